//! In-process [`RoomStore`] backend with the same revision semantics as the
//! durable backends. Not persistent; used by tests and as a local-development
//! fallback when no CouchDB endpoint is configured.

use std::sync::{Arc, Mutex};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;

use crate::dao::models::{AppConfigEntity, RoomKeyPage};
use crate::dao::room_store::{Revision, RoomStore};
use crate::dao::storage::{StorageError, StorageResult};
use crate::state::room::RoomState;

#[derive(Debug, Clone)]
struct StoredRoom {
    rev: u64,
    room: RoomState,
}

#[derive(Default)]
struct Inner {
    rooms: DashMap<String, StoredRoom>,
    config: Mutex<Option<(u64, AppConfigEntity)>>,
}

/// Shared-nothing in-memory store. Cloning yields handles to the same data.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    inner: Arc<Inner>,
}

impl MemoryRoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rooms currently held. Test helper.
    pub fn room_count(&self) -> usize {
        self.inner.rooms.len()
    }
}

impl RoomStore for MemoryRoomStore {
    fn find_room(
        &self,
        room_key: &str,
    ) -> BoxFuture<'static, StorageResult<Option<(RoomState, Revision)>>> {
        let inner = self.inner.clone();
        let room_key = room_key.to_string();
        Box::pin(async move {
            Ok(inner
                .rooms
                .get(&room_key)
                .map(|entry| (entry.room.clone(), entry.rev.to_string())))
        })
    }

    fn save_room(
        &self,
        room: RoomState,
        expected: Option<Revision>,
    ) -> BoxFuture<'static, StorageResult<Revision>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let key = room.room_key.clone();
            // The entry guard holds the shard lock, making the compare and
            // the swap one atomic step.
            match inner.rooms.entry(key.clone()) {
                Entry::Occupied(mut occupied) => {
                    let current = occupied.get().rev;
                    if expected.as_deref() != Some(current.to_string().as_str()) {
                        return Err(StorageError::conflict(key));
                    }
                    let next = current + 1;
                    occupied.insert(StoredRoom { rev: next, room });
                    Ok(next.to_string())
                }
                Entry::Vacant(vacant) => {
                    if expected.is_some() {
                        return Err(StorageError::conflict(key));
                    }
                    vacant.insert(StoredRoom { rev: 1, room });
                    Ok("1".to_string())
                }
            }
        })
    }

    fn delete_room(&self, room_key: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        let room_key = room_key.to_string();
        Box::pin(async move { Ok(inner.rooms.remove(&room_key).is_some()) })
    }

    fn list_room_keys(
        &self,
        limit: usize,
        cursor: Option<String>,
    ) -> BoxFuture<'static, StorageResult<RoomKeyPage>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut keys: Vec<String> = inner
                .rooms
                .iter()
                .map(|entry| entry.key().clone())
                .filter(|key| cursor.as_deref().is_none_or(|c| key.as_str() > c))
                .collect();
            keys.sort();

            let has_more = keys.len() > limit;
            keys.truncate(limit);
            let next_cursor = if has_more { keys.last().cloned() } else { None };

            Ok(RoomKeyPage { keys, next_cursor })
        })
    }

    fn find_config(
        &self,
    ) -> BoxFuture<'static, StorageResult<Option<(AppConfigEntity, Revision)>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.config.lock().expect("config lock poisoned");
            Ok(guard
                .as_ref()
                .map(|(rev, config)| (config.clone(), rev.to_string())))
        })
    }

    fn save_config(
        &self,
        config: AppConfigEntity,
        expected: Option<Revision>,
    ) -> BoxFuture<'static, StorageResult<Revision>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.config.lock().expect("config lock poisoned");
            let current = guard.as_ref().map(|(rev, _)| *rev);
            if expected.as_deref() != current.map(|rev| rev.to_string()).as_deref() {
                return Err(StorageError::conflict("app-config"));
            }
            let next = current.unwrap_or(0) + 1;
            *guard = Some((next, config));
            Ok(next.to_string())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
