//! Shared application state: the installed storage backend, the degraded-mode
//! flag, and the optional issue tracker handle. There is deliberately no other
//! in-process mutable state; every session operation is stateless across
//! invocations and coordinates only through the store, since clients observe
//! changes by polling rather than through any push channel.

pub mod room;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::dao::room_store::RoomStore;
use crate::dao::tracker::TrackerClient;
use crate::error::ServiceError;

/// Cheaply cloneable handle to [`AppState`].
pub type SharedState = Arc<AppState>;

/// Central application state shared by every request handler.
pub struct AppState {
    room_store: RwLock<Option<Arc<dyn RoomStore>>>,
    tracker: Option<Arc<TrackerClient>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned
    /// cheaply. The application starts in degraded mode until a storage
    /// backend is installed.
    pub fn new(tracker: Option<Arc<TrackerClient>>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            room_store: RwLock::new(None),
            tracker,
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        let guard = self.room_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the room store or fail with a degraded-mode error.
    pub async fn require_room_store(&self) -> Result<Arc<dyn RoomStore>, ServiceError> {
        self.room_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a storage backend and leave degraded mode.
    pub async fn set_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.room_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current storage backend and enter degraded mode.
    pub async fn clear_room_store(&self) {
        {
            let mut guard = self.room_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Handle to the issue tracker client, if one is configured.
    pub fn tracker(&self) -> Option<Arc<TrackerClient>> {
        self.tracker.clone()
    }
}
