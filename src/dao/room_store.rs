use futures::future::BoxFuture;

use crate::dao::models::{AppConfigEntity, RoomKeyPage};
use crate::dao::storage::StorageResult;
use crate::state::room::RoomState;

/// Opaque token identifying one stored version of a document. Conditional
/// writes compare against it; a mismatch means another writer got there
/// first and the whole read-modify-write cycle must be retried.
pub type Revision = String;

/// Abstraction over the durable document store holding rooms and the global
/// config singleton.
///
/// Reads return the revision alongside the document; writes are conditional
/// on it. Passing `None` as the expected revision means "the document must
/// not exist yet" (the create path). There is no cross-key transactionality.
pub trait RoomStore: Send + Sync {
    /// Fetch a room document and its current revision.
    fn find_room(
        &self,
        room_key: &str,
    ) -> BoxFuture<'static, StorageResult<Option<(RoomState, Revision)>>>;

    /// Conditionally replace (or create, with `expected = None`) a room
    /// document. Yields the new revision, or [`StorageError::Conflict`]
    /// when the stored revision no longer matches.
    ///
    /// [`StorageError::Conflict`]: crate::dao::storage::StorageError::Conflict
    fn save_room(
        &self,
        room: RoomState,
        expected: Option<Revision>,
    ) -> BoxFuture<'static, StorageResult<Revision>>;

    /// Delete a room document. Returns whether it existed.
    fn delete_room(&self, room_key: &str) -> BoxFuture<'static, StorageResult<bool>>;

    /// Scan room keys in key order, at most `limit` per call, resuming from
    /// an opaque cursor returned by a previous call.
    fn list_room_keys(
        &self,
        limit: usize,
        cursor: Option<String>,
    ) -> BoxFuture<'static, StorageResult<RoomKeyPage>>;

    /// Fetch the global config singleton and its revision.
    fn find_config(
        &self,
    ) -> BoxFuture<'static, StorageResult<Option<(AppConfigEntity, Revision)>>>;

    /// Conditionally replace (or create) the global config singleton.
    fn save_config(
        &self,
        config: AppConfigEntity,
        expected: Option<Revision>,
    ) -> BoxFuture<'static, StorageResult<Revision>>;

    /// Cheap liveness probe against the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;

    /// Attempt to re-establish connectivity after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
