//! DTO definitions used by the admin routes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request to delete a batch of rooms, resuming from an earlier batch.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurgeRequest {
    /// Cursor returned by the previous call; absent for the first batch.
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Outcome of one purge batch. A non-null cursor means more rooms remain;
/// callers repeat until it comes back null.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurgeOutcome {
    /// Rooms deleted by this batch.
    pub deleted: u64,
    /// Cursor for the next batch, `null` once the scan is exhausted.
    pub next_cursor: Option<String>,
}
