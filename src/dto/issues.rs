//! DTO definitions for the issue tracker routes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request to resolve an issue key typed by a user.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LookupIssueRequest {
    /// Human-facing issue key (e.g. `GS-123`).
    pub issue_key: String,
}

/// Request for one page of a project's open backlog.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BacklogRequest {
    /// Project key; a full issue key is tolerated and reduced to its prefix.
    pub project_key: String,
    /// Continuation token from the previous page.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Request to update an issue's summary and/or plain-text description.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIssueRequest {
    /// New one-line summary, when present.
    #[serde(default)]
    pub summary: Option<String>,
    /// New description as plain paragraphs, when present.
    #[serde(default)]
    pub description: Option<String>,
}

/// Acknowledgement for an issue update.
#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateIssueResponse {
    /// Whether the tracker accepted the update.
    pub success: bool,
}
