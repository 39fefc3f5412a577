//! Projections of tracker issues shared across layers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Minimal reference resolved from an issue key lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueRef {
    /// Tracker-internal issue id.
    pub id: String,
    /// Human-facing issue key (e.g. `GS-123`).
    pub key: String,
    /// One-line summary.
    pub summary: String,
}

/// Full issue details shown on the estimation panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueDetails {
    /// Tracker-internal issue id.
    pub id: String,
    /// Human-facing issue key.
    pub key: String,
    /// One-line summary.
    pub summary: String,
    /// Description flattened to plain paragraphs.
    pub description: Option<String>,
    /// Workflow status name.
    pub status: Option<String>,
}

/// One backlog entry eligible for estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BacklogItem {
    /// Tracker-internal issue id.
    pub id: String,
    /// Human-facing issue key.
    pub key: String,
    /// One-line summary.
    pub summary: String,
    /// Workflow status name.
    pub status: String,
    /// Issue type icon URL.
    pub icon: Option<String>,
    /// Current story-point estimate, if any.
    pub story_points: Option<f64>,
}

/// A page of backlog entries plus the continuation token for the next page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BacklogPage {
    /// Issues in rank order.
    pub issues: Vec<BacklogItem>,
    /// Total number of matches reported by the tracker, when known.
    pub total: Option<u64>,
    /// Opaque token to fetch the next page; `None` on the last page.
    pub next_page_token: Option<String>,
}
