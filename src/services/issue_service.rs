//! Degrading wrappers over the issue tracker boundary. Upstream faults are
//! absorbed here: read paths fall back to "no data" and updates report
//! failure, so a broken tracker never breaks the estimation session itself.

use tracing::warn;

use crate::dao::tracker::models::{BacklogPage, IssueDetails, IssueRef};
use crate::dto::issues::{BacklogRequest, LookupIssueRequest, UpdateIssueRequest};
use crate::state::SharedState;

/// Resolve an issue key typed by a user. `None` when the tracker is
/// unconfigured, unavailable, or does not know the key.
pub async fn lookup_issue(state: &SharedState, request: LookupIssueRequest) -> Option<IssueRef> {
    let tracker = state.tracker()?;
    match tracker.lookup_issue(request.issue_key.trim()).await {
        Ok(found) => found,
        Err(err) => {
            warn!(error = %err, issue_key = %request.issue_key, "issue lookup failed");
            None
        }
    }
}

/// Fetch the details rendered on the estimation panel, degraded to `None` on
/// any upstream fault.
pub async fn fetch_issue(state: &SharedState, id_or_key: &str) -> Option<IssueDetails> {
    let tracker = state.tracker()?;
    match tracker.fetch_issue(id_or_key.trim()).await {
        Ok(found) => found,
        Err(err) => {
            warn!(error = %err, issue = %id_or_key, "issue fetch failed");
            None
        }
    }
}

/// Fetch one page of a project's open backlog, degraded to an empty page on
/// any upstream fault. A full issue key is tolerated and reduced to its
/// project prefix.
pub async fn backlog(state: &SharedState, request: BacklogRequest) -> BacklogPage {
    let project_key = normalize_project_key(&request.project_key);
    if project_key.is_empty() {
        warn!("backlog requested without a project key");
        return BacklogPage::default();
    }

    let Some(tracker) = state.tracker() else {
        return BacklogPage::default();
    };

    match tracker
        .search_backlog(project_key, request.next_page_token)
        .await
    {
        Ok(page) => page,
        Err(err) => {
            warn!(error = %err, project_key, "backlog search failed");
            BacklogPage::default()
        }
    }
}

/// Push a summary/description edit to the tracker. Reports whether the
/// tracker accepted it; never raises.
pub async fn update_issue(
    state: &SharedState,
    issue_id: &str,
    request: UpdateIssueRequest,
) -> bool {
    let Some(tracker) = state.tracker() else {
        warn!("issue update requested but no tracker is configured");
        return false;
    };

    match tracker
        .update_issue(
            issue_id,
            request.summary.as_deref(),
            request.description.as_deref(),
        )
        .await
    {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, issue_id, "issue update failed");
            false
        }
    }
}

/// Reduce user input to a bare project key: `GS-123` becomes `GS`.
fn normalize_project_key(input: &str) -> &str {
    let trimmed = input.trim();
    trimmed.split('-').next().unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_keys_reduce_to_their_project() {
        assert_eq!(normalize_project_key("GS-123"), "GS");
        assert_eq!(normalize_project_key("GS"), "GS");
        assert_eq!(normalize_project_key("  GS-123  "), "GS");
        assert_eq!(normalize_project_key(""), "");
    }

    #[tokio::test]
    async fn everything_degrades_without_a_tracker() {
        let state = crate::state::AppState::new(None);

        assert!(
            lookup_issue(
                &state,
                LookupIssueRequest {
                    issue_key: "GS-1".into()
                }
            )
            .await
            .is_none()
        );
        assert!(fetch_issue(&state, "GS-1").await.is_none());
        assert_eq!(
            backlog(
                &state,
                BacklogRequest {
                    project_key: "GS".into(),
                    next_page_token: None
                }
            )
            .await,
            BacklogPage::default()
        );
        assert!(
            !update_issue(
                &state,
                "10001",
                UpdateIssueRequest {
                    summary: Some("new".into()),
                    description: None
                }
            )
            .await
        );
    }
}
