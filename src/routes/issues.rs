use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};

use crate::{
    dao::tracker::models::{BacklogPage, IssueDetails, IssueRef},
    dto::issues::{BacklogRequest, LookupIssueRequest, UpdateIssueRequest, UpdateIssueResponse},
    services::issue_service,
    state::SharedState,
};

/// Issue tracker endpoints. All read paths degrade to `null`/empty results
/// when the tracker is unavailable, so the estimation UI keeps working.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/issues/lookup", post(lookup_issue))
        .route("/issues/backlog", post(backlog))
        .route("/issues/{id_or_key}", get(get_issue).put(update_issue))
}

/// Resolve an issue key typed by a user; `null` when unknown or unreachable.
#[utoipa::path(
    post,
    path = "/issues/lookup",
    tag = "issues",
    request_body = LookupIssueRequest,
    responses(
        (status = 200, description = "Resolved issue, or null", body = Option<IssueRef>)
    )
)]
pub async fn lookup_issue(
    State(state): State<SharedState>,
    Json(payload): Json<LookupIssueRequest>,
) -> Json<Option<IssueRef>> {
    Json(issue_service::lookup_issue(&state, payload).await)
}

/// Fetch one page of a project's open backlog, in rank order.
#[utoipa::path(
    post,
    path = "/issues/backlog",
    tag = "issues",
    request_body = BacklogRequest,
    responses(
        (status = 200, description = "Backlog page; empty when the tracker is unreachable", body = BacklogPage)
    )
)]
pub async fn backlog(
    State(state): State<SharedState>,
    Json(payload): Json<BacklogRequest>,
) -> Json<BacklogPage> {
    Json(issue_service::backlog(&state, payload).await)
}

/// Fetch the details rendered on the estimation panel.
#[utoipa::path(
    get,
    path = "/issues/{id_or_key}",
    tag = "issues",
    params(("id_or_key" = String, Path, description = "Issue id or key")),
    responses(
        (status = 200, description = "Issue details, or null", body = Option<IssueDetails>)
    )
)]
pub async fn get_issue(
    State(state): State<SharedState>,
    Path(id_or_key): Path<String>,
) -> Json<Option<IssueDetails>> {
    Json(issue_service::fetch_issue(&state, &id_or_key).await)
}

/// Update an issue's summary and/or plain-text description.
#[utoipa::path(
    put,
    path = "/issues/{id_or_key}",
    tag = "issues",
    params(("id_or_key" = String, Path, description = "Issue id or key")),
    request_body = UpdateIssueRequest,
    responses(
        (status = 200, description = "Whether the tracker accepted the update", body = UpdateIssueResponse)
    )
)]
pub async fn update_issue(
    State(state): State<SharedState>,
    Path(id_or_key): Path<String>,
    Json(payload): Json<UpdateIssueRequest>,
) -> Json<UpdateIssueResponse> {
    let success = issue_service::update_issue(&state, &id_or_key, payload).await;
    Json(UpdateIssueResponse { success })
}
