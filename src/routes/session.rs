use axum::{Json, Router, extract::State, routing::post};
use validator::Validate;

use crate::{
    dto::session::{
        AckResponse, ActiveIssueRequest, JoinRequest, LeaveRequest, RoomStateView,
        RoundActionRequest, StateRequest, TimerRequest, VoteRequest,
    },
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Session operations: everything a participant or moderator does to a room.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/join", post(join))
        .route("/rooms/state", post(state))
        .route("/rooms/active-issue", post(set_active_issue))
        .route("/rooms/vote", post(submit_vote))
        .route("/rooms/reveal", post(reveal_votes))
        .route("/rooms/reset", post(reset_round))
        .route("/rooms/timer/start", post(start_timer))
        .route("/rooms/leave", post(leave))
}

/// Enter a room, creating it on first join.
#[utoipa::path(
    post,
    path = "/rooms/join",
    tag = "session",
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Current room state for the joiner", body = RoomStateView),
        (status = 409, description = "Persistent write contention, retry")
    )
)]
pub async fn join(
    State(state): State<SharedState>,
    Json(payload): Json<JoinRequest>,
) -> Result<Json<RoomStateView>, AppError> {
    payload.validate()?;
    let view = room_service::join(&state, payload).await?;
    Ok(Json(view))
}

/// Poll the room state. Returns `null` for rooms that were never created.
#[utoipa::path(
    post,
    path = "/rooms/state",
    tag = "session",
    request_body = StateRequest,
    responses(
        (status = 200, description = "Room state for the viewer, or null", body = Option<RoomStateView>)
    )
)]
pub async fn state(
    State(state): State<SharedState>,
    Json(payload): Json<StateRequest>,
) -> Result<Json<Option<RoomStateView>>, AppError> {
    let view = room_service::get_state(&state, payload).await?;
    Ok(Json(view))
}

/// Switch the issue under estimation (moderator only).
#[utoipa::path(
    post,
    path = "/rooms/active-issue",
    tag = "session",
    request_body = ActiveIssueRequest,
    responses(
        (status = 200, description = "Updated room state, or null for an unknown room", body = Option<RoomStateView>),
        (status = 403, description = "Acting account is not the moderator")
    )
)]
pub async fn set_active_issue(
    State(state): State<SharedState>,
    Json(payload): Json<ActiveIssueRequest>,
) -> Result<Json<Option<RoomStateView>>, AppError> {
    let view = room_service::set_active_issue(&state, payload).await?;
    Ok(Json(view))
}

/// Cast or withdraw a vote; a silent no-op outside an open round.
#[utoipa::path(
    post,
    path = "/rooms/vote",
    tag = "session",
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Room state after the vote, or null for an unknown room", body = Option<RoomStateView>)
    )
)]
pub async fn submit_vote(
    State(state): State<SharedState>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<Option<RoomStateView>>, AppError> {
    let view = room_service::submit_vote(&state, payload).await?;
    Ok(Json(view))
}

/// Expose every vote.
#[utoipa::path(
    post,
    path = "/rooms/reveal",
    tag = "session",
    request_body = RoundActionRequest,
    responses(
        (status = 200, description = "Revealed room state, or null for an unknown room", body = Option<RoomStateView>),
        (status = 403, description = "Acting account may not reveal")
    )
)]
pub async fn reveal_votes(
    State(state): State<SharedState>,
    Json(payload): Json<RoundActionRequest>,
) -> Result<Json<Option<RoomStateView>>, AppError> {
    let view = room_service::reveal_votes(&state, payload).await?;
    Ok(Json(view))
}

/// Start a fresh voting round (moderator only).
#[utoipa::path(
    post,
    path = "/rooms/reset",
    tag = "session",
    request_body = RoundActionRequest,
    responses(
        (status = 200, description = "Reset room state, or null for an unknown room", body = Option<RoomStateView>),
        (status = 403, description = "Acting account is not the moderator")
    )
)]
pub async fn reset_round(
    State(state): State<SharedState>,
    Json(payload): Json<RoundActionRequest>,
) -> Result<Json<Option<RoomStateView>>, AppError> {
    let view = room_service::reset_round(&state, payload).await?;
    Ok(Json(view))
}

/// Start the shared countdown (moderator only).
#[utoipa::path(
    post,
    path = "/rooms/timer/start",
    tag = "session",
    request_body = TimerRequest,
    responses(
        (status = 200, description = "Room state with the running timer, or null", body = Option<RoomStateView>),
        (status = 403, description = "Acting account is not the moderator")
    )
)]
pub async fn start_timer(
    State(state): State<SharedState>,
    Json(payload): Json<TimerRequest>,
) -> Result<Json<Option<RoomStateView>>, AppError> {
    let view = room_service::start_timer(&state, payload).await?;
    Ok(Json(view))
}

/// Leave a room, handing over the moderator seat when needed.
#[utoipa::path(
    post,
    path = "/rooms/leave",
    tag = "session",
    request_body = LeaveRequest,
    responses(
        (status = 200, description = "Acknowledgement", body = AckResponse)
    )
)]
pub async fn leave(
    State(state): State<SharedState>,
    Json(payload): Json<LeaveRequest>,
) -> Result<Json<AckResponse>, AppError> {
    room_service::leave(&state, payload).await?;
    // Leaving an unknown room still acknowledges; pollers may retry leaves.
    Ok(Json(AckResponse { success: true }))
}
