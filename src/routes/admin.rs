use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dao::models::AppConfigEntity,
    dto::admin::{PurgeOutcome, PurgeRequest},
    error::AppError,
    services::admin_service,
    state::SharedState,
};

/// Admin endpoints: global deck configuration and room cleanup.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/admin/config", get(get_config).put(save_config))
        .route("/admin/rooms/purge", post(purge_rooms))
}

/// Read the global estimation config; `null` when it was never saved.
#[utoipa::path(
    get,
    path = "/admin/config",
    tag = "admin",
    responses(
        (status = 200, description = "Stored config, or null", body = Option<AppConfigEntity>)
    )
)]
pub async fn get_config(
    State(state): State<SharedState>,
) -> Result<Json<Option<AppConfigEntity>>, AppError> {
    Ok(Json(admin_service::get_config(&state).await?))
}

/// Replace the global estimation config. Only affects rooms created later.
#[utoipa::path(
    put,
    path = "/admin/config",
    tag = "admin",
    request_body = AppConfigEntity,
    responses(
        (status = 200, description = "Saved config", body = AppConfigEntity),
        (status = 400, description = "Custom deck without values")
    )
)]
pub async fn save_config(
    State(state): State<SharedState>,
    Json(payload): Json<AppConfigEntity>,
) -> Result<Json<AppConfigEntity>, AppError> {
    Ok(Json(admin_service::save_config(&state, payload).await?))
}

/// Delete one bounded batch of rooms; call again while a cursor is returned.
#[utoipa::path(
    post,
    path = "/admin/rooms/purge",
    tag = "admin",
    request_body = PurgeRequest,
    responses(
        (status = 200, description = "Batch outcome with continuation cursor", body = PurgeOutcome)
    )
)]
pub async fn purge_rooms(
    State(state): State<SharedState>,
    Json(payload): Json<PurgeRequest>,
) -> Result<Json<PurgeOutcome>, AppError> {
    Ok(Json(admin_service::purge_rooms(&state, payload).await?))
}
