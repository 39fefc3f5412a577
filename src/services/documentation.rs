use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the planning poker backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::join,
        crate::routes::session::state,
        crate::routes::session::set_active_issue,
        crate::routes::session::submit_vote,
        crate::routes::session::reveal_votes,
        crate::routes::session::reset_round,
        crate::routes::session::start_timer,
        crate::routes::session::leave,
        crate::routes::admin::get_config,
        crate::routes::admin::save_config,
        crate::routes::admin::purge_rooms,
        crate::routes::issues::lookup_issue,
        crate::routes::issues::backlog,
        crate::routes::issues::get_issue,
        crate::routes::issues::update_issue,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::RoomTarget,
            crate::dto::session::JoinRequest,
            crate::dto::session::StateRequest,
            crate::dto::session::VoteRequest,
            crate::dto::session::ActiveIssueRequest,
            crate::dto::session::RoundActionRequest,
            crate::dto::session::TimerRequest,
            crate::dto::session::LeaveRequest,
            crate::dto::session::AckResponse,
            crate::dto::session::RoomStateView,
            crate::dto::session::ParticipantView,
            crate::dto::admin::PurgeRequest,
            crate::dto::admin::PurgeOutcome,
            crate::dto::issues::LookupIssueRequest,
            crate::dto::issues::BacklogRequest,
            crate::dto::issues::UpdateIssueRequest,
            crate::dto::issues::UpdateIssueResponse,
            crate::dao::models::AppConfigEntity,
            crate::dao::models::DeckType,
            crate::dao::models::RevealPolicy,
            crate::dao::tracker::models::IssueRef,
            crate::dao::tracker::models::IssueDetails,
            crate::dao::tracker::models::BacklogItem,
            crate::dao::tracker::models::BacklogPage,
            crate::state::room::RoomStatus,
            crate::state::room::TimerStatus,
            crate::state::room::Timer,
        )
    ),
    tags(
        (name = "session", description = "Room join, voting, reveal, and timer operations"),
        (name = "admin", description = "Global configuration and room cleanup"),
        (name = "issues", description = "Issue tracker lookups and updates"),
        (name = "health", description = "Health check endpoints"),
    )
)]
pub struct ApiDoc;
