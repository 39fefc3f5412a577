//! Payloads for the session operations and the viewer-specific room
//! projection returned to clients.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::dao::models::{DeckType, RevealPolicy};
use crate::dto::validation::{validate_display_name, validate_identifier};
use crate::state::room::{Participant, RoomState, RoomStatus, Timer};

/// Room addressing shared by every session payload: an explicit room key
/// wins, otherwise the legacy issue-panel mode addresses the room by the
/// issue id. Both modes live in the same storage namespace.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomTarget {
    /// Explicit room key (project mode).
    #[serde(default)]
    pub room_key: Option<String>,
    /// Issue id used as the room key when no explicit key is given.
    #[serde(default)]
    pub issue_id: Option<String>,
}

impl RoomTarget {
    /// Resolve the storage room key. Blank values count as absent.
    pub fn resolve(&self) -> Option<&str> {
        self.room_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                self.issue_id
                    .as_deref()
                    .filter(|id| !id.trim().is_empty())
            })
    }
}

/// Payload to enter (or lazily create) a room.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// Room addressing.
    #[serde(flatten)]
    pub target: RoomTarget,
    /// Already-authenticated account id of the joiner.
    pub account_id: String,
    /// Name shown on the joiner's seat.
    pub display_name: String,
    /// Avatar image URL, if the platform supplies one.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Validate for JoinRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_identifier(&self.account_id) {
            errors.add("account_id", e);
        }
        if let Err(e) = validate_display_name(&self.display_name) {
            errors.add("display_name", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload for the read-only state poll.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StateRequest {
    /// Room addressing.
    #[serde(flatten)]
    pub target: RoomTarget,
    /// Viewer account id; absent viewers see every vote masked pre-reveal.
    #[serde(default)]
    pub account_id: Option<String>,
}

/// Payload to cast (or clear, with a null value) a vote.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    /// Room addressing.
    #[serde(flatten)]
    pub target: RoomTarget,
    /// Voting account id.
    pub account_id: String,
    /// Selected card value; `null` withdraws the vote.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub vote: Option<Value>,
}

/// Payload to switch the issue under estimation.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveIssueRequest {
    /// Room key (project mode is the only mode with a backlog to pick from).
    pub room_key: String,
    /// Acting account id; must hold the moderator seat.
    pub account_id: String,
    /// Issue to estimate next; `null` clears the selection.
    #[serde(default)]
    pub issue_id: Option<String>,
}

/// Payload for moderator round actions (reveal, reset).
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoundActionRequest {
    /// Room addressing.
    #[serde(flatten)]
    pub target: RoomTarget,
    /// Acting account id.
    pub account_id: String,
}

/// Payload to start the shared countdown.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimerRequest {
    /// Room addressing.
    #[serde(flatten)]
    pub target: RoomTarget,
    /// Acting account id; must hold the moderator seat.
    pub account_id: String,
    /// Countdown length in seconds; clamped to sane bounds server-side.
    #[serde(default)]
    pub duration: Option<u32>,
}

/// Payload to leave a room.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    /// Room addressing.
    #[serde(flatten)]
    pub target: RoomTarget,
    /// Leaving account id.
    pub account_id: String,
}

/// Generic acknowledgement for operations without a state payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct AckResponse {
    /// Whether the operation took effect.
    pub success: bool,
}

/// One participant as seen by a specific viewer.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    /// Name shown on the seat.
    pub display_name: String,
    /// Avatar image URL.
    pub avatar_url: Option<String>,
    /// Card value; masked (`null`) for other participants until reveal.
    #[schema(value_type = Option<Object>)]
    pub vote: Option<Value>,
    /// Whether a vote has been cast, always visible.
    pub has_voted: bool,
    /// Epoch milliseconds of the first join.
    pub joined_at: i64,
    /// Whether this participant holds the moderator seat.
    pub is_moderator: bool,
}

/// Room state as returned to one polling viewer.
///
/// The stored document always carries every vote; this projection is what
/// keeps ballots secret while the round is open. The viewer sees their own
/// vote, everyone sees `has_voted`, and nobody sees another ballot until the
/// room is revealed.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateView {
    /// Stable identity of the room.
    pub room_key: String,
    /// Structural version, bumped when the active issue switches.
    pub version: u64,
    /// Work item currently being estimated.
    pub active_issue_id: Option<String>,
    /// Voting/revealed round status.
    pub status: RoomStatus,
    /// Account id of the moderator.
    pub moderator_id: Option<String>,
    /// Participants in join order.
    pub participants: IndexMap<String, ParticipantView>,
    /// Deck frozen at room creation.
    pub deck_type: DeckType,
    /// Card values used when the deck is custom.
    pub custom_deck: Option<Vec<String>>,
    /// Reveal permission frozen at room creation.
    pub reveal_policy: RevealPolicy,
    /// Shared countdown state.
    pub timer: Timer,
    /// Epoch milliseconds of the last accepted mutation.
    pub updated_at: i64,
}

impl RoomStateView {
    /// Project a stored room for one viewer, masking other participants'
    /// ballots while the round is still open.
    pub fn for_viewer(room: &RoomState, viewer: Option<&str>) -> Self {
        let participants = room
            .participants
            .iter()
            .map(|(id, participant)| {
                let own = viewer == Some(id.as_str());
                (id.clone(), project_participant(participant, room.status, own))
            })
            .collect();

        Self {
            room_key: room.room_key.clone(),
            version: room.version,
            active_issue_id: room.active_issue_id.clone(),
            status: room.status,
            moderator_id: room.moderator_id.clone(),
            participants,
            deck_type: room.deck_type,
            custom_deck: room.custom_deck.clone(),
            reveal_policy: room.reveal_policy,
            timer: room.timer.clone(),
            updated_at: room.updated_at,
        }
    }
}

fn project_participant(participant: &Participant, status: RoomStatus, own: bool) -> ParticipantView {
    let vote = match status {
        RoomStatus::Revealed => participant.vote.clone(),
        RoomStatus::Voting if own => participant.vote.clone(),
        RoomStatus::Voting => None,
    };

    ParticipantView {
        display_name: participant.display_name.clone(),
        avatar_url: participant.avatar_url.clone(),
        vote,
        has_voted: participant.has_voted,
        joined_at: participant.joined_at,
        is_moderator: participant.is_moderator,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::AppConfigEntity;

    fn voted_room() -> RoomState {
        let mut room = RoomState::create("GS", None, &AppConfigEntity::default(), 1_000);
        room.insert_participant("acct-1", "Alice".into(), None, 1_000);
        room.insert_participant("acct-2", "Bob".into(), None, 2_000);
        room.record_vote("acct-1", Some(Value::from(5)));
        room.record_vote("acct-2", Some(Value::from(8)));
        room
    }

    #[test]
    fn votes_are_masked_while_voting() {
        let room = voted_room();
        let view = RoomStateView::for_viewer(&room, Some("acct-1"));

        assert_eq!(view.participants["acct-1"].vote, Some(Value::from(5)));
        assert_eq!(view.participants["acct-2"].vote, None);
        assert!(view.participants["acct-2"].has_voted);
    }

    #[test]
    fn anonymous_viewers_see_no_votes() {
        let room = voted_room();
        let view = RoomStateView::for_viewer(&room, None);

        assert!(view.participants.values().all(|p| p.vote.is_none()));
        assert!(view.participants.values().all(|p| p.has_voted));
    }

    #[test]
    fn reveal_exposes_every_vote() {
        let mut room = voted_room();
        room.reveal();
        let view = RoomStateView::for_viewer(&room, Some("acct-1"));

        assert_eq!(view.participants["acct-1"].vote, Some(Value::from(5)));
        assert_eq!(view.participants["acct-2"].vote, Some(Value::from(8)));
    }

    #[test]
    fn target_prefers_room_key_over_issue_id() {
        let target = RoomTarget {
            room_key: Some("GS".into()),
            issue_id: Some("10042".into()),
        };
        assert_eq!(target.resolve(), Some("GS"));

        let legacy = RoomTarget {
            room_key: None,
            issue_id: Some("10042".into()),
        };
        assert_eq!(legacy.resolve(), Some("10042"));

        let blank = RoomTarget {
            room_key: Some("   ".into()),
            issue_id: None,
        };
        assert_eq!(blank.resolve(), None);
    }

    #[test]
    fn join_request_validation_flags_bad_fields() {
        let request = JoinRequest {
            target: RoomTarget::default(),
            account_id: "".into(),
            display_name: "  ".into(),
            avatar_url: None,
        };
        assert!(request.validate().is_err());

        let request = JoinRequest {
            target: RoomTarget::default(),
            account_id: "acct-1".into(),
            display_name: "Alice".into(),
            avatar_url: None,
        };
        assert!(request.validate().is_ok());
    }
}
