//! Canonical room document and its invariant-preserving mutators.
//!
//! A [`RoomState`] is the unit of persistence: the session service reads one,
//! mutates it through the methods here, and conditionally writes it back.
//! Nothing in this module performs I/O.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::dao::models::{AppConfigEntity, DeckType, RevealPolicy};

/// Default countdown length in seconds when none is requested.
pub const DEFAULT_TIMER_SECS: u32 = 60;

/// Current milliseconds since the Unix epoch, the timestamp unit used on the wire.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Whether votes are currently hidden or exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    /// Votes are being collected and stay hidden from other participants.
    Voting,
    /// Votes have been exposed to every participant.
    Revealed,
}

/// Whether the shared countdown is ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerStatus {
    /// No countdown is running.
    Stopped,
    /// A countdown was started and clients render the remaining time.
    Running,
}

/// Shared countdown state. A running timer never forces a reveal by itself;
/// acting on expiry is the polling client's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    /// Epoch milliseconds at which the countdown started, if any.
    pub start_time: Option<i64>,
    /// Countdown length in seconds.
    pub duration: u32,
    /// Whether the countdown is running.
    pub status: TimerStatus,
}

impl Timer {
    /// A stopped timer with the default duration.
    pub fn stopped() -> Self {
        Self {
            start_time: None,
            duration: DEFAULT_TIMER_SECS,
            status: TimerStatus::Stopped,
        }
    }

    /// A timer started at `now` for `duration` seconds.
    pub fn running(now: i64, duration: u32) -> Self {
        Self {
            start_time: Some(now),
            duration,
            status: TimerStatus::Running,
        }
    }
}

/// One authenticated account's membership record within a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Name shown on the participant's seat.
    pub display_name: String,
    /// Avatar image URL, if the hosting platform supplied one.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Selected card value; decks mix numbers and strings, so this stays JSON.
    #[serde(default)]
    pub vote: Option<Value>,
    /// Whether a non-null vote has been cast this round.
    pub has_voted: bool,
    /// Epoch milliseconds when the account first joined the room.
    pub joined_at: i64,
    /// Mirror of `moderator_id == this account`, kept in sync on every
    /// membership change.
    pub is_moderator: bool,
}

/// The canonical session document, one per room key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    /// Stable identity of the room, derived from a project key or issue id.
    pub room_key: String,
    /// Structural version, bumped when the active issue switches.
    pub version: u64,
    /// Work item currently being estimated, if one is selected.
    #[serde(default)]
    pub active_issue_id: Option<String>,
    /// Voting/revealed round status.
    pub status: RoomStatus,
    /// Account id of the single moderator, `None` only for an empty room.
    #[serde(default)]
    pub moderator_id: Option<String>,
    /// Membership records keyed by account id, in join order.
    pub participants: IndexMap<String, Participant>,
    /// Deck captured from the global config when the room was created.
    pub deck_type: DeckType,
    /// Card values used when `deck_type` is custom.
    #[serde(default)]
    pub custom_deck: Option<Vec<String>>,
    /// Reveal permission captured from the global config at creation time.
    #[serde(default = "default_reveal_policy")]
    pub reveal_policy: RevealPolicy,
    /// Shared countdown state.
    pub timer: Timer,
    /// Epoch milliseconds of the last accepted mutation; advisory only.
    pub updated_at: i64,
}

fn default_reveal_policy() -> RevealPolicy {
    RevealPolicy::Moderator
}

impl RoomState {
    /// Build a fresh room seeded from the global config captured at this
    /// moment. The deck and reveal policy are frozen for the room's lifetime.
    pub fn create(
        room_key: impl Into<String>,
        active_issue_id: Option<String>,
        config: &AppConfigEntity,
        now: i64,
    ) -> Self {
        Self {
            room_key: room_key.into(),
            version: 1,
            active_issue_id,
            status: RoomStatus::Voting,
            moderator_id: None,
            participants: IndexMap::new(),
            deck_type: config.deck_type,
            custom_deck: config.custom_deck.clone(),
            reveal_policy: config.who_can_reveal,
            timer: Timer::stopped(),
            updated_at: now,
        }
    }

    /// Whether the account is the current moderator.
    pub fn is_moderator(&self, account_id: &str) -> bool {
        self.moderator_id.as_deref() == Some(account_id)
    }

    /// Whether the account is allowed to reveal votes in this room.
    pub fn can_reveal(&self, account_id: &str) -> bool {
        match self.reveal_policy {
            RevealPolicy::Moderator => self.is_moderator(account_id),
            RevealPolicy::Everyone => self.participants.contains_key(account_id),
        }
    }

    /// Add an account to the room, claiming the moderator seat when it is
    /// vacant. Re-adding an existing account only corrects a stale
    /// `is_moderator` flag. Returns whether the document changed.
    pub fn insert_participant(
        &mut self,
        account_id: &str,
        display_name: String,
        avatar_url: Option<String>,
        now: i64,
    ) -> bool {
        if self.moderator_id.is_none() {
            self.moderator_id = Some(account_id.to_string());
        }

        if let Some(existing) = self.participants.get_mut(account_id) {
            let expected = self.moderator_id.as_deref() == Some(account_id);
            if existing.is_moderator != expected {
                existing.is_moderator = expected;
                return true;
            }
            return false;
        }

        self.participants.insert(
            account_id.to_string(),
            Participant {
                display_name,
                avatar_url,
                vote: None,
                has_voted: false,
                joined_at: now,
                is_moderator: self.is_moderator(account_id),
            },
        );
        self.sync_moderator_flags();
        true
    }

    /// Remove an account from the room. When the moderator leaves, the seat
    /// passes to the remaining participant with the earliest `joined_at`,
    /// ties broken by smallest account id; an emptied room has no moderator.
    /// Returns whether the account was present.
    pub fn remove_participant(&mut self, account_id: &str) -> bool {
        if self.participants.shift_remove(account_id).is_none() {
            return false;
        }

        if self.is_moderator(account_id) {
            self.moderator_id = self
                .participants
                .iter()
                .min_by_key(|(id, p)| (p.joined_at, id.as_str()))
                .map(|(id, _)| id.clone());
            self.sync_moderator_flags();
        }
        true
    }

    /// Record a vote for a participant. Only meaningful while voting; the
    /// caller guards on [`RoomStatus::Voting`]. `has_voted` tracks whether
    /// the value is non-null. Returns whether the account was present.
    pub fn record_vote(&mut self, account_id: &str, vote: Option<Value>) -> bool {
        let Some(participant) = self.participants.get_mut(account_id) else {
            return false;
        };
        participant.has_voted = !matches!(vote, None | Some(Value::Null));
        participant.vote = vote;
        true
    }

    /// Switch the room to a new active issue: forces voting, bumps the
    /// structural version, and wipes every participant's vote.
    pub fn set_active_issue(&mut self, issue_id: Option<String>) {
        self.active_issue_id = issue_id;
        self.status = RoomStatus::Voting;
        self.version += 1;
        self.clear_votes();
    }

    /// Expose all votes. Idempotent.
    pub fn reveal(&mut self) {
        self.status = RoomStatus::Revealed;
    }

    /// Start a fresh voting round: hide votes, wipe ballots, stop the timer.
    pub fn reset_round(&mut self) {
        self.status = RoomStatus::Voting;
        self.clear_votes();
        self.timer = Timer::stopped();
    }

    /// Wipe every participant's vote and `has_voted` flag.
    pub fn clear_votes(&mut self) {
        for participant in self.participants.values_mut() {
            participant.vote = None;
            participant.has_voted = false;
        }
    }

    /// Re-derive every `is_moderator` flag from `moderator_id`.
    fn sync_moderator_flags(&mut self) {
        let moderator = self.moderator_id.clone();
        for (id, participant) in self.participants.iter_mut() {
            participant.is_moderator = moderator.as_deref() == Some(id.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfigEntity {
        AppConfigEntity::default()
    }

    fn moderator_flag_count(room: &RoomState) -> usize {
        room.participants
            .values()
            .filter(|p| p.is_moderator)
            .count()
    }

    fn assert_single_moderator(room: &RoomState) {
        match &room.moderator_id {
            Some(id) => {
                assert_eq!(moderator_flag_count(room), 1);
                assert!(room.participants[id.as_str()].is_moderator);
            }
            None => {
                assert!(room.participants.is_empty());
                assert_eq!(moderator_flag_count(room), 0);
            }
        }
    }

    #[test]
    fn first_join_claims_moderator() {
        let mut room = RoomState::create("GS", None, &config(), 1_000);
        assert!(room.insert_participant("acct-1", "Alice".into(), None, 1_000));

        assert_eq!(room.moderator_id.as_deref(), Some("acct-1"));
        assert!(room.participants["acct-1"].is_moderator);
        assert_single_moderator(&room);
    }

    #[test]
    fn second_join_does_not_take_the_seat() {
        let mut room = RoomState::create("GS", None, &config(), 1_000);
        room.insert_participant("acct-1", "Alice".into(), None, 1_000);
        room.insert_participant("acct-2", "Bob".into(), None, 2_000);

        assert_eq!(room.moderator_id.as_deref(), Some("acct-1"));
        assert!(!room.participants["acct-2"].is_moderator);
        assert_single_moderator(&room);
    }

    #[test]
    fn rejoin_is_a_noop() {
        let mut room = RoomState::create("GS", None, &config(), 1_000);
        room.insert_participant("acct-1", "Alice".into(), None, 1_000);
        let before = room.clone();

        let changed = room.insert_participant("acct-1", "Alice".into(), None, 9_999);
        assert!(!changed);
        assert_eq!(room, before);
    }

    #[test]
    fn rejoin_repairs_stale_moderator_flag() {
        let mut room = RoomState::create("GS", None, &config(), 1_000);
        room.insert_participant("acct-1", "Alice".into(), None, 1_000);
        room.participants.get_mut("acct-1").unwrap().is_moderator = false;

        assert!(room.insert_participant("acct-1", "Alice".into(), None, 2_000));
        assert_single_moderator(&room);
    }

    #[test]
    fn moderator_leave_reassigns_to_earliest_joiner() {
        let mut room = RoomState::create("GS", None, &config(), 1_000);
        room.insert_participant("acct-1", "Alice".into(), None, 1_000);
        room.insert_participant("acct-3", "Carol".into(), None, 3_000);
        room.insert_participant("acct-2", "Bob".into(), None, 2_000);

        assert!(room.remove_participant("acct-1"));
        assert_eq!(room.moderator_id.as_deref(), Some("acct-2"));
        assert_single_moderator(&room);
    }

    #[test]
    fn moderator_leave_ties_break_on_account_id() {
        let mut room = RoomState::create("GS", None, &config(), 1_000);
        room.insert_participant("acct-9", "Alice".into(), None, 1_000);
        room.insert_participant("acct-b", "Bob".into(), None, 5_000);
        room.insert_participant("acct-a", "Ann".into(), None, 5_000);

        room.remove_participant("acct-9");
        assert_eq!(room.moderator_id.as_deref(), Some("acct-a"));
    }

    #[test]
    fn last_leave_empties_the_room() {
        let mut room = RoomState::create("GS", None, &config(), 1_000);
        room.insert_participant("acct-1", "Alice".into(), None, 1_000);

        room.remove_participant("acct-1");
        assert_eq!(room.moderator_id, None);
        assert_single_moderator(&room);
    }

    #[test]
    fn removing_a_stranger_changes_nothing() {
        let mut room = RoomState::create("GS", None, &config(), 1_000);
        room.insert_participant("acct-1", "Alice".into(), None, 1_000);
        let before = room.clone();

        assert!(!room.remove_participant("acct-404"));
        assert_eq!(room, before);
    }

    #[test]
    fn null_vote_clears_has_voted() {
        let mut room = RoomState::create("GS", None, &config(), 1_000);
        room.insert_participant("acct-1", "Alice".into(), None, 1_000);

        assert!(room.record_vote("acct-1", Some(Value::from(5))));
        assert!(room.participants["acct-1"].has_voted);

        room.record_vote("acct-1", Some(Value::Null));
        assert!(!room.participants["acct-1"].has_voted);
    }

    #[test]
    fn switching_issue_restarts_the_round() {
        let mut room = RoomState::create("GS", None, &config(), 1_000);
        room.insert_participant("acct-1", "Alice".into(), None, 1_000);
        room.record_vote("acct-1", Some(Value::from(8)));
        room.reveal();
        let version_before = room.version;

        room.set_active_issue(Some("10042".into()));

        assert_eq!(room.active_issue_id.as_deref(), Some("10042"));
        assert_eq!(room.status, RoomStatus::Voting);
        assert_eq!(room.version, version_before + 1);
        assert!(room.participants.values().all(|p| !p.has_voted));
        assert!(room.participants.values().all(|p| p.vote.is_none()));
    }

    #[test]
    fn reset_round_stops_the_timer() {
        let mut room = RoomState::create("GS", None, &config(), 1_000);
        room.insert_participant("acct-1", "Alice".into(), None, 1_000);
        room.record_vote("acct-1", Some(Value::from("M")));
        room.timer = Timer::running(5_000, 90);
        room.reveal();

        room.reset_round();

        assert_eq!(room.status, RoomStatus::Voting);
        assert_eq!(room.timer, Timer::stopped());
        assert!(!room.participants["acct-1"].has_voted);
    }

    #[test]
    fn reveal_policy_everyone_lets_any_participant_reveal() {
        let mut cfg = config();
        cfg.who_can_reveal = RevealPolicy::Everyone;
        let mut room = RoomState::create("GS", None, &cfg, 1_000);
        room.insert_participant("acct-1", "Alice".into(), None, 1_000);
        room.insert_participant("acct-2", "Bob".into(), None, 2_000);

        assert!(room.can_reveal("acct-2"));
        assert!(!room.can_reveal("acct-404"));
    }

    #[test]
    fn reveal_policy_moderator_restricts_to_the_seat() {
        let mut room = RoomState::create("GS", None, &config(), 1_000);
        room.insert_participant("acct-1", "Alice".into(), None, 1_000);
        room.insert_participant("acct-2", "Bob".into(), None, 2_000);

        assert!(room.can_reveal("acct-1"));
        assert!(!room.can_reveal("acct-2"));
    }

    #[test]
    fn document_round_trips_through_json() {
        let mut room = RoomState::create("GS", Some("10001".into()), &config(), 1_000);
        room.insert_participant("acct-1", "Alice".into(), Some("https://a/1.png".into()), 1_000);
        room.record_vote("acct-1", Some(Value::from(13)));

        let raw = serde_json::to_string(&room).unwrap();
        let parsed: RoomState = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, room);

        // Wire format keeps the original field spelling.
        assert!(raw.contains("\"roomKey\""));
        assert!(raw.contains("\"hasVoted\""));
        assert!(raw.contains("\"activeIssueId\""));
    }

    #[test]
    fn legacy_documents_without_reveal_policy_parse() {
        let raw = r#"{
            "roomKey": "GS",
            "version": 1,
            "status": "VOTING",
            "participants": {},
            "deckType": "FIBONACCI",
            "timer": {"startTime": null, "duration": 60, "status": "STOPPED"},
            "updatedAt": 0
        }"#;
        let parsed: RoomState = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.reveal_policy, RevealPolicy::Moderator);
        assert_eq!(parsed.moderator_id, None);
    }
}
