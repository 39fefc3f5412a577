//! Session operations over room documents.
//!
//! Every mutator here is one logical read-modify-write against a single room
//! document. The store write is conditional on the revision observed by the
//! read; losing that race restarts the whole cycle with backoff, so an
//! accepted write always saw a consistent prior state and concurrent votes
//! are never silently dropped. Rooms that do not exist yield `None` rather
//! than an error so pollers can treat "not yet created" as ordinary.

use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::dao::models::AppConfigEntity;
use crate::dto::session::{
    ActiveIssueRequest, JoinRequest, LeaveRequest, RoomStateView, RoomTarget, RoundActionRequest,
    StateRequest, TimerRequest, VoteRequest,
};
use crate::error::ServiceError;
use crate::state::SharedState;
use crate::state::room::{DEFAULT_TIMER_SECS, RoomState, RoomStatus, Timer, now_millis};

/// Attempts per operation before contention is reported to the caller.
const MAX_WRITE_ATTEMPTS: u32 = 5;
/// First retry delay; doubled per attempt.
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(10);
/// Ceiling for the retry delay.
const MAX_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Shortest countdown a moderator can start, in seconds.
const MIN_TIMER_SECS: u32 = 5;
/// Longest countdown a moderator can start, in seconds.
const MAX_TIMER_SECS: u32 = 300;

/// What a mutation decided after inspecting a freshly read room.
enum Mutation {
    /// Persist the mutated document.
    Write,
    /// Leave the stored document untouched and return it as-is.
    Skip,
}

/// Enter a room, creating it lazily on first join. Creation seeds the deck
/// and reveal policy from the global config captured at this moment. Joining
/// twice is idempotent apart from timestamps.
pub async fn join(state: &SharedState, request: JoinRequest) -> Result<RoomStateView, ServiceError> {
    let store = state.require_room_store().await?;
    let room_key = resolve_key(&request.target)?;
    let account_id = request.account_id.clone();

    let mut delay = INITIAL_RETRY_DELAY;
    for attempt in 0..MAX_WRITE_ATTEMPTS {
        let found = store.find_room(&room_key).await?;
        let now = now_millis();

        let (mut room, expected) = match found {
            Some((room, revision)) => (room, Some(revision)),
            None => {
                // First join: capture the global config and freeze it in.
                let config = load_config_or_default(&store).await?;
                let room = RoomState::create(
                    &room_key,
                    request.target.issue_id.clone(),
                    &config,
                    now,
                );
                (room, None)
            }
        };

        let changed = room.insert_participant(
            &account_id,
            request.display_name.clone(),
            request.avatar_url.clone(),
            now,
        );

        if !changed && expected.is_some() {
            return Ok(RoomStateView::for_viewer(&room, Some(account_id.as_str())));
        }

        room.updated_at = now;
        match store.save_room(room.clone(), expected).await {
            Ok(_) => return Ok(RoomStateView::for_viewer(&room, Some(account_id.as_str()))),
            Err(err) if err.is_conflict() => {
                debug!(%room_key, attempt, "join lost a write race; retrying");
                delay = backoff(delay, attempt).await;
            }
            Err(err) => return Err(err.into()),
        }
    }

    warn!(%room_key, "join exhausted its write attempts");
    Err(ServiceError::Contention)
}

/// Pure read of a room, projected for the polling viewer. `None` when the
/// room has never been created.
pub async fn get_state(
    state: &SharedState,
    request: StateRequest,
) -> Result<Option<RoomStateView>, ServiceError> {
    let store = state.require_room_store().await?;
    let room_key = resolve_key(&request.target)?;

    let found = store.find_room(&room_key).await?;
    Ok(found
        .map(|(room, _)| RoomStateView::for_viewer(&room, request.account_id.as_deref())))
}

/// Switch the room to a new active issue: moderator-only; forces a fresh
/// voting round and bumps the structural version.
pub async fn set_active_issue(
    state: &SharedState,
    request: ActiveIssueRequest,
) -> Result<Option<RoomStateView>, ServiceError> {
    let account_id = request.account_id.clone();
    let issue_id = request.issue_id.clone();

    modify_room(state, &request.room_key, &request.account_id, move |room| {
        ensure_moderator(room, &account_id)?;
        room.set_active_issue(issue_id.clone());
        Ok(Mutation::Write)
    })
    .await
}

/// Record a participant's vote. Effective only while the room is voting and
/// the account is a member; otherwise the state is returned unchanged.
pub async fn submit_vote(
    state: &SharedState,
    request: VoteRequest,
) -> Result<Option<RoomStateView>, ServiceError> {
    let room_key = resolve_key(&request.target)?;
    let account_id = request.account_id.clone();
    let vote = request.vote.clone();

    modify_room(state, &room_key, &request.account_id, move |room| {
        if room.status != RoomStatus::Voting {
            return Ok(Mutation::Skip);
        }
        if !room.record_vote(&account_id, vote.clone()) {
            return Ok(Mutation::Skip);
        }
        Ok(Mutation::Write)
    })
    .await
}

/// Expose all votes. Allowed for the moderator, or for any participant when
/// the room was created under an everyone-may-reveal policy. Idempotent.
pub async fn reveal_votes(
    state: &SharedState,
    request: RoundActionRequest,
) -> Result<Option<RoomStateView>, ServiceError> {
    let room_key = resolve_key(&request.target)?;
    let account_id = request.account_id.clone();

    modify_room(state, &room_key, &request.account_id, move |room| {
        if !room.can_reveal(&account_id) {
            return Err(ServiceError::PermissionDenied(
                "only the moderator may reveal votes in this room".into(),
            ));
        }
        if room.status == RoomStatus::Revealed {
            return Ok(Mutation::Skip);
        }
        room.reveal();
        Ok(Mutation::Write)
    })
    .await
}

/// Start a fresh voting round: moderator-only; wipes ballots and stops the
/// countdown.
pub async fn reset_round(
    state: &SharedState,
    request: RoundActionRequest,
) -> Result<Option<RoomStateView>, ServiceError> {
    let room_key = resolve_key(&request.target)?;
    let account_id = request.account_id.clone();

    modify_room(state, &room_key, &request.account_id, move |room| {
        ensure_moderator(room, &account_id)?;
        room.reset_round();
        Ok(Mutation::Write)
    })
    .await
}

/// Start the shared countdown: moderator-only. The duration is clamped to
/// sane bounds; expiry is acted on by the polling clients, never here.
pub async fn start_timer(
    state: &SharedState,
    request: TimerRequest,
) -> Result<Option<RoomStateView>, ServiceError> {
    let room_key = resolve_key(&request.target)?;
    let account_id = request.account_id.clone();
    let duration = request
        .duration
        .unwrap_or(DEFAULT_TIMER_SECS)
        .clamp(MIN_TIMER_SECS, MAX_TIMER_SECS);

    modify_room(state, &room_key, &request.account_id, move |room| {
        ensure_moderator(room, &account_id)?;
        room.timer = Timer::running(now_millis(), duration);
        Ok(Mutation::Write)
    })
    .await
}

/// Remove a participant. A departing moderator hands the seat to the
/// remaining participant with the earliest join, ties broken by account id.
pub async fn leave(
    state: &SharedState,
    request: LeaveRequest,
) -> Result<Option<RoomStateView>, ServiceError> {
    let room_key = resolve_key(&request.target)?;
    let account_id = request.account_id.clone();

    modify_room(state, &room_key, &request.account_id, move |room| {
        if !room.remove_participant(&account_id) {
            return Ok(Mutation::Skip);
        }
        Ok(Mutation::Write)
    })
    .await
}

/// Resolve the storage room key from a request target.
fn resolve_key(target: &RoomTarget) -> Result<String, ServiceError> {
    target
        .resolve()
        .map(str::to_string)
        .ok_or_else(|| ServiceError::InvalidInput("room key or issue id required".into()))
}

fn ensure_moderator(room: &RoomState, account_id: &str) -> Result<(), ServiceError> {
    if room.is_moderator(account_id) {
        return Ok(());
    }
    Err(ServiceError::PermissionDenied(
        "only the moderator may perform this action".into(),
    ))
}

async fn load_config_or_default(
    store: &std::sync::Arc<dyn crate::dao::room_store::RoomStore>,
) -> Result<AppConfigEntity, ServiceError> {
    Ok(store
        .find_config()
        .await?
        .map(|(config, _)| config)
        .unwrap_or_default())
}

/// Run one fetch-mutate-conditional-store cycle with bounded retries.
///
/// The mutation callback sees a freshly read document on every attempt, so
/// guards (moderator checks, status checks) are re-evaluated against current
/// state after losing a race. `Skip` returns the document without writing.
async fn modify_room<F>(
    state: &SharedState,
    room_key: &str,
    viewer: &str,
    mut apply: F,
) -> Result<Option<RoomStateView>, ServiceError>
where
    F: FnMut(&mut RoomState) -> Result<Mutation, ServiceError>,
{
    let store = state.require_room_store().await?;

    let mut delay = INITIAL_RETRY_DELAY;
    for attempt in 0..MAX_WRITE_ATTEMPTS {
        let Some((mut room, revision)) = store.find_room(room_key).await? else {
            return Ok(None);
        };

        match apply(&mut room)? {
            Mutation::Skip => {
                return Ok(Some(RoomStateView::for_viewer(&room, Some(viewer))));
            }
            Mutation::Write => {}
        }

        room.updated_at = now_millis();
        match store.save_room(room.clone(), Some(revision)).await {
            Ok(_) => return Ok(Some(RoomStateView::for_viewer(&room, Some(viewer)))),
            Err(err) if err.is_conflict() => {
                debug!(%room_key, attempt, "room update lost a write race; retrying");
                delay = backoff(delay, attempt).await;
            }
            Err(err) => return Err(err.into()),
        }
    }

    warn!(%room_key, "room update exhausted its write attempts");
    Err(ServiceError::Contention)
}

/// Sleep for the current delay plus jitter and return the next delay.
async fn backoff(delay: Duration, attempt: u32) -> Duration {
    // No delay before the first retry; contention is usually momentary.
    if attempt == 0 {
        return delay;
    }
    let jitter = Duration::from_millis(rand::rng().random_range(0..=delay.as_millis() as u64 / 2));
    sleep(delay + jitter).await;
    (delay * 2).min(MAX_RETRY_DELAY)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex, atomic::AtomicU32, atomic::Ordering};

    use futures::future::BoxFuture;
    use serde_json::Value;

    use super::*;
    use crate::dao::memory::MemoryRoomStore;
    use crate::dao::models::{AppConfigEntity, DeckType, RevealPolicy, RoomKeyPage};
    use crate::dao::room_store::{Revision, RoomStore};
    use crate::dao::storage::{StorageError, StorageResult};
    use crate::state::AppState;
    use crate::state::room::TimerStatus;

    async fn test_state() -> (SharedState, MemoryRoomStore) {
        let store = MemoryRoomStore::new();
        let state = AppState::new(None);
        state.set_room_store(Arc::new(store.clone())).await;
        (state, store)
    }

    fn join_request(room_key: &str, account_id: &str, name: &str) -> JoinRequest {
        JoinRequest {
            target: RoomTarget {
                room_key: Some(room_key.into()),
                issue_id: None,
            },
            account_id: account_id.into(),
            display_name: name.into(),
            avatar_url: None,
        }
    }

    fn target(room_key: &str) -> RoomTarget {
        RoomTarget {
            room_key: Some(room_key.into()),
            issue_id: None,
        }
    }

    fn vote_request(room_key: &str, account_id: &str, vote: impl Into<Value>) -> VoteRequest {
        VoteRequest {
            target: target(room_key),
            account_id: account_id.into(),
            vote: Some(vote.into()),
        }
    }

    fn action(room_key: &str, account_id: &str) -> RoundActionRequest {
        RoundActionRequest {
            target: target(room_key),
            account_id: account_id.into(),
        }
    }

    #[tokio::test]
    async fn full_round_through_a_fresh_room() {
        let (state, _) = test_state().await;

        let view = join(&state, join_request("GS", "acct-1", "Alice"))
            .await
            .unwrap();
        assert_eq!(view.moderator_id.as_deref(), Some("acct-1"));
        assert_eq!(view.participants.len(), 1);
        assert_eq!(view.status, RoomStatus::Voting);

        let view = submit_vote(&state, vote_request("GS", "acct-1", 5))
            .await
            .unwrap()
            .unwrap();
        assert!(view.participants["acct-1"].has_voted);
        assert_eq!(view.participants["acct-1"].vote, Some(Value::from(5)));

        let view = reveal_votes(&state, action("GS", "acct-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.status, RoomStatus::Revealed);

        let view = reset_round(&state, action("GS", "acct-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.status, RoomStatus::Voting);
        assert_eq!(view.participants["acct-1"].vote, None);
        assert!(!view.participants["acct-1"].has_voted);
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let (state, store) = test_state().await;

        join(&state, join_request("GS", "acct-1", "Alice"))
            .await
            .unwrap();
        let (first, rev_first) = store.find_room("GS").await.unwrap().unwrap();

        let view = join(&state, join_request("GS", "acct-1", "Alice"))
            .await
            .unwrap();
        let (second, rev_second) = store.find_room("GS").await.unwrap().unwrap();

        assert_eq!(view.participants.len(), 1);
        assert_eq!(first, second);
        // The second join did not even write.
        assert_eq!(rev_first, rev_second);
    }

    #[tokio::test]
    async fn join_freezes_the_config_at_creation() {
        let (state, store) = test_state().await;

        let custom = AppConfigEntity {
            deck_type: DeckType::Custom,
            custom_deck: Some(vec!["1".into(), "2".into(), "3".into()]),
            who_can_reveal: RevealPolicy::Everyone,
            auto_reveal: false,
            auto_reveal_seconds: None,
        };
        store.save_config(custom.clone(), None).await.unwrap();

        let view = join(&state, join_request("GS", "acct-1", "Alice"))
            .await
            .unwrap();
        assert_eq!(view.deck_type, DeckType::Custom);
        assert_eq!(view.reveal_policy, RevealPolicy::Everyone);

        // A later config edit must not leak into the existing room.
        let (config, rev) = store.find_config().await.unwrap().unwrap();
        let mut updated = config;
        updated.deck_type = DeckType::Tshirt;
        store.save_config(updated, Some(rev)).await.unwrap();

        let view = get_state(
            &state,
            StateRequest {
                target: target("GS"),
                account_id: Some("acct-1".into()),
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(view.deck_type, DeckType::Custom);
    }

    #[tokio::test]
    async fn legacy_issue_mode_addresses_its_own_room() {
        let (state, _) = test_state().await;

        let view = join(
            &state,
            JoinRequest {
                target: RoomTarget {
                    room_key: None,
                    issue_id: Some("10042".into()),
                },
                account_id: "acct-1".into(),
                display_name: "Alice".into(),
                avatar_url: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(view.room_key, "10042");
        assert_eq!(view.active_issue_id.as_deref(), Some("10042"));

        // Project mode under a different key is a different room.
        let other = get_state(
            &state,
            StateRequest {
                target: target("GS"),
                account_id: None,
            },
        )
        .await
        .unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn get_state_returns_none_for_unknown_rooms() {
        let (state, _) = test_state().await;
        let result = get_state(
            &state,
            StateRequest {
                target: target("GS"),
                account_id: None,
            },
        )
        .await
        .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn missing_target_is_invalid_input() {
        let (state, _) = test_state().await;
        let err = get_state(
            &state,
            StateRequest {
                target: RoomTarget::default(),
                account_id: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn switching_issue_round_trips_through_get_state() {
        let (state, _) = test_state().await;
        join(&state, join_request("GS", "acct-1", "Alice"))
            .await
            .unwrap();
        join(&state, join_request("GS", "acct-2", "Bob"))
            .await
            .unwrap();
        submit_vote(&state, vote_request("GS", "acct-2", 3))
            .await
            .unwrap();
        reveal_votes(&state, action("GS", "acct-1")).await.unwrap();

        let view = set_active_issue(
            &state,
            ActiveIssueRequest {
                room_key: "GS".into(),
                account_id: "acct-1".into(),
                issue_id: Some("10042".into()),
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(view.version, 2);

        let view = get_state(
            &state,
            StateRequest {
                target: target("GS"),
                account_id: Some("acct-2".into()),
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(view.active_issue_id.as_deref(), Some("10042"));
        assert_eq!(view.status, RoomStatus::Voting);
        assert!(view.participants.values().all(|p| !p.has_voted));
    }

    #[tokio::test]
    async fn switching_issue_on_a_missing_room_is_none() {
        let (state, _) = test_state().await;
        let result = set_active_issue(
            &state,
            ActiveIssueRequest {
                room_key: "GS".into(),
                account_id: "acct-1".into(),
                issue_id: Some("10042".into()),
            },
        )
        .await
        .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn round_actions_require_the_moderator() {
        let (state, _) = test_state().await;
        join(&state, join_request("GS", "acct-1", "Alice"))
            .await
            .unwrap();
        join(&state, join_request("GS", "acct-2", "Bob"))
            .await
            .unwrap();

        for err in [
            set_active_issue(
                &state,
                ActiveIssueRequest {
                    room_key: "GS".into(),
                    account_id: "acct-2".into(),
                    issue_id: None,
                },
            )
            .await
            .unwrap_err(),
            reveal_votes(&state, action("GS", "acct-2")).await.unwrap_err(),
            reset_round(&state, action("GS", "acct-2")).await.unwrap_err(),
            start_timer(
                &state,
                TimerRequest {
                    target: target("GS"),
                    account_id: "acct-2".into(),
                    duration: None,
                },
            )
            .await
            .unwrap_err(),
        ] {
            assert!(matches!(err, ServiceError::PermissionDenied(_)));
        }
    }

    #[tokio::test]
    async fn everyone_policy_lets_participants_reveal() {
        let (state, store) = test_state().await;
        let config = AppConfigEntity {
            who_can_reveal: RevealPolicy::Everyone,
            ..AppConfigEntity::default()
        };
        store.save_config(config, None).await.unwrap();

        join(&state, join_request("GS", "acct-1", "Alice"))
            .await
            .unwrap();
        join(&state, join_request("GS", "acct-2", "Bob"))
            .await
            .unwrap();

        let view = reveal_votes(&state, action("GS", "acct-2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.status, RoomStatus::Revealed);

        // A stranger still may not.
        let err = reveal_votes(&state, action("GS", "acct-404"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn votes_after_reveal_are_silent_noops() {
        let (state, store) = test_state().await;
        join(&state, join_request("GS", "acct-1", "Alice"))
            .await
            .unwrap();
        submit_vote(&state, vote_request("GS", "acct-1", 5))
            .await
            .unwrap();
        reveal_votes(&state, action("GS", "acct-1")).await.unwrap();
        let (_, rev_before) = store.find_room("GS").await.unwrap().unwrap();

        let view = submit_vote(&state, vote_request("GS", "acct-1", 13))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.participants["acct-1"].vote, Some(Value::from(5)));

        let (_, rev_after) = store.find_room("GS").await.unwrap().unwrap();
        assert_eq!(rev_before, rev_after);
    }

    #[tokio::test]
    async fn votes_from_strangers_are_silent_noops() {
        let (state, store) = test_state().await;
        join(&state, join_request("GS", "acct-1", "Alice"))
            .await
            .unwrap();
        let (_, rev_before) = store.find_room("GS").await.unwrap().unwrap();

        let view = submit_vote(&state, vote_request("GS", "acct-404", 5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.participants.len(), 1);

        let (_, rev_after) = store.find_room("GS").await.unwrap().unwrap();
        assert_eq!(rev_before, rev_after);
    }

    #[tokio::test]
    async fn timer_duration_is_clamped() {
        let (state, _) = test_state().await;
        join(&state, join_request("GS", "acct-1", "Alice"))
            .await
            .unwrap();

        let view = start_timer(
            &state,
            TimerRequest {
                target: target("GS"),
                account_id: "acct-1".into(),
                duration: Some(1),
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(view.timer.duration, MIN_TIMER_SECS);
        assert_eq!(view.timer.status, TimerStatus::Running);
        assert!(view.timer.start_time.is_some());

        let view = start_timer(
            &state,
            TimerRequest {
                target: target("GS"),
                account_id: "acct-1".into(),
                duration: Some(10_000),
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(view.timer.duration, MAX_TIMER_SECS);

        let view = start_timer(
            &state,
            TimerRequest {
                target: target("GS"),
                account_id: "acct-1".into(),
                duration: None,
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(view.timer.duration, DEFAULT_TIMER_SECS);
    }

    #[tokio::test]
    async fn departing_moderator_hands_over_the_seat() {
        let (state, _) = test_state().await;
        join(&state, join_request("GS", "acct-1", "Alice"))
            .await
            .unwrap();
        join(&state, join_request("GS", "acct-2", "Bob"))
            .await
            .unwrap();

        let view = leave(
            &state,
            LeaveRequest {
                target: target("GS"),
                account_id: "acct-1".into(),
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(view.moderator_id.as_deref(), Some("acct-2"));
        assert!(view.participants["acct-2"].is_moderator);
        assert_eq!(view.participants.len(), 1);
    }

    /// Test store that injects a rival writer between a service read and its
    /// conditional write, forcing the first attempt to lose the race.
    struct RiggedStore {
        inner: MemoryRoomStore,
        rival: Mutex<Option<Rival>>,
        conflicts_served: AtomicU32,
    }

    enum Rival {
        /// Another participant votes before our write lands.
        Vote(&'static str, i64),
        /// Another client creates the room before our create lands.
        Create(&'static str),
        /// Every write loses, no matter how often it retries.
        AlwaysConflict,
    }

    impl RiggedStore {
        fn new(inner: MemoryRoomStore, rival: Rival) -> Self {
            Self {
                inner,
                rival: Mutex::new(Some(rival)),
                conflicts_served: AtomicU32::new(0),
            }
        }

        async fn run_rival(&self, rival: &Rival, room_key: &str) {
            match rival {
                Rival::Vote(account_id, value) => {
                    let (mut room, rev) =
                        self.inner.find_room(room_key).await.unwrap().unwrap();
                    room.record_vote(account_id, Some(Value::from(*value)));
                    self.inner.save_room(room, Some(rev)).await.unwrap();
                }
                Rival::Create(account_id) => {
                    let mut room = RoomState::create(
                        room_key,
                        None,
                        &AppConfigEntity::default(),
                        now_millis(),
                    );
                    room.insert_participant(account_id, "Rival".into(), None, now_millis());
                    self.inner.save_room(room, None).await.unwrap();
                }
                Rival::AlwaysConflict => {}
            }
        }
    }

    impl RoomStore for Arc<RiggedStore> {
        fn find_room(
            &self,
            room_key: &str,
        ) -> BoxFuture<'static, StorageResult<Option<(RoomState, Revision)>>> {
            self.inner.find_room(room_key)
        }

        fn save_room(
            &self,
            room: RoomState,
            expected: Option<Revision>,
        ) -> BoxFuture<'static, StorageResult<Revision>> {
            let this = self.clone();
            Box::pin(async move {
                let rival = this.rival.lock().unwrap().take();
                if let Some(rival) = rival {
                    if matches!(rival, Rival::AlwaysConflict) {
                        *this.rival.lock().unwrap() = Some(Rival::AlwaysConflict);
                        this.conflicts_served.fetch_add(1, Ordering::SeqCst);
                        return Err(StorageError::conflict(room.room_key));
                    }
                    this.run_rival(&rival, &room.room_key).await;
                }
                this.inner.save_room(room, expected).await
            })
        }

        fn delete_room(&self, room_key: &str) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_room(room_key)
        }

        fn list_room_keys(
            &self,
            limit: usize,
            cursor: Option<String>,
        ) -> BoxFuture<'static, StorageResult<RoomKeyPage>> {
            self.inner.list_room_keys(limit, cursor)
        }

        fn find_config(
            &self,
        ) -> BoxFuture<'static, StorageResult<Option<(AppConfigEntity, Revision)>>> {
            self.inner.find_config()
        }

        fn save_config(
            &self,
            config: AppConfigEntity,
            expected: Option<Revision>,
        ) -> BoxFuture<'static, StorageResult<Revision>> {
            self.inner.save_config(config, expected)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    #[tokio::test]
    async fn racing_votes_are_both_kept() {
        let inner = MemoryRoomStore::new();
        let state = AppState::new(None);
        state.set_room_store(Arc::new(inner.clone())).await;
        join(&state, join_request("GS", "acct-1", "Alice"))
            .await
            .unwrap();
        join(&state, join_request("GS", "acct-2", "Bob"))
            .await
            .unwrap();

        // From here on, acct-1's next write races a rival vote by acct-2.
        let rigged = Arc::new(RiggedStore::new(inner, Rival::Vote("acct-2", 8)));
        state.set_room_store(Arc::new(rigged)).await;

        submit_vote(&state, vote_request("GS", "acct-1", 5))
            .await
            .unwrap()
            .unwrap();

        reveal_votes(&state, action("GS", "acct-1")).await.unwrap();
        let view = get_state(
            &state,
            StateRequest {
                target: target("GS"),
                account_id: Some("acct-1".into()),
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(view.participants["acct-1"].vote, Some(Value::from(5)));
        assert_eq!(view.participants["acct-2"].vote, Some(Value::from(8)));
    }

    #[tokio::test]
    async fn racing_creates_merge_their_joiners() {
        let inner = MemoryRoomStore::new();
        let state = AppState::new(None);
        let rigged = Arc::new(RiggedStore::new(inner, Rival::Create("acct-9")));
        state.set_room_store(Arc::new(rigged)).await;

        let view = join(&state, join_request("GS", "acct-1", "Alice"))
            .await
            .unwrap();

        // The rival created the room first; our join retried into it.
        assert_eq!(view.participants.len(), 2);
        assert_eq!(view.moderator_id.as_deref(), Some("acct-9"));
        assert!(view.participants.contains_key("acct-1"));
    }

    #[tokio::test]
    async fn exhausted_retries_surface_as_contention() {
        let inner = MemoryRoomStore::new();
        let state = AppState::new(None);
        state.set_room_store(Arc::new(inner.clone())).await;
        join(&state, join_request("GS", "acct-1", "Alice"))
            .await
            .unwrap();
        let (before, _) = inner.find_room("GS").await.unwrap().unwrap();

        let rigged = Arc::new(RiggedStore::new(inner.clone(), Rival::AlwaysConflict));
        state.set_room_store(Arc::new(rigged.clone())).await;

        let err = submit_vote(&state, vote_request("GS", "acct-1", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Contention));
        assert_eq!(
            rigged.conflicts_served.load(Ordering::SeqCst),
            MAX_WRITE_ATTEMPTS
        );

        // The stored document was never touched.
        let (after, _) = inner.find_room("GS").await.unwrap().unwrap();
        assert_eq!(before, after);
    }
}
