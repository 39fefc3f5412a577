//! Business logic behind the admin routes: the global deck configuration and
//! the bounded, cursor-driven cleanup of room documents.

use tracing::info;

use crate::dao::models::{AppConfigEntity, DeckType};
use crate::dto::admin::{PurgeOutcome, PurgeRequest};
use crate::error::ServiceError;
use crate::state::SharedState;

/// Rooms deleted per purge call. Deliberately small so one call finishes
/// well inside a single request window; callers repeat until the cursor
/// comes back null.
const PURGE_BATCH_SIZE: usize = 20;
/// Attempts to replace the config singleton before giving up.
const MAX_CONFIG_ATTEMPTS: u32 = 3;

/// Read the global config singleton. `None` when it was never saved; rooms
/// created in that state use built-in defaults.
pub async fn get_config(state: &SharedState) -> Result<Option<AppConfigEntity>, ServiceError> {
    let store = state.require_room_store().await?;
    Ok(store.find_config().await?.map(|(config, _)| config))
}

/// Replace the global config singleton. A custom deck without at least one
/// non-blank card is rejected; existing rooms are unaffected either way.
pub async fn save_config(
    state: &SharedState,
    config: AppConfigEntity,
) -> Result<AppConfigEntity, ServiceError> {
    validate_config(&config)?;

    let store = state.require_room_store().await?;
    for _ in 0..MAX_CONFIG_ATTEMPTS {
        let expected = store.find_config().await?.map(|(_, revision)| revision);
        match store.save_config(config.clone(), expected).await {
            Ok(_) => {
                info!(deck = ?config.deck_type, "saved global estimation config");
                return Ok(config);
            }
            Err(err) if err.is_conflict() => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Err(ServiceError::Contention)
}

/// Delete one batch of room documents, resuming from `cursor`. Never
/// exhaustive in one call: a non-null cursor in the outcome means more rooms
/// remain and the caller should call again.
pub async fn purge_rooms(
    state: &SharedState,
    request: PurgeRequest,
) -> Result<PurgeOutcome, ServiceError> {
    let store = state.require_room_store().await?;

    let page = store
        .list_room_keys(PURGE_BATCH_SIZE, request.cursor)
        .await?;

    let mut deleted = 0u64;
    for key in &page.keys {
        if store.delete_room(key).await? {
            deleted += 1;
        }
    }

    info!(deleted, more = page.next_cursor.is_some(), "purged room batch");
    Ok(PurgeOutcome {
        deleted,
        next_cursor: page.next_cursor,
    })
}

fn validate_config(config: &AppConfigEntity) -> Result<(), ServiceError> {
    if config.deck_type == DeckType::Custom {
        let has_cards = config
            .custom_deck
            .as_ref()
            .is_some_and(|deck| deck.iter().any(|card| !card.trim().is_empty()));
        if !has_cards {
            return Err(ServiceError::InvalidInput(
                "custom deck values required".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dao::memory::MemoryRoomStore;
    use crate::dao::models::RevealPolicy;
    use crate::dao::room_store::RoomStore;
    use crate::state::AppState;
    use crate::state::room::RoomState;

    async fn test_state() -> (SharedState, MemoryRoomStore) {
        let store = MemoryRoomStore::new();
        let state = AppState::new(None);
        state.set_room_store(Arc::new(store.clone())).await;
        (state, store)
    }

    fn custom_config(deck: Option<Vec<String>>) -> AppConfigEntity {
        AppConfigEntity {
            deck_type: DeckType::Custom,
            custom_deck: deck,
            who_can_reveal: RevealPolicy::Moderator,
            auto_reveal: false,
            auto_reveal_seconds: None,
        }
    }

    #[tokio::test]
    async fn custom_deck_without_values_is_rejected() {
        let (state, _) = test_state().await;

        for deck in [None, Some(vec![]), Some(vec!["  ".into(), "".into()])] {
            let err = save_config(&state, custom_config(deck)).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidInput(_)));
        }

        assert!(get_config(&state).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn config_round_trips_and_replaces() {
        let (state, _) = test_state().await;
        assert!(get_config(&state).await.unwrap().is_none());

        let saved = save_config(&state, custom_config(Some(vec!["XS".into(), "XL".into()])))
            .await
            .unwrap();
        assert_eq!(get_config(&state).await.unwrap(), Some(saved));

        // A second save replaces the singleton without the caller handling
        // revisions.
        let replaced = save_config(&state, AppConfigEntity::default())
            .await
            .unwrap();
        assert_eq!(get_config(&state).await.unwrap(), Some(replaced));
    }

    #[tokio::test]
    async fn purge_walks_batches_until_exhausted() {
        let (state, store) = test_state().await;
        for index in 0..45 {
            let room = RoomState::create(
                format!("ROOM-{index:03}"),
                None,
                &AppConfigEntity::default(),
                0,
            );
            store.save_room(room, None).await.unwrap();
        }

        let mut cursor = None;
        let mut total = 0;
        let mut batches = 0;
        loop {
            let outcome = purge_rooms(&state, PurgeRequest { cursor }).await.unwrap();
            assert!(outcome.deleted <= 20);
            total += outcome.deleted;
            batches += 1;
            match outcome.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(total, 45);
        assert_eq!(batches, 3);
        assert_eq!(store.room_count(), 0);
    }

    #[tokio::test]
    async fn purge_of_an_empty_store_reports_nothing() {
        let (state, _) = test_state().await;
        let outcome = purge_rooms(&state, PurgeRequest { cursor: None })
            .await
            .unwrap();
        assert_eq!(outcome.deleted, 0);
        assert!(outcome.next_cursor.is_none());
    }
}
