use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Card deck variants a room can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeckType {
    /// Classic Fibonacci-style estimation cards.
    Fibonacci,
    /// T-shirt sizes (XS..XL).
    Tshirt,
    /// Admin-provided card values; requires a non-empty custom deck.
    Custom,
}

/// Who is allowed to trigger a reveal for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevealPolicy {
    /// Only the room moderator may reveal.
    Moderator,
    /// Any current participant may reveal.
    Everyone,
}

/// Global estimation settings, stored as a singleton document.
///
/// Read exactly once when a room is created; the deck and reveal policy are
/// frozen into the room document at that point, so later edits never affect
/// existing rooms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppConfigEntity {
    /// Deck handed to newly created rooms.
    pub deck_type: DeckType,
    /// Ordered card values used when `deck_type` is [`DeckType::Custom`].
    #[serde(default)]
    pub custom_deck: Option<Vec<String>>,
    /// Reveal permission handed to newly created rooms.
    pub who_can_reveal: RevealPolicy,
    /// Whether clients should reveal automatically once everyone voted.
    #[serde(default)]
    pub auto_reveal: bool,
    /// Grace period, in seconds, before an automatic reveal fires.
    #[serde(default)]
    pub auto_reveal_seconds: Option<u32>,
}

impl Default for AppConfigEntity {
    fn default() -> Self {
        Self {
            deck_type: DeckType::Fibonacci,
            custom_deck: None,
            who_can_reveal: RevealPolicy::Moderator,
            auto_reveal: false,
            auto_reveal_seconds: None,
        }
    }
}

/// One page of room keys returned by a prefix scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomKeyPage {
    /// Room keys found in this page, in key order.
    pub keys: Vec<String>,
    /// Cursor to resume the scan, `None` once the scan is exhausted.
    pub next_cursor: Option<String>,
}
