use serde::{Deserialize, Serialize};

use crate::dao::models::AppConfigEntity;
use crate::state::room::RoomState;

/// Document id prefix for room documents, preserving the legacy namespace
/// where project-keyed and issue-keyed rooms share one prefix.
pub const ROOM_PREFIX: &str = "poker_room::";
/// Document id of the global config singleton.
pub const CONFIG_DOC_ID: &str = "poker_app_config";
/// High sentinel appended to the prefix for `endkey` range scans.
pub const END_SUFFIX: &str = "\u{ffff}";

/// Response shape of `_all_docs` when listing without `include_docs`.
#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    /// Matched rows in key order.
    pub rows: Vec<AllDocsRow>,
}

/// One `_all_docs` row.
#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    /// Document id of the row.
    pub id: String,
}

/// Body CouchDB answers a successful PUT/DELETE with.
#[derive(Debug, Deserialize)]
pub struct WriteResponse {
    /// Revision assigned to the new document version.
    pub rev: String,
}

/// Room document as stored in CouchDB, wrapping the state with `_id`/`_rev`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchRoomDocument {
    /// CouchDB document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// CouchDB revision; absent when creating.
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// The room state itself, flattened into the document body.
    #[serde(flatten)]
    pub room: RoomState,
}

/// Config singleton as stored in CouchDB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchConfigDocument {
    /// CouchDB document id, always [`CONFIG_DOC_ID`].
    #[serde(rename = "_id")]
    pub id: String,
    /// CouchDB revision; absent when creating.
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// The config payload, flattened into the document body.
    #[serde(flatten)]
    pub config: AppConfigEntity,
}

/// Document id for a room key.
pub fn room_doc_id(room_key: &str) -> String {
    format!("{ROOM_PREFIX}{room_key}")
}

/// Inverse of [`room_doc_id`]; `None` for ids outside the room namespace.
pub fn room_key_from_doc_id(doc_id: &str) -> Option<&str> {
    doc_id.strip_prefix(ROOM_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::AppConfigEntity;

    #[test]
    fn doc_id_round_trips() {
        let id = room_doc_id("GS");
        assert_eq!(id, "poker_room::GS");
        assert_eq!(room_key_from_doc_id(&id), Some("GS"));
        assert_eq!(room_key_from_doc_id("other::GS"), None);
    }

    #[test]
    fn room_document_flattens_state() {
        let room = RoomState::create("GS", None, &AppConfigEntity::default(), 0);
        let doc = CouchRoomDocument {
            id: room_doc_id(&room.room_key),
            rev: None,
            room,
        };

        let raw = serde_json::to_string(&doc).unwrap();
        assert!(raw.contains("\"_id\":\"poker_room::GS\""));
        assert!(!raw.contains("_rev"));
        assert!(raw.contains("\"roomKey\":\"GS\""));
    }
}
