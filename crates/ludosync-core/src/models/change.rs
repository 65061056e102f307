//! Change envelope and change-feed request models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::EntityId;
use super::object_type::ObjectType;

/// A server-side notification that one object changed.
///
/// `id` is the monotonic server sequence number; it is absent for changes the
/// server has not durably sequenced yet. `object_id` is the server-side
/// numeric handle used to fetch the payload. `client_id` names the client
/// whose write produced the change, which is how clients recognize their own
/// echoes; `force_fetch` overrides that skip to recover from desync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub object_id: i64,
    #[serde(default)]
    pub force_fetch: bool,
}

/// Provider identity pair identifying a game across clients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_id: Option<Uuid>,
}

/// Request body for the changes-for-game-set endpoint: entity ids plus
/// provider identity pairs, so the server can match games either way
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameChangeRequest {
    pub ids: Vec<EntityId>,
    pub game_ids: Vec<GameKey>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn envelope_parses_the_wire_form() {
        let json = r#"{"id":123,"type":"Category","clientId":"abc","objectId":10,"forceFetch":false}"#;
        let envelope: ChangeEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.id, Some(123));
        assert_eq!(envelope.object_type, ObjectType::Category);
        assert_eq!(envelope.client_id.as_deref(), Some("abc"));
        assert_eq!(envelope.object_id, 10);
        assert!(!envelope.force_fetch);
    }

    #[test]
    fn envelope_tolerates_missing_sequence_id_and_client() {
        let json = r#"{"type":"GameDiff","objectId":42}"#;
        let envelope: ChangeEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.id, None);
        assert_eq!(envelope.client_id, None);
        assert_eq!(envelope.object_type, ObjectType::GameDiff);
    }

    #[test]
    fn game_request_serializes_camel_case() {
        let request = GameChangeRequest {
            ids: vec![],
            game_ids: vec![GameKey {
                game_id: Some("620".into()),
                plugin_id: None,
            }],
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"ids":[],"gameIds":[{"gameId":"620"}]}"#);
    }
}
