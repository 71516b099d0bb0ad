//! Protocol Messages
//!
//! Wire format for peer <-> relay communication over WebSocket.
//! One JSON object per text frame, tagged by `type`, camelCase fields,
//! matching the browser clients.

use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::core::grid::Direction;
use crate::game::state::ContestantId;

// =============================================================================
// PEER -> RELAY MESSAGES
// =============================================================================

/// Messages sent from a peer to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Register in a room.
    #[serde(rename_all = "camelCase")]
    JoinGame {
        /// Match key.
        game_id: String,
        /// Contestant slot.
        player_id: ContestantId,
        /// Participant address.
        player_address: String,
    },

    /// Heading change, forwarded to the other peer.
    #[serde(rename_all = "camelCase")]
    PlayerMove {
        /// Match key.
        game_id: String,
        /// Who pressed.
        player_id: ContestantId,
        /// Heading pressed.
        direction: Direction,
        /// Epoch ms on the sender.
        timestamp: u64,
    },

    /// Authoritative state from the host.
    #[serde(rename_all = "camelCase")]
    GameState {
        /// Match key.
        game_id: String,
        /// Opaque snapshot blob.
        game_state: Value,
    },

    /// Leaving the room.
    #[serde(rename_all = "camelCase")]
    LeaveGame {
        /// Match key.
        game_id: String,
        /// Contestant slot.
        player_id: ContestantId,
    },
}

// =============================================================================
// RELAY -> PEER MESSAGES
// =============================================================================

/// Messages sent from the relay to a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// A contestant is present in the room.
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        /// Match key.
        game_id: String,
        /// Contestant slot.
        player_id: ContestantId,
        /// Participant address.
        player_address: String,
        /// Peers now in the room.
        player_count: usize,
    },

    /// A contestant left the room.
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        /// Match key.
        game_id: String,
        /// Contestant slot.
        player_id: ContestantId,
        /// Peers still in the room.
        player_count: usize,
    },

    /// Heading change from the other peer.
    #[serde(rename_all = "camelCase")]
    PlayerMove {
        /// Match key.
        game_id: String,
        /// Who pressed.
        player_id: ContestantId,
        /// Heading pressed.
        direction: Direction,
        /// Epoch ms on the sender.
        timestamp: u64,
    },

    /// Latest authoritative state.
    #[serde(rename_all = "camelCase")]
    GameStateUpdate {
        /// Match key.
        game_id: String,
        /// Opaque snapshot blob.
        game_state: Value,
    },
}

/// Protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Not valid JSON, unknown `type`, or bad field.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Frame kind the protocol does not use.
    #[error("unsupported frame: {0}")]
    UnsupportedFrame(&'static str),
}

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Match key this message is scoped to.
    pub fn game_id(&self) -> &str {
        match self {
            ClientMessage::JoinGame { game_id, .. }
            | ClientMessage::PlayerMove { game_id, .. }
            | ClientMessage::GameState { game_id, .. }
            | ClientMessage::LeaveGame { game_id, .. } => game_id,
        }
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_browser_join_parses() {
        let text = r#"{"type":"JOIN_GAME","gameId":"0xabc","playerId":2,"playerAddress":"0xguest"}"#;
        let msg = ClientMessage::from_json(text).unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinGame {
                game_id: "0xabc".into(),
                player_id: ContestantId::Two,
                player_address: "0xguest".into(),
            }
        );
        assert_eq!(msg.game_id(), "0xabc");
    }

    #[test]
    fn test_move_roundtrip_shape() {
        let msg = ClientMessage::PlayerMove {
            game_id: "g".into(),
            player_id: ContestantId::One,
            direction: Direction::Down,
            timestamp: 1_700_000_000_123,
        };
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "PLAYER_MOVE",
                "gameId": "g",
                "playerId": 1,
                "direction": "DOWN",
                "timestamp": 1_700_000_000_123u64
            })
        );
    }

    #[test]
    fn test_game_state_ignores_extra_fields() {
        // Browser hosts send GAME_STATE without a playerId; extra keys are tolerated.
        let text = r#"{"type":"GAME_STATE","gameId":"g","gameState":{"gameOver":false},"extra":1}"#;
        match ClientMessage::from_json(text).unwrap() {
            ClientMessage::GameState { game_state, .. } => {
                assert_eq!(game_state["gameOver"], false);
            }
            other => panic!("wrong message: {other:?}"),
        }
    }

    #[test]
    fn test_server_message_names() {
        let msg = ServerMessage::PlayerLeft {
            game_id: "g".into(),
            player_id: ContestantId::Two,
            player_count: 1,
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"PLAYER_LEFT\""));
        assert!(json.contains("\"playerCount\":1"));

        let msg = ServerMessage::GameStateUpdate {
            game_id: "g".into(),
            game_state: json!({"winner": null}),
        };
        assert!(msg.to_json().unwrap().contains("GAME_STATE_UPDATE"));
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(ClientMessage::from_json("not json").is_err());
        assert!(ClientMessage::from_json(r#"{"type":"DANCE","gameId":"g"}"#).is_err());
        // Contestant ids are 1 or 2.
        assert!(ClientMessage::from_json(
            r#"{"type":"LEAVE_GAME","gameId":"g","playerId":3}"#
        )
        .is_err());
        assert!(ClientMessage::from_json(
            r#"{"type":"PLAYER_MOVE","gameId":"g","playerId":1,"direction":"NORTH","timestamp":1}"#
        )
        .is_err());
    }
}
