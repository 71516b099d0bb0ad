//! Game Snapshot
//!
//! The state blob the host broadcasts every tick and the guest renders.
//! Field names follow the JSON used by the web clients.

use serde::{Serialize, Deserialize};

use crate::core::grid::{Cell, Direction};
use crate::core::hash::OutcomeDigest;
use crate::game::events::MatchOutcome;
use crate::game::input::{outcome_digest, InputEvent};
use crate::game::state::{ContestantId, ContestantState, MatchState};
use crate::game::tick;

/// One contestant as seen on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestantSnapshot {
    /// Cells, head first
    pub body: Vec<Cell>,
    /// Current heading
    pub direction: Direction,
    /// Items eaten
    pub score: u32,
    /// Still alive?
    pub alive: bool,
}

impl From<&ContestantState> for ContestantSnapshot {
    fn from(c: &ContestantState) -> Self {
        Self {
            body: c.body.iter().copied().collect(),
            direction: c.heading,
            score: c.score,
            alive: c.alive,
        }
    }
}

/// One logged input as seen on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInput {
    /// Who pressed
    pub player_id: ContestantId,
    /// Heading pressed
    pub direction: Direction,
    /// Epoch ms on the host
    pub timestamp: u64,
}

/// Read-only mirror of a match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    /// Contestant 1
    pub player1: ContestantSnapshot,
    /// Contestant 2
    pub player2: ContestantSnapshot,
    /// Items on the board
    pub apples: Vec<Cell>,
    /// Milliseconds left on the match clock
    pub time_remaining: u64,
    /// Has the match ended?
    pub game_over: bool,
    /// Winner, `null` while running or on a draw
    pub winner: Option<ContestantId>,
    /// Full input log
    pub inputs: Vec<SnapshotInput>,
    /// Seed string (the match key)
    pub seed: String,
    /// Numeric match id
    pub game_id: u32,
    /// Host tick cursor; absent from older clients
    #[serde(default)]
    pub version: u64,
}

impl GameSnapshot {
    /// Capture `state` as of `now`.
    pub fn from_state(state: &MatchState, now: u64) -> Self {
        let outcome = tick::outcome(state, now);
        Self {
            player1: state.contestant(ContestantId::One).into(),
            player2: state.contestant(ContestantId::Two).into(),
            apples: state.items.clone(),
            time_remaining: state.ends_at.saturating_sub(now),
            game_over: outcome.is_some(),
            winner: outcome.and_then(MatchOutcome::winner),
            inputs: state
                .inputs
                .iter()
                .map(|e| SnapshotInput {
                    player_id: e.contestant,
                    direction: e.heading,
                    timestamp: e.timestamp,
                })
                .collect(),
            seed: state.seed.clone(),
            game_id: state.match_id,
            version: state.version,
        }
    }

    /// Outcome of a finished match, `None` while running.
    pub fn outcome(&self) -> Option<MatchOutcome> {
        if !self.game_over {
            return None;
        }
        Some(match self.winner {
            Some(id) => MatchOutcome::Won(id),
            None => MatchOutcome::Draw,
        })
    }

    /// Snapshot of one contestant.
    pub fn contestant(&self, id: ContestantId) -> &ContestantSnapshot {
        match id {
            ContestantId::One => &self.player1,
            ContestantId::Two => &self.player2,
        }
    }

    /// Recompute the outcome digest from the mirrored input log.
    ///
    /// Matches the host's [`Engine::outcome_digest`](crate::game::Engine::outcome_digest)
    /// for the same snapshot.
    pub fn outcome_digest(&self) -> OutcomeDigest {
        let inputs: Vec<InputEvent> = self
            .inputs
            .iter()
            .map(|i| InputEvent {
                contestant: i.player_id,
                heading: i.direction,
                timestamp: i.timestamp,
                version: 0,
            })
            .collect();
        outcome_digest(
            &self.seed,
            self.game_id,
            &inputs,
            (self.player1.score, self.player2.score),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::Engine;
    use crate::game::state::MatchMode;

    #[test]
    fn test_wire_field_names() {
        let mut engine = Engine::new("0xdeadbeef", MatchMode::Duel, 0);
        engine.queue_input(ContestantId::Two, Direction::Up, 42);
        let snapshot = engine.snapshot(10);
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["gameId"], 0xdeadbeef_u32);
        assert_eq!(json["seed"], "0xdeadbeef");
        assert_eq!(json["timeRemaining"], 29_990);
        assert_eq!(json["gameOver"], false);
        assert!(json["winner"].is_null());
        assert_eq!(json["player1"]["direction"], "RIGHT");
        assert_eq!(json["player1"]["body"][0]["x"], 10);
        assert_eq!(json["player2"]["alive"], true);
        assert_eq!(json["inputs"][0]["playerId"], 2);
        assert_eq!(json["inputs"][0]["direction"], "UP");
        assert_eq!(json["inputs"][0]["timestamp"], 42);
        assert!(json["apples"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_parse_browser_blob_without_version() {
        let blob = r#"{
            "player1": {"body": [{"x": 10, "y": 15}], "direction": "RIGHT", "score": 0, "alive": true},
            "player2": {"body": [{"x": 30, "y": 15}], "direction": "LEFT", "score": 0, "alive": false},
            "apples": [{"x": 1, "y": 2}],
            "timeRemaining": 0,
            "gameOver": true,
            "winner": 1,
            "inputs": [],
            "seed": "k",
            "gameId": 0
        }"#;
        let snapshot: GameSnapshot = serde_json::from_str(blob).unwrap();
        assert_eq!(snapshot.version, 0);
        assert_eq!(snapshot.outcome(), Some(MatchOutcome::Won(ContestantId::One)));
        assert_eq!(snapshot.apples, vec![Cell::new(1, 2)]);
    }

    #[test]
    fn test_guest_digest_matches_host() {
        let mut engine = Engine::new("0x0000000000000000000000000000000012345678", MatchMode::Duel, 0);
        engine.queue_input(ContestantId::One, Direction::Down, 5);
        engine.advance(100);
        engine.queue_input(ContestantId::Two, Direction::Up, 130);
        engine.advance(200);

        let snapshot = engine.snapshot(200);
        let roundtrip: GameSnapshot =
            serde_json::from_str(&serde_json::to_string(&snapshot).unwrap()).unwrap();
        assert_eq!(roundtrip.outcome_digest(), engine.outcome_digest());
        assert_eq!(roundtrip, snapshot);
    }
}
