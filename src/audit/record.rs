//! Match Record
//!
//! Everything needed to replay a finished match and check its digest.
//! Encoded with bincode for compact storage next to a settlement.

use serde::{Serialize, Deserialize};

use crate::core::hash::OutcomeDigest;
use crate::game::engine::Engine;
use crate::game::events::MatchOutcome;
use crate::game::input::InputEvent;
use crate::game::state::MatchMode;

/// Current record format.
pub const RECORD_VERSION: u8 = 1;

/// Complete record of one match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Format version for forward compatibility.
    pub format: u8,

    /// Match key (seed).
    pub seed: String,

    /// Practice or duel.
    pub mode: MatchMode,

    /// Engine construction time (epoch ms).
    pub started_at: u64,

    /// Ticks run before the match ended.
    pub final_version: u64,

    /// Accepted inputs, in arrival order.
    pub inputs: Vec<InputEvent>,

    /// Final scores (contestant 1, contestant 2).
    pub scores: (u32, u32),

    /// Final outcome; `None` if recorded before the end.
    pub outcome: Option<MatchOutcome>,

    /// Outcome digest reported by the host.
    pub digest: OutcomeDigest,
}

/// Errors decoding a record.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Bincode encode failure.
    #[error("record serialization failed: {0}")]
    SerializationFailed(String),
    /// Bincode decode failure.
    #[error("record deserialization failed: {0}")]
    DeserializationFailed(String),
}

impl MatchRecord {
    /// Capture an engine's history as of `now`.
    pub fn from_engine(engine: &Engine, now: u64) -> Self {
        let state = engine.state();
        Self {
            format: RECORD_VERSION,
            seed: state.seed.clone(),
            mode: state.mode,
            started_at: state.started_at,
            final_version: state.version,
            inputs: state.inputs.as_slice().to_vec(),
            scores: state.scores(),
            outcome: engine.outcome(now),
            digest: engine.outcome_digest(),
        }
    }

    /// Serialize to bytes using bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        bincode::serialize(self).map_err(|e| RecordError::SerializationFailed(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, RecordError> {
        bincode::deserialize(data).map_err(|e| RecordError::DeserializationFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::Direction;
    use crate::game::state::ContestantId;
    use crate::MATCH_DURATION_MS;

    #[test]
    fn test_record_bytes() {
        let mut engine = Engine::new("0xfeedface", MatchMode::Duel, 0);
        engine.queue_input(ContestantId::One, Direction::Up, 10);
        engine.advance(100);
        engine.advance(MATCH_DURATION_MS);

        let record = MatchRecord::from_engine(&engine, MATCH_DURATION_MS);
        assert_eq!(record.final_version, 1);
        assert_eq!(record.inputs.len(), 1);
        assert!(record.outcome.is_some());

        let bytes = record.to_bytes().unwrap();
        assert_eq!(MatchRecord::from_bytes(&bytes).unwrap(), record);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            MatchRecord::from_bytes(&[0xff, 0x00, 0x13]),
            Err(RecordError::DeserializationFailed(_))
        ));
    }
}
