//! Verification API
//!
//! Verify a finished match by deterministic replay. Inputs are re-applied
//! at the tick cursor they were logged at, so item placement and movement
//! follow exactly the path the host saw.

use tracing::{debug, warn};

use crate::audit::record::{MatchRecord, RECORD_VERSION};
use crate::core::hash::OutcomeDigest;
use crate::game::events::{GameEvent, MatchOutcome};
use crate::game::input::{outcome_digest, InputEvent};
use crate::game::state::MatchState;
use crate::game::tick;

/// Successful replay.
#[derive(Debug)]
pub struct VerificationReport {
    /// Digest recomputed from the replay.
    pub digest: OutcomeDigest,
    /// Replayed final scores.
    pub scores: (u32, u32),
    /// Replayed outcome.
    pub outcome: MatchOutcome,
    /// Every event the replay produced.
    pub events: Vec<GameEvent>,
}

/// Errors that can occur during verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// Record format mismatch.
    #[error("record version mismatch: expected {expected}, got {got}")]
    VersionMismatch {
        /// Expected version.
        expected: u8,
        /// Actual version.
        got: u8,
    },

    /// Record was taken before the match ended.
    #[error("record is incomplete")]
    IncompleteRecord,

    /// Input log out of tick order or past the final tick.
    #[error("input {index} is out of order")]
    MalformedInputLog {
        /// Offending input.
        index: usize,
    },

    /// The replayed engine refused a logged input.
    #[error("input {index} was rejected on replay")]
    InputRejected {
        /// Offending input.
        index: usize,
    },

    /// Replayed scores differ.
    #[error("score mismatch: expected {expected:?}, computed {computed:?}")]
    ScoreMismatch {
        /// Recorded scores.
        expected: (u32, u32),
        /// Replayed scores.
        computed: (u32, u32),
    },

    /// Replayed outcome differs.
    #[error("outcome mismatch: expected {expected:?}, computed {computed:?}")]
    OutcomeMismatch {
        /// Recorded outcome.
        expected: MatchOutcome,
        /// Replayed outcome.
        computed: MatchOutcome,
    },

    /// Digest differs.
    #[error("digest mismatch: expected {expected}, computed {computed}")]
    DigestMismatch {
        /// Recorded digest.
        expected: OutcomeDigest,
        /// Replayed digest.
        computed: OutcomeDigest,
    },
}

/// Verify a match record by full replay.
pub fn verify_record(record: &MatchRecord) -> Result<VerificationReport, VerifyError> {
    if record.format != RECORD_VERSION {
        return Err(VerifyError::VersionMismatch {
            expected: RECORD_VERSION,
            got: record.format,
        });
    }
    let expected_outcome = record.outcome.ok_or(VerifyError::IncompleteRecord)?;
    check_input_order(&record.inputs, record.final_version)?;

    let mut state = MatchState::new(&record.seed, record.mode, record.started_at);
    let mut events = Vec::new();
    let mut next = 0;

    for version in 0..=record.final_version {
        next = apply_inputs(&mut state, &record.inputs, next, version)?;
        if version == record.final_version {
            break;
        }
        events.extend(tick::tick(&mut state).events);
    }

    let scores = state.scores();
    if scores != record.scores {
        warn!(?scores, expected = ?record.scores, "Replay score mismatch");
        return Err(VerifyError::ScoreMismatch {
            expected: record.scores,
            computed: scores,
        });
    }

    // Time expiry ends every match, and never changes who won.
    let outcome = tick::outcome(&state, state.ends_at).unwrap_or(MatchOutcome::Draw);
    if outcome != expected_outcome {
        return Err(VerifyError::OutcomeMismatch {
            expected: expected_outcome,
            computed: outcome,
        });
    }

    let digest = outcome_digest(&state.seed, state.match_id, state.inputs.iter(), scores);
    if digest != record.digest {
        warn!(%digest, expected = %record.digest, "Replay digest mismatch");
        return Err(VerifyError::DigestMismatch {
            expected: record.digest,
            computed: digest,
        });
    }

    debug!(%digest, ticks = record.final_version, "Record verified");
    Ok(VerificationReport {
        digest,
        scores,
        outcome,
        events,
    })
}

/// Check that a peer's digest matches a verified replay.
pub fn verify_digest(record: &MatchRecord, claimed: &OutcomeDigest) -> Result<(), VerifyError> {
    let report = verify_record(record)?;
    if &report.digest != claimed {
        return Err(VerifyError::DigestMismatch {
            expected: *claimed,
            computed: report.digest,
        });
    }
    Ok(())
}

fn check_input_order(inputs: &[InputEvent], final_version: u64) -> Result<(), VerifyError> {
    let mut last = 0;
    for (index, input) in inputs.iter().enumerate() {
        if input.version < last || input.version > final_version {
            return Err(VerifyError::MalformedInputLog { index });
        }
        last = input.version;
    }
    Ok(())
}

/// Apply the run of inputs logged at `version`, starting from `next`.
fn apply_inputs(
    state: &mut MatchState,
    inputs: &[InputEvent],
    mut next: usize,
    version: u64,
) -> Result<usize, VerifyError> {
    while let Some(input) = inputs.get(next).filter(|i| i.version == version) {
        if !tick::queue_input(state, input.contestant, input.heading, input.timestamp) {
            return Err(VerifyError::InputRejected { index: next });
        }
        next += 1;
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::Direction;
    use crate::game::engine::Engine;
    use crate::game::state::{ContestantId, MatchMode};
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    const T0: u64 = 1_700_000_000_000;

    /// Play a random match to its end.
    fn play(seed: u64, mode: MatchMode) -> (Engine, u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut engine = Engine::new("0x3f9a1c07b2e4d5a6f7089a1b2c3d4e5f60718293", mode, T0);
        let mut now = T0;
        while !engine.is_over(now) {
            now += rng.gen_range(10..60);
            if rng.gen_bool(0.3) {
                let id = if rng.gen_bool(0.5) { ContestantId::One } else { ContestantId::Two };
                let dir = Direction::ALL[rng.gen_range(0..4)];
                engine.queue_input(id, dir, now);
            }
            engine.advance(now);
        }
        engine.advance(now);
        (engine, now)
    }

    #[test]
    fn test_replay_reproduces_digest() {
        for seed in 0..8 {
            for mode in [MatchMode::Duel, MatchMode::Practice] {
                let (engine, end) = play(seed, mode);
                let record = MatchRecord::from_engine(&engine, end);

                let report = verify_record(&record).unwrap();
                assert_eq!(report.digest, engine.outcome_digest());
                assert_eq!(report.scores, engine.state().scores());
                assert_eq!(Some(report.outcome), engine.outcome(end));
                assert!(verify_digest(&record, &engine.outcome_digest()).is_ok());
            }
        }
    }

    #[test]
    fn test_tampered_score_detected() {
        let (engine, end) = play(42, MatchMode::Duel);
        let mut record = MatchRecord::from_engine(&engine, end);
        record.scores.1 += 1;
        assert!(matches!(
            verify_record(&record),
            Err(VerifyError::ScoreMismatch { .. })
        ));
    }

    #[test]
    fn test_tampered_digest_detected() {
        let (engine, end) = play(7, MatchMode::Duel);
        let mut record = MatchRecord::from_engine(&engine, end);
        record.digest = OutcomeDigest([0u8; 32]);
        assert!(matches!(
            verify_record(&record),
            Err(VerifyError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn test_incomplete_record_fails() {
        let engine = Engine::new("k", MatchMode::Duel, T0);
        let record = MatchRecord::from_engine(&engine, T0 + 1);
        assert_eq!(verify_record(&record).unwrap_err(), VerifyError::IncompleteRecord);
    }

    #[test]
    fn test_out_of_order_inputs_rejected() {
        let (engine, end) = play(3, MatchMode::Duel);
        let mut record = MatchRecord::from_engine(&engine, end);
        record.inputs.push(InputEvent {
            contestant: ContestantId::One,
            heading: Direction::Up,
            timestamp: end,
            version: record.final_version + 1,
        });
        assert!(matches!(
            verify_record(&record),
            Err(VerifyError::MalformedInputLog { .. })
        ));
    }

    #[test]
    fn test_reversal_injected_is_rejected() {
        let engine = Engine::new("k", MatchMode::Duel, T0);
        let mut record = MatchRecord::from_engine(&engine, T0 + crate::MATCH_DURATION_MS);
        // Contestant 1 starts heading right; a left turn can never have been accepted.
        record.inputs.push(InputEvent {
            contestant: ContestantId::One,
            heading: Direction::Left,
            timestamp: T0,
            version: 0,
        });
        assert_eq!(
            verify_record(&record).unwrap_err(),
            VerifyError::InputRejected { index: 0 }
        );
    }
}
