//! Match Engine
//!
//! The authoritative simulation owned by the host. Wraps [`MatchState`]
//! with input validation, tick pacing and outcome queries. Time is always
//! passed in by the caller, so the engine never touches a clock.

use tracing::{debug, trace};

use crate::core::grid::Direction;
use crate::core::hash::OutcomeDigest;
use crate::game::events::MatchOutcome;
use crate::game::input::outcome_digest;
use crate::game::snapshot::GameSnapshot;
use crate::game::state::{ContestantId, MatchMode, MatchPhase, MatchState};
use crate::game::tick::{self, TickResult};
use crate::TICK_INTERVAL_MS;

/// Deterministic snake duel simulation.
#[derive(Clone, Debug)]
pub struct Engine {
    state: MatchState,
    last_tick_at: u64,
}

impl Engine {
    /// Start a match keyed by `match_key` at `now` (epoch ms).
    pub fn new(match_key: &str, mode: MatchMode, now: u64) -> Self {
        let state = MatchState::new(match_key, mode, now);
        debug!(match_id = state.match_id, ?mode, "Engine created");
        Self {
            state,
            last_tick_at: now,
        }
    }

    /// Current state (read-only).
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Current phase.
    pub fn phase(&self) -> MatchPhase {
        self.state.phase
    }

    /// Effective ticks performed so far.
    pub fn version(&self) -> u64 {
        self.state.version
    }

    /// Request a heading change, effective on the next tick.
    ///
    /// Returns false (and logs nothing) for a reversal of the current
    /// heading, a dead contestant or a finished match. Otherwise the input
    /// is logged and overwrites any heading still pending.
    pub fn queue_input(&mut self, contestant: ContestantId, heading: Direction, now: u64) -> bool {
        let accepted = tick::queue_input(&mut self.state, contestant, heading, now);
        if !accepted {
            trace!(%contestant, %heading, "Input ignored");
        }
        accepted
    }

    /// Advance the simulation if a tick is due at `now`.
    ///
    /// A tick is due once [`TICK_INTERVAL_MS`] has passed since the last one
    /// (construction counts as the first). Nothing happens once the match
    /// is over; the call that first observes the end latches it.
    pub fn advance(&mut self, now: u64) -> TickResult {
        let mut result = TickResult::default();
        if self.state.is_ended() {
            result.match_ended = true;
            return result;
        }
        if tick::is_over(&self.state, now) {
            tick::end_match(&mut self.state, &mut result);
            debug!(version = self.state.version, outcome = ?result.outcome, "Match over");
            return result;
        }
        if now.saturating_sub(self.last_tick_at) < TICK_INTERVAL_MS {
            return result;
        }

        self.last_tick_at = now;
        result = tick::tick(&mut self.state);

        if tick::is_over(&self.state, now) {
            tick::end_match(&mut self.state, &mut result);
            debug!(version = self.state.version, outcome = ?result.outcome, "Match over");
        }
        result
    }

    /// Has the match ended at `now`?
    pub fn is_over(&self, now: u64) -> bool {
        tick::is_over(&self.state, now)
    }

    /// Outcome at `now`; `None` while the match is on.
    pub fn outcome(&self, now: u64) -> Option<MatchOutcome> {
        tick::outcome(&self.state, now)
    }

    /// Winning contestant at `now`, if any.
    pub fn winner(&self, now: u64) -> Option<ContestantId> {
        tick::winner(&self.state, now)
    }

    /// Fingerprint of the input log and current scores.
    pub fn outcome_digest(&self) -> OutcomeDigest {
        outcome_digest(
            &self.state.seed,
            self.state.match_id,
            self.state.inputs.iter(),
            self.state.scores(),
        )
    }

    /// Milliseconds left on the match clock.
    pub fn time_remaining(&self, now: u64) -> u64 {
        self.state.ends_at.saturating_sub(now)
    }

    /// Wire snapshot of the current state.
    pub fn snapshot(&self, now: u64) -> GameSnapshot {
        GameSnapshot::from_state(&self.state, now)
    }
}

// =============================================================================
// TESTS
// =============================================================================
