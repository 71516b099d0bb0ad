//! Collision Detection
//!
//! Checks run on post-move positions, wall then self then opponent.
//! Deaths are collected for both contestants first and applied together.

use crate::game::events::{DeathCause, GameEvent};
use crate::game::state::{ContestantId, ContestantState, MatchState};

/// Head off the board?
#[inline]
pub fn hits_wall(contestant: &ContestantState) -> bool {
    !contestant.head().in_bounds()
}

/// Head on any body cell after the head itself?
pub fn hits_self(contestant: &ContestantState) -> bool {
    let head = contestant.head();
    contestant.body.iter().skip(1).any(|&cell| cell == head)
}

/// Head on any cell of `other`'s body?
pub fn hits_opponent(contestant: &ContestantState, other: &ContestantState) -> bool {
    let head = contestant.head();
    other.body.iter().any(|&cell| cell == head)
}

/// First collision the contestant suffers this tick, checked wall, self, opponent.
///
/// `opponent_alive` is the opponent's status before the tick; a body that
/// was already dead is not an obstacle.
pub fn collision_cause(
    contestant: &ContestantState,
    other: &ContestantState,
    opponent_alive: bool,
) -> Option<DeathCause> {
    if hits_wall(contestant) {
        Some(DeathCause::Wall)
    } else if hits_self(contestant) {
        Some(DeathCause::SelfCollision)
    } else if opponent_alive && hits_opponent(contestant, other) {
        Some(DeathCause::Opponent)
    } else {
        None
    }
}

/// Resolve all collisions for this tick, marking contestants dead.
///
/// Both contestants are judged against the same post-move bodies and the
/// same pre-tick alive flags, so the order of checks never matters.
pub fn resolve_collisions(state: &mut MatchState) {
    let alive = ContestantId::BOTH.map(|id| state.contestant(id).alive);

    let deaths = ContestantId::BOTH.map(|id| {
        if !alive[id.index()] {
            return None;
        }
        let opponent = id.opponent();
        collision_cause(
            state.contestant(id),
            state.contestant(opponent),
            alive[opponent.index()],
        )
    });

    for id in ContestantId::BOTH {
        if let Some(cause) = deaths[id.index()] {
            kill(state, id, cause);
        }
    }
}

fn kill(state: &mut MatchState, id: ContestantId, cause: DeathCause) {
    state.contestant_mut(id).alive = false;
    let version = state.version;
    state.push_event(GameEvent::contestant_died(version, id, cause));
}
