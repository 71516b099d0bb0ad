//! Authoritative Simulation Tick
//!
//! One deterministic step plus the end-of-match rules.
//! Time only enters through the `now` argument of the outcome checks.

use crate::core::grid::Direction;
use crate::game::collision::resolve_collisions;
use crate::game::events::{GameEvent, MatchOutcome};
use crate::game::input::{is_reversal, InputEvent};
use crate::game::items::{consume_item, top_up_items};
use crate::game::state::{ContestantId, MatchMode, MatchPhase, MatchState};
use crate::ITEMS_TO_WIN;

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Whether the tick ran at all
    pub advanced: bool,
    /// Whether match ended this tick
    pub match_ended: bool,
    /// Outcome (if match ended)
    pub outcome: Option<MatchOutcome>,
}

/// Run one simulation step.
///
/// # Determinism
///
/// Given the same state (including its input log) this always produces
/// the same next state. Items are topped up, contestants move (1 then 2),
/// then collisions are resolved on the new positions.
pub fn tick(state: &mut MatchState) -> TickResult {
    if state.is_ended() {
        return TickResult {
            match_ended: true,
            ..TickResult::default()
        };
    }

    state.phase = MatchPhase::Running;

    // 1. Top up items
    top_up_items(state);

    // 2. Move living contestants
    for id in ContestantId::BOTH {
        if state.contestant(id).alive {
            move_contestant(state, id);
        }
    }

    // 3. Collisions on post-move positions
    resolve_collisions(state);

    state.version += 1;

    TickResult {
        events: state.take_events(),
        advanced: true,
        ..TickResult::default()
    }
}

/// Log a heading change and make it the contestant's pending heading.
///
/// Rejected (nothing logged) when the match is over at `now`, the
/// contestant is dead, or the heading reverses the current one.
pub fn queue_input(
    state: &mut MatchState,
    contestant: ContestantId,
    heading: Direction,
    now: u64,
) -> bool {
    if is_over(state, now) {
        return false;
    }
    let player = state.contestant(contestant);
    if !player.alive || is_reversal(player.heading, heading) {
        return false;
    }

    let version = state.version;
    state.inputs.push(InputEvent {
        contestant,
        heading,
        timestamp: now,
        version,
    });
    state.contestant_mut(contestant).queued_heading = heading;
    true
}

/// Commit the queued heading and step one cell, eating any item under the new head.
fn move_contestant(state: &mut MatchState, id: ContestantId) {
    let player = state.contestant_mut(id);
    player.heading = player.queued_heading;
    let new_head = player.head().step(player.heading);
    player.body.push_front(new_head);

    if !consume_item(state, id, new_head) {
        state.contestant_mut(id).body.pop_back();
    }
}

/// Has the match ended at `now`?
///
/// Wall-clock expiry, either contestant at the item threshold, both dead
/// (duel), or contestant 1 dead (practice). Once ended, always ended.
pub fn is_over(state: &MatchState, now: u64) -> bool {
    if state.is_ended() || now >= state.ends_at {
        return true;
    }

    let one = state.contestant(ContestantId::One);
    let two = state.contestant(ContestantId::Two);

    match state.mode {
        MatchMode::Practice => one.score >= ITEMS_TO_WIN || !one.alive,
        MatchMode::Duel => {
            one.score >= ITEMS_TO_WIN
                || two.score >= ITEMS_TO_WIN
                || (!one.alive && !two.alive)
        }
    }
}

/// Outcome at `now`, or `None` while the match is still on.
pub fn outcome(state: &MatchState, now: u64) -> Option<MatchOutcome> {
    if !is_over(state, now) {
        return None;
    }
    Some(decide(state))
}

/// Winner at `now`. `None` while running, on a draw, or after a failed practice run.
pub fn winner(state: &MatchState, now: u64) -> Option<ContestantId> {
    outcome(state, now).and_then(MatchOutcome::winner)
}

fn decide(state: &MatchState) -> MatchOutcome {
    let one = state.contestant(ContestantId::One);
    let two = state.contestant(ContestantId::Two);

    match state.mode {
        MatchMode::Practice => {
            if one.score >= ITEMS_TO_WIN {
                MatchOutcome::Won(ContestantId::One)
            } else if !one.alive {
                MatchOutcome::Draw
            } else if one.score > 0 {
                MatchOutcome::Won(ContestantId::One)
            } else {
                MatchOutcome::Draw
            }
        }
        MatchMode::Duel => {
            // Threshold first; contestant 1 wins a simultaneous reach.
            if one.score >= ITEMS_TO_WIN {
                return MatchOutcome::Won(ContestantId::One);
            }
            if two.score >= ITEMS_TO_WIN {
                return MatchOutcome::Won(ContestantId::Two);
            }
            match (one.alive, two.alive) {
                (false, true) => return MatchOutcome::Won(ContestantId::Two),
                (true, false) => return MatchOutcome::Won(ContestantId::One),
                _ => {}
            }
            match one.score.cmp(&two.score) {
                std::cmp::Ordering::Greater => MatchOutcome::Won(ContestantId::One),
                std::cmp::Ordering::Less => MatchOutcome::Won(ContestantId::Two),
                std::cmp::Ordering::Equal => MatchOutcome::Draw,
            }
        }
    }
}

/// Latch the end of the match, recording the outcome.
pub fn end_match(state: &mut MatchState, result: &mut TickResult) {
    if state.is_ended() {
        return;
    }
    let outcome = decide(state);
    state.phase = MatchPhase::Ended;
    result.match_ended = true;
    result.outcome = Some(outcome);
    result.events.push(GameEvent::match_ended(state.version, outcome));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::Cell;
    use crate::game::events::GameEventData;

    fn duel() -> MatchState {
        MatchState::new("tick-test", MatchMode::Duel, 0)
    }

    #[test]
    fn test_tick_determinism() {
        let mut a = duel();
        let mut b = duel();
        for _ in 0..40 {
            let ra = tick(&mut a);
            let rb = tick(&mut b);
            assert_eq!(ra.events, rb.events);
        }
        assert_eq!(a.contestants, b.contestants);
        assert_eq!(a.items, b.items);
        assert_eq!(a.version, 40);
    }

    #[test]
    fn test_movement_keeps_length() {
        let mut state = duel();
        state.items.clear();
        tick(&mut state);

        let one = state.contestant(ContestantId::One);
        assert_eq!(state.phase, MatchPhase::Running);
        assert_eq!(one.head(), Cell::new(11, 15));
        assert_eq!(one.body.len(), 3 + one.score as usize);
        assert_eq!(state.contestant(ContestantId::Two).head(), Cell::new(29, 15));
    }

    #[test]
    fn test_eating_grows_body() {
        let mut state = duel();
        // Fill the pool so top-up does nothing, one item right ahead.
        state.items = vec![Cell::new(11, 15), Cell::new(0, 0), Cell::new(0, 1)];
        let result = tick(&mut state);

        let one = state.contestant(ContestantId::One);
        assert_eq!(one.score, 1);
        assert_eq!(one.body.len(), 4);
        assert_eq!(*one.body.back().unwrap(), Cell::new(8, 15));
        assert!(result
            .events
            .iter()
            .any(|e| matches!(e.data, GameEventData::ItemConsumed { new_score: 1, .. })));
    }

    #[test]
    fn test_queued_heading_committed_on_tick() {
        let mut state = duel();
        state.items.clear();
        state.contestant_mut(ContestantId::One).queued_heading = Direction::Up;
        tick(&mut state);

        let one = state.contestant(ContestantId::One);
        assert_eq!(one.heading, Direction::Up);
        assert_eq!(one.head(), Cell::new(10, 14));
    }

    #[test]
    fn test_wall_death() {
        let mut state = duel();
        state.contestants[0] = crate::game::state::ContestantState::new(
            ContestantId::One,
            [Cell::new(39, 3), Cell::new(38, 3), Cell::new(37, 3)],
            Direction::Right,
        );
        let result = tick(&mut state);
        assert!(!state.contestant(ContestantId::One).alive);
        assert!(result.events.iter().any(|e| matches!(
            e.data,
            GameEventData::ContestantDied { contestant: ContestantId::One, .. }
        )));
    }

    #[test]
    fn test_dead_contestant_stays_put() {
        let mut state = duel();
        state.contestant_mut(ContestantId::Two).alive = false;
        let before = state.contestant(ContestantId::Two).body.clone();
        tick(&mut state);
        assert_eq!(state.contestant(ContestantId::Two).body, before);
    }

    #[test]
    fn test_threshold_win_contestant_one_first() {
        let mut state = duel();
        state.contestant_mut(ContestantId::One).score = 5;
        state.contestant_mut(ContestantId::Two).score = 3;
        assert!(is_over(&state, 1));
        assert_eq!(winner(&state, 1), Some(ContestantId::One));

        state.contestant_mut(ContestantId::Two).score = 5;
        assert_eq!(winner(&state, 1), Some(ContestantId::One));
    }

    #[test]
    fn test_duel_rules() {
        let mut state = duel();
        assert!(!is_over(&state, 1));
        assert_eq!(outcome(&state, 1), None);

        // One dead is not enough to end a duel.
        state.contestant_mut(ContestantId::One).alive = false;
        assert!(!is_over(&state, 1));
        // Time runs out: the survivor wins even with fewer items.
        state.contestant_mut(ContestantId::One).score = 4;
        assert_eq!(winner(&state, state.ends_at), Some(ContestantId::Two));

        // Both dead: score decides.
        state.contestant_mut(ContestantId::Two).alive = false;
        assert!(is_over(&state, 1));
        assert_eq!(winner(&state, 1), Some(ContestantId::One));

        state.contestant_mut(ContestantId::Two).score = 4;
        assert_eq!(outcome(&state, 1), Some(MatchOutcome::Draw));
    }

    #[test]
    fn test_practice_rules() {
        let mut state = MatchState::new("practice", MatchMode::Practice, 0);
        state.contestant_mut(ContestantId::One).score = 2;
        assert!(!is_over(&state, 1));

        state.contestant_mut(ContestantId::One).alive = false;
        assert!(is_over(&state, 1));
        assert_eq!(winner(&state, 1), None);

        let mut state = MatchState::new("practice", MatchMode::Practice, 0);
        assert_eq!(outcome(&state, state.ends_at), Some(MatchOutcome::Draw));
        state.contestant_mut(ContestantId::One).score = 1;
        assert_eq!(winner(&state, state.ends_at), Some(ContestantId::One));

        // Contestant 2 dying means nothing in practice.
        let mut state = MatchState::new("practice", MatchMode::Practice, 0);
        state.contestant_mut(ContestantId::Two).alive = false;
        assert!(!is_over(&state, 1));
    }

    #[test]
    fn test_end_match_latches() {
        let mut state = duel();
        let mut result = TickResult::default();
        end_match(&mut state, &mut result);
        assert!(result.match_ended);
        assert_eq!(result.outcome, Some(MatchOutcome::Draw));
        assert!(is_over(&state, 0));

        let again = tick(&mut state);
        assert!(!again.advanced);
        assert!(again.match_ended);
    }
}
