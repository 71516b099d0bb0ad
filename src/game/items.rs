//! Item Placement and Consumption
//!
//! Placement is a pure function of match history: the digest of
//! `{seed}{match_id}{slot}{inputs}` picks the cell, so any party holding
//! the input log can recompute where every item appeared.

use crate::core::grid::Cell;
use crate::core::hash::{hash_text, leading_words};
use crate::game::events::GameEvent;
use crate::game::state::{ContestantId, MatchState};
use crate::{GRID_HEIGHT, GRID_WIDTH, MAX_ITEMS};

/// Cell chosen for the item in `slot`, given the current input history.
pub fn placement_cell(seed: &str, match_id: u32, slot: usize, history: &str) -> Cell {
    let text = format!("{seed}{match_id}{slot}{history}");
    let (a, b) = leading_words(&hash_text(&text));
    Cell::new(
        (a % GRID_WIDTH as u32) as i32,
        (b % GRID_HEIGHT as u32) as i32,
    )
}

/// Fill empty item slots.
///
/// One attempt per empty slot, slot index = current pool length. An attempt
/// that lands on a contestant ends the top-up for this tick; the same slot
/// would hash to the same cell, so it is retried once history changes.
pub fn top_up_items(state: &mut MatchState) {
    let history = state.inputs.placement_text();

    while state.items.len() < MAX_ITEMS {
        let slot = state.items.len();
        let cell = placement_cell(&state.seed, state.match_id, slot, &history);

        if state.is_occupied(cell) {
            let version = state.version;
            state.push_event(GameEvent::item_spawn_skipped(version, cell, slot));
            break;
        }

        state.items.push(cell);
        let version = state.version;
        state.push_event(GameEvent::item_spawned(version, cell, slot));
    }
}

/// Remove the item under `cell`, if any, crediting `contestant`.
///
/// Returns true if an item was eaten.
pub fn consume_item(state: &mut MatchState, contestant: ContestantId, cell: Cell) -> bool {
    let Some(index) = state.items.iter().position(|&item| item == cell) else {
        return false;
    };
    state.items.remove(index);

    let player = state.contestant_mut(contestant);
    player.score += 1;
    let new_score = player.score;

    let version = state.version;
    state.push_event(GameEvent::item_consumed(version, contestant, cell, new_score));
    true
}
