//! Match State Definitions
//!
//! All state types for match simulation.
//! Contestants live in a fixed two-slot array indexed by id, so iteration
//! order is always contestant 1 then contestant 2.

use std::collections::VecDeque;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::grid::{Cell, Direction};
use crate::game::events::GameEvent;
use crate::game::input::InputLog;
use crate::MATCH_DURATION_MS;

// =============================================================================
// CONTESTANT ID
// =============================================================================

/// One of the two contestants. Serialized as the number `1` or `2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ContestantId {
    /// The host, who created the match.
    One,
    /// The guest.
    Two,
}

impl ContestantId {
    /// Both ids in simulation order.
    pub const BOTH: [ContestantId; 2] = [ContestantId::One, ContestantId::Two];

    /// Numeric id (1 or 2).
    #[inline]
    pub const fn as_u8(self) -> u8 {
        match self {
            ContestantId::One => 1,
            ContestantId::Two => 2,
        }
    }

    /// Slot in the contestant array.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            ContestantId::One => 0,
            ContestantId::Two => 1,
        }
    }

    /// The other contestant.
    #[inline]
    pub const fn opponent(self) -> ContestantId {
        match self {
            ContestantId::One => ContestantId::Two,
            ContestantId::Two => ContestantId::One,
        }
    }
}

/// Rejected numeric contestant id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("contestant id must be 1 or 2, got {0}")]
pub struct InvalidContestantId(pub u8);

impl TryFrom<u8> for ContestantId {
    type Error = InvalidContestantId;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ContestantId::One),
            2 => Ok(ContestantId::Two),
            other => Err(InvalidContestantId(other)),
        }
    }
}

impl From<ContestantId> for u8 {
    fn from(id: ContestantId) -> u8 {
        id.as_u8()
    }
}

impl fmt::Display for ContestantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

// =============================================================================
// MODE / PHASE
// =============================================================================

/// Whether a second participant is playing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchMode {
    /// Contestant 1 alone; contestant 2 is still simulated as an obstacle.
    Practice,
    /// Two participants.
    Duel,
}

/// Match phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MatchPhase {
    /// Constructed, no tick yet.
    #[default]
    NotStarted,
    /// At least one tick has run.
    Running,
    /// Terminal.
    Ended,
}

// =============================================================================
// CONTESTANT STATE
// =============================================================================

/// State of a single contestant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestantState {
    /// Which contestant this is
    pub id: ContestantId,

    /// Occupied cells, head first
    pub body: VecDeque<Cell>,

    /// Heading used on the last move
    pub heading: Direction,

    /// Heading committed on the next move
    pub queued_heading: Direction,

    /// Items consumed
    pub score: u32,

    /// Still moving?
    pub alive: bool,
}

impl ContestantState {
    /// Create a contestant with the given body (head first).
    pub fn new(id: ContestantId, body: impl IntoIterator<Item = Cell>, heading: Direction) -> Self {
        Self {
            id,
            body: body.into_iter().collect(),
            heading,
            queued_heading: heading,
            score: 0,
            alive: true,
        }
    }

    /// Starting layout for a contestant.
    pub fn spawn(id: ContestantId) -> Self {
        match id {
            ContestantId::One => Self::new(
                id,
                [Cell::new(10, 15), Cell::new(9, 15), Cell::new(8, 15)],
                Direction::Right,
            ),
            ContestantId::Two => Self::new(
                id,
                [Cell::new(30, 15), Cell::new(31, 15), Cell::new(32, 15)],
                Direction::Left,
            ),
        }
    }

    /// Head cell.
    #[inline]
    pub fn head(&self) -> Cell {
        // Bodies are created non-empty and never shrink below their spawn length.
        self.body.front().copied().unwrap_or(Cell::new(-1, -1))
    }

    /// Does any body cell sit on `cell`?
    pub fn occupies(&self, cell: Cell) -> bool {
        self.body.contains(&cell)
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of a match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchState {
    /// Seed string (the match key)
    pub seed: String,

    /// Numeric match id derived from the key
    pub match_id: u32,

    /// Practice or duel
    pub mode: MatchMode,

    /// Current phase
    pub phase: MatchPhase,

    /// Effective ticks performed so far
    pub version: u64,

    /// Construction time (epoch ms)
    pub started_at: u64,

    /// Wall-clock end (epoch ms)
    pub ends_at: u64,

    /// Contestant 1 and 2
    pub contestants: [ContestantState; 2],

    /// Items on the board, in spawn order
    pub items: Vec<Cell>,

    /// Every accepted input
    pub inputs: InputLog,

    /// Events generated this tick (cleared each tick)
    #[serde(skip)]
    pub pending_events: Vec<GameEvent>,
}

impl MatchState {
    /// Create the initial state for `match_key`, starting at `now`.
    pub fn new(match_key: &str, mode: MatchMode, now: u64) -> Self {
        Self {
            seed: match_key.to_string(),
            match_id: match_id_from_key(match_key),
            mode,
            phase: MatchPhase::NotStarted,
            version: 0,
            started_at: now,
            ends_at: now + MATCH_DURATION_MS,
            contestants: [
                ContestantState::spawn(ContestantId::One),
                ContestantState::spawn(ContestantId::Two),
            ],
            items: Vec::new(),
            inputs: InputLog::new(),
            pending_events: Vec::new(),
        }
    }

    /// Get a contestant.
    #[inline]
    pub fn contestant(&self, id: ContestantId) -> &ContestantState {
        &self.contestants[id.index()]
    }

    /// Get a contestant mutably.
    #[inline]
    pub fn contestant_mut(&mut self, id: ContestantId) -> &mut ContestantState {
        &mut self.contestants[id.index()]
    }

    /// Is `cell` covered by either contestant's body?
    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.contestants.iter().any(|c| c.occupies(cell))
    }

    /// Scores as (contestant 1, contestant 2).
    pub fn scores(&self) -> (u32, u32) {
        (self.contestants[0].score, self.contestants[1].score)
    }

    /// Check if match has ended.
    pub fn is_ended(&self) -> bool {
        matches!(self.phase, MatchPhase::Ended)
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

/// Numeric match id: the last 8 characters of the key read as hex.
///
/// Keys whose tail is not valid hex map to 0.
pub fn match_id_from_key(key: &str) -> u32 {
    let start = key
        .char_indices()
        .rev()
        .nth(7)
        .map(|(i, _)| i)
        .unwrap_or(0);
    u32::from_str_radix(&key[start..], 16).unwrap_or(0)
}

// =============================================================================
// TESTS
// =============================================================================
