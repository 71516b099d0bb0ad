//! Game Events
//!
//! Events generated during simulation for rendering and audit.

use serde::{Serialize, Deserialize};

use crate::core::grid::Cell;
use crate::game::state::ContestantId;

/// Why a contestant died.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeathCause {
    /// Head left the board
    Wall,
    /// Head ran into its own body
    SelfCollision,
    /// Head ran into the opponent's body
    Opponent,
}

/// Final result of a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// A contestant won
    Won(ContestantId),
    /// Nobody won (a tie, or a practice run without a win)
    Draw,
}

impl MatchOutcome {
    /// Winning contestant, if any.
    pub fn winner(self) -> Option<ContestantId> {
        match self {
            MatchOutcome::Won(id) => Some(id),
            MatchOutcome::Draw => None,
        }
    }
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// An item appeared
    ItemSpawned {
        cell: Cell,
        slot: usize,
    },

    /// A placement attempt landed on a contestant and was skipped
    ItemSpawnSkipped {
        cell: Cell,
        slot: usize,
    },

    /// A contestant ate an item
    ItemConsumed {
        contestant: ContestantId,
        cell: Cell,
        new_score: u32,
    },

    /// A contestant died
    ContestantDied {
        contestant: ContestantId,
        cause: DeathCause,
    },

    /// Match ended
    MatchEnded {
        outcome: MatchOutcome,
        version: u64,
    },
}

/// A game event stamped with the tick that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick cursor when the event occurred
    pub version: u64,

    /// Contestant involved, if any
    pub contestant: Option<ContestantId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(version: u64, data: GameEventData) -> Self {
        let contestant = match &data {
            GameEventData::ItemConsumed { contestant, .. } => Some(*contestant),
            GameEventData::ContestantDied { contestant, .. } => Some(*contestant),
            GameEventData::MatchEnded { outcome, .. } => outcome.winner(),
            _ => None,
        };

        Self {
            version,
            contestant,
            data,
        }
    }

    /// Create item spawned event.
    pub fn item_spawned(version: u64, cell: Cell, slot: usize) -> Self {
        Self::new(version, GameEventData::ItemSpawned { cell, slot })
    }

    /// Create item spawn skipped event.
    pub fn item_spawn_skipped(version: u64, cell: Cell, slot: usize) -> Self {
        Self::new(version, GameEventData::ItemSpawnSkipped { cell, slot })
    }

    /// Create item consumed event.
    pub fn item_consumed(version: u64, contestant: ContestantId, cell: Cell, new_score: u32) -> Self {
        Self::new(version, GameEventData::ItemConsumed { contestant, cell, new_score })
    }

    /// Create contestant died event.
    pub fn contestant_died(version: u64, contestant: ContestantId, cause: DeathCause) -> Self {
        Self::new(version, GameEventData::ContestantDied { contestant, cause })
    }

    /// Create match ended event.
    pub fn match_ended(version: u64, outcome: MatchOutcome) -> Self {
        Self::new(version, GameEventData::MatchEnded { outcome, version })
    }
}
