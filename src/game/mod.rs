//! Game Logic Module
//!
//! All game simulation code. 100% deterministic given inputs and timestamps.
//!
//! ## Module Structure
//!
//! - `state`: Match state, contestant state, ids
//! - `input`: Input log, reversal rule, outcome digest
//! - `items`: Item placement and consumption
//! - `collision`: Wall, self and opponent collisions
//! - `events`: Per-tick events
//! - `tick`: One simulation step and end-of-match rules
//! - `engine`: Paced engine owned by the host
//! - `snapshot`: Wire state blob mirrored by the guest

pub mod state;
pub mod input;
pub mod items;
pub mod collision;
pub mod events;
pub mod tick;
pub mod engine;
pub mod snapshot;

// Re-export key types
pub use engine::Engine;
pub use events::{GameEvent, MatchOutcome};
pub use input::{InputEvent, InputLog};
pub use snapshot::GameSnapshot;
pub use state::{ContestantId, MatchMode, MatchPhase, MatchState};
pub use tick::TickResult;
