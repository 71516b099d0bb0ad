//! # Snake Duel
//!
//! Deterministic two-player snake duel with staked settlement.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       SNAKE DUEL                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── grid.rs     - Cells and headings                        │
//! │  ├── hash.rs     - SHA-256 text hashing, outcome digest      │
//! │  └── clock.rs    - Injected time source                      │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                │
//! │  ├── state.rs    - Match and contestant state                │
//! │  ├── input.rs    - Input log and outcome digest              │
//! │  ├── items.rs    - Hash-derived item placement               │
//! │  ├── collision.rs- Wall, self and opponent collisions        │
//! │  ├── tick.rs     - Authoritative simulation step             │
//! │  ├── engine.rs   - Paced engine owned by the host            │
//! │  └── snapshot.rs - Wire state blob                           │
//! │                                                              │
//! │  audit/          - Replay verification of finished matches   │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── protocol.rs - Message types                             │
//! │  ├── room.rs     - Room registry                             │
//! │  ├── server.rs   - WebSocket relay                           │
//! │  └── session.rs  - Peer session (host / guest)               │
//! │                                                              │
//! │  config.rs       - Environment configuration                 │
//! │  settlement.rs   - Wallet and staking contract interfaces    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are deterministic given the match key
//! and the input log:
//! - No floating-point arithmetic in game logic
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - Time only enters as an explicit `now` argument
//! - Item placement derives from SHA-256 of the key and the input log
//!
//! Two engines fed the same inputs at the same versions reach the same
//! state and the same outcome digest.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod config;
pub mod core;
pub mod game;
pub mod network;
pub mod settlement;

// Re-export commonly used types
pub use core::clock::{Clock, ManualClock, SystemClock};
pub use core::grid::{Cell, Direction};
pub use core::hash::OutcomeDigest;
pub use game::engine::Engine;
pub use game::events::MatchOutcome;
pub use game::snapshot::GameSnapshot;
pub use game::state::{ContestantId, MatchMode, MatchState};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Grid width in cells
pub const GRID_WIDTH: i32 = 40;

/// Grid height in cells
pub const GRID_HEIGHT: i32 = 30;

/// Minimum time between ticks (ms)
pub const TICK_INTERVAL_MS: u64 = 100;

/// Match length (ms)
pub const MATCH_DURATION_MS: u64 = 30_000;

/// Items needed to win outright
pub const ITEMS_TO_WIN: u32 = 5;

/// Items kept on the board
pub const MAX_ITEMS: usize = 3;
