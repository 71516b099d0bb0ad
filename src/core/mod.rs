//! Core deterministic primitives.
//!
//! Grid geometry and hashing are pure; the clock is the single
//! time source, injected wherever time matters.

pub mod grid;
pub mod hash;
pub mod clock;

// Re-export core types
pub use grid::{Cell, Direction};
pub use hash::{OutcomeDigest, TextHasher, hash_text};
pub use clock::{Clock, ManualClock, SystemClock};
