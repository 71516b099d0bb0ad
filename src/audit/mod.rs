//! Audit Module
//!
//! Replay verification of finished matches.
//!
//! ## Flow
//!
//! 1. The host captures a [`MatchRecord`] when its engine reports the end
//! 2. Anyone holding the record replays it with [`verify_record`]
//! 3. The replayed digest must equal the digest submitted for settlement

pub mod record;
pub mod verify;

pub use record::{MatchRecord, RecordError, RECORD_VERSION};
pub use verify::{verify_digest, verify_record, VerificationReport, VerifyError};
