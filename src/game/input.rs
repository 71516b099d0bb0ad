//! Input Log
//!
//! Append-only record of every accepted heading change.
//! Feeds item placement, the outcome digest and audit replay.

use serde::{Serialize, Deserialize};

use crate::core::grid::Direction;
use crate::core::hash::{OutcomeDigest, TextHasher};
use crate::game::state::ContestantId;

/// A single accepted heading change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Who pressed
    pub contestant: ContestantId,
    /// Requested heading
    pub heading: Direction,
    /// Wall-clock time of the press (epoch ms)
    pub timestamp: u64,
    /// Number of ticks run before the press
    pub version: u64,
}

/// Would `requested` turn a contestant straight back into its own neck?
#[inline]
pub fn is_reversal(current: Direction, requested: Direction) -> bool {
    requested == current.opposite()
}

/// Ordered, append-only input log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputLog {
    events: Vec<InputEvent>,
}

impl InputLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Append an event.
    pub fn push(&mut self, event: InputEvent) {
        self.events.push(event);
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Is the log empty?
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &InputEvent> {
        self.events.iter()
    }

    /// Events in arrival order, as a slice.
    pub fn as_slice(&self) -> &[InputEvent] {
        &self.events
    }

    /// Events queued while the tick cursor stood at `version`.
    pub fn queued_at(&self, version: u64) -> impl Iterator<Item = &InputEvent> {
        self.events.iter().filter(move |e| e.version == version)
    }

    /// `{id}{HEADING}{timestamp}` for every event, concatenated.
    ///
    /// This is the history term of the item placement digest.
    pub fn placement_text(&self) -> String {
        let mut text = String::with_capacity(self.events.len() * 16);
        for e in &self.events {
            text.push_str(&e.contestant.to_string());
            text.push_str(e.heading.as_str());
            text.push_str(&e.timestamp.to_string());
        }
        text
    }
}

impl FromIterator<InputEvent> for InputLog {
    fn from_iter<T: IntoIterator<Item = InputEvent>>(iter: T) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

/// Digest a finished match.
///
/// SHA-256 over `{seed}|{match_id}|{moves}|{score1}|{score2}` where `moves`
/// is the log stably sorted by timestamp and rendered as `{id}:{HEADING}`
/// joined by `|`. Timestamps only decide order; their values are not hashed,
/// so both peers agree even though their clocks differ.
pub fn outcome_digest<'a>(
    seed: &str,
    match_id: u32,
    inputs: impl IntoIterator<Item = &'a InputEvent>,
    scores: (u32, u32),
) -> OutcomeDigest {
    let mut sorted: Vec<&InputEvent> = inputs.into_iter().collect();
    sorted.sort_by_key(|e| e.timestamp);

    let mut hasher = TextHasher::new();
    hasher.update_str(seed);
    hasher.separator();
    hasher.update_u64(match_id as u64);
    hasher.separator();
    for (i, e) in sorted.iter().enumerate() {
        if i > 0 {
            hasher.separator();
        }
        hasher.update_u64(e.contestant.as_u8() as u64);
        hasher.update_str(":");
        hasher.update_str(e.heading.as_str());
    }
    hasher.separator();
    hasher.update_u64(scores.0 as u64);
    hasher.separator();
    hasher.update_u64(scores.1 as u64);
    OutcomeDigest(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::hash_text;

    fn ev(contestant: ContestantId, heading: Direction, timestamp: u64) -> InputEvent {
        InputEvent { contestant, heading, timestamp, version: 0 }
    }

    #[test]
    fn test_reversal_rule() {
        assert!(is_reversal(Direction::Right, Direction::Left));
        assert!(is_reversal(Direction::Up, Direction::Down));
        assert!(!is_reversal(Direction::Right, Direction::Right));
        assert!(!is_reversal(Direction::Right, Direction::Up));
    }

    #[test]
    fn test_placement_text() {
        let log: InputLog = [
            ev(ContestantId::One, Direction::Up, 1000),
            ev(ContestantId::Two, Direction::Down, 1005),
        ]
        .into_iter()
        .collect();
        assert_eq!(log.placement_text(), "1UP10002DOWN1005");
        assert_eq!(InputLog::new().placement_text(), "");
    }

    #[test]
    fn test_digest_text_layout() {
        let inputs = [
            ev(ContestantId::Two, Direction::Down, 20),
            ev(ContestantId::One, Direction::Up, 10),
        ];
        let digest = outcome_digest("seed", 7, &inputs, (3, 1));
        assert_eq!(digest.0, hash_text("seed|7|1:UP|2:DOWN|3|1"));

        let empty = outcome_digest("seed", 7, InputLog::new().iter(), (0, 0));
        assert_eq!(empty.0, hash_text("seed|7||0|0"));
    }

    #[test]
    fn test_digest_sort_is_stable() {
        // Equal timestamps keep arrival order.
        let a = [
            ev(ContestantId::One, Direction::Up, 5),
            ev(ContestantId::Two, Direction::Down, 5),
        ];
        let digest = outcome_digest("k", 0, &a, (0, 0));
        assert_eq!(digest.0, hash_text("k|0|1:UP|2:DOWN|0|0"));
    }

    #[test]
    fn test_queued_at() {
        let log: InputLog = [
            InputEvent { version: 0, ..ev(ContestantId::One, Direction::Up, 1) },
            InputEvent { version: 2, ..ev(ContestantId::Two, Direction::Up, 2) },
            InputEvent { version: 2, ..ev(ContestantId::One, Direction::Left, 3) },
        ]
        .into_iter()
        .collect();
        assert_eq!(log.queued_at(2).count(), 2);
        assert_eq!(log.queued_at(1).count(), 0);
    }
}
