//! Hashing for Verification
//!
//! SHA-256 helpers shared by item placement and the outcome digest.
//!
//! Both digests are taken over *text*, not binary encodings: the web
//! clients compute the same strings, so a match played against a browser
//! peer can still be audited here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Raw hash output (256 bits / 32 bytes).
pub type HashBytes = [u8; 32];

/// Incremental hasher over textual fields.
///
/// Order of updates is critical for determinism.
pub struct TextHasher {
    hasher: Sha256,
}

impl TextHasher {
    /// Create an empty hasher.
    pub fn new() -> Self {
        Self { hasher: Sha256::new() }
    }

    /// Append a string verbatim.
    #[inline]
    pub fn update_str(&mut self, s: &str) {
        self.hasher.update(s.as_bytes());
    }

    /// Append the decimal rendering of an integer.
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_string().as_bytes());
    }

    /// Append the `|` field separator.
    #[inline]
    pub fn separator(&mut self) {
        self.hasher.update(b"|");
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> HashBytes {
        self.hasher.finalize().into()
    }
}

impl Default for TextHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute SHA-256 of a string.
pub fn hash_text(text: &str) -> HashBytes {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

/// Split a hash into two big-endian words (bytes 0..4 and 4..8).
///
/// Matches reading the first 16 hex characters as two 8-character numbers.
#[inline]
pub fn leading_words(hash: &HashBytes) -> (u32, u32) {
    let a = u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]]);
    let b = u32::from_be_bytes([hash[4], hash[5], hash[6], hash[7]]);
    (a, b)
}

// =============================================================================
// OUTCOME DIGEST
// =============================================================================

/// Tamper-evident fingerprint of a finished match.
///
/// Displayed and serialized as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutcomeDigest(pub HashBytes);

impl OutcomeDigest {
    /// Hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &HashBytes {
        &self.0
    }
}

impl fmt::Display for OutcomeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for OutcomeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutcomeDigest({})", &self.to_hex()[..16])
    }
}

/// Error parsing a hex digest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestParseError {
    /// Not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    /// Wrong number of bytes.
    #[error("expected 32 bytes, got {0}")]
    WrongLength(usize),
}

impl FromStr for OutcomeDigest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| DigestParseError::InvalidHex(e.to_string()))?;
        let arr: HashBytes = bytes
            .as_slice()
            .try_into()
            .map_err(|_| DigestParseError::WrongLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl Serialize for OutcomeDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for OutcomeDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_hasher_matches_one_shot() {
        let mut hasher = TextHasher::new();
        hasher.update_str("seed");
        hasher.separator();
        hasher.update_u64(42);
        assert_eq!(hasher.finalize(), hash_text("seed|42"));
    }

    #[test]
    fn test_known_sha256() {
        // sha256("abc")
        let hash = hash_text("abc");
        assert_eq!(
            hex::encode(hash),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        let (a, b) = leading_words(&hash);
        assert_eq!(a, 0xba7816bf);
        assert_eq!(b, 0x8f01cfea);
    }

    #[test]
    fn test_order_matters() {
        let mut h1 = TextHasher::new();
        h1.update_u64(1);
        h1.separator();
        h1.update_u64(2);

        let mut h2 = TextHasher::new();
        h2.update_u64(2);
        h2.separator();
        h2.update_u64(1);

        assert_ne!(h1.finalize(), h2.finalize());
    }

    #[test]
    fn test_digest_hex_roundtrip() {
        let digest = OutcomeDigest(hash_text("match"));
        let hex = digest.to_string();
        assert_eq!(hex.len(), 64);
        assert_eq!(hex.parse::<OutcomeDigest>().unwrap(), digest);
        assert_eq!(format!("0x{hex}").parse::<OutcomeDigest>().unwrap(), digest);

        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{hex}\""));
    }

    #[test]
    fn test_digest_parse_errors() {
        assert!(matches!("zz".parse::<OutcomeDigest>(), Err(DigestParseError::InvalidHex(_))));
        assert_eq!("abcd".parse::<OutcomeDigest>(), Err(DigestParseError::WrongLength(2)));
    }
}
