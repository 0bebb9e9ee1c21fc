use std::fmt;

use rand::{
    Rng, SeedableRng as _,
    distr::{Distribution, StandardUniform},
};
use rand_pcg::Pcg32;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::PieceKind;

/// Uniform random piece source with a one-piece preview.
///
/// Every draw picks each of the 7 kinds with equal probability, independent of
/// earlier draws. The upcoming piece is always known, which lets a learner
/// bootstrap from the real next state instead of an average.
///
/// # Example
///
/// ```
/// use tdtris_engine::PieceGenerator;
///
/// let mut generator = PieceGenerator::new();
/// let upcoming = generator.peek_next();
/// assert_eq!(generator.pop_next(), upcoming);
/// ```
#[derive(Debug, Clone)]
pub struct PieceGenerator {
    rng: Pcg32,
    next: PieceKind,
}

impl Default for PieceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Seed for deterministic piece generation.
///
/// A 128-bit seed for the generator's RNG; the same seed yields the same piece
/// sequence. Serialized as a 32 character hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceSeed([u8; 16]);

impl From<u128> for PieceSeed {
    fn from(value: u128) -> Self {
        Self(value.to_be_bytes())
    }
}

impl fmt::Display for PieceSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", u128::from_be_bytes(self.0))
    }
}

impl Serialize for PieceSeed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PieceSeed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        if hex_str.len() != 32 {
            return Err(serde::de::Error::custom(format!(
                "invalid hex: expected 32 characters, got {}",
                hex_str.len()
            )));
        }
        let num = u128::from_str_radix(&hex_str, 16)
            .map_err(|e| serde::de::Error::custom(format!("invalid hex: {hex_str} ({e})")))?;
        Ok(Self::from(num))
    }
}

impl Distribution<PieceSeed> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> PieceSeed {
        let mut seed = [0; 16];
        rng.fill(&mut seed);
        PieceSeed(seed)
    }
}

impl PieceGenerator {
    /// Creates a generator with a random seed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(rand::rng().random())
    }

    #[must_use]
    pub fn with_seed(seed: PieceSeed) -> Self {
        let mut rng = Pcg32::from_seed(seed.0);
        let next = rng.random();
        Self { rng, next }
    }

    /// Draws the next piece and rolls a new preview.
    pub fn pop_next(&mut self) -> PieceKind {
        let next = self.rng.random();
        std::mem::replace(&mut self.next, next)
    }

    /// The piece the next [`Self::pop_next`] returns.
    #[must_use]
    pub fn peek_next(&self) -> PieceKind {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod piece_seed_serialization {
        use super::*;

        #[test]
        fn test_roundtrip_random_seed() {
            let seed: PieceSeed = rand::rng().random();
            let serialized = serde_json::to_string(&seed).unwrap();
            let deserialized: PieceSeed = serde_json::from_str(&serialized).unwrap();
            assert_eq!(seed, deserialized);
        }

        #[test]
        fn test_known_value_sequential_bytes() {
            // Big-endian: bytes appear in order as hex pairs
            let seed = PieceSeed([
                0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0xFE, 0xDC, 0xBA, 0x98, 0x76, 0x54,
                0x32, 0x10,
            ]);
            let serialized = serde_json::to_string(&seed).unwrap();
            assert_eq!(serialized, "\"0123456789abcdeffedcba9876543210\"");
            assert_eq!(seed, PieceSeed::from(0x0123_4567_89ab_cdef_fedc_ba98_7654_3210));
        }

        #[test]
        fn test_deserialize_uppercase_hex() {
            let json = "\"0123456789ABCDEFFEDCBA9876543210\"";
            let deserialized: PieceSeed = serde_json::from_str(json).unwrap();
            assert_eq!(
                deserialized,
                PieceSeed::from(0x0123_4567_89ab_cdef_fedc_ba98_7654_3210)
            );
        }

        #[test]
        fn test_error_invalid_hex() {
            for json in [
                "\"ghijklmnopqrstuvwxyzghijklmnopqr\"",
                "\"0123456789abcdef0123456789abcde\"",
                "\"0123456789abcdef0123456789abcdef0\"",
                "\"\"",
            ] {
                let err = serde_json::from_str::<PieceSeed>(json).unwrap_err();
                assert!(err.to_string().contains("invalid hex"), "{json}: {err}");
            }
        }
    }

    #[test]
    fn test_deterministic_piece_generation() {
        let seed = PieceSeed::from(0x1234_5678_9abc_def0_1122_3344_5566_7788);
        let mut generator1 = PieceGenerator::with_seed(seed);
        let mut generator2 = PieceGenerator::with_seed(seed);
        for _ in 0..50 {
            assert_eq!(generator1.peek_next(), generator2.peek_next());
            assert_eq!(generator1.pop_next(), generator2.pop_next());
        }
    }

    #[test]
    fn test_peek_matches_pop() {
        let mut generator = PieceGenerator::with_seed(PieceSeed::from(7));
        for _ in 0..50 {
            let peeked = generator.peek_next();
            assert_eq!(generator.pop_next(), peeked);
        }
    }

    #[test]
    fn test_all_kinds_appear() {
        let mut generator = PieceGenerator::with_seed(PieceSeed::from(42));
        let mut seen = [false; PieceKind::LEN];
        for _ in 0..1000 {
            seen[generator.pop_next().index()] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }
}
