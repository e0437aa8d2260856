//! 32-byte SHA3-256 digest used for transaction ids, merkle nodes and block hashes.

use crate::types::encoding::EncodeSink;
use ledger_derive::BinaryCodec;
use sha3::{Digest, Sha3_256};
use std::fmt;
use std::str::FromStr;

/// SHA3-256 digest length in bytes.
pub const HASH_LEN: usize = 32;

/// Fixed-size digest. `Copy` because hashes are compared and passed around
/// constantly during validation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, BinaryCodec)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// The all-zero hash. Doubles as the root marker of the genesis block.
    pub const fn zero() -> Hash {
        Hash([0u8; HASH_LEN])
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn sha3() -> HashBuilder {
        HashBuilder::new()
    }

    /// One-shot digest of `data`.
    pub fn digest(data: &[u8]) -> Hash {
        Hash::sha3().chain(data).finalize()
    }

    /// Number of leading `0` characters in the lowercase hex rendering.
    pub fn leading_zero_nibbles(&self) -> usize {
        let mut count = 0;
        for byte in self.0 {
            if byte == 0 {
                count += 2;
                continue;
            }
            if byte >> 4 == 0 {
                count += 1;
            }
            break;
        }
        count
    }

    /// True when the first `difficulty` hex characters are all `0`.
    pub fn meets_difficulty(&self, difficulty: u8) -> bool {
        self.leading_zero_nibbles() >= difficulty as usize
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

/// Error returned when parsing a hash from hex text.
#[derive(Debug, Clone, PartialEq, Eq, ledger_derive::Error)]
pub enum ParseHashError {
    #[error("expected {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("invalid hex character at position {0}")]
    InvalidCharacter(usize),
}

impl FromStr for Hash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != HASH_LEN * 2 {
            return Err(ParseHashError::InvalidLength {
                expected: HASH_LEN * 2,
                actual: s.len(),
            });
        }

        let mut out = [0u8; HASH_LEN];
        for (i, pair) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_value(pair[0]).ok_or(ParseHashError::InvalidCharacter(i * 2))?;
            let lo = hex_value(pair[1]).ok_or(ParseHashError::InvalidCharacter(i * 2 + 1))?;
            out[i] = (hi << 4) | lo;
        }
        Ok(Hash(out))
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Incremental SHA3-256 hasher.
///
/// Implements [`EncodeSink`] so encodable values hash without an intermediate
/// buffer, and `Clone` so a partially fed state can be reused (block mining
/// clones the state that precedes the nonce).
#[derive(Clone, Default)]
pub struct HashBuilder {
    hasher: Sha3_256,
}

impl HashBuilder {
    pub fn new() -> Self {
        Self {
            hasher: Sha3_256::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub fn chain(mut self, data: &[u8]) -> Self {
        self.update(data);
        self
    }

    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

impl EncodeSink for HashBuilder {
    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_lowercase_hex() {
        let mut raw = [0u8; HASH_LEN];
        raw[0] = 0xAB;
        raw[31] = 0x01;
        let text = Hash(raw).to_string();
        assert_eq!(text.len(), 64);
        assert!(text.starts_with("ab00"));
        assert!(text.ends_with("01"));
    }

    #[test]
    fn parse_roundtrips_display() {
        let hash = Hash::digest(b"survey 123/4");
        let parsed: Hash = hash.to_string().parse().unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(
            "abc".parse::<Hash>(),
            Err(ParseHashError::InvalidLength {
                expected: 64,
                actual: 3
            })
        );
        let bad = format!("{}zz", "0".repeat(62));
        assert_eq!(bad.parse::<Hash>(), Err(ParseHashError::InvalidCharacter(62)));
    }

    #[test]
    fn leading_zero_nibbles_counts_hex_characters() {
        let mut raw = [0xFFu8; HASH_LEN];
        assert_eq!(Hash(raw).leading_zero_nibbles(), 0);

        raw[0] = 0x0F;
        assert_eq!(Hash(raw).leading_zero_nibbles(), 1);

        raw[0] = 0x00;
        raw[1] = 0x0A;
        assert_eq!(Hash(raw).leading_zero_nibbles(), 3);

        assert_eq!(Hash::zero().leading_zero_nibbles(), 64);
    }

    #[test]
    fn meets_difficulty_matches_hex_prefix() {
        for data in [b"a".as_slice(), b"b", b"c", b"d"] {
            let hash = Hash::digest(data);
            let text = hash.to_string();
            for d in 0..4u8 {
                let expected = text.chars().take(d as usize).all(|c| c == '0');
                assert_eq!(hash.meets_difficulty(d), expected);
            }
        }
    }

    #[test]
    fn cloned_builder_continues_independently() {
        let base = Hash::sha3().chain(b"prefix");
        let a = base.clone().chain(b"a").finalize();
        let b = base.chain(b"b").finalize();
        assert_ne!(a, b);
        assert_eq!(a, Hash::digest(b"prefixa"));
    }

    #[test]
    fn digest_of_empty_input_is_sha3_empty() {
        assert_eq!(
            Hash::digest(b"").to_string(),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }
}
