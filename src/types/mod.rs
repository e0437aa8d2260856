//! Core type definitions for ledger primitives.
//!
//! - `Hash`: Fixed-size 32-byte SHA3-256 hashes
//! - `Encode` / `Decode`: deterministic binary encoding for hashing and storage
//! - `MerkleTree`: ordered commitment over a block's transactions

pub mod encoding;
pub mod hash;
pub mod merkle_tree;
