//! Tamper-evident, append-only ledger for land-acquisition records.
//!
//! Award declarations, compensation payments, citizen queries and litigation
//! records are admitted into a pending pool, sealed into proof-of-work blocks,
//! persisted in RocksDB and indexed by survey number, village and tehsil.

pub mod config;
pub mod core;
pub mod storage;
pub mod types;
pub mod utils;
