//! Ledger storage subsystem.
//!
//! - [`storage_trait`]: Core [`Storage`](storage_trait::Storage) trait for block persistence
//! - [`index`]: Transaction index entries and lookup key layout
//! - [`rocksdb_storage`]: Production RocksDB-backed implementation
//! - [`test_storage`]: In-memory implementation for testing
//! - [`pending_pool`]: Pool of admitted transactions awaiting a block

pub mod index;
pub mod pending_pool;
pub mod rocksdb_storage;
pub mod storage_trait;
pub mod test_storage;
