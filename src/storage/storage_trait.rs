//! Ledger storage abstraction.
//!
//! Defines the [`Storage`] trait the chain persists through. The RocksDB
//! backend lives in [`rocksdb_storage`](super::rocksdb_storage); an in-memory
//! double for tests lives in [`test_storage`](super::test_storage).

use crate::core::block::Block;
use crate::core::transaction::TransactionKind;
use crate::storage::index::{IndexEntry, IndexKey};
use crate::types::encoding::DecodeError;
use crate::types::hash::Hash;
use ledger_derive::Error;
use std::collections::BTreeMap;

/// Errors that can occur while interacting with storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend rejected a read or write.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// A column family the ledger needs is missing from the database.
    #[error("missing column family `{0}`")]
    MissingColumnFamily(&'static str),
    /// Stored bytes could not be decoded.
    #[error("failed to decode stored {what}: {source}")]
    Decode {
        what: &'static str,
        source: DecodeError,
    },
    /// Stored data is structurally inconsistent (gaps, mismatched keys).
    #[error("storage is corrupt: {0}")]
    Corrupt(String),
}

/// Persistence backend for the ledger.
///
/// Implementations must be thread-safe (`Send + Sync`); the chain calls them
/// while holding its own locks, so none of these methods may call back into
/// the chain.
pub trait Storage: Send + Sync {
    /// Every stored block in index order. A gap in the indexes is corruption.
    fn load_blocks(&self) -> Result<Vec<Block>, StorageError>;

    /// Stores `block` under its index together with its index rows, in one
    /// atomic write. Storing the same index again replaces the previous
    /// block and its rows.
    fn put_block(&self, block: &Block) -> Result<(), StorageError>;

    fn get_block(&self, index: u64) -> Result<Option<Block>, StorageError>;

    /// Index entries whose `key` field equals `value` exactly, ordered by
    /// block index.
    fn scan_lookup(&self, key: IndexKey, value: &str) -> Result<Vec<IndexEntry>, StorageError>;

    /// Index entry of one transaction.
    fn get_entry(&self, transaction_id: &Hash) -> Result<Option<IndexEntry>, StorageError>;

    /// Number of indexed transactions per kind.
    fn kind_histogram(&self) -> Result<BTreeMap<TransactionKind, u64>, StorageError>;

    /// Makes completed writes durable.
    fn flush(&self) -> Result<(), StorageError>;
}
