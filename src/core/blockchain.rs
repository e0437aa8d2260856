//! The in-memory chain of sealed blocks, backed by a [`Storage`].

use crate::core::block::{Block, ROOT_MARKER};
use crate::core::payload::{Payload, SystemInit};
use crate::core::transaction::{Transaction, TransactionKind};
use crate::storage::index::IndexKey;
use crate::storage::storage_trait::{Storage, StorageError};
use crate::types::hash::Hash;
use crate::utils::clock;
use crate::{debug, error, info};
use ledger_derive::Error;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

/// First inconsistency found while validating the chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("block at position {position} carries index {index}")]
    OutOfSequence { position: u64, index: u64 },
    #[error("block {index}: stored hash {stored} does not match recomputed {computed}")]
    HashMismatch {
        index: u64,
        stored: Hash,
        computed: Hash,
    },
    #[error("block {index}: merkle root does not commit to its transactions")]
    MerkleMismatch { index: u64 },
    #[error("genesis block does not start from the root marker (found {found})")]
    BadRootMarker { found: Hash },
    #[error("block {index}: previous hash {found} does not match block {parent} hash {expected}")]
    BrokenLinkage {
        index: u64,
        parent: u64,
        expected: Hash,
        found: Hash,
    },
}

/// Checks position, hash, merkle root and linkage of every block, genesis
/// included. Performs no repair.
pub fn validate_blocks(blocks: &[Arc<Block>]) -> Result<(), ValidationFailure> {
    for (position, block) in blocks.iter().enumerate() {
        let position = position as u64;
        if block.index() != position {
            return Err(ValidationFailure::OutOfSequence {
                position,
                index: block.index(),
            });
        }

        let computed = block.compute_hash();
        if computed != block.hash {
            return Err(ValidationFailure::HashMismatch {
                index: position,
                stored: block.hash,
                computed,
            });
        }
        if !block.verify_merkle_root() {
            return Err(ValidationFailure::MerkleMismatch { index: position });
        }

        let found = block.header.previous_hash;
        if position == 0 {
            if found != ROOT_MARKER {
                return Err(ValidationFailure::BadRootMarker { found });
            }
        } else {
            let parent = &blocks[position as usize - 1];
            if found != parent.hash {
                return Err(ValidationFailure::BrokenLinkage {
                    index: position,
                    parent: position - 1,
                    expected: parent.hash,
                    found,
                });
            }
        }
    }
    Ok(())
}

/// Errors raised while opening a chain.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("{0}")]
    Storage(StorageError),
    #[error("stored chain failed verification: {0}")]
    Validation(ValidationFailure),
}

/// Append-only chain of sealed blocks.
///
/// Blocks are kept in memory behind an `RwLock` for readers; `append` is
/// serialised and only publishes a block after storage accepted it.
pub struct Blockchain<S: Storage> {
    storage: S,
    difficulty: u8,
    blocks: RwLock<Vec<Arc<Block>>>,
    append_lock: Mutex<()>,
}

impl<S: Storage> Blockchain<S> {
    /// Loads the stored chain, or creates and persists the genesis block when
    /// storage is empty.
    ///
    /// Stored blocks are trusted unless `verify_on_load` is set, in which case
    /// every block is validated before the chain is returned.
    pub fn open(storage: S, difficulty: u8, verify_on_load: bool) -> Result<Self, OpenError> {
        let loaded: Vec<Arc<Block>> = storage
            .load_blocks()
            .map_err(OpenError::Storage)?
            .into_iter()
            .map(Arc::new)
            .collect();

        if verify_on_load {
            validate_blocks(&loaded).map_err(|failure| {
                error!("Stored chain failed verification: {failure}");
                OpenError::Validation(failure)
            })?;
        }

        let chain = Self {
            storage,
            difficulty,
            blocks: RwLock::new(loaded),
            append_lock: Mutex::new(()),
        };

        if chain.is_empty() {
            chain.create_genesis().map_err(OpenError::Storage)?;
        } else {
            info!(
                "Loaded ledger: {} blocks, tip={}",
                chain.len(),
                chain.tip().map(|b| b.hash).unwrap_or(ROOT_MARKER)
            );
        }
        Ok(chain)
    }

    fn read_blocks(&self) -> RwLockReadGuard<'_, Vec<Arc<Block>>> {
        self.blocks.read().unwrap_or_else(|e| e.into_inner())
    }

    fn create_genesis(&self) -> Result<(), StorageError> {
        let init = Transaction::builder(Payload::SystemInit(SystemInit::default()))
            .build()
            .map_err(|e| StorageError::Corrupt(format!("genesis record: {e}")))?;
        let block = self.append(vec![init])?;
        info!("Created genesis block hash={}", block.hash);
        Ok(())
    }

    /// Mines a block over `transactions` on top of the current tip, persists
    /// it and appends it.
    ///
    /// If storage rejects the block the chain is left unchanged.
    pub fn append(&self, transactions: Vec<Transaction>) -> Result<Arc<Block>, StorageError> {
        let _guard = self.append_lock.lock().unwrap_or_else(|e| e.into_inner());

        let (index, previous_hash) = {
            let blocks = self.read_blocks();
            (
                blocks.len() as u64,
                blocks.last().map(|b| b.hash).unwrap_or(ROOT_MARKER),
            )
        };

        let mut block = Block::new(index, clock::now_nanos(), transactions, previous_hash);
        let attempts = block.mine(self.difficulty);
        debug!("Mined block {index} after {attempts} attempts");

        if let Err(e) = self.storage.put_block(&block) {
            error!("Failed to persist block {index}: {e}");
            return Err(e);
        }

        let block = Arc::new(block);
        self.blocks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(block.clone());

        info!(
            "Sealed block index={} hash={} nonce={} transactions={}",
            block.index(),
            block.hash,
            block.header.nonce,
            block.transactions.len()
        );
        Ok(block)
    }

    pub fn difficulty(&self) -> u8 {
        self.difficulty
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.read_blocks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the tip block (genesis = 0).
    pub fn height(&self) -> u64 {
        self.len().saturating_sub(1) as u64
    }

    pub fn tip(&self) -> Option<Arc<Block>> {
        self.read_blocks().last().cloned()
    }

    pub fn block(&self, index: u64) -> Option<Arc<Block>> {
        self.read_blocks().get(index as usize).cloned()
    }

    /// Point-in-time copy of the chain.
    pub fn blocks(&self) -> Vec<Arc<Block>> {
        self.read_blocks().clone()
    }

    pub fn transaction_count(&self) -> u64 {
        self.read_blocks()
            .iter()
            .map(|b| b.transactions.len() as u64)
            .sum()
    }

    pub fn validate(&self) -> Result<(), ValidationFailure> {
        let result = validate_blocks(&self.read_blocks());
        if let Err(failure) = &result {
            error!("Chain validation failed: {failure}");
        }
        result
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Transactions whose `key` field equals `value`, ordered by block
    /// timestamp and then by position in the block.
    ///
    /// Index rows only select candidate blocks; each transaction is matched
    /// again against the stored block. Blocks persisted but not yet published
    /// by `append` are skipped.
    pub fn lookup(&self, key: IndexKey, value: &str) -> Result<Vec<Transaction>, StorageError> {
        let published = self.len() as u64;
        let candidates: BTreeSet<u64> = self
            .storage
            .scan_lookup(key, value)?
            .into_iter()
            .map(|entry| entry.block_index)
            .filter(|index| *index < published)
            .collect();

        let mut found = Vec::new();
        for index in candidates {
            let Some(block) = self.storage.get_block(index)? else {
                continue;
            };
            for (position, tx) in block.transactions.iter().enumerate() {
                if key.matches(tx, value) {
                    found.push((block.header.timestamp, index, position, tx.clone()));
                }
            }
        }

        found.sort_by_key(|(timestamp, index, position, _)| (*timestamp, *index, *position));
        Ok(found.into_iter().map(|(_, _, _, tx)| tx).collect())
    }

    /// A sealed transaction and the index of its block.
    pub fn transaction(&self, id: &Hash) -> Result<Option<(u64, Transaction)>, StorageError> {
        let published = self.len() as u64;
        let Some(entry) = self.storage.get_entry(id)? else {
            return Ok(None);
        };
        if entry.block_index >= published {
            return Ok(None);
        }
        let Some(block) = self.storage.get_block(entry.block_index)? else {
            return Ok(None);
        };
        Ok(block
            .transactions
            .iter()
            .find(|tx| tx.id == *id)
            .map(|tx| (entry.block_index, tx.clone())))
    }

    pub fn kind_histogram(&self) -> Result<BTreeMap<TransactionKind, u64>, StorageError> {
        self.storage.kind_histogram()
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.storage.flush()
    }

    #[cfg(test)]
    pub(crate) fn storage(&self) -> &S {
        &self.storage
    }

    /// Replaces the in-memory copy of a block, for tamper tests.
    #[cfg(test)]
    pub(crate) fn replace_block(&self, block: Block) {
        let mut blocks = self.blocks.write().unwrap_or_else(|e| e.into_inner());
        let index = block.index() as usize;
        blocks[index] = Arc::new(block);
    }
}
