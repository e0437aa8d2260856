//! The ledger facade: admission, sealing, validation, lookup and stats.
//!
//! A [`Ledger`] is constructed explicitly and handed to whatever needs it
//! (record management, the CLI). Submissions only enter the pending pool;
//! nothing is sealed until [`Ledger::seal_pending`] is called.

use crate::config::{ConfigError, LedgerConfig};
use crate::core::block::Block;
use crate::core::blockchain::{Blockchain, OpenError, ValidationFailure};
use crate::core::payload::{EncodingError, Payload};
use crate::core::transaction::{Transaction, TransactionBuilder, TransactionKind};
use crate::storage::index::IndexKey;
use crate::storage::pending_pool::{PendingPool, PoolError};
use crate::storage::rocksdb_storage::RocksDbStorage;
use crate::storage::storage_trait::{Storage, StorageError};
use crate::types::hash::Hash;
use crate::{debug, info, warn};
use ledger_derive::Error;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Umbrella error for ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid configuration: {0}")]
    Config(ConfigError),
    #[error("rejected transaction: {0}")]
    Encoding(EncodingError),
    #[error("{0}")]
    Pool(PoolError),
    #[error("{0}")]
    Storage(StorageError),
    #[error("chain validation failed: {0}")]
    Validation(ValidationFailure),
    #[error("background seal task failed: {0}")]
    Task(String),
}

impl From<ConfigError> for LedgerError {
    fn from(e: ConfigError) -> Self {
        LedgerError::Config(e)
    }
}

impl From<EncodingError> for LedgerError {
    fn from(e: EncodingError) -> Self {
        LedgerError::Encoding(e)
    }
}

impl From<PoolError> for LedgerError {
    fn from(e: PoolError) -> Self {
        LedgerError::Pool(e)
    }
}

impl From<StorageError> for LedgerError {
    fn from(e: StorageError) -> Self {
        LedgerError::Storage(e)
    }
}

impl From<ValidationFailure> for LedgerError {
    fn from(e: ValidationFailure) -> Self {
        LedgerError::Validation(e)
    }
}

impl From<OpenError> for LedgerError {
    fn from(e: OpenError) -> Self {
        match e {
            OpenError::Storage(e) => LedgerError::Storage(e),
            OpenError::Validation(e) => LedgerError::Validation(e),
        }
    }
}

/// Result of [`Ledger::seal_pending`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SealOutcome {
    Sealed(Arc<Block>),
    /// The pool was empty; no block was created.
    NoPending,
}

impl SealOutcome {
    pub fn block(&self) -> Option<&Arc<Block>> {
        match self {
            SealOutcome::Sealed(block) => Some(block),
            SealOutcome::NoPending => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStats {
    pub total_blocks: u64,
    pub total_transactions: u64,
    pub pending_transactions: u64,
    pub transaction_types: BTreeMap<TransactionKind, u64>,
    pub is_valid: bool,
}

impl fmt::Display for LedgerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "total_blocks:         {}", self.total_blocks)?;
        writeln!(f, "total_transactions:   {}", self.total_transactions)?;
        writeln!(f, "pending_transactions: {}", self.pending_transactions)?;
        writeln!(f, "is_valid:             {}", self.is_valid)?;
        write!(f, "transaction_types:")?;
        for (kind, count) in &self.transaction_types {
            write!(f, "\n  {kind:<22}{count}")?;
        }
        Ok(())
    }
}

/// Tamper-evident ledger of land-acquisition records.
pub struct Ledger<S: Storage = RocksDbStorage> {
    config: LedgerConfig,
    chain: Blockchain<S>,
    pool: PendingPool,
    /// Serialises snapshot, append and pool removal of a seal.
    seal_lock: Mutex<()>,
}

impl Ledger<RocksDbStorage> {
    /// Opens the RocksDB ledger at `config.data_dir`, creating the genesis
    /// block on first use.
    pub fn open(config: &LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        let storage = RocksDbStorage::open(&config.data_dir)?;
        Self::with_storage(storage, config.clone())
    }
}

impl<S: Storage> Ledger<S> {
    pub fn with_storage(storage: S, config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        let chain = Blockchain::open(storage, config.difficulty, config.verify_on_load)?;
        let pool = PendingPool::new(config.pool_capacity);
        Ok(Self {
            config,
            chain,
            pool,
            seal_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Admits a record to the pending pool and returns its transaction id.
    /// Never seals.
    pub fn submit(&self, payload: impl Into<Payload>) -> Result<Hash, LedgerError> {
        let payload = payload.into();
        if payload.kind() == TransactionKind::SystemInit {
            return Err(EncodingError::ReservedKind(TransactionKind::SystemInit).into());
        }
        self.admit(TransactionBuilder::new(payload).build()?)
    }

    /// Like [`submit`](Self::submit), from loosely typed `name -> value` fields.
    pub fn submit_fields(
        &self,
        kind: TransactionKind,
        fields: &BTreeMap<String, String>,
    ) -> Result<Hash, LedgerError> {
        self.admit(TransactionBuilder::from_fields(kind, fields)?.build()?)
    }

    fn admit(&self, tx: Transaction) -> Result<Hash, LedgerError> {
        let id = tx.id;
        let kind = tx.kind();
        self.pool.append(tx)?;
        debug!("Admitted {kind} transaction {id}");
        Ok(id)
    }

    /// Seals every pending transaction into one new block.
    ///
    /// Returns [`SealOutcome::NoPending`] without touching the chain when the
    /// pool is empty. On a storage error neither the chain nor the pool change.
    pub fn seal_pending(&self) -> Result<SealOutcome, LedgerError> {
        let _guard = self.seal_lock.lock().unwrap_or_else(|e| e.into_inner());

        let pending = self.pool.snapshot();
        if pending.is_empty() {
            return Ok(SealOutcome::NoPending);
        }

        let ids: Vec<Hash> = pending.iter().map(|tx| tx.id).collect();
        let block = self.chain.append(pending)?;
        self.pool.remove_batch(&ids);
        Ok(SealOutcome::Sealed(block))
    }

    pub fn validate_chain(&self) -> bool {
        self.chain.is_valid()
    }

    /// First validation failure, if any.
    pub fn validation_report(&self) -> Result<(), ValidationFailure> {
        self.chain.validate()
    }

    pub fn lookup(&self, key: IndexKey, value: &str) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.chain.lookup(key, value)?)
    }

    pub fn by_survey_number(&self, survey_number: &str) -> Result<Vec<Transaction>, LedgerError> {
        self.lookup(IndexKey::SurveyNumber, survey_number)
    }

    pub fn by_village(&self, village: &str) -> Result<Vec<Transaction>, LedgerError> {
        self.lookup(IndexKey::Village, village)
    }

    pub fn by_tehsil(&self, tehsil: &str) -> Result<Vec<Transaction>, LedgerError> {
        self.lookup(IndexKey::Tehsil, tehsil)
    }

    /// A sealed transaction and its block index.
    pub fn transaction(&self, id: &Hash) -> Result<Option<(u64, Transaction)>, LedgerError> {
        Ok(self.chain.transaction(id)?)
    }

    pub fn stats(&self) -> Result<LedgerStats, LedgerError> {
        Ok(LedgerStats {
            total_blocks: self.chain.len() as u64,
            total_transactions: self.chain.transaction_count(),
            pending_transactions: self.pool.len() as u64,
            transaction_types: self.chain.kind_histogram()?,
            is_valid: self.chain.is_valid(),
        })
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pool.len()
    }

    pub fn tip(&self) -> Option<Arc<Block>> {
        self.chain.tip()
    }

    pub fn blocks(&self) -> Vec<Arc<Block>> {
        self.chain.blocks()
    }

    /// Discards unsealed transactions and flushes storage.
    pub fn shutdown(self) -> Result<(), LedgerError> {
        let discarded = self.pool.clear();
        if discarded > 0 {
            warn!("Shutting down with {discarded} pending transactions discarded");
        }
        self.chain.flush()?;
        info!("Ledger closed at height {}", self.chain.height());
        Ok(())
    }
}

impl<S: Storage + 'static> Ledger<S> {
    /// [`seal_pending`](Self::seal_pending) on a blocking worker thread, so the
    /// async caller is not stalled while the block is mined.
    pub async fn seal_pending_async(self: Arc<Self>) -> Result<SealOutcome, LedgerError> {
        tokio::task::spawn_blocking(move || self.seal_pending())
            .await
            .map_err(|e| LedgerError::Task(e.to_string()))?
    }
}
