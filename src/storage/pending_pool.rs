//! Pool of admitted transactions waiting to be sealed into a block.
//!
//! Transactions are kept in admission order; sealing takes a snapshot of the
//! pool and removes exactly that snapshot once the block is persisted, so
//! transactions admitted while a block is being mined stay for the next one.

use crate::core::transaction::Transaction;
use crate::types::hash::Hash;
use dashmap::DashMap;
use ledger_derive::Error;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// Default pending pool capacity.
pub const POOL_CAPACITY: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("pending pool is full ({capacity} transactions)")]
    Full { capacity: usize },
    #[error("transaction {0} is already pending")]
    Duplicate(Hash),
}

/// Thread-safe pool of pending transactions.
pub struct PendingPool {
    capacity: usize,
    /// Transactions by id for O(1) duplicate detection and removal.
    transactions: DashMap<Hash, Transaction>,
    /// Admission order. Also serialises appends so the capacity check holds.
    order: Mutex<Vec<Hash>>,
}

impl PendingPool {
    /// Creates a pool holding at most `capacity` transactions (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            transactions: DashMap::new(),
            order: Mutex::new(Vec::new()),
        }
    }

    fn lock_order(&self) -> MutexGuard<'_, Vec<Hash>> {
        self.order.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(&self, transaction: Transaction) -> Result<(), PoolError> {
        let mut order = self.lock_order();
        if self.transactions.contains_key(&transaction.id) {
            return Err(PoolError::Duplicate(transaction.id));
        }
        if order.len() >= self.capacity {
            return Err(PoolError::Full {
                capacity: self.capacity,
            });
        }

        order.push(transaction.id);
        self.transactions.insert(transaction.id, transaction);
        Ok(())
    }

    pub fn contains(&self, id: &Hash) -> bool {
        self.transactions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock_order().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pending transactions in admission order.
    pub fn snapshot(&self) -> Vec<Transaction> {
        let order = self.lock_order();
        order
            .iter()
            .filter_map(|id| self.transactions.get(id).map(|tx| tx.value().clone()))
            .collect()
    }

    /// Removes the given transactions; ids not in the pool are ignored.
    pub fn remove_batch(&self, ids: &[Hash]) {
        if ids.is_empty() {
            return;
        }
        let remove: HashSet<&Hash> = ids.iter().collect();
        let mut order = self.lock_order();
        for id in &remove {
            self.transactions.remove(*id);
        }
        order.retain(|id| !remove.contains(id));
    }

    /// Drops every pending transaction and returns how many there were.
    pub fn clear(&self) -> usize {
        let mut order = self.lock_order();
        let count = order.len();
        order.clear();
        self.transactions.clear();
        count
    }
}
