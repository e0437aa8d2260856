#[cfg(test)]
pub mod test {
    use crate::core::block::Block;
    use crate::core::transaction::TransactionKind;
    use crate::storage::index::{IndexEntry, IndexKey, entries_for_block};
    use crate::storage::storage_trait::{Storage, StorageError};
    use crate::types::hash::Hash;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tables {
        blocks: BTreeMap<u64, Block>,
        tx_index: BTreeMap<Hash, IndexEntry>,
        lookup: BTreeMap<Vec<u8>, IndexEntry>,
    }

    /// In-memory storage for unit tests.
    ///
    /// Mirrors the RocksDB key layout with ordered maps. Writes can be made to
    /// fail on demand to exercise the chain's error paths.
    #[derive(Default)]
    pub struct TestStorage {
        tables: Mutex<Tables>,
        fail_writes: AtomicBool,
        writes: AtomicUsize,
    }

    impl TestStorage {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every following `put_block` fail until reset.
        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        /// Number of successful `put_block` calls.
        pub fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        /// Replaces a stored block without touching its index rows, the way an
        /// out-of-band edit of the database would.
        pub fn overwrite_raw(&self, block: Block) {
            self.lock().blocks.insert(block.index(), block);
        }

        pub fn remove_raw(&self, index: u64) {
            self.lock().blocks.remove(&index);
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
            self.tables.lock().unwrap_or_else(|e| e.into_inner())
        }
    }

    impl Storage for TestStorage {
        fn load_blocks(&self) -> Result<Vec<Block>, StorageError> {
            let tables = self.lock();
            let mut out = Vec::with_capacity(tables.blocks.len());
            for (expected, (index, block)) in tables.blocks.iter().enumerate() {
                if *index != expected as u64 {
                    return Err(StorageError::Corrupt(format!(
                        "expected block {expected}, found {index}"
                    )));
                }
                out.push(block.clone());
            }
            Ok(out)
        }

        fn put_block(&self, block: &Block) -> Result<(), StorageError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Backend("injected write failure".into()));
            }

            let mut tables = self.lock();
            if let Some(old) = tables.blocks.remove(&block.index()) {
                for entry in entries_for_block(&old) {
                    for key in entry.lookup_keys() {
                        tables.lookup.remove(&key);
                    }
                    tables.tx_index.remove(&entry.transaction_id);
                }
            }

            for entry in entries_for_block(block) {
                for key in entry.lookup_keys() {
                    tables.lookup.insert(key, entry.clone());
                }
                tables.tx_index.insert(entry.transaction_id, entry);
            }
            tables.blocks.insert(block.index(), block.clone());
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn get_block(&self, index: u64) -> Result<Option<Block>, StorageError> {
            Ok(self.lock().blocks.get(&index).cloned())
        }

        fn scan_lookup(
            &self,
            key: IndexKey,
            value: &str,
        ) -> Result<Vec<IndexEntry>, StorageError> {
            let prefix = key.prefix(value);
            Ok(self
                .lock()
                .lookup
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .map(|(_, entry)| entry.clone())
                .collect())
        }

        fn get_entry(&self, transaction_id: &Hash) -> Result<Option<IndexEntry>, StorageError> {
            Ok(self.lock().tx_index.get(transaction_id).cloned())
        }

        fn kind_histogram(&self) -> Result<BTreeMap<TransactionKind, u64>, StorageError> {
            let mut counts = BTreeMap::new();
            for entry in self.lock().tx_index.values() {
                *counts.entry(entry.kind).or_insert(0) += 1;
            }
            Ok(counts)
        }

        fn flush(&self) -> Result<(), StorageError> {
            Ok(())
        }
    }
}
