//! RocksDB-backed ledger storage.
//!
//! Three column families:
//!
//! - [`CF_BLOCKS`]: big-endian block index -> encoded [`Block`]
//! - [`CF_TX_INDEX`]: transaction id -> encoded [`IndexEntry`]
//! - [`CF_LOOKUP`]: lookup row key (see [`index`](crate::storage::index)) -> encoded [`IndexEntry`]
//!
//! Big-endian block keys make RocksDB's byte order the chain order, so a full
//! forward scan of [`CF_BLOCKS`] replays the ledger.

use crate::core::block::Block;
use crate::core::transaction::TransactionKind;
use crate::storage::index::{IndexEntry, IndexKey, entries_for_block};
use crate::storage::storage_trait::{Storage, StorageError};
use crate::types::encoding::{Decode, Encode};
use crate::types::hash::Hash;
use crate::{debug, info};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// Column family name for blocks indexed by position.
pub const CF_BLOCKS: &str = "blocks";
/// Column family name for index entries keyed by transaction id.
pub const CF_TX_INDEX: &str = "tx_index";
/// Column family name for survey number / village / tehsil lookup rows.
pub const CF_LOOKUP: &str = "lookup";

const COLUMN_FAMILIES: [&str; 3] = [CF_BLOCKS, CF_TX_INDEX, CF_LOOKUP];

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::Backend(e.into_string())
    }
}

fn block_key(index: u64) -> [u8; 8] {
    index.to_be_bytes()
}

fn decode<T: Decode>(what: &'static str, bytes: &[u8]) -> Result<T, StorageError> {
    T::from_bytes(bytes).map_err(|source| StorageError::Decode { what, source })
}

/// RocksDB-backed storage for ledger blocks and their index.
pub struct RocksDbStorage {
    db: DB,
    /// Serialises `put_block`, which reads the block it replaces before
    /// writing the batch.
    write_lock: Mutex<()>,
}

impl RocksDbStorage {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;
        info!("Opened ledger storage at {}", path.display());

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or(StorageError::MissingColumnFamily(name))
    }

    fn read_block(&self, index: u64) -> Result<Option<Block>, StorageError> {
        self.db
            .get_cf(self.cf(CF_BLOCKS)?, block_key(index))?
            .map(|bytes| decode("block", &bytes))
            .transpose()
    }
}

impl Storage for RocksDbStorage {
    fn load_blocks(&self) -> Result<Vec<Block>, StorageError> {
        let mut blocks = Vec::new();
        for item in self.db.iterator_cf(self.cf(CF_BLOCKS)?, IteratorMode::Start) {
            let (key, value) = item?;
            let expected = blocks.len() as u64;
            let index = <[u8; 8]>::try_from(key.as_ref())
                .map(u64::from_be_bytes)
                .map_err(|_| StorageError::Corrupt(format!("block key of {} bytes", key.len())))?;
            if index != expected {
                return Err(StorageError::Corrupt(format!(
                    "expected block {expected}, found {index}"
                )));
            }

            let block: Block = decode("block", &value)?;
            if block.index() != index {
                return Err(StorageError::Corrupt(format!(
                    "block stored under key {index} has index {}",
                    block.index()
                )));
            }
            blocks.push(block);
        }
        debug!("Loaded {} blocks from storage", blocks.len());
        Ok(blocks)
    }

    fn put_block(&self, block: &Block) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let cf_blocks = self.cf(CF_BLOCKS)?;
        let cf_tx_index = self.cf(CF_TX_INDEX)?;
        let cf_lookup = self.cf(CF_LOOKUP)?;

        let mut batch = WriteBatch::default();
        if let Some(old) = self.read_block(block.index())? {
            for entry in entries_for_block(&old) {
                for key in entry.lookup_keys() {
                    batch.delete_cf(cf_lookup, key);
                }
                batch.delete_cf(cf_tx_index, entry.transaction_id.as_slice());
            }
        }

        for entry in entries_for_block(block) {
            let value = entry.to_bytes();
            for key in entry.lookup_keys() {
                batch.put_cf(cf_lookup, key, &value);
            }
            batch.put_cf(cf_tx_index, entry.transaction_id.as_slice(), &value);
        }
        batch.put_cf(cf_blocks, block_key(block.index()), block.to_bytes());

        self.db.write(batch)?;
        Ok(())
    }

    fn get_block(&self, index: u64) -> Result<Option<Block>, StorageError> {
        self.read_block(index)
    }

    fn scan_lookup(&self, key: IndexKey, value: &str) -> Result<Vec<IndexEntry>, StorageError> {
        let prefix = key.prefix(value);
        let iter = self.db.iterator_cf(
            self.cf(CF_LOOKUP)?,
            IteratorMode::From(prefix.as_slice(), Direction::Forward),
        );

        let mut entries = Vec::new();
        for item in iter {
            let (row, bytes) = item?;
            if !row.starts_with(&prefix) {
                break;
            }
            entries.push(decode("index entry", &bytes)?);
        }
        Ok(entries)
    }

    fn get_entry(&self, transaction_id: &Hash) -> Result<Option<IndexEntry>, StorageError> {
        self.db
            .get_cf(self.cf(CF_TX_INDEX)?, transaction_id.as_slice())?
            .map(|bytes| decode("index entry", &bytes))
            .transpose()
    }

    fn kind_histogram(&self) -> Result<BTreeMap<TransactionKind, u64>, StorageError> {
        let mut counts = BTreeMap::new();
        for item in self.db.iterator_cf(self.cf(CF_TX_INDEX)?, IteratorMode::Start) {
            let (_, bytes) = item?;
            let entry: IndexEntry = decode("index entry", &bytes)?;
            *counts.entry(entry.kind).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn flush(&self) -> Result<(), StorageError> {
        for name in COLUMN_FAMILIES {
            self.db.flush_cf(self.cf(name)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::ROOT_MARKER;
    use crate::core::payload::Payload;
    use crate::utils::test_utils::utils::{award, citizen_query, payment, tx_at};

    fn chain_of(n: u64) -> Vec<Block> {
        let mut blocks: Vec<Block> = Vec::new();
        for i in 0..n {
            let previous = blocks.last().map(|b| b.hash).unwrap_or(ROOT_MARKER);
            let survey = format!("{}/1", i + 1);
            let mut block = Block::new(i, 100 + i, vec![tx_at(award(&survey), i)], previous);
            block.mine(1);
            blocks.push(block);
        }
        blocks
    }

    #[test]
    fn blocks_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let blocks = chain_of(3);
        {
            let storage = RocksDbStorage::open(dir.path()).unwrap();
            for block in &blocks {
                storage.put_block(block).unwrap();
            }
            storage.flush().unwrap();
        }

        let storage = RocksDbStorage::open(dir.path()).unwrap();
        let loaded = storage.load_blocks().unwrap();
        assert_eq!(loaded, blocks);
        assert!(loaded.iter().all(Block::verify_hash));
    }

    #[test]
    fn empty_database_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = RocksDbStorage::open(dir.path()).unwrap();
        assert!(storage.load_blocks().unwrap().is_empty());
        assert_eq!(storage.get_block(0).unwrap(), None);
    }

    #[test]
    fn gap_in_block_keys_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let storage = RocksDbStorage::open(dir.path()).unwrap();
        let blocks = chain_of(3);
        storage.put_block(&blocks[0]).unwrap();
        storage.put_block(&blocks[2]).unwrap();
        assert!(matches!(
            storage.load_blocks(),
            Err(StorageError::Corrupt(_))
        ));
    }

    #[test]
    fn lookup_is_exact_on_survey_number() {
        let dir = tempfile::tempdir().unwrap();
        let storage = RocksDbStorage::open(dir.path()).unwrap();
        let block = Block::new(
            0,
            1,
            vec![
                tx_at(award("123/4"), 1),
                tx_at(award("123/45"), 2),
                tx_at(payment("123/4"), 3),
            ],
            ROOT_MARKER,
        );
        storage.put_block(&block).unwrap();

        let hits = storage.scan_lookup(IndexKey::SurveyNumber, "123/4").unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|e| e.survey_numbers.contains(&"123/4".to_string())));

        let hits = storage.scan_lookup(IndexKey::SurveyNumber, "123/45").unwrap();
        assert_eq!(hits.len(), 1);

        assert!(storage.scan_lookup(IndexKey::SurveyNumber, "123").unwrap().is_empty());
    }

    #[test]
    fn lookup_by_village_and_tehsil() {
        let dir = tempfile::tempdir().unwrap();
        let storage = RocksDbStorage::open(dir.path()).unwrap();
        let mut elsewhere = award("9/9");
        if let Payload::AwardDeclaration(a) = &mut elsewhere {
            a.village = "Kesnand".into();
        }
        let block = Block::new(
            0,
            1,
            vec![tx_at(award("1/1"), 1), tx_at(elsewhere, 2), tx_at(citizen_query("1/1"), 3)],
            ROOT_MARKER,
        );
        storage.put_block(&block).unwrap();

        assert_eq!(storage.scan_lookup(IndexKey::Village, "Wagholi").unwrap().len(), 1);
        assert_eq!(storage.scan_lookup(IndexKey::Village, "Kesnand").unwrap().len(), 1);
        assert_eq!(storage.scan_lookup(IndexKey::Tehsil, "Haveli").unwrap().len(), 2);
    }

    #[test]
    fn re_upsert_replaces_index_rows() {
        let dir = tempfile::tempdir().unwrap();
        let storage = RocksDbStorage::open(dir.path()).unwrap();
        let first = Block::new(0, 1, vec![tx_at(award("5/5"), 1)], ROOT_MARKER);
        storage.put_block(&first).unwrap();
        storage.put_block(&first).unwrap();
        assert_eq!(storage.scan_lookup(IndexKey::SurveyNumber, "5/5").unwrap().len(), 1);

        let replacement = Block::new(0, 1, vec![tx_at(payment("6/6"), 2)], ROOT_MARKER);
        storage.put_block(&replacement).unwrap();
        assert!(storage.scan_lookup(IndexKey::SurveyNumber, "5/5").unwrap().is_empty());
        assert!(storage.scan_lookup(IndexKey::Village, "Wagholi").unwrap().is_empty());
        assert_eq!(storage.scan_lookup(IndexKey::SurveyNumber, "6/6").unwrap().len(), 1);
        assert_eq!(storage.get_entry(&first.transactions[0].id).unwrap(), None);
        assert_eq!(storage.load_blocks().unwrap(), vec![replacement]);
    }

    #[test]
    fn entry_and_histogram_come_from_tx_index() {
        let dir = tempfile::tempdir().unwrap();
        let storage = RocksDbStorage::open(dir.path()).unwrap();
        let block = Block::new(
            0,
            1,
            vec![tx_at(award("1/1"), 1), tx_at(award("2/1"), 2), tx_at(payment("1/1"), 3)],
            ROOT_MARKER,
        );
        storage.put_block(&block).unwrap();

        let entry = storage.get_entry(&block.transactions[2].id).unwrap().unwrap();
        assert_eq!(entry.block_index, 0);
        assert_eq!(entry.kind, TransactionKind::CompensationPayment);

        let histogram = storage.kind_histogram().unwrap();
        assert_eq!(histogram.get(&TransactionKind::AwardDeclaration), Some(&2));
        assert_eq!(histogram.get(&TransactionKind::CompensationPayment), Some(&1));
        assert_eq!(histogram.get(&TransactionKind::Litigation), None);
    }
}
