//! Transaction index entries and lookup key layout.
//!
//! Lookup rows are keyed `tag ++ value ++ 0x00 ++ block_index (BE) ++ tx_id`,
//! so all rows for one value are contiguous and sorted by block. Values never
//! contain NUL (payload checks reject control characters), which keeps
//! `123/4` from matching rows of `123/45`.

use crate::core::block::Block;
use crate::core::payload::Payload;
use crate::core::transaction::{Transaction, TransactionKind};
use crate::types::hash::{HASH_LEN, Hash};
use ledger_derive::{BinaryCodec, Error};
use std::fmt;
use std::str::FromStr;

/// Field a lookup matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKey {
    SurveyNumber,
    Village,
    Tehsil,
}

impl IndexKey {
    fn tag(self) -> u8 {
        match self {
            IndexKey::SurveyNumber => b's',
            IndexKey::Village => b'v',
            IndexKey::Tehsil => b't',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IndexKey::SurveyNumber => "survey_number",
            IndexKey::Village => "village",
            IndexKey::Tehsil => "tehsil",
        }
    }

    /// Values of this field carried by `payload`.
    pub fn values(self, payload: &Payload) -> Vec<&str> {
        match self {
            IndexKey::SurveyNumber => payload.survey_numbers(),
            IndexKey::Village => payload.village().into_iter().collect(),
            IndexKey::Tehsil => payload.tehsil().into_iter().collect(),
        }
    }

    /// Exact match of `value` against this field of `tx`.
    pub fn matches(self, tx: &Transaction, value: &str) -> bool {
        self.values(&tx.payload).contains(&value)
    }

    /// Prefix shared by every lookup row for `value`.
    pub fn prefix(self, value: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(value.len() + 2);
        key.push(self.tag());
        key.extend_from_slice(value.as_bytes());
        key.push(0);
        key
    }

    pub fn row_key(self, value: &str, block_index: u64, transaction_id: &Hash) -> Vec<u8> {
        let mut key = self.prefix(value);
        key.reserve(8 + HASH_LEN);
        key.extend_from_slice(&block_index.to_be_bytes());
        key.extend_from_slice(transaction_id.as_slice());
        key
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown lookup field {0:?}, expected survey, village or tehsil")]
pub struct ParseIndexKeyError(pub String);

impl FromStr for IndexKey {
    type Err = ParseIndexKeyError;

    /// Accepts `survey`, `survey_number`, `village` and `tehsil`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "survey" | "survey_number" | "survey-number" => Ok(IndexKey::SurveyNumber),
            "village" => Ok(IndexKey::Village),
            "tehsil" => Ok(IndexKey::Tehsil),
            _ => Err(ParseIndexKeyError(s.to_string())),
        }
    }
}

/// One row of the transaction index.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct IndexEntry {
    pub transaction_id: Hash,
    pub block_index: u64,
    pub kind: TransactionKind,
    pub survey_numbers: Vec<String>,
    pub village: Option<String>,
    pub tehsil: Option<String>,
    pub timestamp: u64,
}

impl IndexEntry {
    pub fn new(block_index: u64, tx: &Transaction) -> Self {
        Self {
            transaction_id: tx.id,
            block_index,
            kind: tx.kind(),
            survey_numbers: tx
                .payload
                .survey_numbers()
                .into_iter()
                .map(str::to_string)
                .collect(),
            village: tx.payload.village().map(str::to_string),
            tehsil: tx.payload.tehsil().map(str::to_string),
            timestamp: tx.timestamp,
        }
    }

    /// Lookup row keys for this entry, one per indexed value.
    pub fn lookup_keys(&self) -> Vec<Vec<u8>> {
        let mut keys = Vec::with_capacity(self.survey_numbers.len() + 2);
        for survey in &self.survey_numbers {
            keys.push(IndexKey::SurveyNumber.row_key(
                survey,
                self.block_index,
                &self.transaction_id,
            ));
        }
        if let Some(village) = &self.village {
            keys.push(IndexKey::Village.row_key(village, self.block_index, &self.transaction_id));
        }
        if let Some(tehsil) = &self.tehsil {
            keys.push(IndexKey::Tehsil.row_key(tehsil, self.block_index, &self.transaction_id));
        }
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Index entries for every transaction of `block`, in block order.
pub fn entries_for_block(block: &Block) -> Vec<IndexEntry> {
    block
        .transactions
        .iter()
        .map(|tx| IndexEntry::new(block.index(), tx))
        .collect()
}
