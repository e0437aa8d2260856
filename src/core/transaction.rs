//! Ledger transactions and the builder that stamps them with id and time.

use crate::core::payload::{EncodingError, Payload};
use crate::types::encoding::Encode;
use crate::types::hash::Hash;
use crate::utils::clock;
use ledger_derive::BinaryCodec;
use std::fmt;
use std::str::FromStr;

/// Largest accepted canonical encoding of a single transaction.
pub const TRANSACTION_MAX_BYTES: usize = 64 * 1024;

/// Record kind. The string form is the one stored in the index and reported
/// in stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BinaryCodec)]
pub enum TransactionKind {
    SystemInit,
    AwardDeclaration,
    CompensationPayment,
    CitizenQuery,
    Litigation,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 5] = [
        TransactionKind::SystemInit,
        TransactionKind::AwardDeclaration,
        TransactionKind::CompensationPayment,
        TransactionKind::CitizenQuery,
        TransactionKind::Litigation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::SystemInit => "SYSTEM_INIT",
            TransactionKind::AwardDeclaration => "AWARD_DECLARATION",
            TransactionKind::CompensationPayment => "COMPENSATION_PAYMENT",
            TransactionKind::CitizenQuery => "CITIZEN_QUERY",
            TransactionKind::Litigation => "LITIGATION",
        }
    }

    /// Status a freshly created record of this kind starts in.
    pub fn initial_status(&self) -> TransactionStatus {
        match self {
            TransactionKind::SystemInit => TransactionStatus::Initialized,
            TransactionKind::AwardDeclaration => TransactionStatus::Declared,
            TransactionKind::CompensationPayment => TransactionStatus::Paid,
            TransactionKind::CitizenQuery => TransactionStatus::Received,
            TransactionKind::Litigation => TransactionStatus::UnderLitigation,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = EncodingError;

    /// Accepts the stored form (`AWARD_DECLARATION`) in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        TransactionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| EncodingError::UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BinaryCodec)]
pub enum TransactionStatus {
    Initialized,
    Declared,
    Paid,
    Received,
    UnderLitigation,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Initialized => "INITIALIZED",
            TransactionStatus::Declared => "DECLARED",
            TransactionStatus::Paid => "PAID",
            TransactionStatus::Received => "RECEIVED",
            TransactionStatus::UnderLitigation => "UNDER_LITIGATION",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable ledger record.
///
/// `id` commits to the payload and the admission time; the merkle leaf and the
/// block hash commit to every field, so editing any of them after sealing is
/// detected by chain validation.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct Transaction {
    pub id: Hash,
    /// Admission time, nanoseconds since the Unix epoch.
    pub timestamp: u64,
    pub status: TransactionStatus,
    pub payload: Payload,
}

impl Transaction {
    pub fn builder(payload: impl Into<Payload>) -> TransactionBuilder {
        TransactionBuilder::new(payload)
    }

    pub fn kind(&self) -> TransactionKind {
        self.payload.kind()
    }

    /// `hash(canonical payload ++ timestamp)`.
    pub fn derive_id(payload: &Payload, timestamp: u64) -> Hash {
        let mut h = Hash::sha3();
        payload.encode(&mut h);
        timestamp.encode(&mut h);
        h.finalize()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ts={} {}",
            self.id,
            self.kind(),
            self.status,
            self.timestamp,
            self.payload
        )
    }
}

/// Stamps a payload with its id, timestamp and initial status.
///
/// ```ignore
/// let tx = Transaction::builder(award).build()?;
/// ```
pub struct TransactionBuilder {
    payload: Payload,
    timestamp: Option<u64>,
}

impl TransactionBuilder {
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            payload: payload.into(),
            timestamp: None,
        }
    }

    /// Builder over loosely typed fields, see [`Payload::from_fields`].
    pub fn from_fields(
        kind: TransactionKind,
        fields: &std::collections::BTreeMap<String, String>,
    ) -> Result<Self, EncodingError> {
        Ok(Self::new(Payload::from_fields(kind, fields)?))
    }

    /// Pins the admission time instead of reading the ledger clock.
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn build(self) -> Result<Transaction, EncodingError> {
        self.payload.check()?;

        let timestamp = self.timestamp.unwrap_or_else(clock::now_nanos);
        let tx = Transaction {
            id: Transaction::derive_id(&self.payload, timestamp),
            timestamp,
            status: self.payload.kind().initial_status(),
            payload: self.payload,
        };

        let size = tx.encoded_len();
        if size > TRANSACTION_MAX_BYTES {
            return Err(EncodingError::TooLarge {
                size,
                max: TRANSACTION_MAX_BYTES,
            });
        }
        Ok(tx)
    }
}
