//! Typed transaction payloads, one struct per record kind.
//!
//! Collaborators either build these directly or hand over a string map
//! (`Payload::from_fields`) the way a web form or importer would. Either way
//! the payload is checked before it can be turned into a transaction:
//! required text must be present, indexed values must be usable as lookup
//! keys, and amounts must be whole paise.

use crate::core::transaction::TransactionKind;
use ledger_derive::{BinaryCodec, Error};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Reasons a payload cannot be canonically encoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` must not be empty")]
    EmptyField { field: &'static str },
    #[error("field `{field}` contains a control character")]
    ControlCharacter { field: &'static str },
    #[error("field `{field}` has leading or trailing whitespace")]
    UntrimmedField { field: &'static str },
    #[error("field `{field}` is not a valid rupee amount: {value:?}")]
    InvalidAmount { field: &'static str, value: String },
    #[error("award declaration lists no survey numbers")]
    NoSurveyNumbers,
    #[error("encoded transaction is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: usize },
    #[error("{0} records are written by the ledger itself")]
    ReservedKind(TransactionKind),
    #[error("unknown transaction kind {0:?}")]
    UnknownKind(String),
}

/// Money in paise (1/100 rupee). Integer so the encoding never depends on
/// float formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, BinaryCodec)]
pub struct Amount(u128);

impl Amount {
    pub const fn from_paise(paise: u128) -> Self {
        Self(paise)
    }

    pub const fn from_rupees(rupees: u64) -> Self {
        Self(rupees as u128 * 100)
    }

    pub fn paise(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Error returned when text is not a `rupees[.paise]` amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid rupee amount")]
pub struct ParseAmountError;

impl FromStr for Amount {
    type Err = ParseAmountError;

    /// Parses `rupees[.paise]` with at most two fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() || frac.len() > 2 {
            return Err(ParseAmountError);
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ParseAmountError);
        }
        if s.ends_with('.') {
            return Err(ParseAmountError);
        }

        let rupees: u128 = whole.parse().map_err(|_| ParseAmountError)?;
        let paise: u128 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u128>().map_err(|_| ParseAmountError)? * 10,
            _ => frac.parse().map_err(|_| ParseAmountError)?,
        };
        rupees
            .checked_mul(100)
            .and_then(|p| p.checked_add(paise))
            .map(Amount)
            .ok_or(ParseAmountError)
    }
}

/// Genesis record. Only the ledger writes one.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct SystemInit {
    pub message: String,
    pub version: String,
    pub created_by: String,
}

impl Default for SystemInit {
    fn default() -> Self {
        Self {
            message: "Land Acquisition Ledger Initialized".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_by: "Land Acquisition Department".to_string(),
        }
    }
}

/// Award declared over one or more survey numbers of a village.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct AwardDeclaration {
    pub project_name: String,
    pub survey_numbers: Vec<String>,
    pub village: String,
    pub tehsil: String,
    pub district: String,
    /// Rate per unit area.
    pub compensation_rate: Amount,
    pub officer_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct CompensationPayment {
    pub survey_number: String,
    pub property_number: String,
    pub beneficiary_name: String,
    pub beneficiary_account: String,
    pub amount: Amount,
    pub payment_method: String,
    pub officer_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct CitizenQuery {
    pub survey_number: String,
    pub query_type: String,
    pub complainant_name: String,
    pub query_details: String,
    pub officer_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct Litigation {
    pub survey_number: String,
    pub case_number: String,
    pub court_name: String,
    pub case_details: String,
    pub officer_id: String,
}

/// Kind-specific body of a transaction.
///
/// Variant order is persisted as the encoding tag; append new kinds at the end.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub enum Payload {
    SystemInit(SystemInit),
    AwardDeclaration(AwardDeclaration),
    CompensationPayment(CompensationPayment),
    CitizenQuery(CitizenQuery),
    Litigation(Litigation),
}

impl Payload {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Payload::SystemInit(_) => TransactionKind::SystemInit,
            Payload::AwardDeclaration(_) => TransactionKind::AwardDeclaration,
            Payload::CompensationPayment(_) => TransactionKind::CompensationPayment,
            Payload::CitizenQuery(_) => TransactionKind::CitizenQuery,
            Payload::Litigation(_) => TransactionKind::Litigation,
        }
    }

    /// Survey numbers this record is about.
    pub fn survey_numbers(&self) -> Vec<&str> {
        match self {
            Payload::SystemInit(_) => Vec::new(),
            Payload::AwardDeclaration(a) => a.survey_numbers.iter().map(String::as_str).collect(),
            Payload::CompensationPayment(p) => vec![p.survey_number.as_str()],
            Payload::CitizenQuery(q) => vec![q.survey_number.as_str()],
            Payload::Litigation(l) => vec![l.survey_number.as_str()],
        }
    }

    pub fn village(&self) -> Option<&str> {
        match self {
            Payload::AwardDeclaration(a) => Some(a.village.as_str()),
            _ => None,
        }
    }

    pub fn tehsil(&self) -> Option<&str> {
        match self {
            Payload::AwardDeclaration(a) => Some(a.tehsil.as_str()),
            _ => None,
        }
    }

    /// Every text field with its name, in declaration order.
    pub fn text_fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            Payload::SystemInit(s) => vec![
                ("message", s.message.as_str()),
                ("version", s.version.as_str()),
                ("created_by", s.created_by.as_str()),
            ],
            Payload::AwardDeclaration(a) => {
                let mut fields = vec![("project_name", a.project_name.as_str())];
                fields.extend(a.survey_numbers.iter().map(|s| ("survey_numbers", s.as_str())));
                fields.extend([
                    ("village", a.village.as_str()),
                    ("tehsil", a.tehsil.as_str()),
                    ("district", a.district.as_str()),
                    ("officer_id", a.officer_id.as_str()),
                ]);
                fields
            }
            Payload::CompensationPayment(p) => vec![
                ("survey_number", p.survey_number.as_str()),
                ("property_number", p.property_number.as_str()),
                ("beneficiary_name", p.beneficiary_name.as_str()),
                ("beneficiary_account", p.beneficiary_account.as_str()),
                ("payment_method", p.payment_method.as_str()),
                ("officer_id", p.officer_id.as_str()),
            ],
            Payload::CitizenQuery(q) => vec![
                ("survey_number", q.survey_number.as_str()),
                ("query_type", q.query_type.as_str()),
                ("complainant_name", q.complainant_name.as_str()),
                ("query_details", q.query_details.as_str()),
                ("officer_id", q.officer_id.as_str()),
            ],
            Payload::Litigation(l) => vec![
                ("survey_number", l.survey_number.as_str()),
                ("case_number", l.case_number.as_str()),
                ("court_name", l.court_name.as_str()),
                ("case_details", l.case_details.as_str()),
                ("officer_id", l.officer_id.as_str()),
            ],
        }
    }

    /// Values the record is indexed under: survey numbers, village and tehsil.
    pub fn indexed_fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields: Vec<(&'static str, &str)> = match self {
            Payload::AwardDeclaration(a) => a
                .survey_numbers
                .iter()
                .map(|s| ("survey_numbers", s.as_str()))
                .collect(),
            other => other
                .survey_numbers()
                .into_iter()
                .map(|s| ("survey_number", s))
                .collect(),
        };
        fields.extend(self.village().map(|v| ("village", v)));
        fields.extend(self.tehsil().map(|t| ("tehsil", t)));
        fields
    }

    /// Checks that the payload can be canonically encoded and indexed.
    ///
    /// Free text may hold any character. Indexed values must be trimmed and
    /// free of control characters, since lookup keys end in `0x00` and are
    /// matched exactly.
    pub fn check(&self) -> Result<(), EncodingError> {
        if let Payload::AwardDeclaration(a) = self
            && a.survey_numbers.is_empty()
        {
            return Err(EncodingError::NoSurveyNumbers);
        }

        for (field, value) in self.text_fields() {
            if value.trim().is_empty() {
                return Err(EncodingError::EmptyField { field });
            }
        }
        for (field, value) in self.indexed_fields() {
            if value.chars().any(char::is_control) {
                return Err(EncodingError::ControlCharacter { field });
            }
            if value.trim() != value {
                return Err(EncodingError::UntrimmedField { field });
            }
        }
        Ok(())
    }

    /// Builds a payload from loosely typed `name -> value` pairs.
    ///
    /// Award declarations take `survey_numbers` as a comma-separated list, or a
    /// single `survey_number`. Unknown keys are ignored.
    pub fn from_fields(
        kind: TransactionKind,
        fields: &BTreeMap<String, String>,
    ) -> Result<Payload, EncodingError> {
        let get = |name: &'static str| -> Result<String, EncodingError> {
            fields
                .get(name)
                .map(|v| v.trim().to_string())
                .ok_or(EncodingError::MissingField(name))
        };
        let amount = |name: &'static str| -> Result<Amount, EncodingError> {
            let raw = get(name)?;
            raw.parse().map_err(|_| EncodingError::InvalidAmount {
                field: name,
                value: raw,
            })
        };

        let payload = match kind {
            TransactionKind::SystemInit => return Err(EncodingError::ReservedKind(kind)),
            TransactionKind::AwardDeclaration => {
                let survey_numbers = match fields.get("survey_numbers") {
                    Some(list) => list
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect(),
                    None => vec![get("survey_number")?],
                };
                Payload::AwardDeclaration(AwardDeclaration {
                    project_name: get("project_name")?,
                    survey_numbers,
                    village: get("village")?,
                    tehsil: get("tehsil")?,
                    district: get("district")?,
                    compensation_rate: amount("compensation_rate")?,
                    officer_id: get("officer_id")?,
                })
            }
            TransactionKind::CompensationPayment => {
                Payload::CompensationPayment(CompensationPayment {
                    survey_number: get("survey_number")?,
                    property_number: get("property_number")?,
                    beneficiary_name: get("beneficiary_name")?,
                    beneficiary_account: get("beneficiary_account")?,
                    amount: amount("amount")?,
                    payment_method: get("payment_method")?,
                    officer_id: get("officer_id")?,
                })
            }
            TransactionKind::CitizenQuery => Payload::CitizenQuery(CitizenQuery {
                survey_number: get("survey_number")?,
                query_type: get("query_type")?,
                complainant_name: get("complainant_name")?,
                query_details: get("query_details")?,
                officer_id: get("officer_id")?,
            }),
            TransactionKind::Litigation => Payload::Litigation(Litigation {
                survey_number: get("survey_number")?,
                case_number: get("case_number")?,
                court_name: get("court_name")?,
                case_details: get("case_details")?,
                officer_id: get("officer_id")?,
            }),
        };

        payload.check()?;
        Ok(payload)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::AwardDeclaration(a) => write!(
                f,
                "project={:?} survey_numbers={} village={:?} tehsil={:?} district={:?} rate={} officer={:?}",
                a.project_name,
                a.survey_numbers.join(","),
                a.village,
                a.tehsil,
                a.district,
                a.compensation_rate,
                a.officer_id
            ),
            Payload::CompensationPayment(p) => write!(
                f,
                "survey_number={:?} property={:?} beneficiary={:?} account={:?} amount={} method={:?} officer={:?}",
                p.survey_number,
                p.property_number,
                p.beneficiary_name,
                p.beneficiary_account,
                p.amount,
                p.payment_method,
                p.officer_id
            ),
            other => {
                let fields: Vec<String> = other
                    .text_fields()
                    .into_iter()
                    .map(|(k, v)| format!("{k}={v:?}"))
                    .collect();
                f.write_str(&fields.join(" "))
            }
        }
    }
}

macro_rules! into_payload {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Payload {
                fn from(value: $variant) -> Self {
                    Payload::$variant(value)
                }
            }
        )*
    };
}

into_payload!(
    SystemInit,
    AwardDeclaration,
    CompensationPayment,
    CitizenQuery,
    Litigation
);
