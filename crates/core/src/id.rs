//! Human-readable, sequential document numbers.
//!
//! Every persisted record is keyed by a prefix plus a zero-padded six digit
//! sequence (`TXN000042`, `ASM000003`, `RIPO000010`, ...). This format is the
//! one bit-exact contract external audits rely on. Sequences past 999999 widen
//! naturally instead of wrapping.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Width of the zero-padded numeric part.
pub const SEQUENCE_WIDTH: usize = 6;

/// Namespace of a document number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdPrefix {
    Transaction,
    Assembly,
    PartOrder,
    RawItemOrder,
    Receipt,
    Part,
    RawItem,
    ScrapItem,
    PendingPart,
    ManufacturingRecord,
}

impl IdPrefix {
    pub const ALL: [IdPrefix; 10] = [
        IdPrefix::Transaction,
        IdPrefix::Assembly,
        IdPrefix::PartOrder,
        IdPrefix::RawItemOrder,
        IdPrefix::Receipt,
        IdPrefix::Part,
        IdPrefix::RawItem,
        IdPrefix::ScrapItem,
        IdPrefix::PendingPart,
        IdPrefix::ManufacturingRecord,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IdPrefix::Transaction => "TXN",
            IdPrefix::Assembly => "ASM",
            IdPrefix::PartOrder => "PO",
            IdPrefix::RawItemOrder => "RIPO",
            IdPrefix::Receipt => "RCP",
            IdPrefix::Part => "P",
            IdPrefix::RawItem => "RI",
            IdPrefix::ScrapItem => "SI",
            IdPrefix::PendingPart => "PP",
            IdPrefix::ManufacturingRecord => "MR",
        }
    }
}

impl core::fmt::Display for IdPrefix {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prefixed sequential identifier, e.g. `PO000017`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentNumber {
    prefix: IdPrefix,
    seq: u64,
}

impl DocumentNumber {
    pub fn new(prefix: IdPrefix, seq: u64) -> Self {
        Self { prefix, seq }
    }

    pub fn prefix(&self) -> IdPrefix {
        self.prefix
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Parse `s` only if it belongs to `prefix`.
    pub fn parse_with_prefix(s: &str, prefix: IdPrefix) -> Option<Self> {
        let digits = s.strip_prefix(prefix.as_str())?;
        if digits.len() < SEQUENCE_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u64>().ok().map(|seq| Self { prefix, seq })
    }
}

impl core::fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}{:0width$}",
            self.prefix.as_str(),
            self.seq,
            width = SEQUENCE_WIDTH
        )
    }
}

impl FromStr for DocumentNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Prefixes overlap ("P", "PO", "PP"), but only one can leave a pure digit tail.
        IdPrefix::ALL
            .iter()
            .find_map(|p| Self::parse_with_prefix(s, *p))
            .ok_or_else(|| DomainError::validation(format!("malformed document number: {s}")))
    }
}

impl TryFrom<String> for DocumentNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DocumentNumber> for String {
    fn from(value: DocumentNumber) -> Self {
        value.to_string()
    }
}

macro_rules! impl_document_id {
    ($(#[$meta:meta])* $t:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $t(u64);

        impl $t {
            pub const PREFIX: IdPrefix = $prefix;

            pub fn from_seq(seq: u64) -> Self {
                Self(seq)
            }

            pub fn seq(&self) -> u64 {
                self.0
            }

            pub fn document_number(&self) -> DocumentNumber {
                DocumentNumber::new(Self::PREFIX, self.0)
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.document_number(), f)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                DocumentNumber::parse_with_prefix(s, Self::PREFIX)
                    .map(|n| Self(n.seq()))
                    .ok_or_else(|| {
                        DomainError::validation(format!(
                            "expected a {} document number, got {s}",
                            Self::PREFIX
                        ))
                    })
            }
        }

        impl TryFrom<String> for $t {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.to_string()
            }
        }

        impl From<$t> for DocumentNumber {
            fn from(value: $t) -> Self {
                value.document_number()
            }
        }
    };
}

impl_document_id!(
    /// Ledger transaction number (`TXN######`).
    TransactionId,
    IdPrefix::Transaction
);
impl_document_id!(AssemblyId, IdPrefix::Assembly);
impl_document_id!(ReceiptId, IdPrefix::Receipt);
impl_document_id!(PartId, IdPrefix::Part);
impl_document_id!(RawItemId, IdPrefix::RawItem);
impl_document_id!(ScrapItemId, IdPrefix::ScrapItem);
impl_document_id!(PendingPartId, IdPrefix::PendingPart);
impl_document_id!(ManufacturingRecordId, IdPrefix::ManufacturingRecord);
