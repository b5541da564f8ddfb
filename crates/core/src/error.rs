//! Domain error model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::ItemRef;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// One component (or raw material) that cannot cover a requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortage {
    pub item: ItemRef,
    pub required: Decimal,
    pub available: Decimal,
}

impl Shortage {
    pub fn missing(&self) -> Decimal {
        self.required - self.available
    }
}

impl core::fmt::Display for Shortage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} (required {}, available {})",
            self.item, self.required, self.available
        )
    }
}

fn join_shortages(shortages: &[Shortage]) -> String {
    shortages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Coarse failure category, used by callers that only need to know how to react.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    BusinessRule,
    OverReceipt,
    AlreadyDone,
    Conflict,
    Internal,
}

/// Domain-level error.
///
/// Every business-rule failure a workflow can report is a typed variant here.
/// Any of them aborts the surrounding unit of work; nothing is partially applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Malformed input (non-positive quantity, missing field, duplicate line...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Review quantities do not add up to the produced quantity.
    #[error("quantity mismatch: passed {passed} + rejected {rejected} must equal {expected}")]
    QuantityMismatch {
        expected: Decimal,
        passed: Decimal,
        rejected: Decimal,
    },

    /// A withdrawal (or ship/dismantle) would drive a quantity below zero.
    #[error("insufficient stock for {subject}: requested {requested}, available {available}")]
    InsufficientStock {
        subject: String,
        requested: Decimal,
        available: Decimal,
    },

    /// The assembly's bill of materials is not covered by current stock.
    #[error("cannot build {quantity} x {assembly}: short on {}", join_shortages(.shortages))]
    CannotBuild {
        assembly: String,
        quantity: u64,
        shortages: Vec<Shortage>,
    },

    /// Raw materials do not cover a production run.
    #[error("insufficient raw stock: short on {}", join_shortages(.shortages))]
    InsufficientRawStock { shortages: Vec<Shortage> },

    /// Attempted to receive more than remains open on an order line.
    #[error("over-receipt on {order} line {line}: requested {requested}, remaining {remaining}")]
    OverReceipt {
        order: String,
        line: u32,
        requested: Decimal,
        remaining: Decimal,
    },

    /// A pending part was already accepted or rejected.
    #[error("{0} has already been reviewed")]
    AlreadyReviewed(String),

    /// A purchase order is completed and no longer accepts changes.
    #[error("{0} is already completed")]
    AlreadyCompleted(String),

    /// A write conflict (stale version or duplicate key). Safe to retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Validation(_) | DomainError::QuantityMismatch { .. } => {
                ErrorKind::Validation
            }
            DomainError::InsufficientStock { .. }
            | DomainError::CannotBuild { .. }
            | DomainError::InsufficientRawStock { .. } => ErrorKind::BusinessRule,
            DomainError::OverReceipt { .. } => ErrorKind::OverReceipt,
            DomainError::AlreadyReviewed(_) | DomainError::AlreadyCompleted(_) => {
                ErrorKind::AlreadyDone
            }
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::InvariantViolation(_) => ErrorKind::Internal,
        }
    }

    /// Shortage details carried by `CannotBuild` / `InsufficientRawStock`.
    pub fn shortages(&self) -> &[Shortage] {
        match self {
            DomainError::CannotBuild { shortages, .. }
            | DomainError::InsufficientRawStock { shortages } => shortages,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::PartId;

    #[test]
    fn quantity_mismatch_is_a_validation_failure() {
        let err = DomainError::QuantityMismatch {
            expected: Decimal::from(10),
            passed: Decimal::from(6),
            rejected: Decimal::from(3),
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn cannot_build_message_lists_shortages() {
        let err = DomainError::CannotBuild {
            assembly: "ASM000001".to_string(),
            quantity: 4,
            shortages: vec![Shortage {
                item: ItemRef::Part(PartId::from_seq(2)),
                required: Decimal::from(4),
                available: Decimal::from(3),
            }],
        };
        let msg = err.to_string();
        assert!(msg.contains("P000002"));
        assert!(msg.contains("required 4"));
        assert_eq!(err.shortages().len(), 1);
        assert_eq!(err.shortages()[0].missing(), Decimal::from(1));
        assert_eq!(err.kind(), ErrorKind::BusinessRule);
    }
}
