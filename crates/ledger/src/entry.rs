use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::{
    AssemblyId, DocumentNumber, DomainError, DomainResult, ItemRef, TransactionId,
};

/// Kind of stock movement recorded by a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Delivery,
    Withdrawal,
    Adjustment,
    AssemblyBuild,
    AssemblyDisassemble,
    AssemblyShip,
}

/// Which way a transaction type moves the subject's quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
    /// Adjustments may go either way; the sign comes from the stock delta.
    Either,
}

impl TransactionType {
    pub fn direction(self) -> Direction {
        match self {
            TransactionType::Delivery | TransactionType::AssemblyDisassemble => Direction::Inbound,
            TransactionType::Withdrawal
            | TransactionType::AssemblyBuild
            | TransactionType::AssemblyShip => Direction::Outbound,
            TransactionType::Adjustment => Direction::Either,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Delivery => "DELIVERY",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Adjustment => "ADJUSTMENT",
            TransactionType::AssemblyBuild => "ASSEMBLY_BUILD",
            TransactionType::AssemblyDisassemble => "ASSEMBLY_DISASSEMBLE",
            TransactionType::AssemblyShip => "ASSEMBLY_SHIP",
        }
    }
}

/// What a ledger entry is about: a stock item, or an assembly's ready-built count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LedgerSubject {
    Item(ItemRef),
    Assembly(AssemblyId),
}

impl LedgerSubject {
    pub fn item(&self) -> Option<ItemRef> {
        match self {
            LedgerSubject::Item(item) => Some(*item),
            LedgerSubject::Assembly(_) => None,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            LedgerSubject::Item(item) => item.kind().as_str(),
            LedgerSubject::Assembly(_) => "assembly",
        }
    }
}

impl core::fmt::Display for LedgerSubject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LedgerSubject::Item(item) => core::fmt::Display::fmt(item, f),
            LedgerSubject::Assembly(id) => core::fmt::Display::fmt(id, f),
        }
    }
}

/// A ledger entry that has not been assigned a transaction number yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub subject: LedgerSubject,
    pub transaction_type: TransactionType,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
    pub reference: Option<String>,
    pub reference_type: Option<String>,
    pub assembly: Option<AssemblyId>,
    pub purchase_order: Option<DocumentNumber>,
    pub notes: Option<String>,
    pub metadata: serde_json::Value,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

impl NewLedgerEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subject: LedgerSubject,
        transaction_type: TransactionType,
        quantity: Decimal,
        unit_price: Decimal,
        previous_stock: Decimal,
        new_stock: Decimal,
        actor: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject,
            transaction_type,
            quantity,
            unit_price,
            previous_stock,
            new_stock,
            reference: None,
            reference_type: None,
            assembly: None,
            purchase_order: None,
            notes: None,
            metadata: serde_json::Value::Null,
            actor: actor.into(),
            occurred_at,
        }
    }

    pub fn with_reference(
        mut self,
        reference: impl Into<String>,
        reference_type: impl Into<String>,
    ) -> Self {
        self.reference = Some(reference.into());
        self.reference_type = Some(reference_type.into());
        self
    }

    pub fn with_assembly(mut self, assembly: AssemblyId) -> Self {
        self.assembly = Some(assembly);
        self
    }

    pub fn with_purchase_order(mut self, order: DocumentNumber) -> Self {
        self.purchase_order = Some(order);
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    fn validate(&self) -> DomainResult<()> {
        if self.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("ledger quantity must be positive"));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(DomainError::validation("unit price cannot be negative"));
        }
        if self.previous_stock < Decimal::ZERO || self.new_stock < Decimal::ZERO {
            return Err(DomainError::invariant(format!(
                "stock of {} cannot go negative ({} -> {})",
                self.subject, self.previous_stock, self.new_stock
            )));
        }
        if self.actor.trim().is_empty() {
            return Err(DomainError::validation("ledger entry requires an actor"));
        }

        let delta = self.new_stock - self.previous_stock;
        let consistent = match self.transaction_type.direction() {
            Direction::Inbound => delta == self.quantity,
            Direction::Outbound => delta == -self.quantity,
            Direction::Either => delta.abs() == self.quantity,
        };
        if !consistent {
            return Err(DomainError::invariant(format!(
                "{} of {} on {} does not match stock change {} -> {}",
                self.transaction_type.as_str(),
                self.quantity,
                self.subject,
                self.previous_stock,
                self.new_stock
            )));
        }
        Ok(())
    }
}

/// Immutable record of one stock mutation.
///
/// Entries are insert-only in every store; `total_value` is always derived
/// from `quantity * unit_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: Uuid,
    pub transaction_id: TransactionId,
    /// The transaction number came from the timestamp fallback, not the sequence.
    pub sequence_fallback: bool,
    pub subject: LedgerSubject,
    pub transaction_type: TransactionType,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_value: Decimal,
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
    pub reference: Option<String>,
    pub reference_type: Option<String>,
    pub assembly: Option<AssemblyId>,
    pub purchase_order: Option<DocumentNumber>,
    pub notes: Option<String>,
    pub metadata: serde_json::Value,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Validate `new` and stamp it with its transaction number.
    pub fn record(
        transaction_id: TransactionId,
        sequence_fallback: bool,
        new: NewLedgerEntry,
    ) -> DomainResult<Self> {
        new.validate()?;
        let total_value = new.quantity.checked_mul(new.unit_price).ok_or_else(|| {
            DomainError::validation(format!(
                "value of {} at {} is too large to represent",
                new.quantity, new.unit_price
            ))
        })?;
        Ok(Self {
            entry_id: Uuid::now_v7(),
            transaction_id,
            sequence_fallback,
            subject: new.subject,
            transaction_type: new.transaction_type,
            total_value,
            quantity: new.quantity,
            unit_price: new.unit_price,
            previous_stock: new.previous_stock,
            new_stock: new.new_stock,
            reference: new.reference,
            reference_type: new.reference_type,
            assembly: new.assembly,
            purchase_order: new.purchase_order,
            notes: new.notes,
            metadata: new.metadata,
            actor: new.actor,
            occurred_at: new.occurred_at,
        })
    }

    /// Quantity with the sign of the stock change.
    pub fn signed_quantity(&self) -> Decimal {
        self.new_stock - self.previous_stock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use stockledger_core::PartId;

    fn part_subject() -> LedgerSubject {
        LedgerSubject::Item(ItemRef::Part(PartId::from_seq(1)))
    }

    fn entry(
        ty: TransactionType,
        quantity: Decimal,
        previous: Decimal,
        new: Decimal,
    ) -> NewLedgerEntry {
        NewLedgerEntry::new(
            part_subject(),
            ty,
            quantity,
            dec!(2.50),
            previous,
            new,
            "tester",
            Utc::now(),
        )
    }

    #[test]
    fn total_value_is_derived_from_quantity_and_price() {
        let recorded = LedgerEntry::record(
            TransactionId::from_seq(1),
            false,
            entry(TransactionType::Delivery, dec!(4), dec!(10), dec!(14)),
        )
        .unwrap();
        assert_eq!(recorded.total_value, dec!(10.00));
        assert_eq!(recorded.signed_quantity(), dec!(4));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let err = LedgerEntry::record(
            TransactionId::from_seq(1),
            false,
            entry(TransactionType::Adjustment, dec!(0), dec!(3), dec!(3)),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn negative_new_stock_is_rejected() {
        let err = LedgerEntry::record(
            TransactionId::from_seq(1),
            false,
            entry(TransactionType::Withdrawal, dec!(5), dec!(3), dec!(-2)),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn direction_must_match_stock_change() {
        let err = LedgerEntry::record(
            TransactionId::from_seq(1),
            false,
            entry(TransactionType::AssemblyBuild, dec!(2), dec!(3), dec!(5)),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn unrepresentable_total_value_is_rejected() {
        let mut huge = entry(TransactionType::Delivery, Decimal::MAX, dec!(0), Decimal::MAX);
        huge.unit_price = dec!(2);
        let err = LedgerEntry::record(TransactionId::from_seq(1), false, huge).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn transaction_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&TransactionType::AssemblyDisassemble).unwrap();
        assert_eq!(json, "\"ASSEMBLY_DISASSEMBLE\"");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: any accepted entry satisfies new - previous == +/- quantity.
        #[test]
        fn accepted_entries_balance(previous in 0i64..10_000, quantity in 1i64..10_000, inbound in any::<bool>()) {
            let previous = Decimal::from(previous);
            let quantity = Decimal::from(quantity);
            let (ty, new) = if inbound {
                (TransactionType::Delivery, previous + quantity)
            } else {
                (TransactionType::Withdrawal, previous - quantity)
            };
            let candidate = entry(ty, quantity, previous, new);
            let result = LedgerEntry::record(TransactionId::from_seq(9), false, candidate);
            if new < Decimal::ZERO {
                prop_assert!(result.is_err());
            } else {
                let recorded = result.unwrap();
                prop_assert_eq!(recorded.signed_quantity().abs(), recorded.quantity);
            }
        }
    }
}
