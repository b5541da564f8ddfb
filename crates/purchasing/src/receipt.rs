use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, ItemRef, ReceiptId, TransactionId};

use crate::order::{PurchaseOrderId, ReceivedLine};

/// Condition the goods arrived in. Recorded for audit; every condition is stocked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptCondition {
    #[default]
    Good,
    Damaged,
    Defective,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub line_id: u32,
    pub item: ItemRef,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub condition: ReceiptCondition,
    /// Ledger entry that booked this line into stock.
    pub transaction_id: TransactionId,
}

/// Immutable snapshot of one receiving event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub order: PurchaseOrderId,
    pub received_at: DateTime<Utc>,
    pub received_by: String,
    pub lines: Vec<ReceiptLine>,
    pub notes: Option<String>,
}

impl Receipt {
    /// Build a receipt from the lines an order reported as received, paired
    /// with the ledger transaction recorded for each.
    pub fn from_received(
        id: ReceiptId,
        order: PurchaseOrderId,
        received_at: DateTime<Utc>,
        received_by: impl Into<String>,
        lines: &[(ReceivedLine, TransactionId)],
        notes: Option<String>,
    ) -> Result<Self, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::validation("receipt must contain at least one line"));
        }
        let received_by = received_by.into();
        if received_by.trim().is_empty() {
            return Err(DomainError::validation("receipt requires a receiver"));
        }

        Ok(Self {
            id,
            order,
            received_at,
            received_by,
            lines: lines
                .iter()
                .map(|(line, transaction_id)| ReceiptLine {
                    line_id: line.line_id,
                    item: line.item,
                    quantity: line.quantity,
                    unit_cost: line.unit_cost,
                    condition: line.condition,
                    transaction_id: *transaction_id,
                })
                .collect(),
            notes: notes.filter(|n| !n.trim().is_empty()),
        })
    }

    pub fn total_quantity(&self) -> Decimal {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn total_cost(&self) -> Decimal {
        self.lines.iter().map(|l| l.quantity * l.unit_cost).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderKind;
    use rust_decimal_macros::dec;
    use stockledger_core::RawItemId;

    fn received(line_id: u32, quantity: Decimal) -> ReceivedLine {
        ReceivedLine {
            line_id,
            item: ItemRef::RawItem(RawItemId::from_seq(line_id as u64)),
            quantity,
            unit_cost: dec!(2),
            condition: ReceiptCondition::Damaged,
            previous_received: Decimal::ZERO,
            new_received: quantity,
        }
    }

    #[test]
    fn receipt_snapshots_lines_and_totals() {
        let receipt = Receipt::from_received(
            ReceiptId::from_seq(1),
            PurchaseOrderId::new(OrderKind::RawItem, 3),
            Utc::now(),
            "dock",
            &[
                (received(1, dec!(3)), TransactionId::from_seq(10)),
                (received(2, dec!(1.5)), TransactionId::from_seq(11)),
            ],
            Some("  ".to_string()),
        )
        .unwrap();

        assert_eq!(receipt.id.to_string(), "RCP000001");
        assert_eq!(receipt.total_quantity(), dec!(4.5));
        assert_eq!(receipt.total_cost(), dec!(9.0));
        assert_eq!(receipt.lines[1].transaction_id, TransactionId::from_seq(11));
        assert_eq!(receipt.lines[0].condition, ReceiptCondition::Damaged);
        assert!(receipt.notes.is_none());
    }

    #[test]
    fn empty_receipts_are_rejected() {
        let err = Receipt::from_received(
            ReceiptId::from_seq(1),
            PurchaseOrderId::new(OrderKind::Part, 1),
            Utc::now(),
            "dock",
            &[],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
