use chrono::{DateTime, Utc};
use core::str::FromStr;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    Aggregate, AggregateRoot, DocumentNumber, DomainError, IdPrefix, ItemKind, ItemRef,
};

use crate::receipt::ReceiptCondition;

/// Which stock kind an order replenishes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Part,
    RawItem,
}

impl OrderKind {
    pub fn prefix(self) -> IdPrefix {
        match self {
            OrderKind::Part => IdPrefix::PartOrder,
            OrderKind::RawItem => IdPrefix::RawItemOrder,
        }
    }

    pub fn item_kind(self) -> ItemKind {
        match self {
            OrderKind::Part => ItemKind::Part,
            OrderKind::RawItem => ItemKind::RawItem,
        }
    }
}

/// Purchase order number (`PO######` or `RIPO######`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PurchaseOrderId(DocumentNumber);

impl PurchaseOrderId {
    pub fn new(kind: OrderKind, seq: u64) -> Self {
        Self(DocumentNumber::new(kind.prefix(), seq))
    }

    pub fn from_number(number: DocumentNumber) -> Result<Self, DomainError> {
        match number.prefix() {
            IdPrefix::PartOrder | IdPrefix::RawItemOrder => Ok(Self(number)),
            other => Err(DomainError::validation(format!(
                "{number} is a {other} number, not a purchase order"
            ))),
        }
    }

    pub fn kind(&self) -> OrderKind {
        match self.0.prefix() {
            IdPrefix::RawItemOrder => OrderKind::RawItem,
            _ => OrderKind::Part,
        }
    }

    pub fn document_number(&self) -> DocumentNumber {
        self.0
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for PurchaseOrderId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_number(s.parse()?)
    }
}

impl TryFrom<String> for PurchaseOrderId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PurchaseOrderId> for String {
    fn from(value: PurchaseOrderId) -> Self {
        value.to_string()
    }
}

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderStatus {
    Pending,
    Partial,
    Completed,
    Cancelled,
}

/// Purchase order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_id: u32,
    pub item: ItemRef,
    pub quantity_ordered: Decimal,
    pub quantity_received: Decimal,
    pub unit_cost: Decimal,
}

impl OrderLine {
    pub fn remaining(&self) -> Decimal {
        self.quantity_ordered - self.quantity_received
    }
}

/// Line input when placing an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub item: ItemRef,
    pub quantity_ordered: Decimal,
    pub unit_cost: Decimal,
}

/// Status implied by cumulative received quantities.
///
/// Nothing received is `Pending`, everything received is `Completed`, anything
/// in between is `Partial`.
pub fn derive_status(lines: &[OrderLine]) -> PurchaseOrderStatus {
    let ordered: Decimal = lines.iter().map(|l| l.quantity_ordered).sum();
    let received: Decimal = lines.iter().map(|l| l.quantity_received).sum();

    if received.is_zero() {
        PurchaseOrderStatus::Pending
    } else if received >= ordered {
        PurchaseOrderStatus::Completed
    } else {
        PurchaseOrderStatus::Partial
    }
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    supplier: String,
    order_date: DateTime<Utc>,
    expected_date: Option<DateTime<Utc>>,
    notes: Option<String>,
    status: PurchaseOrderStatus,
    lines: Vec<OrderLine>,
    created_by: String,
    version: u64,
}

impl PurchaseOrder {
    /// Place a new order. Line ids are assigned in input order starting at 1.
    pub fn new(
        id: PurchaseOrderId,
        supplier: impl Into<String>,
        order_date: DateTime<Utc>,
        lines: Vec<NewOrderLine>,
        created_by: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let supplier = supplier.into();
        if supplier.trim().is_empty() {
            return Err(DomainError::validation("supplier cannot be empty"));
        }
        if lines.is_empty() {
            return Err(DomainError::validation("purchase order needs at least one line"));
        }

        let expected_kind = id.kind().item_kind();
        let mut order_lines = Vec::with_capacity(lines.len());
        for (idx, line) in lines.into_iter().enumerate() {
            if line.item.kind() != expected_kind {
                return Err(DomainError::validation(format!(
                    "{} cannot order {}: expected a {}",
                    id,
                    line.item,
                    expected_kind.as_str()
                )));
            }
            if line.quantity_ordered <= Decimal::ZERO {
                return Err(DomainError::validation("quantity ordered must be positive"));
            }
            if line.unit_cost < Decimal::ZERO {
                return Err(DomainError::validation("unit cost cannot be negative"));
            }
            order_lines.push(OrderLine {
                line_id: idx as u32 + 1,
                item: line.item,
                quantity_ordered: line.quantity_ordered,
                quantity_received: Decimal::ZERO,
                unit_cost: line.unit_cost,
            });
        }

        Ok(Self {
            id,
            supplier,
            order_date,
            expected_date: None,
            notes: None,
            status: PurchaseOrderStatus::Pending,
            lines: order_lines,
            created_by: created_by.into(),
            version: 0,
        })
    }

    pub fn with_details(
        mut self,
        expected_date: Option<DateTime<Utc>>,
        notes: Option<String>,
    ) -> Self {
        self.expected_date = expected_date;
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn kind(&self) -> OrderKind {
        self.id.kind()
    }

    pub fn supplier(&self) -> &str {
        &self.supplier
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }

    pub fn expected_date(&self) -> Option<DateTime<Utc>> {
        self.expected_date
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn line(&self, line_id: u32) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.line_id == line_id)
    }

    pub fn total_ordered(&self) -> Decimal {
        self.lines.iter().map(|l| l.quantity_ordered).sum()
    }

    pub fn total_received(&self) -> Decimal {
        self.lines.iter().map(|l| l.quantity_received).sum()
    }

    /// Orders that have received anything are part of the audit trail.
    pub fn ensure_deletable(&self) -> Result<(), DomainError> {
        if self.lines.iter().any(|l| l.quantity_received > Decimal::ZERO) {
            return Err(DomainError::invariant(format!(
                "{} has received items and cannot be deleted",
                self.id
            )));
        }
        Ok(())
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// One line of a receive request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineReceipt {
    pub line_id: u32,
    pub quantity: Decimal,
    #[serde(default)]
    pub condition: ReceiptCondition,
}

/// Field edits. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPatch {
    pub supplier: Option<String>,
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub status: Option<PurchaseOrderStatus>,
}

impl OrderPatch {
    pub fn status_only(&self) -> bool {
        self.supplier.is_none() && self.expected_date.is_none() && self.notes.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    ReceiveLines {
        lines: Vec<LineReceipt>,
        received_at: DateTime<Utc>,
    },
    Update(OrderPatch),
    Cancel,
}

/// A line as affected by one receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedLine {
    pub line_id: u32,
    pub item: ItemRef,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub condition: ReceiptCondition,
    pub previous_received: Decimal,
    pub new_received: Decimal,
}

/// Event: LinesReceived.
///
/// Carries the item and quantity of every processed line; the infra layer
/// turns each into a stock increase, a DELIVERY ledger entry and a receipt line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinesReceived {
    pub order_id: PurchaseOrderId,
    pub lines: Vec<ReceivedLine>,
    pub status: PurchaseOrderStatus,
    pub received_at: DateTime<Utc>,
}

/// Event: PurchaseOrderUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderUpdated {
    pub order_id: PurchaseOrderId,
    pub patch: OrderPatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    LinesReceived(LinesReceived),
    Updated(PurchaseOrderUpdated),
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::LinesReceived(e) => {
                for received in &e.lines {
                    let line = self.lines.iter_mut().find(|l| l.line_id == received.line_id);
                    if let Some(line) = line {
                        line.quantity_received = received.new_received;
                    }
                }
                self.status = e.status;
            }
            PurchaseOrderEvent::Updated(e) => {
                if let Some(supplier) = &e.patch.supplier {
                    self.supplier = supplier.clone();
                }
                if let Some(expected) = e.patch.expected_date {
                    self.expected_date = Some(expected);
                }
                if let Some(notes) = &e.patch.notes {
                    self.notes = Some(notes.clone());
                }
                if let Some(status) = e.patch.status {
                    self.status = status;
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::ReceiveLines { lines, received_at } => {
                self.handle_receive(lines, *received_at)
            }
            PurchaseOrderCommand::Update(patch) => self.handle_update(patch),
            PurchaseOrderCommand::Cancel => self.handle_update(&OrderPatch {
                status: Some(PurchaseOrderStatus::Cancelled),
                ..OrderPatch::default()
            }),
        }
    }
}

impl PurchaseOrder {
    fn handle_receive(
        &self,
        requested: &[LineReceipt],
        received_at: DateTime<Utc>,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        match self.status {
            PurchaseOrderStatus::Completed => {
                return Err(DomainError::AlreadyCompleted(self.id.to_string()));
            }
            PurchaseOrderStatus::Cancelled => {
                return Err(DomainError::validation(format!(
                    "{} is cancelled and cannot receive items",
                    self.id
                )));
            }
            PurchaseOrderStatus::Pending | PurchaseOrderStatus::Partial => {}
        }
        if requested.is_empty() {
            return Err(DomainError::validation("receipt must contain at least one line"));
        }

        let mut next_lines = self.lines.clone();
        let mut received = Vec::new();
        for (idx, req) in requested.iter().enumerate() {
            if requested[..idx].iter().any(|r| r.line_id == req.line_id) {
                return Err(DomainError::validation(format!(
                    "line {} appears twice in one receipt",
                    req.line_id
                )));
            }
            if req.quantity < Decimal::ZERO {
                return Err(DomainError::validation("quantity received cannot be negative"));
            }
            let line = next_lines
                .iter_mut()
                .find(|l| l.line_id == req.line_id)
                .ok_or_else(|| {
                    DomainError::not_found("order line", format!("{}#{}", self.id, req.line_id))
                })?;
            if req.quantity.is_zero() {
                continue;
            }

            let remaining = line.remaining();
            if req.quantity > remaining {
                return Err(DomainError::OverReceipt {
                    order: self.id.to_string(),
                    line: line.line_id,
                    requested: req.quantity,
                    remaining,
                });
            }

            let previous_received = line.quantity_received;
            line.quantity_received += req.quantity;
            received.push(ReceivedLine {
                line_id: line.line_id,
                item: line.item,
                quantity: req.quantity,
                unit_cost: line.unit_cost,
                condition: req.condition,
                previous_received,
                new_received: line.quantity_received,
            });
        }

        if received.is_empty() {
            return Err(DomainError::validation("receipt does not receive any quantity"));
        }

        Ok(vec![PurchaseOrderEvent::LinesReceived(LinesReceived {
            order_id: self.id,
            lines: received,
            status: derive_status(&next_lines),
            received_at,
        })])
    }

    fn handle_update(&self, patch: &OrderPatch) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.status == PurchaseOrderStatus::Completed && !patch.status_only() {
            return Err(DomainError::AlreadyCompleted(self.id.to_string()));
        }
        if let Some(supplier) = &patch.supplier {
            if supplier.trim().is_empty() {
                return Err(DomainError::validation("supplier cannot be empty"));
            }
        }
        if let Some(status) = patch.status {
            // Received quantities pin the status; only cancellation can override it.
            let derived = derive_status(&self.lines);
            if status != PurchaseOrderStatus::Cancelled && status != derived {
                return Err(DomainError::validation(format!(
                    "{} cannot be marked {:?}: received quantities imply {:?}",
                    self.id, status, derived
                )));
            }
        }

        Ok(vec![PurchaseOrderEvent::Updated(PurchaseOrderUpdated {
            order_id: self.id,
            patch: patch.clone(),
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use stockledger_core::{PartId, RawItemId};

    fn test_order() -> PurchaseOrder {
        PurchaseOrder::new(
            PurchaseOrderId::new(OrderKind::Part, 1),
            "Acme Supply",
            Utc::now(),
            vec![
                NewOrderLine {
                    item: ItemRef::Part(PartId::from_seq(1)),
                    quantity_ordered: dec!(10),
                    unit_cost: dec!(1.25),
                },
                NewOrderLine {
                    item: ItemRef::Part(PartId::from_seq(2)),
                    quantity_ordered: dec!(5),
                    unit_cost: dec!(4.00),
                },
            ],
            "buyer",
        )
        .unwrap()
    }

    fn receive(line_qty: &[(u32, Decimal)]) -> PurchaseOrderCommand {
        PurchaseOrderCommand::ReceiveLines {
            lines: line_qty
                .iter()
                .map(|(line_id, quantity)| LineReceipt {
                    line_id: *line_id,
                    quantity: *quantity,
                    condition: ReceiptCondition::Good,
                })
                .collect(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn new_order_is_pending_with_numbered_lines() {
        let order = test_order();
        assert_eq!(order.status(), PurchaseOrderStatus::Pending);
        assert_eq!(order.lines()[1].line_id, 2);
        assert_eq!(order.id_typed().to_string(), "PO000001");
    }

    #[test]
    fn order_kind_must_match_line_items() {
        let err = PurchaseOrder::new(
            PurchaseOrderId::new(OrderKind::RawItem, 1),
            "Acme Supply",
            Utc::now(),
            vec![NewOrderLine {
                item: ItemRef::Part(PartId::from_seq(1)),
                quantity_ordered: dec!(1),
                unit_cost: dec!(1),
            }],
            "buyer",
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn partial_then_complete() {
        let mut order = test_order();

        let events = order
            .execute(&receive(&[(1, dec!(3)), (2, dec!(0))]))
            .unwrap();
        match &events[0] {
            PurchaseOrderEvent::LinesReceived(e) => assert_eq!(e.lines.len(), 1),
            _ => panic!("Expected LinesReceived event"),
        }
        assert_eq!(order.status(), PurchaseOrderStatus::Partial);

        order
            .execute(&receive(&[(1, dec!(7)), (2, dec!(5))]))
            .unwrap();
        assert_eq!(order.status(), PurchaseOrderStatus::Completed);
        assert_eq!(order.total_received(), order.total_ordered());
    }

    #[test]
    fn over_receipt_is_rejected_without_changes() {
        let mut order = test_order();
        order.execute(&receive(&[(2, dec!(4))])).unwrap();

        let err = order.handle(&receive(&[(2, dec!(2))])).unwrap_err();
        assert_eq!(
            err,
            DomainError::OverReceipt {
                order: "PO000001".to_string(),
                line: 2,
                requested: dec!(2),
                remaining: dec!(1),
            }
        );
        assert_eq!(order.line(2).unwrap().quantity_received, dec!(4));
    }

    #[test]
    fn completed_orders_reject_receipts_and_edits() {
        let mut order = test_order();
        order
            .execute(&receive(&[(1, dec!(10)), (2, dec!(5))]))
            .unwrap();

        assert!(matches!(
            order.handle(&receive(&[(1, dec!(1))])),
            Err(DomainError::AlreadyCompleted(_))
        ));
        assert!(matches!(
            order.handle(&PurchaseOrderCommand::Update(OrderPatch {
                notes: Some("late".to_string()),
                ..OrderPatch::default()
            })),
            Err(DomainError::AlreadyCompleted(_))
        ));
        order
            .execute(&PurchaseOrderCommand::Update(OrderPatch {
                status: Some(PurchaseOrderStatus::Completed),
                ..OrderPatch::default()
            }))
            .unwrap();
    }

    #[test]
    fn unknown_line_is_not_found_and_duplicates_are_invalid() {
        let order = test_order();
        assert!(matches!(
            order.handle(&receive(&[(9, dec!(1))])),
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            order.handle(&receive(&[(1, dec!(1)), (1, dec!(1))])),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            order.handle(&receive(&[(1, dec!(0))])),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn cancelled_orders_cannot_receive() {
        let mut order = test_order();
        order.execute(&PurchaseOrderCommand::Cancel).unwrap();
        assert_eq!(order.status(), PurchaseOrderStatus::Cancelled);
        assert!(matches!(
            order.handle(&receive(&[(1, dec!(1))])),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn status_cannot_contradict_received_quantities() {
        let order = test_order();
        let err = order
            .handle(&PurchaseOrderCommand::Update(OrderPatch {
                status: Some(PurchaseOrderStatus::Completed),
                ..OrderPatch::default()
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn orders_with_receipts_cannot_be_deleted() {
        let mut order = test_order();
        assert!(order.ensure_deletable().is_ok());
        order.execute(&receive(&[(1, dec!(1))])).unwrap();
        assert!(matches!(
            order.ensure_deletable(),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn purchase_order_ids_parse_by_prefix() {
        let id: PurchaseOrderId = "RIPO000042".parse().unwrap();
        assert_eq!(id.kind(), OrderKind::RawItem);
        assert!("RI000042".parse::<PurchaseOrderId>().is_err());
        let raw = ItemRef::RawItem(RawItemId::from_seq(42));
        assert_eq!(raw.kind(), id.kind().item_kind());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: status derivation depends only on cumulative totals.
        #[test]
        fn status_follows_cumulative_totals(received in proptest::collection::vec((0u32..20, 1u32..20), 1..6)) {
            let lines: Vec<OrderLine> = received
                .iter()
                .enumerate()
                .map(|(i, (got, ordered))| OrderLine {
                    line_id: i as u32 + 1,
                    item: ItemRef::Part(PartId::from_seq(i as u64 + 1)),
                    quantity_ordered: Decimal::from(*ordered),
                    quantity_received: Decimal::from((*got).min(*ordered)),
                    unit_cost: Decimal::ONE,
                })
                .collect();
            let total: u32 = received.iter().map(|(g, o)| (*g).min(*o)).sum();
            let ordered: u32 = received.iter().map(|(_, o)| *o).sum();
            let expected = if total == 0 {
                PurchaseOrderStatus::Pending
            } else if total >= ordered {
                PurchaseOrderStatus::Completed
            } else {
                PurchaseOrderStatus::Partial
            };
            prop_assert_eq!(derive_status(&lines), expected);
        }
    }
}
