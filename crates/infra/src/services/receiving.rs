use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use stockledger_core::{Aggregate, DomainError, IdPrefix, ReceiptId, TransactionId};
use stockledger_inventory::{StockCommand, StockItem};
use stockledger_ledger::{LedgerEntry, LedgerSubject, NewLedgerEntry, TransactionType};
use stockledger_purchasing::{
    LineReceipt, NewOrderLine, OrderKind, OrderPatch, PurchaseOrder, PurchaseOrderCommand,
    PurchaseOrderEvent, PurchaseOrderId, Receipt, ReceivedLine,
};

use crate::engine::InventoryEngine;
use crate::error::ServiceResult;
use crate::store::{InventoryStore, UnitOfWork};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub supplier: String,
    /// Defaults to now.
    pub order_date: Option<DateTime<Utc>>,
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveRequest {
    pub order: PurchaseOrderId,
    pub lines: Vec<LineReceipt>,
    /// Defaults to now.
    pub received_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiveOutcome {
    pub order: PurchaseOrder,
    pub receipt: Receipt,
    pub entries: Vec<LedgerEntry>,
}

impl<S: InventoryStore> InventoryEngine<S> {
    pub fn create_part_order(
        &self,
        order: NewPurchaseOrder,
        actor: &str,
    ) -> ServiceResult<PurchaseOrder> {
        self.create_purchase_order(OrderKind::Part, order, actor)
    }

    pub fn create_raw_item_order(
        &self,
        order: NewPurchaseOrder,
        actor: &str,
    ) -> ServiceResult<PurchaseOrder> {
        self.create_purchase_order(OrderKind::RawItem, order, actor)
    }

    #[instrument(skip(self, order), fields(supplier = %order.supplier), err)]
    fn create_purchase_order(
        &self,
        kind: OrderKind,
        order: NewPurchaseOrder,
        actor: &str,
    ) -> ServiceResult<PurchaseOrder> {
        let created = self.transact(|ctx| {
            for line in &order.lines {
                let _: StockItem = ctx.fetch(line.item)?;
            }
            let id = PurchaseOrderId::new(kind, ctx.next_seq(kind.prefix()));
            let placed = PurchaseOrder::new(
                id,
                order.supplier.as_str(),
                order.order_date.unwrap_or(ctx.now()),
                order.lines.clone(),
                actor,
            )?
            .with_details(order.expected_date, order.notes.clone());
            ctx.uow.insert(&placed)?;
            Ok(placed)
        })?;
        info!(order = %created.id_typed(), lines = created.lines().len(), "purchase order created");
        Ok(created)
    }

    #[instrument(skip(self, patch), err)]
    pub fn update_purchase_order(
        &self,
        order: PurchaseOrderId,
        patch: OrderPatch,
    ) -> ServiceResult<PurchaseOrder> {
        self.transact(|ctx| {
            let mut target: PurchaseOrder = ctx.fetch(order)?;
            target.execute(&PurchaseOrderCommand::Update(patch.clone()))?;
            ctx.uow.save(&target)?;
            Ok(target)
        })
    }

    #[instrument(skip(self), err)]
    pub fn cancel_purchase_order(&self, order: PurchaseOrderId) -> ServiceResult<PurchaseOrder> {
        self.transact(|ctx| {
            let mut target: PurchaseOrder = ctx.fetch(order)?;
            target.execute(&PurchaseOrderCommand::Cancel)?;
            ctx.uow.save(&target)?;
            Ok(target)
        })
    }

    /// Remove an order that never received anything.
    #[instrument(skip(self), err)]
    pub fn delete_purchase_order(&self, order: PurchaseOrderId) -> ServiceResult<()> {
        self.transact(|ctx| {
            let target: PurchaseOrder = ctx.fetch(order)?;
            target.ensure_deletable()?;
            ctx.uow.delete::<PurchaseOrder>(&order.to_string())?;
            Ok(())
        })?;
        info!(%order, "purchase order deleted");
        Ok(())
    }

    pub fn receive_part_order_items(
        &self,
        request: ReceiveRequest,
        actor: &str,
    ) -> ServiceResult<ReceiveOutcome> {
        self.receive_order_items(OrderKind::Part, request, actor)
    }

    pub fn receive_raw_item_order_items(
        &self,
        request: ReceiveRequest,
        actor: &str,
    ) -> ServiceResult<ReceiveOutcome> {
        self.receive_order_items(OrderKind::RawItem, request, actor)
    }

    /// Book received lines into stock, write one DELIVERY per line and a receipt.
    ///
    /// Over-receipt of any line rejects the whole request.
    #[instrument(
        skip(self, request),
        fields(order = %request.order, lines = request.lines.len()),
        err
    )]
    fn receive_order_items(
        &self,
        kind: OrderKind,
        request: ReceiveRequest,
        actor: &str,
    ) -> ServiceResult<ReceiveOutcome> {
        let outcome = self.transact(|ctx| {
            if request.order.kind() != kind {
                return Err(DomainError::validation(format!(
                    "{} is not a {} order",
                    request.order,
                    kind.item_kind().as_str()
                ))
                .into());
            }
            let mut order: PurchaseOrder = ctx.fetch(request.order)?;
            let received_at = request.received_date.unwrap_or(ctx.now());
            let events = order.execute(&PurchaseOrderCommand::ReceiveLines {
                lines: request.lines.clone(),
                received_at,
            })?;
            let received = received_lines(events)?;

            let mut booked: Vec<(ReceivedLine, TransactionId)> = Vec::with_capacity(received.len());
            let mut entries = Vec::with_capacity(received.len());
            for line in received {
                let (_, change) = ctx.move_stock(
                    line.item,
                    StockCommand::Receive {
                        quantity: line.quantity,
                        restocked_at: received_at,
                    },
                )?;
                let now = ctx.now();
                let entry = ctx.record(
                    NewLedgerEntry::new(
                        LedgerSubject::Item(line.item),
                        TransactionType::Delivery,
                        line.quantity,
                        line.unit_cost,
                        change.previous,
                        change.new,
                        actor,
                        now,
                    )
                    .with_reference(order.id_typed().to_string(), "purchase_order")
                    .with_purchase_order(order.id_typed().document_number())
                    .with_notes(request.notes.clone())
                    .with_metadata(json!({
                        "line_id": line.line_id,
                        "condition": line.condition,
                    })),
                )?;
                booked.push((line, entry.transaction_id));
                entries.push(entry);
            }

            let receipt_id = ReceiptId::from_seq(ctx.next_seq(IdPrefix::Receipt));
            let receipt = Receipt::from_received(
                receipt_id,
                order.id_typed(),
                received_at,
                actor,
                &booked,
                request.notes.clone(),
            )?;
            ctx.uow.insert(&receipt)?;
            ctx.uow.save(&order)?;
            Ok(ReceiveOutcome {
                order,
                receipt,
                entries,
            })
        })?;

        info!(
            order = %outcome.order.id_typed(),
            receipt = %outcome.receipt.id,
            status = ?outcome.order.status(),
            "purchase order received"
        );
        Ok(outcome)
    }
}

fn received_lines(events: Vec<PurchaseOrderEvent>) -> Result<Vec<ReceivedLine>, DomainError> {
    events
        .into_iter()
        .find_map(|e| match e {
            PurchaseOrderEvent::LinesReceived(received) => Some(received.lines),
            PurchaseOrderEvent::Updated(_) => None,
        })
        .ok_or_else(|| DomainError::invariant("receive produced no received lines"))
}
