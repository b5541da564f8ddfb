use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use stockledger_core::{
    Aggregate, DomainError, IdPrefix, ItemRef, ManufacturingRecordId, PartId, PendingPartId,
    RawItemId, ScrapItemId,
};
use stockledger_inventory::{ScrapProvenance, StockCommand, StockDetails, StockItem};
use stockledger_ledger::{LedgerEntry, LedgerSubject, NewLedgerEntry, TransactionType};
use stockledger_manufacturing::{
    ManufacturingRecord, PendingPart, PendingPartCommand, RawMaterialUsage, RawStock, ReviewAction,
    WasteAllocation, allocate_waste, consumption_plan,
};

use super::context::TxContext;
use crate::engine::InventoryEngine;
use crate::error::ServiceResult;
use crate::store::{InventoryStore, ScrapLink, UnitOfWork};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceRequest {
    pub part: PartId,
    pub quantity: Decimal,
    pub raw_materials: Vec<RawMaterialUsage>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProduceOutcome {
    pub pending_part: PendingPart,
    /// One WITHDRAWAL per raw material.
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub pending_part: PendingPartId,
    pub action: ReviewAction,
    pub reason: Option<String>,
}

/// Waste booked onto one scrap item.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapOutcome {
    pub scrap_item: StockItem,
    pub entry: LedgerEntry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub pending_part: PendingPart,
    /// DELIVERY of the accepted units into the part's stock.
    pub delivery: Option<LedgerEntry>,
    pub record: Option<ManufacturingRecord>,
    pub scrap: Vec<ScrapOutcome>,
}

impl<S: InventoryStore> InventoryEngine<S> {
    /// Consume raw materials into a quality hold.
    ///
    /// The finished part's stock is untouched until the run is reviewed.
    #[instrument(
        skip(self, request),
        fields(part = %request.part, quantity = %request.quantity),
        err
    )]
    pub fn produce_from_raw_materials(
        &self,
        request: ProduceRequest,
        actor: &str,
    ) -> ServiceResult<ProduceOutcome> {
        let outcome = self.transact(|ctx| {
            let part: StockItem = ctx.fetch(ItemRef::Part(request.part))?;
            let part_type = match part.details() {
                StockDetails::Part { part_type } => part_type.clone(),
                _ => None,
            };

            let stocks = raw_stocks(ctx, &request.raw_materials)?;
            let plan = consumption_plan(request.quantity, &request.raw_materials, |raw| {
                stocks
                    .get(&raw)
                    .cloned()
                    .ok_or_else(|| DomainError::not_found("stock item", raw))
            })?;

            let id = PendingPartId::from_seq(ctx.next_seq(IdPrefix::PendingPart));
            let mut entries = Vec::with_capacity(plan.len());
            for line in &plan {
                let item = ItemRef::RawItem(line.raw_item);
                let (_, change) = ctx.move_stock(
                    item,
                    StockCommand::Withdraw {
                        quantity: line.total_consumed,
                    },
                )?;
                let now = ctx.now();
                let entry = ctx.record(
                    NewLedgerEntry::new(
                        LedgerSubject::Item(item),
                        TransactionType::Withdrawal,
                        line.total_consumed,
                        line.unit_cost,
                        change.previous,
                        change.new,
                        actor,
                        now,
                    )
                    .with_reference(id.to_string(), "pending_part")
                    .with_notes(request.notes.clone())
                    .with_metadata(json!({
                        "part": request.part,
                        "quantity_per_unit": line.quantity_per_unit,
                    })),
                )?;
                entries.push(entry);
            }

            let pending = PendingPart::new(
                id,
                request.part,
                part.name(),
                part_type,
                request.quantity,
                plan,
                actor,
                ctx.now(),
            )?
            .with_notes(request.notes.clone());
            ctx.uow.insert(&pending)?;
            Ok(ProduceOutcome {
                pending_part: pending,
                entries,
            })
        })?;

        info!(
            pending_part = %outcome.pending_part.id_typed(),
            part = %request.part,
            quantity = %request.quantity,
            "production run awaiting review"
        );
        Ok(outcome)
    }

    /// Accept or reject a pending run.
    ///
    /// Accepted units are delivered into the part's stock with a manufacturing
    /// record; rejected units turn their share of raw material into scrap.
    #[instrument(skip(self, request), fields(pending_part = %request.pending_part), err)]
    pub fn review_pending_part(
        &self,
        request: ReviewRequest,
        inspector: &str,
    ) -> ServiceResult<ReviewOutcome> {
        let outcome = self.transact(|ctx| {
            let mut pending: PendingPart = ctx.fetch(request.pending_part)?;
            pending.execute(&PendingPartCommand::Review {
                action: request.action.clone(),
                reason: request.reason.clone(),
                inspector: inspector.to_string(),
                reviewed_at: ctx.now(),
            })?;
            let qc = pending
                .quality_control()
                .cloned()
                .ok_or_else(|| DomainError::invariant("review recorded no quality control"))?;

            let (delivery, record) = if qc.passed_quantity > Decimal::ZERO {
                let (entry, record) =
                    deliver_accepted(ctx, &pending, qc.passed_quantity, inspector)?;
                (Some(entry), Some(record))
            } else {
                (None, None)
            };

            let mut scrap = Vec::new();
            for waste in allocate_waste(&pending, qc.rejected_quantity) {
                scrap.push(book_scrap(ctx, &pending, &waste, qc.reason.clone(), inspector)?);
            }

            ctx.uow.save(&pending)?;
            Ok(ReviewOutcome {
                pending_part: pending,
                delivery,
                record,
                scrap,
            })
        })?;

        info!(
            pending_part = %outcome.pending_part.id_typed(),
            status = ?outcome.pending_part.status(),
            scrap_lines = outcome.scrap.len(),
            "pending part reviewed"
        );
        Ok(outcome)
    }
}

fn raw_stocks<U: UnitOfWork>(
    ctx: &mut TxContext<'_, U>,
    usages: &[RawMaterialUsage],
) -> ServiceResult<HashMap<RawItemId, RawStock>> {
    let mut stocks = HashMap::new();
    for usage in usages {
        let stock: StockItem = ctx.fetch(ItemRef::RawItem(usage.raw_item))?;
        stocks.insert(
            usage.raw_item,
            RawStock {
                name: stock.name().to_string(),
                on_hand: stock.quantity_on_hand(),
                unit_cost: stock.cost_per_unit(),
            },
        );
    }
    Ok(stocks)
}

fn deliver_accepted<U: UnitOfWork>(
    ctx: &mut TxContext<'_, U>,
    pending: &PendingPart,
    passed: Decimal,
    inspector: &str,
) -> ServiceResult<(LedgerEntry, ManufacturingRecord)> {
    let now = ctx.now();
    let item = ItemRef::Part(pending.part());
    let (_, change) = ctx.move_stock(
        item,
        StockCommand::Receive {
            quantity: passed,
            restocked_at: now,
        },
    )?;
    let unit_cost = pending
        .total_raw_cost()
        .checked_div(pending.quantity_created())
        .ok_or_else(|| {
            DomainError::validation(format!(
                "unit cost of {} is too large to represent",
                pending.id_typed()
            ))
        })?;
    let entry = ctx.record(
        NewLedgerEntry::new(
            LedgerSubject::Item(item),
            TransactionType::Delivery,
            passed,
            unit_cost,
            change.previous,
            change.new,
            inspector,
            now,
        )
        .with_reference(pending.id_typed().to_string(), "pending_part")
        .with_metadata(json!({ "source": "manufacturing" })),
    )?;

    let record_id = ManufacturingRecordId::from_seq(ctx.next_seq(IdPrefix::ManufacturingRecord));
    let record = ManufacturingRecord::from_acceptance(record_id, pending)?;
    ctx.uow.insert(&record)?;
    Ok((entry, record))
}

/// The scrap item collecting waste of `raw_item`, created on first use.
fn scrap_item_for<U: UnitOfWork>(
    ctx: &mut TxContext<'_, U>,
    waste: &WasteAllocation,
) -> ServiceResult<ItemRef> {
    if let Some(link) = ctx.uow.load::<ScrapLink>(&waste.raw_item.to_string())? {
        return Ok(ItemRef::Scrap(link.scrap_item));
    }

    let id = ScrapItemId::from_seq(ctx.next_seq(IdPrefix::ScrapItem));
    let item = StockItem::scrap_of(id, waste.raw_item, &waste.raw_name, waste.unit_cost)?;
    ctx.uow.insert(&item)?;
    ctx.uow.insert(&ScrapLink {
        raw_item: waste.raw_item,
        scrap_item: id,
    })?;
    info!(scrap_item = %id, raw_item = %waste.raw_item, "scrap item created");
    Ok(ItemRef::Scrap(id))
}

fn book_scrap<U: UnitOfWork>(
    ctx: &mut TxContext<'_, U>,
    pending: &PendingPart,
    waste: &WasteAllocation,
    reason: Option<String>,
    inspector: &str,
) -> ServiceResult<ScrapOutcome> {
    let item = scrap_item_for(ctx, waste)?;
    let now = ctx.now();
    let (scrap_item, change) = ctx.move_stock(
        item,
        StockCommand::AccumulateScrap(ScrapProvenance {
            pending_part: pending.id_typed(),
            quantity: waste.quantity,
            reason: reason.clone(),
            inspector: inspector.to_string(),
            recorded_at: now,
        }),
    )?;
    let entry = ctx.record(
        NewLedgerEntry::new(
            LedgerSubject::Item(item),
            TransactionType::Adjustment,
            waste.quantity,
            waste.unit_cost,
            change.previous,
            change.new,
            inspector,
            now,
        )
        .with_reference(pending.id_typed().to_string(), "scrap")
        .with_notes(reason)
        .with_metadata(json!({
            "raw_item": waste.raw_item,
            "part": pending.part(),
        })),
    )?;
    Ok(ScrapOutcome { scrap_item, entry })
}
