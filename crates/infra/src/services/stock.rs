use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use stockledger_core::{DomainError, IdPrefix, ItemRef, PartId, RawItemId};
use stockledger_inventory::{StockCommand, StockDetails, StockItem};
use stockledger_ledger::{LedgerEntry, LedgerSubject, NewLedgerEntry, TransactionType};

use super::context::TxContext;
use crate::engine::InventoryEngine;
use crate::error::ServiceResult;
use crate::store::{InventoryStore, UnitOfWork};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPart {
    pub name: String,
    pub part_type: Option<String>,
    pub cost_per_unit: Decimal,
    #[serde(default)]
    pub min_stock_level: Decimal,
    #[serde(default)]
    pub opening_quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRawItem {
    pub name: String,
    pub unit_of_measure: Option<String>,
    pub cost_per_unit: Decimal,
    #[serde(default)]
    pub min_stock_level: Decimal,
    #[serde(default)]
    pub opening_quantity: Decimal,
}

impl<S: InventoryStore> InventoryEngine<S> {
    #[instrument(skip(self, part), fields(name = %part.name), err)]
    pub fn create_part(&self, part: NewPart, actor: &str) -> ServiceResult<StockItem> {
        let item = self.transact(|ctx| {
            let id = ItemRef::Part(PartId::from_seq(ctx.next_seq(IdPrefix::Part)));
            let item = StockItem::new(
                id,
                part.name.clone(),
                part.cost_per_unit,
                part.min_stock_level,
                StockDetails::Part {
                    part_type: part.part_type.clone(),
                },
            )?;
            open_stock(ctx, item, part.opening_quantity, actor)
        })?;
        info!(item = %item.item_ref(), "part created");
        Ok(item)
    }

    #[instrument(skip(self, raw), fields(name = %raw.name), err)]
    pub fn create_raw_item(&self, raw: NewRawItem, actor: &str) -> ServiceResult<StockItem> {
        let item = self.transact(|ctx| {
            let id = ItemRef::RawItem(RawItemId::from_seq(ctx.next_seq(IdPrefix::RawItem)));
            let item = StockItem::new(
                id,
                raw.name.clone(),
                raw.cost_per_unit,
                raw.min_stock_level,
                StockDetails::RawItem {
                    unit_of_measure: raw.unit_of_measure.clone(),
                },
            )?;
            open_stock(ctx, item, raw.opening_quantity, actor)
        })?;
        info!(item = %item.item_ref(), "raw item created");
        Ok(item)
    }

    /// Set an item's quantity on hand, recording an ADJUSTMENT.
    #[instrument(skip(self, reason), err)]
    pub fn adjust_stock(
        &self,
        item: ItemRef,
        new_quantity: Decimal,
        reason: Option<String>,
        actor: &str,
    ) -> ServiceResult<LedgerEntry> {
        let entry = self.transact(|ctx| {
            let (stock, change) =
                ctx.move_stock(item, StockCommand::SetQuantity { quantity: new_quantity })?;
            let now = ctx.now();
            ctx.record(
                NewLedgerEntry::new(
                    LedgerSubject::Item(item),
                    TransactionType::Adjustment,
                    change.delta().abs(),
                    stock.cost_per_unit(),
                    change.previous,
                    change.new,
                    actor,
                    now,
                )
                .with_reference(item.to_string(), "stock_adjustment")
                .with_notes(reason.clone()),
            )
        })?;
        info!(
            transaction_id = %entry.transaction_id,
            new_stock = %entry.new_stock,
            "stock adjusted"
        );
        Ok(entry)
    }

    /// Take stock out of an item, recording a WITHDRAWAL.
    #[instrument(skip(self, reason), err)]
    pub fn withdraw_stock(
        &self,
        item: ItemRef,
        quantity: Decimal,
        reason: Option<String>,
        actor: &str,
    ) -> ServiceResult<LedgerEntry> {
        let entry = self.transact(|ctx| {
            let (stock, change) = ctx.move_stock(item, StockCommand::Withdraw { quantity })?;
            let now = ctx.now();
            ctx.record(
                NewLedgerEntry::new(
                    LedgerSubject::Item(item),
                    TransactionType::Withdrawal,
                    quantity,
                    stock.cost_per_unit(),
                    change.previous,
                    change.new,
                    actor,
                    now,
                )
                .with_reference(item.to_string(), "stock_withdrawal")
                .with_notes(reason.clone()),
            )
        })?;
        info!(
            transaction_id = %entry.transaction_id,
            new_stock = %entry.new_stock,
            "stock withdrawn"
        );
        Ok(entry)
    }
}

/// Insert a new item and book its opening balance as an ADJUSTMENT.
fn open_stock<U: UnitOfWork>(
    ctx: &mut TxContext<'_, U>,
    item: StockItem,
    opening_quantity: Decimal,
    actor: &str,
) -> ServiceResult<StockItem> {
    if opening_quantity < Decimal::ZERO {
        return Err(DomainError::validation("opening quantity cannot be negative").into());
    }
    ctx.uow.insert(&item)?;
    if opening_quantity.is_zero() {
        return Ok(item);
    }

    let id = item.item_ref();
    let (stock, change) = ctx.move_stock(
        id,
        StockCommand::SetQuantity {
            quantity: opening_quantity,
        },
    )?;
    let now = ctx.now();
    ctx.record(
        NewLedgerEntry::new(
            LedgerSubject::Item(id),
            TransactionType::Adjustment,
            opening_quantity,
            stock.cost_per_unit(),
            change.previous,
            change.new,
            actor,
            now,
        )
        .with_reference(id.to_string(), "opening_balance"),
    )?;
    Ok(stock)
}
