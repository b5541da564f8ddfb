//! Workflow entry point.
//!
//! `InventoryEngine` owns a store handle and configuration. Every mutating
//! operation (see `services`) runs as one unit of work through
//! `run_in_transaction`: it either commits all of its stock changes, counters,
//! documents and ledger entries, or none of them.

use chrono::Utc;

use stockledger_core::{ItemRef, PendingPartId};
use stockledger_inventory::StockItem;
use stockledger_ledger::{LedgerEntry, SequenceAllocator};
use stockledger_manufacturing::PendingPart;
use stockledger_purchasing::{PurchaseOrderId, Receipt};

use crate::config::EngineConfig;
use crate::error::ServiceResult;
use crate::services::context::TxContext;
use crate::store::{Document, InventoryStore};
use crate::transaction::run_in_transaction;

#[derive(Debug, Clone)]
pub struct InventoryEngine<S> {
    store: S,
    config: EngineConfig,
    allocator: SequenceAllocator,
}

impl<S: InventoryStore> InventoryEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            allocator: SequenceAllocator::new(config.id_probe_limit),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn transact<T, F>(&self, mut work: F) -> ServiceResult<T>
    where
        F: FnMut(&mut TxContext<'_, S::Tx>) -> ServiceResult<T>,
    {
        let allocator = self.allocator;
        run_in_transaction(&self.store, &self.config, |uow| {
            let mut ctx = TxContext::new(uow, allocator, Utc::now());
            work(&mut ctx)
        })
    }

    /// Committed document by key, or `NotFound`.
    pub fn get<D: Document>(&self, key: impl core::fmt::Display) -> ServiceResult<D> {
        let key = key.to_string();
        self.store
            .get::<D>(&key)?
            .ok_or_else(|| stockledger_core::DomainError::not_found(D::ENTITY, key).into())
    }

    pub fn stock_item(&self, item: ItemRef) -> ServiceResult<StockItem> {
        self.get(item)
    }

    /// Stock items below their minimum stock level.
    pub fn low_stock_items(&self) -> ServiceResult<Vec<StockItem>> {
        Ok(self
            .store
            .scan::<StockItem>()?
            .into_iter()
            .filter(StockItem::is_below_min)
            .collect())
    }

    /// Every ledger entry about `item`, in transaction order.
    pub fn ledger_for_item(&self, item: ItemRef) -> ServiceResult<Vec<LedgerEntry>> {
        self.ledger_where(|e| e.subject.item() == Some(item))
    }

    /// Every ledger entry whose reference is `reference`.
    ///
    /// References are assembly, order or pending part numbers.
    pub fn ledger_for_reference(&self, reference: &str) -> ServiceResult<Vec<LedgerEntry>> {
        self.ledger_where(|e| e.reference.as_deref() == Some(reference))
    }

    pub fn ledger(&self) -> ServiceResult<Vec<LedgerEntry>> {
        self.ledger_where(|_| true)
    }

    fn ledger_where<P>(&self, predicate: P) -> ServiceResult<Vec<LedgerEntry>>
    where
        P: Fn(&LedgerEntry) -> bool,
    {
        let mut entries: Vec<LedgerEntry> = self
            .store
            .scan::<LedgerEntry>()?
            .into_iter()
            .filter(|e| predicate(e))
            .collect();
        entries.sort_by_key(|e| (e.occurred_at, e.transaction_id));
        Ok(entries)
    }

    pub fn receipts_for_order(&self, order: PurchaseOrderId) -> ServiceResult<Vec<Receipt>> {
        let mut receipts: Vec<Receipt> = self
            .store
            .scan::<Receipt>()?
            .into_iter()
            .filter(|r| r.order == order)
            .collect();
        receipts.sort_by_key(|r| (r.received_at, r.id));
        Ok(receipts)
    }

    pub fn pending_part(&self, id: PendingPartId) -> ServiceResult<PendingPart> {
        self.get(id)
    }

    /// Production runs still on quality hold, oldest first.
    pub fn pending_parts_awaiting_review(&self) -> ServiceResult<Vec<PendingPart>> {
        let mut pending: Vec<PendingPart> = self
            .store
            .scan::<PendingPart>()?
            .into_iter()
            .filter(PendingPart::is_pending)
            .collect();
        pending.sort_by_key(|p| (p.created_at(), p.id_typed()));
        Ok(pending)
    }
}
