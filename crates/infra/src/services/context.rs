//! Per-transaction helpers shared by the workflow services.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use stockledger_core::{Aggregate, DocumentNumber, DomainError, IdPrefix, ItemRef, TransactionId};
use stockledger_inventory::{QuantityChanged, StockCommand, StockEvent, StockItem};
use stockledger_ledger::{LedgerEntry, NewLedgerEntry, SequenceAllocator};

use crate::error::ServiceResult;
use crate::sequence::UowSequence;
use crate::store::{Document, UnitOfWork};

/// A unit of work plus the clock reading and allocator for one attempt.
pub(crate) struct TxContext<'a, U> {
    pub(crate) uow: &'a mut U,
    allocator: SequenceAllocator,
    now: DateTime<Utc>,
}

impl<'a, U: UnitOfWork> TxContext<'a, U> {
    pub(crate) fn new(uow: &'a mut U, allocator: SequenceAllocator, now: DateTime<Utc>) -> Self {
        Self {
            uow,
            allocator,
            now,
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Load a document that must exist.
    pub(crate) fn fetch<D: Document>(&mut self, key: impl core::fmt::Display) -> ServiceResult<D> {
        let key = key.to_string();
        match self.uow.load::<D>(&key)? {
            Some(doc) => Ok(doc),
            None => Err(DomainError::not_found(D::ENTITY, key).into()),
        }
    }

    /// Next document number for `prefix`, plus whether it is a timestamp fallback.
    pub(crate) fn allocate(&mut self, prefix: IdPrefix) -> (DocumentNumber, bool) {
        let allocation = self
            .allocator
            .allocate(&mut UowSequence::new(self.uow), prefix, self.now);
        if let Some(reason) = &allocation.fallback {
            warn!(
                %prefix,
                number = %allocation.number,
                ?reason,
                "sequence probing failed; using timestamp-derived number"
            );
        }
        (allocation.number, allocation.is_fallback())
    }

    pub(crate) fn next_seq(&mut self, prefix: IdPrefix) -> u64 {
        self.allocate(prefix).0.seq()
    }

    /// Number and append one ledger entry.
    pub(crate) fn record(&mut self, entry: NewLedgerEntry) -> ServiceResult<LedgerEntry> {
        let (number, fallback) = self.allocate(IdPrefix::Transaction);
        let entry = LedgerEntry::record(TransactionId::from_seq(number.seq()), fallback, entry)?;
        self.uow.insert(&entry)?;
        debug!(
            transaction_id = %entry.transaction_id,
            subject = %entry.subject,
            transaction_type = entry.transaction_type.as_str(),
            quantity = %entry.quantity,
            new_stock = %entry.new_stock,
            "ledger entry recorded"
        );
        Ok(entry)
    }

    /// Apply a stock command to an item and save it.
    pub(crate) fn move_stock(
        &mut self,
        item: ItemRef,
        command: StockCommand,
    ) -> ServiceResult<(StockItem, QuantityChanged)> {
        let mut stock: StockItem = self.fetch(item)?;
        let events = stock.execute(&command)?;
        let change = StockEvent::quantity_change(&events)
            .cloned()
            .ok_or_else(|| DomainError::invariant(format!("{item}: no quantity change recorded")))?;
        self.uow.save(&stock)?;
        Ok((stock, change))
    }
}
