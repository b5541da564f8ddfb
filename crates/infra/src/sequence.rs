//! Document number allocation inside a unit of work.

use stockledger_core::{DocumentNumber, IdPrefix};
use stockledger_ledger::SequenceSource;

use crate::error::StoreError;
use crate::store::{UnitOfWork, collection_for};

/// Exposes a unit of work to the `SequenceAllocator`.
///
/// `highest` reads the store's per-prefix counter, `is_taken` probes the
/// prefix's collection and `claim` reserves the number in the counter.
pub struct UowSequence<'a, U> {
    uow: &'a mut U,
}

impl<'a, U: UnitOfWork> UowSequence<'a, U> {
    pub fn new(uow: &'a mut U) -> Self {
        Self { uow }
    }
}

impl<U: UnitOfWork> SequenceSource for UowSequence<'_, U> {
    type Error = StoreError;

    fn highest(&mut self, prefix: IdPrefix) -> Result<Option<u64>, StoreError> {
        self.uow.highest_sequence(prefix)
    }

    fn is_taken(&mut self, number: DocumentNumber) -> Result<bool, StoreError> {
        self.uow.probe(collection_for(number.prefix()), &number.to_string())
    }

    fn claim(&mut self, number: DocumentNumber) {
        self.uow.reserve(number);
    }
}
