//! Ledger domain module.
//!
//! Append-only record of every stock mutation, plus the sequential document
//! number allocator shared by all record types. Pure domain logic: the infra
//! layer persists entries and supplies the sequence lookups.

pub mod entry;
pub mod sequence;

pub use entry::{Direction, LedgerEntry, LedgerSubject, NewLedgerEntry, TransactionType};
pub use sequence::{
    Allocation, DEFAULT_PROBE_LIMIT, FallbackReason, SequenceAllocator, SequenceSource,
};
