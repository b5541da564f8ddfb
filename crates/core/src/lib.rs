//! `stockledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the error taxonomy, aggregate traits, and the human-readable document
//! numbers shared by every other crate.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod item;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult, ErrorKind, Shortage};
pub use id::{
    AssemblyId, DocumentNumber, IdPrefix, ManufacturingRecordId, PartId, PendingPartId, RawItemId,
    ReceiptId, ScrapItemId, TransactionId,
};
pub use item::{ItemKind, ItemRef};
