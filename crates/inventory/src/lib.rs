//! Inventory domain module.
//!
//! Current quantity on hand for Parts, RawItems and ScrapItems, implemented
//! purely as deterministic domain logic (no IO, no storage). Every quantity
//! change is surfaced as a `QuantityChanged` event so callers can write the
//! matching ledger entry.

pub mod item;

pub use item::{
    QuantityChanged, ScrapProvenance, StockCommand, StockDetails, StockEvent, StockItem,
};
