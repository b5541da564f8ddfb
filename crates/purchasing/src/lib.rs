//! Purchasing domain module (Part and RawItem purchase orders).
//!
//! This crate contains the business rules for purchase orders and partial
//! receiving, implemented purely as deterministic domain logic (no IO, no
//! storage). Stock and ledger effects of a receipt are applied by the infra
//! layer from the `LinesReceived` event.

pub mod order;
pub mod receipt;

pub use order::{
    LineReceipt, LinesReceived, NewOrderLine, OrderKind, OrderLine, OrderPatch, PurchaseOrder,
    PurchaseOrderCommand, PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderStatus,
    PurchaseOrderUpdated, ReceivedLine, derive_status,
};
pub use receipt::{Receipt, ReceiptCondition, ReceiptLine};
