//! Workflow services.
//!
//! Each public method on `InventoryEngine` defined here is one atomic
//! workflow verb. The pattern is the same everywhere:
//!
//! 1. load the aggregates involved inside a `TxContext`,
//! 2. let the aggregates decide (`execute`), which validates before anything
//!    is written,
//! 3. apply stock movements and record one ledger entry per movement,
//! 4. save documents; `run_in_transaction` commits or discards everything.

pub(crate) mod context;

mod assembly;
mod manufacturing;
mod receiving;
mod stock;

pub use assembly::{
    BuildOutcome, BuildRequest, DismantleRequest, ShipOutcome, ShipRequest, ShippingInfo,
};
pub use manufacturing::{ProduceOutcome, ProduceRequest, ReviewOutcome, ReviewRequest, ScrapOutcome};
pub use receiving::{NewPurchaseOrder, ReceiveOutcome, ReceiveRequest};
pub use stock::{NewPart, NewRawItem};
