//! Infrastructure layer: document store, units of work, ID allocation and the
//! workflow services that compose the domain crates atomically.

pub mod config;
pub mod engine;
pub mod error;
pub mod sequence;
pub mod services;
pub mod store;
pub mod transaction;

pub use config::{ConfigError, EngineConfig};
pub use engine::InventoryEngine;
pub use error::{ServiceError, ServiceResult, StoreError};
pub use services::{
    BuildOutcome, BuildRequest, DismantleRequest, NewPart, NewPurchaseOrder, NewRawItem,
    ProduceOutcome, ProduceRequest, ReceiveOutcome, ReceiveRequest, ReviewOutcome,
    ReviewRequest, ScrapOutcome, ShipOutcome, ShipRequest, ShippingInfo,
};
pub use store::{Document, InMemoryStore, InventoryStore, ScrapLink, UnitOfWork};
pub use transaction::run_in_transaction;
