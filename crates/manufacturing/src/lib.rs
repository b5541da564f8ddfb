//! Manufacturing domain module.
//!
//! Production runs land in a quality hold (`PendingPart`) and leave it exactly
//! once, through an accept or reject review. Accepted output produces a
//! `ManufacturingRecord`; rejected output is converted into proportional raw
//! material waste by `allocate_waste`.

pub mod pending;
pub mod record;
pub mod scrap;

pub use pending::{
    PendingPart, PendingPartCommand, PendingPartEvent, PendingPartStatus, QualityControl,
    RawMaterialConsumption, RawMaterialUsage, RawStock, ReviewAction, Reviewed, consumption_plan,
};
pub use record::ManufacturingRecord;
pub use scrap::{WasteAllocation, allocate_waste};
