//! Assembly domain module.
//!
//! Assemblies, their bills of materials, buildability checks and the
//! build / ship / dismantle counter transitions. Pure domain logic; stock
//! movements for components are orchestrated by the infra layer.

pub mod assembly;
pub mod bom;

pub use assembly::{
    Assembly, AssemblyCommand, AssemblyEvent, BomItem, ComponentAdded, ComponentRemoved,
    CounterMoved,
};
pub use bom::{Buildability, Requirement, can_build, requirements};
