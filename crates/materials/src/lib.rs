//! Materials domain module (event-sourced).
//!
//! Business rules for the material master and its reference catalog,
//! implemented as deterministic domain logic (no IO, no HTTP, no storage).

pub mod catalog;
pub mod material;

pub use catalog::{
    MaterialCatalog, MaterialCatalogCommand, MaterialCatalogEvent, MaterialCatalogId,
    MaterialType, Unit,
};
pub use material::{
    CreateMaterial, DeleteMaterial, Material, MaterialCommand, MaterialCreated, MaterialDeleted,
    MaterialEvent, MaterialFields, MaterialId, MaterialUpdated, UpdateMaterial,
};
