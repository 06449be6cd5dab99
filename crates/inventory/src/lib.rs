//! Inventory domain module (event-sourced).
//!
//! Locations and the per-(location, material) stock ledger, implemented as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod location;
pub mod stock;

pub use location::{
    CreateLocation, DeleteLocation, Location, LocationCommand, LocationCreated, LocationDeleted,
    LocationEvent, LocationFields, LocationId, LocationUpdated, UpdateLocation,
};
pub use stock::{
    MovementKind, MovementRecorded, MovementReversed, RecordMovement, ReverseMovement,
    SetStockLevels, StockCommand, StockEvent, StockLedger, StockLedgerId, StockLevelsSet,
};
