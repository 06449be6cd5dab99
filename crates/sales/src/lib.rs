//! Sales domain module (event-sourced).
//!
//! The sale decision of the inventory+ledger bridge, implemented as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod order;

pub use order::{
    RecordSale, SaleCommand, SaleEvent, SaleOrder, SaleOrderId, SaleRecorded,
};
