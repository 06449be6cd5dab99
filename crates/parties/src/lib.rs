//! Trading parties domain module (event-sourced).
//!
//! Suppliers, customers, and their reference catalog, as deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod catalog;
pub mod customer;
pub mod profile;
pub mod supplier;

pub use catalog::{
    Country, Currency, TradeCatalog, TradeCatalogCommand, TradeCatalogEvent, TradeCatalogId,
};
pub use customer::{
    CreateCustomer, Customer, CustomerCommand, CustomerCreated, CustomerDeleted, CustomerEvent,
    CustomerId, CustomerUpdated, DeleteCustomer, UpdateCustomer,
};
pub use profile::PartyProfile;
pub use supplier::{
    CreateSupplier, DeleteSupplier, Supplier, SupplierCommand, SupplierCreated, SupplierDeleted,
    SupplierEvent, SupplierId, SupplierUpdated, UpdateSupplier,
};
