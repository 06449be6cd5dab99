//! Accounting domain module (event-sourced).
//!
//! The general journal, the chart of accounts and its reference catalog,
//! implemented as deterministic domain logic (no IO, no HTTP, no storage).

pub mod account;
pub mod catalog;
pub mod journal;

pub use account::{
    Account, AccountCommand, AccountCreated, AccountDeleted, AccountEvent, AccountFields,
    AccountId, AccountUpdated, CreateAccount, DeleteAccount, UpdateAccount,
};
pub use catalog::{
    AccountCatalog, AccountCatalogCommand, AccountCatalogEvent, AccountCatalogId, AccountGroup,
    AccountNature, AccountType,
};
pub use journal::{
    BALANCE_TOLERANCE, EntryLine, EntryPosted, Journal, JournalCommand, JournalEvent, JournalId,
    PostEntry,
};
