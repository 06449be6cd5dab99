//! `telar-infra` — event store, command dispatch, read models.
//!
//! Composes the domain crates with storage and transport. No HTTP here;
//! the API crate wires these pieces into handlers.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use read_model::{InMemoryKeyedStore, KeyedStore};
