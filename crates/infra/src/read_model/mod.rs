//! Read model storage abstractions.

pub mod keyed_store;

pub use keyed_store::{InMemoryKeyedStore, KeyedStore};
