//! Supplier and customer directory read models.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use telar_events::EventEnvelope;
use telar_parties::{CustomerEvent, PartyProfile, SupplierEvent};

use crate::read_model::KeyedStore;

use super::{Cursors, ProjectionError};

/// Queryable supplier row, keyed by the supplier code.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplierRow {
    pub code: String,
    pub profile: PartyProfile,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Queryable customer row, keyed by the customer code.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRow {
    pub code: String,
    pub profile: PartyProfile,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SuppliersProjection<S>
where
    S: KeyedStore<String, SupplierRow>,
{
    store: S,
    cursors: Cursors,
}

impl<S> SuppliersProjection<S>
where
    S: KeyedStore<String, SupplierRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, code: &str) -> Option<SupplierRow> {
        self.store.get(&code.to_string())
    }

    pub fn list(&self) -> Vec<SupplierRow> {
        let mut rows = self.store.list();
        rows.sort_by(|a, b| a.code.cmp(&b.code));
        rows
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.begin(aggregate_id, seq)? {
            return Ok(());
        }

        let event: SupplierEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            SupplierEvent::SupplierCreated(e) => {
                self.store.upsert(
                    e.code.clone(),
                    SupplierRow {
                        code: e.code,
                        profile: e.profile,
                        created_by: e.created_by,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            SupplierEvent::SupplierUpdated(e) => {
                if let Some(mut row) = self.store.get(&e.code) {
                    row.profile = e.profile;
                    row.updated_at = e.occurred_at;
                    self.store.upsert(e.code, row);
                }
            }
            SupplierEvent::SupplierDeleted(e) => {
                self.store.remove(&e.code);
            }
        }

        self.cursors.commit(aggregate_id, seq);
        Ok(())
    }
}

#[derive(Debug)]
pub struct CustomersProjection<S>
where
    S: KeyedStore<String, CustomerRow>,
{
    store: S,
    cursors: Cursors,
}

impl<S> CustomersProjection<S>
where
    S: KeyedStore<String, CustomerRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, code: &str) -> Option<CustomerRow> {
        self.store.get(&code.to_string())
    }

    pub fn list(&self) -> Vec<CustomerRow> {
        let mut rows = self.store.list();
        rows.sort_by(|a, b| a.code.cmp(&b.code));
        rows
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.begin(aggregate_id, seq)? {
            return Ok(());
        }

        let event: CustomerEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            CustomerEvent::CustomerCreated(e) => {
                self.store.upsert(
                    e.code.clone(),
                    CustomerRow {
                        code: e.code,
                        profile: e.profile,
                        created_by: e.created_by,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            CustomerEvent::CustomerUpdated(e) => {
                if let Some(mut row) = self.store.get(&e.code) {
                    row.profile = e.profile;
                    row.updated_at = e.occurred_at;
                    self.store.upsert(e.code, row);
                }
            }
            CustomerEvent::CustomerDeleted(e) => {
                self.store.remove(&e.code);
            }
        }

        self.cursors.commit(aggregate_id, seq);
        Ok(())
    }
}
