//! Location read model.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use telar_events::EventEnvelope;
use telar_inventory::LocationEvent;

use crate::read_model::KeyedStore;

use super::{Cursors, ProjectionError};

/// Queryable location row, keyed by the location code.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRow {
    pub code: String,
    pub name: String,
    pub address: String,
    pub main_location: bool,
    pub active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct LocationsProjection<S>
where
    S: KeyedStore<String, LocationRow>,
{
    store: S,
    cursors: Cursors,
}

impl<S> LocationsProjection<S>
where
    S: KeyedStore<String, LocationRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, code: &str) -> Option<LocationRow> {
        self.store.get(&code.to_string())
    }

    pub fn list(&self) -> Vec<LocationRow> {
        let mut rows = self.store.list();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    /// The designated default warehouse for full receipts: the first
    /// active location flagged as main.
    pub fn main_location(&self) -> Option<LocationRow> {
        self.list().into_iter().find(|l| l.active && l.main_location)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.begin(aggregate_id, seq)? {
            return Ok(());
        }

        let event: LocationEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            LocationEvent::LocationCreated(e) => {
                self.store.upsert(
                    e.code.clone(),
                    LocationRow {
                        code: e.code,
                        name: e.fields.name,
                        address: e.fields.address,
                        main_location: e.fields.main_location,
                        active: e.fields.active,
                        created_by: e.created_by,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            LocationEvent::LocationUpdated(e) => {
                if let Some(mut row) = self.store.get(&e.code) {
                    row.name = e.fields.name;
                    row.address = e.fields.address;
                    row.main_location = e.fields.main_location;
                    row.active = e.fields.active;
                    row.updated_at = e.occurred_at;
                    self.store.upsert(e.code, row);
                }
            }
            LocationEvent::LocationDeleted(e) => {
                self.store.remove(&e.code);
            }
        }

        self.cursors.commit(aggregate_id, seq);
        Ok(())
    }
}
