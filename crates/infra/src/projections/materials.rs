//! Material master read model.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use telar_events::EventEnvelope;
use telar_materials::MaterialEvent;

use crate::read_model::KeyedStore;

use super::{Cursors, ProjectionError};

/// Queryable material row, keyed by the material code.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialRow {
    pub code: String,
    pub name: String,
    pub description: String,
    pub unit: String,
    pub material_type: String,
    pub active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct MaterialsProjection<S>
where
    S: KeyedStore<String, MaterialRow>,
{
    store: S,
    cursors: Cursors,
}

impl<S> MaterialsProjection<S>
where
    S: KeyedStore<String, MaterialRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, code: &str) -> Option<MaterialRow> {
        self.store.get(&code.to_string())
    }

    pub fn list(&self) -> Vec<MaterialRow> {
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

        let event: MaterialEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            MaterialEvent::MaterialCreated(e) => {
                self.store.upsert(
                    e.code.clone(),
                    MaterialRow {
                        code: e.code,
                        name: e.fields.name,
                        description: e.fields.description,
                        unit: e.fields.unit,
                        material_type: e.fields.material_type,
                        active: e.fields.active,
                        created_by: e.created_by,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            MaterialEvent::MaterialUpdated(e) => {
                if let Some(mut row) = self.store.get(&e.code) {
                    row.name = e.fields.name;
                    row.description = e.fields.description;
                    row.unit = e.fields.unit;
                    row.material_type = e.fields.material_type;
                    row.active = e.fields.active;
                    row.updated_at = e.occurred_at;
                    self.store.upsert(e.code, row);
                }
            }
            MaterialEvent::MaterialDeleted(e) => {
                self.store.remove(&e.code);
            }
        }

        self.cursors.commit(aggregate_id, seq);
        Ok(())
    }
}
