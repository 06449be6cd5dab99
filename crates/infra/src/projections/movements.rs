//! Movement log read model: one row per live (not reversed) movement.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use telar_events::EventEnvelope;
use telar_inventory::{MovementKind, StockEvent};

use crate::read_model::KeyedStore;

use super::{Cursors, ProjectionError};

/// Queryable movement row.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementRow {
    pub movement_id: Uuid,
    pub location: String,
    pub material: String,
    pub kind: MovementKind,
    pub quantity: i64,
    pub unit: String,
    pub note: String,
    pub recorded_by: String,
    pub created_at: DateTime<Utc>,
}

/// Movement projection keyed by movement id. Reversed movements disappear
/// from the list (deletion semantics).
#[derive(Debug)]
pub struct MovementsProjection<S>
where
    S: KeyedStore<Uuid, MovementRow>,
{
    store: S,
    cursors: Cursors,
}

impl<S> MovementsProjection<S>
where
    S: KeyedStore<Uuid, MovementRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, movement_id: &Uuid) -> Option<MovementRow> {
        self.store.get(movement_id)
    }

    /// Newest first, matching the list views.
    pub fn list(&self) -> Vec<MovementRow> {
        let mut rows = self.store.list();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.begin(aggregate_id, seq)? {
            return Ok(());
        }

        let event: StockEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            StockEvent::MovementRecorded(e) => {
                self.store.upsert(
                    e.movement_id,
                    MovementRow {
                        movement_id: e.movement_id,
                        location: e.location,
                        material: e.material,
                        kind: e.kind,
                        quantity: e.quantity,
                        unit: e.unit,
                        note: e.note,
                        recorded_by: e.recorded_by,
                        created_at: e.occurred_at,
                    },
                );
            }
            StockEvent::MovementReversed(e) => {
                self.store.remove(&e.movement_id);
            }
            StockEvent::StockLevelsSet(_) => {}
        }

        self.cursors.commit(aggregate_id, seq);
        Ok(())
    }
}
