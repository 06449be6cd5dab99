//! Stock read model: one row per (location, material) pair.
//!
//! A materialized view of the stock ledger streams; it cannot diverge from
//! the movement log because every row value is taken from the fold the
//! aggregate already carried out.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use telar_events::EventEnvelope;
use telar_inventory::StockEvent;

use crate::read_model::KeyedStore;

use super::{Cursors, ProjectionError};

/// Queryable stock row.
#[derive(Debug, Clone, PartialEq)]
pub struct StockRow {
    pub location: String,
    pub material: String,
    pub quantity: i64,
    pub unit: String,
    pub min_stock: i64,
    pub max_stock: i64,
    pub last_movement: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Stock projection keyed by (location code, material code).
#[derive(Debug)]
pub struct StockProjection<S>
where
    S: KeyedStore<(String, String), StockRow>,
{
    store: S,
    cursors: Cursors,
}

impl<S> StockProjection<S>
where
    S: KeyedStore<(String, String), StockRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, location: &str, material: &str) -> Option<StockRow> {
        self.store.get(&(location.to_string(), material.to_string()))
    }

    pub fn list(&self) -> Vec<StockRow> {
        let mut rows = self.store.list();
        rows.sort_by(|a, b| (&a.location, &a.material).cmp(&(&b.location, &b.material)));
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
                let key = (e.location.clone(), e.material.clone());
                let row = match self.store.get(&key) {
                    Some(mut row) => {
                        row.quantity = e.balance;
                        row.last_movement = Some(e.occurred_at);
                        row.updated_at = e.occurred_at;
                        row
                    }
                    None => StockRow {
                        location: e.location,
                        material: e.material,
                        quantity: e.balance,
                        unit: e.unit,
                        min_stock: 0,
                        max_stock: 0,
                        last_movement: Some(e.occurred_at),
                        updated_at: e.occurred_at,
                    },
                };
                self.store.upsert(key, row);
            }
            StockEvent::MovementReversed(e) => {
                let key = (e.location.clone(), e.material.clone());
                if let Some(mut row) = self.store.get(&key) {
                    row.quantity = e.balance;
                    row.last_movement = e.last_movement;
                    row.updated_at = e.occurred_at;
                    self.store.upsert(key, row);
                }
            }
            StockEvent::StockLevelsSet(e) => {
                let key = (e.location.clone(), e.material.clone());
                if let Some(mut row) = self.store.get(&key) {
                    row.min_stock = e.min_stock;
                    row.max_stock = e.max_stock;
                    row.updated_at = e.occurred_at;
                    self.store.upsert(key, row);
                }
            }
        }

        self.cursors.commit(aggregate_id, seq);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use telar_core::{Aggregate, AggregateId};
    use telar_inventory::{
        MovementKind, RecordMovement, StockCommand, StockLedger, StockLedgerId,
    };
    use uuid::Uuid;

    use crate::read_model::InMemoryKeyedStore;

    fn envelope(aggregate_id: AggregateId, seq: u64, event: &StockEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            aggregate_id,
            "inventory.stock",
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    #[test]
    fn movements_fold_into_the_stock_row() {
        let store: Arc<InMemoryKeyedStore<(String, String), StockRow>> =
            Arc::new(InMemoryKeyedStore::new());
        let projection = StockProjection::new(store);

        let ledger_id = StockLedgerId::for_pair("ALM-01", "MAT-001");
        let mut ledger = StockLedger::empty(ledger_id);
        let mut seq = 0u64;

        for (kind, qty) in [
            (MovementKind::Entrada, 100),
            (MovementKind::Salida, 30),
            (MovementKind::Ajuste, 12),
        ] {
            let events = ledger
                .handle(&StockCommand::RecordMovement(RecordMovement {
                    ledger_id,
                    movement_id: Uuid::now_v7(),
                    location: "ALM-01".to_string(),
                    material: "MAT-001".to_string(),
                    kind,
                    quantity: qty,
                    unit: "pza".to_string(),
                    note: String::new(),
                    recorded_by: "ana".to_string(),
                    occurred_at: Utc::now(),
                }))
                .unwrap();
            for ev in events {
                ledger.apply(&ev);
                seq += 1;
                projection.apply_envelope(&envelope(ledger_id.0, seq, &ev)).unwrap();
            }
        }

        let row = projection.get("ALM-01", "MAT-001").unwrap();
        assert_eq!(row.quantity, 12);
        assert_eq!(row.quantity, ledger.balance());
    }

    #[test]
    fn replayed_envelopes_are_ignored() {
        let store: Arc<InMemoryKeyedStore<(String, String), StockRow>> =
            Arc::new(InMemoryKeyedStore::new());
        let projection = StockProjection::new(store);

        let ledger_id = StockLedgerId::for_pair("ALM-01", "MAT-001");
        let ledger = StockLedger::empty(ledger_id);
        let events = ledger
            .handle(&StockCommand::RecordMovement(RecordMovement {
                ledger_id,
                movement_id: Uuid::now_v7(),
                location: "ALM-01".to_string(),
                material: "MAT-001".to_string(),
                kind: MovementKind::Entrada,
                quantity: 10,
                unit: "pza".to_string(),
                note: String::new(),
                recorded_by: "ana".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();

        let env = envelope(ledger_id.0, 1, &events[0]);
        projection.apply_envelope(&env).unwrap();
        projection.apply_envelope(&env).unwrap();

        assert_eq!(projection.get("ALM-01", "MAT-001").unwrap().quantity, 10);
    }
}
