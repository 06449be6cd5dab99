//! Sale order read model.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use telar_events::EventEnvelope;
use telar_sales::SaleEvent;

use crate::read_model::KeyedStore;

use super::{Cursors, ProjectionError};

/// Queryable sale row, keyed by the sale code.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleRow {
    pub code: String,
    pub customer: String,
    pub location: String,
    pub material: String,
    pub quantity: i64,
    pub unit: String,
    pub unit_price: f64,
    pub subtotal: f64,
    pub total_amount: f64,
    pub currency: String,
    pub debit_account: String,
    pub credit_account: String,
    pub recorded_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SalesProjection<S>
where
    S: KeyedStore<String, SaleRow>,
{
    store: S,
    cursors: Cursors,
}

impl<S> SalesProjection<S>
where
    S: KeyedStore<String, SaleRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, code: &str) -> Option<SaleRow> {
        self.store.get(&code.to_string())
    }

    /// Newest first, matching the list views.
    pub fn list(&self) -> Vec<SaleRow> {
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

        let event: SaleEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            SaleEvent::SaleRecorded(e) => {
                self.store.upsert(
                    e.code.clone(),
                    SaleRow {
                        code: e.code,
                        customer: e.customer,
                        location: e.location,
                        material: e.material,
                        quantity: e.quantity,
                        unit: e.unit,
                        unit_price: e.unit_price,
                        subtotal: e.subtotal,
                        total_amount: e.total_amount,
                        currency: e.currency,
                        debit_account: e.debit_account,
                        credit_account: e.credit_account,
                        recorded_by: e.recorded_by,
                        created_at: e.occurred_at,
                    },
                );
            }
        }

        self.cursors.commit(aggregate_id, seq);
        Ok(())
    }
}
