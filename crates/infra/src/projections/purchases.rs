//! Purchase order read model.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;

use telar_events::EventEnvelope;
use telar_purchasing::{OrderLine, OrderStatus, PurchaseOrderEvent};

use crate::read_model::KeyedStore;

use super::{Cursors, ProjectionError};

/// Queryable purchase order row (header + lines), keyed by the order code.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseOrderRow {
    pub code: String,
    pub supplier: String,
    pub issue_date: NaiveDate,
    pub estimated_delivery_date: NaiveDate,
    pub status: OrderStatus,
    pub currency: String,
    pub notes: String,
    pub total_amount: f64,
    pub lines: Vec<OrderLine>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct PurchasesProjection<S>
where
    S: KeyedStore<String, PurchaseOrderRow>,
{
    store: S,
    cursors: Cursors,
}

impl<S> PurchasesProjection<S>
where
    S: KeyedStore<String, PurchaseOrderRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, code: &str) -> Option<PurchaseOrderRow> {
        self.store.get(&code.to_string())
    }

    /// Newest first, matching the list views.
    pub fn list(&self) -> Vec<PurchaseOrderRow> {
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

        let event: PurchaseOrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            PurchaseOrderEvent::OrderCreated(e) => {
                self.store.upsert(
                    e.code.clone(),
                    PurchaseOrderRow {
                        code: e.code,
                        supplier: e.supplier,
                        issue_date: e.issue_date,
                        estimated_delivery_date: e.estimated_delivery_date,
                        status: e.status,
                        currency: e.currency,
                        notes: e.notes,
                        total_amount: e.total_amount,
                        lines: e.lines,
                        created_by: e.created_by,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            PurchaseOrderEvent::OrderRevised(e) => {
                if let Some(mut row) = self.store.get(&e.code) {
                    row.supplier = e.supplier;
                    row.issue_date = e.issue_date;
                    row.estimated_delivery_date = e.estimated_delivery_date;
                    row.currency = e.currency;
                    row.notes = e.notes;
                    row.total_amount = e.total_amount;
                    row.lines = e.lines;
                    row.updated_at = e.occurred_at;
                    self.store.upsert(e.code, row);
                }
            }
            PurchaseOrderEvent::StatusChanged(e) => {
                if let Some(mut row) = self.store.get(&e.code) {
                    row.status = e.to;
                    row.updated_at = e.occurred_at;
                    self.store.upsert(e.code, row);
                }
            }
            PurchaseOrderEvent::OrderDeleted(e) => {
                self.store.remove(&e.code);
            }
            PurchaseOrderEvent::GoodsReceived(e) => {
                if let Some(mut row) = self.store.get(&e.code) {
                    for receipt in &e.receipts {
                        if let Some(line) =
                            row.lines.iter_mut().find(|l| l.position == receipt.position)
                        {
                            line.resolved_quantity += receipt.quantity;
                        }
                    }
                    row.updated_at = e.occurred_at;
                    self.store.upsert(e.code, row);
                }
            }
        }

        self.cursors.commit(aggregate_id, seq);
        Ok(())
    }
}
