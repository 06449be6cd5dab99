//! Chart-of-accounts read model.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use telar_accounting::{AccountEvent, AccountFields};
use telar_events::EventEnvelope;

use crate::read_model::KeyedStore;

use super::{Cursors, ProjectionError};

/// Queryable account row, keyed by the account business key.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRow {
    pub key: String,
    pub fields: AccountFields,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct AccountsProjection<S>
where
    S: KeyedStore<String, AccountRow>,
{
    store: S,
    cursors: Cursors,
}

impl<S> AccountsProjection<S>
where
    S: KeyedStore<String, AccountRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<AccountRow> {
        self.store.get(&key.to_string())
    }

    /// Ordered by reporting code.
    pub fn list(&self) -> Vec<AccountRow> {
        let mut rows = self.store.list();
        rows.sort_by(|a, b| a.fields.code.cmp(&b.fields.code));
        rows
    }

    /// Deletion guard: does any account name this one as parent?
    pub fn has_children(&self, key: &str) -> bool {
        self.store
            .list()
            .iter()
            .any(|r| r.fields.parent_account.as_deref() == Some(key))
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.begin(aggregate_id, seq)? {
            return Ok(());
        }

        let event: AccountEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            AccountEvent::AccountCreated(e) => {
                self.store.upsert(
                    e.key.clone(),
                    AccountRow {
                        key: e.key,
                        fields: e.fields,
                        created_by: e.created_by,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            AccountEvent::AccountUpdated(e) => {
                if let Some(mut row) = self.store.get(&e.key) {
                    row.fields = e.fields;
                    row.updated_at = e.occurred_at;
                    self.store.upsert(e.key, row);
                }
            }
            AccountEvent::AccountDeleted(e) => {
                self.store.remove(&e.key);
            }
        }

        self.cursors.commit(aggregate_id, seq);
        Ok(())
    }
}
