//! Journal read models: posted entries and per-account running balances.
//!
//! Consumes two event families: manual postings from the accounting
//! journal, and sale-generated entries carried by `SaleRecorded` (the sale
//! bridge posts debit = total on the receivable account, credit = total on
//! the revenue account, referencing the sale code).

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use telar_accounting::{EntryLine, JournalEvent};
use telar_events::EventEnvelope;
use telar_sales::SaleEvent;

use crate::read_model::KeyedStore;

use super::{Cursors, ProjectionError};

/// Queryable journal entry row, keyed by entry id.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntryRow {
    pub entry_id: Uuid,
    pub date: NaiveDate,
    pub description: String,
    pub reference: Option<String>,
    pub lines: Vec<EntryLine>,
    pub recorded_by: String,
    pub created_at: DateTime<Utc>,
}

/// Per-account debit/credit running totals.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountBalanceRow {
    pub account: String,
    pub debit_total: f64,
    pub credit_total: f64,
}

impl AccountBalanceRow {
    pub fn balance(&self) -> f64 {
        self.debit_total - self.credit_total
    }
}

#[derive(Debug)]
pub struct JournalProjection<SE, SB>
where
    SE: KeyedStore<Uuid, JournalEntryRow>,
    SB: KeyedStore<String, AccountBalanceRow>,
{
    entries: SE,
    balances: SB,
    cursors: Cursors,
}

impl<SE, SB> JournalProjection<SE, SB>
where
    SE: KeyedStore<Uuid, JournalEntryRow>,
    SB: KeyedStore<String, AccountBalanceRow>,
{
    pub fn new(entries: SE, balances: SB) -> Self {
        Self {
            entries,
            balances,
            cursors: Cursors::new(),
        }
    }

    pub fn entry(&self, entry_id: &Uuid) -> Option<JournalEntryRow> {
        self.entries.get(entry_id)
    }

    /// Newest first, matching the list views.
    pub fn entries(&self) -> Vec<JournalEntryRow> {
        let mut rows = self.entries.list();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    pub fn balance(&self, account: &str) -> Option<AccountBalanceRow> {
        self.balances.get(&account.to_string())
    }

    pub fn balances(&self) -> Vec<AccountBalanceRow> {
        let mut rows = self.balances.list();
        rows.sort_by(|a, b| a.account.cmp(&b.account));
        rows
    }

    fn post(&self, row: JournalEntryRow) {
        for line in &row.lines {
            let mut balance = self.balances.get(&line.account).unwrap_or(AccountBalanceRow {
                account: line.account.clone(),
                debit_total: 0.0,
                credit_total: 0.0,
            });
            balance.debit_total += line.debit;
            balance.credit_total += line.credit;
            self.balances.upsert(line.account.clone(), balance);
        }
        self.entries.upsert(row.entry_id, row);
    }

    /// Apply an envelope from either the journal stream or a sale stream.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.begin(aggregate_id, seq)? {
            return Ok(());
        }

        match envelope.aggregate_type() {
            "sales.order" => {
                let event: SaleEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
                let SaleEvent::SaleRecorded(e) = event;

                self.post(JournalEntryRow {
                    // The envelope's event id doubles as the entry id for
                    // sale-generated entries.
                    entry_id: envelope.event_id(),
                    date: e.occurred_at.date_naive(),
                    description: format!("Venta {} - Cliente: {}", e.code, e.customer),
                    reference: Some(e.code.clone()),
                    lines: vec![
                        EntryLine {
                            account: e.debit_account.clone(),
                            debit: e.total_amount,
                            credit: 0.0,
                        },
                        EntryLine {
                            account: e.credit_account.clone(),
                            debit: 0.0,
                            credit: e.total_amount,
                        },
                    ],
                    recorded_by: e.recorded_by,
                    created_at: e.occurred_at,
                });
            }
            _ => {
                let event: JournalEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
                let JournalEvent::EntryPosted(e) = event;

                self.post(JournalEntryRow {
                    entry_id: e.entry_id,
                    date: e.date,
                    description: e.description,
                    reference: e.reference,
                    lines: e.lines,
                    recorded_by: e.recorded_by,
                    created_at: e.occurred_at,
                });
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

    use telar_accounting::{EntryPosted, JournalId};

    use crate::read_model::InMemoryKeyedStore;

    fn projection() -> JournalProjection<
        Arc<InMemoryKeyedStore<Uuid, JournalEntryRow>>,
        Arc<InMemoryKeyedStore<String, AccountBalanceRow>>,
    > {
        JournalProjection::new(
            Arc::new(InMemoryKeyedStore::new()),
            Arc::new(InMemoryKeyedStore::new()),
        )
    }

    #[test]
    fn posted_entries_accumulate_account_balances() {
        let projection = projection();
        let journal_id = JournalId::general();

        let event = JournalEvent::EntryPosted(EntryPosted {
            journal_id,
            entry_id: Uuid::now_v7(),
            date: "2024-06-15".parse().unwrap(),
            description: "Venta de contado".to_string(),
            reference: None,
            lines: vec![
                EntryLine { account: "1105".to_string(), debit: 200.0, credit: 0.0 },
                EntryLine { account: "4105".to_string(), debit: 0.0, credit: 200.0 },
            ],
            recorded_by: "ana".to_string(),
            occurred_at: Utc::now(),
        });

        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            journal_id.0,
            "accounting.journal",
            1,
            serde_json::to_value(&event).unwrap(),
        );
        projection.apply_envelope(&envelope).unwrap();

        assert_eq!(projection.entries().len(), 1);
        assert_eq!(projection.balance("1105").unwrap().balance(), 200.0);
        assert_eq!(projection.balance("4105").unwrap().balance(), -200.0);
    }
}
