//! General journal: balanced double-entry postings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use telar_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use telar_events::Event;

/// Accepted rounding slack when comparing debit and credit totals.
pub const BALANCE_TOLERANCE: f64 = 0.001;

/// Journal identifier (one general journal per deployment).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JournalId(pub AggregateId);

impl JournalId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn general() -> Self {
        Self(AggregateId::derive("accounting.journal", "general"))
    }
}

impl core::fmt::Display for JournalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One line of an entry: debit and credit are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryLine {
    pub account: String,
    pub debit: f64,
    pub credit: f64,
}

/// Aggregate root: Journal.
///
/// The journal holds no balances; those are derived by the account-balance
/// projection over posted entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Journal {
    id: JournalId,
    posted_entries: u64,
    version: u64,
}

impl Journal {
    /// Empty aggregate for rehydration.
    pub fn empty(id: JournalId) -> Self {
        Self {
            id,
            posted_entries: 0,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> JournalId {
        self.id
    }

    pub fn posted_entries(&self) -> u64 {
        self.posted_entries
    }
}

impl AggregateRoot for Journal {
    type Id = JournalId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PostEntry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostEntry {
    pub journal_id: JournalId,
    /// Caller-supplied so decisions stay deterministic.
    pub entry_id: Uuid,
    pub date: NaiveDate,
    pub description: String,
    pub reference: Option<String>,
    pub lines: Vec<EntryLine>,
    pub recorded_by: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalCommand {
    PostEntry(PostEntry),
}

/// Event: EntryPosted. Lines are already filtered: zero-value lines are
/// dropped, every stored line carries exactly one side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPosted {
    pub journal_id: JournalId,
    pub entry_id: Uuid,
    pub date: NaiveDate,
    pub description: String,
    pub reference: Option<String>,
    pub lines: Vec<EntryLine>,
    pub recorded_by: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalEvent {
    EntryPosted(EntryPosted),
}

impl Event for JournalEvent {
    fn event_type(&self) -> &'static str {
        match self {
            JournalEvent::EntryPosted(_) => "accounting.journal.entry_posted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            JournalEvent::EntryPosted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Journal {
    type Command = JournalCommand;
    type Event = JournalEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            JournalEvent::EntryPosted(_) => {
                self.posted_entries += 1;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            JournalCommand::PostEntry(cmd) => self.handle_post(cmd),
        }
    }
}

impl Journal {
    fn handle_post(&self, cmd: &PostEntry) -> Result<Vec<JournalEvent>, DomainError> {
        let mut total_debit = 0.0f64;
        let mut total_credit = 0.0f64;
        let mut stored = Vec::new();

        for line in &cmd.lines {
            if line.account.trim().is_empty() {
                return Err(DomainError::validation("entry line is missing an account"));
            }
            if line.debit < 0.0 || line.credit < 0.0 {
                return Err(DomainError::validation("amounts cannot be negative"));
            }
            if line.debit > 0.0 && line.credit > 0.0 {
                return Err(DomainError::validation(
                    "a line cannot carry both a debit and a credit",
                ));
            }
            // Zero-value lines are dropped, not stored.
            if line.debit == 0.0 && line.credit == 0.0 {
                continue;
            }

            total_debit += line.debit;
            total_credit += line.credit;
            stored.push(line.clone());
        }

        if stored.is_empty() {
            return Err(DomainError::validation("entry must have at least one line"));
        }

        if (total_debit - total_credit).abs() > BALANCE_TOLERANCE {
            return Err(DomainError::invariant(format!(
                "entry is not balanced (debit {total_debit:.2}, credit {total_credit:.2})"
            )));
        }

        Ok(vec![JournalEvent::EntryPosted(EntryPosted {
            journal_id: cmd.journal_id,
            entry_id: cmd.entry_id,
            date: cmd.date,
            description: cmd.description.clone(),
            reference: cmd.reference.clone(),
            lines: stored,
            recorded_by: cmd.recorded_by.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn date() -> NaiveDate {
        "2024-06-15".parse().unwrap()
    }

    fn post(lines: Vec<EntryLine>) -> JournalCommand {
        JournalCommand::PostEntry(PostEntry {
            journal_id: JournalId::general(),
            entry_id: Uuid::now_v7(),
            date: date(),
            description: "Asiento de prueba".to_string(),
            reference: None,
            lines,
            recorded_by: "ana".to_string(),
            occurred_at: test_time(),
        })
    }

    fn line(account: &str, debit: f64, credit: f64) -> EntryLine {
        EntryLine { account: account.to_string(), debit, credit }
    }

    #[test]
    fn balanced_entry_is_accepted() {
        let journal = Journal::empty(JournalId::general());
        let events = journal
            .handle(&post(vec![line("1105", 100.0, 0.0), line("4105", 0.0, 100.0)]))
            .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn unbalanced_entry_is_rejected_wholesale() {
        let journal = Journal::empty(JournalId::general());
        let err = journal
            .handle(&post(vec![line("1105", 100.0, 0.0), line("4105", 0.0, 99.0)]))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn imbalance_within_tolerance_is_accepted() {
        let journal = Journal::empty(JournalId::general());
        let events = journal
            .handle(&post(vec![line("1105", 100.0005, 0.0), line("4105", 0.0, 100.0)]))
            .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn zero_value_lines_are_dropped_not_stored() {
        let journal = Journal::empty(JournalId::general());
        let events = journal
            .handle(&post(vec![
                line("1105", 100.0, 0.0),
                line("2105", 0.0, 0.0),
                line("4105", 0.0, 100.0),
            ]))
            .unwrap();

        match &events[0] {
            JournalEvent::EntryPosted(e) => assert_eq!(e.lines.len(), 2),
        }
    }

    #[test]
    fn a_line_cannot_carry_both_sides() {
        let journal = Journal::empty(JournalId::general());
        let err = journal
            .handle(&post(vec![line("1105", 100.0, 100.0)]))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn all_zero_entry_is_rejected() {
        let journal = Journal::empty(JournalId::general());
        let err = journal
            .handle(&post(vec![line("1105", 0.0, 0.0)]))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: for any posted entry, stored debits equal stored
        /// credits within tolerance.
        #[test]
        fn posted_entries_are_balanced(
            amounts in prop::collection::vec(1u32..1_000_000u32, 1..10)
        ) {
            let journal = Journal::empty(JournalId::general());

            // One debit line per amount plus one balancing credit line.
            let total: f64 = amounts.iter().map(|a| *a as f64 / 100.0).sum();
            let mut lines: Vec<EntryLine> = amounts
                .iter()
                .map(|a| line("1105", *a as f64 / 100.0, 0.0))
                .collect();
            lines.push(line("4105", 0.0, total));

            let events = journal.handle(&post(lines)).unwrap();
            let JournalEvent::EntryPosted(entry) = &events[0];

            let debit: f64 = entry.lines.iter().map(|l| l.debit).sum();
            let credit: f64 = entry.lines.iter().map(|l| l.credit).sum();
            prop_assert!((debit - credit).abs() <= BALANCE_TOLERANCE);
        }
    }
}
