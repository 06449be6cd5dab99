//! Read-model projections over published event envelopes.
//!
//! Projections are idempotent consumers: the bus delivers at-least-once,
//! so every projection tracks a per-stream cursor and ignores replays.
//! Read models are disposable and rebuildable from the event stream.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use telar_core::AggregateId;

pub mod accounts;
pub mod catalogs;
pub mod journal;
pub mod locations;
pub mod materials;
pub mod movements;
pub mod parties;
pub mod purchases;
pub mod sales;
pub mod stock;
pub mod users;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Per-stream cursors supporting at-least-once delivery.
///
/// `begin` answers whether an envelope should be applied; `commit` advances
/// the cursor after a successful apply.
#[derive(Debug, Default)]
pub struct Cursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

impl Cursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Ok(false)` for duplicates/replays (safe to ignore),
    /// `Ok(true)` when the envelope is next in line.
    pub fn begin(&self, aggregate_id: AggregateId, seq: u64) -> Result<bool, ProjectionError> {
        let cursors = match self.inner.read() {
            Ok(c) => c,
            Err(_) => return Ok(false),
        };
        let last = *cursors.get(&aggregate_id).unwrap_or(&0);

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            // Duplicate or replay.
            return Ok(false);
        }
        // The first observed event may start above 1 (e.g. mid-stream
        // subscription after a rebuild); after that we require strict
        // increments.
        if last != 0 && seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        Ok(true)
    }

    /// Advance the cursor after a successful apply.
    pub fn commit(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.insert(aggregate_id, seq);
        }
    }

    pub fn reset(&self) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_ignored_and_gaps_rejected() {
        let cursors = Cursors::new();
        let id = AggregateId::new();

        assert!(cursors.begin(id, 1).unwrap());
        cursors.commit(id, 1);

        // Replay of an already-applied sequence number.
        assert!(!cursors.begin(id, 1).unwrap());

        // A gap after the first commit is an error.
        assert!(matches!(
            cursors.begin(id, 3),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 3 })
        ));

        assert!(cursors.begin(id, 2).unwrap());
    }
}
