//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of an aggregate root.
///
/// Freshly minted ids are UUIDv7 (time-ordered). Entities addressed by a
/// business key (material codes, order numbers, usernames, ...) use
/// [`AggregateId::derive`] instead, so the same key always resolves to the
/// same stream without a directory table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Mint a new time-ordered identifier.
    ///
    /// Prefer passing ids explicitly in tests for determinism.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Derive the identifier for a business-keyed aggregate.
    ///
    /// `kind` is the aggregate type tag (e.g. `"materials.material"`), `key`
    /// the business key (e.g. `"MAT-001"`). UUIDv5 keeps this stable across
    /// processes and restarts.
    pub fn derive(kind: &str, key: &str) -> Self {
        let name = format!("{kind}:{key}");
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for AggregateId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<AggregateId> for Uuid {
    fn from(value: AggregateId) -> Self {
        value.0
    }
}

impl FromStr for AggregateId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s)
            .map_err(|e| DomainError::invalid_id(format!("AggregateId: {e}")))?;
        Ok(Self(uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_ids_are_stable_per_kind_and_key() {
        let a = AggregateId::derive("materials.material", "MAT-001");
        let b = AggregateId::derive("materials.material", "MAT-001");
        assert_eq!(a, b);
    }

    #[test]
    fn derived_ids_differ_across_kinds() {
        let a = AggregateId::derive("materials.material", "X-1");
        let b = AggregateId::derive("parties.supplier", "X-1");
        assert_ne!(a, b);
    }
}
