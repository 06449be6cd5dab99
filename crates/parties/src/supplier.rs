use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use telar_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use telar_events::Event;

use crate::profile::PartyProfile;

/// Supplier identifier, derived from the supplier code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub AggregateId);

impl SupplierId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn for_code(code: &str) -> Self {
        Self(AggregateId::derive("parties.supplier", code))
    }
}

impl core::fmt::Display for SupplierId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supplier {
    id: SupplierId,
    code: String,
    profile: PartyProfile,
    created_by: String,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Supplier {
    /// Empty aggregate for rehydration.
    pub fn empty(id: SupplierId) -> Self {
        Self {
            id,
            code: String::new(),
            profile: PartyProfile::default(),
            created_by: String::new(),
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> SupplierId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn profile(&self) -> &PartyProfile {
        &self.profile
    }

    /// Inactive suppliers cannot be referenced by new purchase orders.
    pub fn can_transact(&self) -> bool {
        self.created && !self.deleted && self.profile.active
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }
}

impl AggregateRoot for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateSupplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSupplier {
    pub supplier_id: SupplierId,
    pub code: String,
    pub profile: PartyProfile,
    pub created_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateSupplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSupplier {
    pub supplier_id: SupplierId,
    pub profile: PartyProfile,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteSupplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSupplier {
    pub supplier_id: SupplierId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierCommand {
    CreateSupplier(CreateSupplier),
    UpdateSupplier(UpdateSupplier),
    DeleteSupplier(DeleteSupplier),
}

/// Event: SupplierCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierCreated {
    pub supplier_id: SupplierId,
    pub code: String,
    pub profile: PartyProfile,
    pub created_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SupplierUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierUpdated {
    pub supplier_id: SupplierId,
    pub code: String,
    pub profile: PartyProfile,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SupplierDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierDeleted {
    pub supplier_id: SupplierId,
    pub code: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierEvent {
    SupplierCreated(SupplierCreated),
    SupplierUpdated(SupplierUpdated),
    SupplierDeleted(SupplierDeleted),
}

impl Event for SupplierEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SupplierEvent::SupplierCreated(_) => "parties.supplier.created",
            SupplierEvent::SupplierUpdated(_) => "parties.supplier.updated",
            SupplierEvent::SupplierDeleted(_) => "parties.supplier.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SupplierEvent::SupplierCreated(e) => e.occurred_at,
            SupplierEvent::SupplierUpdated(e) => e.occurred_at,
            SupplierEvent::SupplierDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Supplier {
    type Command = SupplierCommand;
    type Event = SupplierEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SupplierEvent::SupplierCreated(e) => {
                self.id = e.supplier_id;
                self.code = e.code.clone();
                self.profile = e.profile.clone();
                self.created_by = e.created_by.clone();
                self.created = true;
                self.deleted = false;
            }
            SupplierEvent::SupplierUpdated(e) => {
                self.profile = e.profile.clone();
            }
            SupplierEvent::SupplierDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SupplierCommand::CreateSupplier(cmd) => {
                if self.created && !self.deleted {
                    return Err(DomainError::conflict("supplier already exists"));
                }
                if cmd.code.trim().is_empty() {
                    return Err(DomainError::validation("supplier code cannot be empty"));
                }
                cmd.profile.validate()?;

                Ok(vec![SupplierEvent::SupplierCreated(SupplierCreated {
                    supplier_id: cmd.supplier_id,
                    code: cmd.code.clone(),
                    profile: cmd.profile.clone(),
                    created_by: cmd.created_by.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            SupplierCommand::UpdateSupplier(cmd) => {
                self.ensure_live()?;
                cmd.profile.validate()?;

                Ok(vec![SupplierEvent::SupplierUpdated(SupplierUpdated {
                    supplier_id: cmd.supplier_id,
                    code: self.code.clone(),
                    profile: cmd.profile.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            SupplierCommand::DeleteSupplier(cmd) => {
                self.ensure_live()?;

                Ok(vec![SupplierEvent::SupplierDeleted(SupplierDeleted {
                    supplier_id: cmd.supplier_id,
                    code: self.code.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Supplier {
    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> PartyProfile {
        PartyProfile {
            legal_name: "Aceros del Norte SA de CV".to_string(),
            name: "Aceros del Norte".to_string(),
            country: "México".to_string(),
            currency: "MXN".to_string(),
            active: true,
            ..PartyProfile::default()
        }
    }

    #[test]
    fn create_supplier_emits_supplier_created() {
        let supplier_id = SupplierId::for_code("PROV-001");
        let supplier = Supplier::empty(supplier_id);

        let events = supplier
            .handle(&SupplierCommand::CreateSupplier(CreateSupplier {
                supplier_id,
                code: "PROV-001".to_string(),
                profile: profile(),
                created_by: "ana".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();

        match &events[0] {
            SupplierEvent::SupplierCreated(e) => {
                assert_eq!(e.code, "PROV-001");
                assert_eq!(e.profile.currency, "MXN");
            }
            _ => panic!("Expected SupplierCreated event"),
        }
    }

    #[test]
    fn create_rejects_a_missing_currency() {
        let supplier_id = SupplierId::for_code("PROV-002");
        let supplier = Supplier::empty(supplier_id);
        let mut bad = profile();
        bad.currency = String::new();

        let err = supplier
            .handle(&SupplierCommand::CreateSupplier(CreateSupplier {
                supplier_id,
                code: "PROV-002".to_string(),
                profile: bad,
                created_by: "ana".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
