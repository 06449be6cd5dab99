//! Role aggregate: a named permission matrix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use telar_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use telar_events::Event;

use crate::permissions::PermissionSet;

/// Role identifier, derived from the role name.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub AggregateId);

impl RoleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// Derive the id for a role name (names are the business key).
    pub fn for_name(name: &str) -> Self {
        Self(AggregateId::derive("auth.role", name))
    }
}

impl core::fmt::Display for RoleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    id: RoleId,
    name: String,
    description: String,
    permissions: PermissionSet,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Role {
    /// Empty aggregate for rehydration.
    pub fn empty(id: RoleId) -> Self {
        Self {
            id,
            name: String::new(),
            description: String::new(),
            permissions: PermissionSet::new(),
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> RoleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl AggregateRoot for Role {
    type Id = RoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateRole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRole {
    pub role_id: RoleId,
    pub name: String,
    pub description: String,
    pub permissions: PermissionSet,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateRole (description and permission matrix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRole {
    pub role_id: RoleId,
    pub description: String,
    pub permissions: PermissionSet,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteRole.
///
/// The "role is still assigned to users" guard is a pre-check in the API
/// layer against the users read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRole {
    pub role_id: RoleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleCommand {
    CreateRole(CreateRole),
    UpdateRole(UpdateRole),
    DeleteRole(DeleteRole),
}

/// Event: RoleCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCreated {
    pub role_id: RoleId,
    pub name: String,
    pub description: String,
    pub permissions: PermissionSet,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RoleUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleUpdated {
    pub role_id: RoleId,
    pub name: String,
    pub description: String,
    pub permissions: PermissionSet,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RoleDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDeleted {
    pub role_id: RoleId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleEvent {
    RoleCreated(RoleCreated),
    RoleUpdated(RoleUpdated),
    RoleDeleted(RoleDeleted),
}

impl Event for RoleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RoleEvent::RoleCreated(_) => "auth.role.created",
            RoleEvent::RoleUpdated(_) => "auth.role.updated",
            RoleEvent::RoleDeleted(_) => "auth.role.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RoleEvent::RoleCreated(e) => e.occurred_at,
            RoleEvent::RoleUpdated(e) => e.occurred_at,
            RoleEvent::RoleDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Role {
    type Command = RoleCommand;
    type Event = RoleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RoleEvent::RoleCreated(e) => {
                self.id = e.role_id;
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.permissions = e.permissions.clone();
                self.created = true;
                self.deleted = false;
            }
            RoleEvent::RoleUpdated(e) => {
                self.description = e.description.clone();
                self.permissions = e.permissions.clone();
            }
            RoleEvent::RoleDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RoleCommand::CreateRole(cmd) => self.handle_create(cmd),
            RoleCommand::UpdateRole(cmd) => self.handle_update(cmd),
            RoleCommand::DeleteRole(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Role {
    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateRole) -> Result<Vec<RoleEvent>, DomainError> {
        if self.created && !self.deleted {
            return Err(DomainError::conflict("role already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("role name cannot be empty"));
        }

        Ok(vec![RoleEvent::RoleCreated(RoleCreated {
            role_id: cmd.role_id,
            name: cmd.name.clone(),
            description: cmd.description.clone(),
            permissions: cmd.permissions.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateRole) -> Result<Vec<RoleEvent>, DomainError> {
        self.ensure_live()?;

        Ok(vec![RoleEvent::RoleUpdated(RoleUpdated {
            role_id: cmd.role_id,
            name: self.name.clone(),
            description: cmd.description.clone(),
            permissions: cmd.permissions.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteRole) -> Result<Vec<RoleEvent>, DomainError> {
        self.ensure_live()?;

        Ok(vec![RoleEvent::RoleDeleted(RoleDeleted {
            role_id: cmd.role_id,
            name: self.name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{Module, PermissionLevel};

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn create_role_emits_role_created() {
        let role_id = RoleId::for_name("warehouse");
        let role = Role::empty(role_id);

        let perms = PermissionSet::new()
            .with(Module::Inventory, PermissionLevel::Write)
            .with(Module::Purchases, PermissionLevel::Read);

        let events = role
            .handle(&RoleCommand::CreateRole(CreateRole {
                role_id,
                name: "warehouse".to_string(),
                description: "Warehouse staff".to_string(),
                permissions: perms.clone(),
                occurred_at: test_time(),
            }))
            .unwrap();

        match &events[0] {
            RoleEvent::RoleCreated(e) => {
                assert_eq!(e.name, "warehouse");
                assert_eq!(e.permissions, perms);
            }
            _ => panic!("Expected RoleCreated event"),
        }
    }

    #[test]
    fn duplicate_create_is_a_conflict() {
        let role_id = RoleId::for_name("admin");
        let mut role = Role::empty(role_id);

        let cmd = RoleCommand::CreateRole(CreateRole {
            role_id,
            name: "admin".to_string(),
            description: String::new(),
            permissions: PermissionSet::full(),
            occurred_at: test_time(),
        });
        let events = role.handle(&cmd).unwrap();
        role.apply(&events[0]);

        let err = role.handle(&cmd).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn deleted_role_rejects_updates() {
        let role_id = RoleId::for_name("temp");
        let mut role = Role::empty(role_id);

        for ev in role
            .handle(&RoleCommand::CreateRole(CreateRole {
                role_id,
                name: "temp".to_string(),
                description: String::new(),
                permissions: PermissionSet::new(),
                occurred_at: test_time(),
            }))
            .unwrap()
        {
            role.apply(&ev);
        }
        for ev in role
            .handle(&RoleCommand::DeleteRole(DeleteRole {
                role_id,
                occurred_at: test_time(),
            }))
            .unwrap()
        {
            role.apply(&ev);
        }

        let err = role
            .handle(&RoleCommand::UpdateRole(UpdateRole {
                role_id,
                description: "x".to_string(),
                permissions: PermissionSet::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }
}
