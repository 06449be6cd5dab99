//! User and role read models (the data behind the permission gate).

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use telar_auth::{PermissionSet, RoleEvent, UserEvent};
use telar_events::EventEnvelope;

use crate::read_model::KeyedStore;

use super::{Cursors, ProjectionError};

/// Queryable user row, keyed by username. Carries the bcrypt hash so the
/// login handler can verify credentials against the read model.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Option<String>,
    pub active: bool,
    pub superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Queryable role row, keyed by role name.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleRow {
    pub name: String,
    pub description: String,
    pub permissions: PermissionSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct UsersProjection<S>
where
    S: KeyedStore<String, UserRow>,
{
    store: S,
    cursors: Cursors,
}

impl<S> UsersProjection<S>
where
    S: KeyedStore<String, UserRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, username: &str) -> Option<UserRow> {
        self.store.get(&username.to_string())
    }

    pub fn list(&self) -> Vec<UserRow> {
        let mut rows = self.store.list();
        rows.sort_by(|a, b| a.username.cmp(&b.username));
        rows
    }

    /// Role-deletion guard: is any user still assigned to `role`?
    pub fn any_with_role(&self, role: &str) -> bool {
        self.store.list().iter().any(|u| u.role.as_deref() == Some(role))
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.begin(aggregate_id, seq)? {
            return Ok(());
        }

        let event: UserEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            UserEvent::UserCreated(e) => {
                self.store.upsert(
                    e.username.clone(),
                    UserRow {
                        username: e.username,
                        email: e.email,
                        password_hash: e.password_hash,
                        role: e.role,
                        active: true,
                        superuser: e.superuser,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            UserEvent::UserUpdated(e) => {
                if let Some(mut row) = self.store.get(&e.username) {
                    row.email = e.email;
                    row.role = e.role;
                    row.superuser = e.superuser;
                    row.active = e.active;
                    row.updated_at = e.occurred_at;
                    self.store.upsert(e.username, row);
                }
            }
            UserEvent::PasswordChanged(e) => {
                if let Some(mut row) = self.store.get(&e.username) {
                    row.password_hash = e.password_hash;
                    row.updated_at = e.occurred_at;
                    self.store.upsert(e.username, row);
                }
            }
            UserEvent::UserDeleted(e) => {
                self.store.remove(&e.username);
            }
        }

        self.cursors.commit(aggregate_id, seq);
        Ok(())
    }
}

#[derive(Debug)]
pub struct RolesProjection<S>
where
    S: KeyedStore<String, RoleRow>,
{
    store: S,
    cursors: Cursors,
}

impl<S> RolesProjection<S>
where
    S: KeyedStore<String, RoleRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<RoleRow> {
        self.store.get(&name.to_string())
    }

    pub fn list(&self) -> Vec<RoleRow> {
        let mut rows = self.store.list();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.begin(aggregate_id, seq)? {
            return Ok(());
        }

        let event: RoleEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            RoleEvent::RoleCreated(e) => {
                self.store.upsert(
                    e.name.clone(),
                    RoleRow {
                        name: e.name,
                        description: e.description,
                        permissions: e.permissions,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            RoleEvent::RoleUpdated(e) => {
                if let Some(mut row) = self.store.get(&e.name) {
                    row.description = e.description;
                    row.permissions = e.permissions;
                    row.updated_at = e.occurred_at;
                    self.store.upsert(e.name, row);
                }
            }
            RoleEvent::RoleDeleted(e) => {
                self.store.remove(&e.name);
            }
        }

        self.cursors.commit(aggregate_id, seq);
        Ok(())
    }
}
