//! User aggregate: identity, credentials, role assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use telar_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use telar_events::Event;

/// User identifier, derived from the username.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub AggregateId);

impl UserId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// Derive the id for a username (usernames are the business key).
    pub fn for_username(username: &str) -> Self {
        Self(AggregateId::derive("auth.user", username))
    }
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: User.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    username: String,
    email: String,
    password_hash: String,
    role: Option<String>,
    active: bool,
    superuser: bool,
    version: u64,
    created: bool,
    deleted: bool,
}

impl User {
    /// Empty aggregate for rehydration.
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            username: String::new(),
            email: String::new(),
            password_hash: String::new(),
            role: None,
            active: false,
            superuser: false,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> UserId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_superuser(&self) -> bool {
        self.superuser
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Verify a candidate password against the stored hash happens in the
    /// auth layer; the aggregate only exposes the hash.
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateUser. `password_hash` is already bcrypt-hashed; plaintext
/// never enters the domain layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUser {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Option<String>,
    pub superuser: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateUser (email, role, superuser flag, active flag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUser {
    pub user_id: UserId,
    pub email: String,
    pub role: Option<String>,
    pub superuser: bool,
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangePassword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePassword {
    pub user_id: UserId,
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteUser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteUser {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserCommand {
    CreateUser(CreateUser),
    UpdateUser(UpdateUser),
    ChangePassword(ChangePassword),
    DeleteUser(DeleteUser),
}

/// Event: UserCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreated {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Option<String>,
    pub superuser: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UserUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdated {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub role: Option<String>,
    pub superuser: bool,
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PasswordChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChanged {
    pub user_id: UserId,
    pub username: String,
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UserDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDeleted {
    pub user_id: UserId,
    pub username: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    UserCreated(UserCreated),
    UserUpdated(UserUpdated),
    PasswordChanged(PasswordChanged),
    UserDeleted(UserDeleted),
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::UserCreated(_) => "auth.user.created",
            UserEvent::UserUpdated(_) => "auth.user.updated",
            UserEvent::PasswordChanged(_) => "auth.user.password_changed",
            UserEvent::UserDeleted(_) => "auth.user.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::UserCreated(e) => e.occurred_at,
            UserEvent::UserUpdated(e) => e.occurred_at,
            UserEvent::PasswordChanged(e) => e.occurred_at,
            UserEvent::UserDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::UserCreated(e) => {
                self.id = e.user_id;
                self.username = e.username.clone();
                self.email = e.email.clone();
                self.password_hash = e.password_hash.clone();
                self.role = e.role.clone();
                self.superuser = e.superuser;
                self.active = true;
                self.created = true;
                self.deleted = false;
            }
            UserEvent::UserUpdated(e) => {
                self.email = e.email.clone();
                self.role = e.role.clone();
                self.superuser = e.superuser;
                self.active = e.active;
            }
            UserEvent::PasswordChanged(e) => {
                self.password_hash = e.password_hash.clone();
            }
            UserEvent::UserDeleted(_) => {
                self.deleted = true;
                self.active = false;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::CreateUser(cmd) => self.handle_create(cmd),
            UserCommand::UpdateUser(cmd) => self.handle_update(cmd),
            UserCommand::ChangePassword(cmd) => self.handle_change_password(cmd),
            UserCommand::DeleteUser(cmd) => self.handle_delete(cmd),
        }
    }
}

impl User {
    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created && !self.deleted {
            return Err(DomainError::conflict("user already exists"));
        }
        if cmd.username.trim().is_empty() {
            return Err(DomainError::validation("username cannot be empty"));
        }
        if cmd.email.trim().is_empty() {
            return Err(DomainError::validation("email cannot be empty"));
        }
        if cmd.password_hash.is_empty() {
            return Err(DomainError::validation("password hash cannot be empty"));
        }

        Ok(vec![UserEvent::UserCreated(UserCreated {
            user_id: cmd.user_id,
            username: cmd.username.clone(),
            email: cmd.email.clone(),
            password_hash: cmd.password_hash.clone(),
            role: cmd.role.clone(),
            superuser: cmd.superuser,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_live()?;
        if cmd.email.trim().is_empty() {
            return Err(DomainError::validation("email cannot be empty"));
        }

        Ok(vec![UserEvent::UserUpdated(UserUpdated {
            user_id: cmd.user_id,
            username: self.username.clone(),
            email: cmd.email.clone(),
            role: cmd.role.clone(),
            superuser: cmd.superuser,
            active: cmd.active,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_password(&self, cmd: &ChangePassword) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_live()?;
        if cmd.password_hash.is_empty() {
            return Err(DomainError::validation("password hash cannot be empty"));
        }

        Ok(vec![UserEvent::PasswordChanged(PasswordChanged {
            user_id: cmd.user_id,
            username: self.username.clone(),
            password_hash: cmd.password_hash.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_live()?;

        Ok(vec![UserEvent::UserDeleted(UserDeleted {
            user_id: cmd.user_id,
            username: self.username.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_user(username: &str) -> User {
        let user_id = UserId::for_username(username);
        let mut user = User::empty(user_id);
        let events = user
            .handle(&UserCommand::CreateUser(CreateUser {
                user_id,
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: "$2b$04$hash".to_string(),
                role: Some("warehouse".to_string()),
                superuser: false,
                occurred_at: test_time(),
            }))
            .unwrap();
        for ev in events {
            user.apply(&ev);
        }
        user
    }

    #[test]
    fn created_user_starts_active() {
        let user = created_user("ana");
        assert!(user.is_active());
        assert_eq!(user.role(), Some("warehouse"));
    }

    #[test]
    fn update_can_suspend_a_user() {
        let mut user = created_user("ana");
        let events = user
            .handle(&UserCommand::UpdateUser(UpdateUser {
                user_id: user.id_typed(),
                email: "ana@example.com".to_string(),
                role: None,
                superuser: false,
                active: false,
                occurred_at: test_time(),
            }))
            .unwrap();
        for ev in events {
            user.apply(&ev);
        }
        assert!(!user.is_active());
        assert_eq!(user.role(), None);
    }

    #[test]
    fn create_requires_a_password_hash() {
        let user_id = UserId::for_username("bob");
        let user = User::empty(user_id);
        let err = user
            .handle(&UserCommand::CreateUser(CreateUser {
                user_id,
                username: "bob".to_string(),
                email: "bob@example.com".to_string(),
                password_hash: String::new(),
                role: None,
                superuser: false,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
