//! Chart of accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use telar_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use telar_events::Event;

/// Account identifier, derived from the account business key (`id_account`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub AggregateId);

impl AccountId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn for_key(key: &str) -> Self {
        Self(AggregateId::derive("accounting.account", key))
    }
}

impl core::fmt::Display for AccountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Editable account fields (everything except the business key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AccountFields {
    pub name: String,
    /// Display/reporting code (e.g. "1105"), distinct from the business key.
    pub code: String,
    pub description: String,
    /// Catalog references, validated against the account catalog in the API
    /// layer.
    pub account_type: String,
    pub account_group: String,
    pub nature: String,
    pub currency: String,
    pub country: String,
    /// Parent account business key, for the account hierarchy.
    pub parent_account: Option<String>,
    pub active: bool,
}

impl AccountFields {
    fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("account name cannot be empty"));
        }
        if self.code.trim().is_empty() {
            return Err(DomainError::validation("account code cannot be empty"));
        }
        if self.account_type.trim().is_empty()
            || self.account_group.trim().is_empty()
            || self.nature.trim().is_empty()
        {
            return Err(DomainError::validation(
                "account type, group and nature are required",
            ));
        }
        Ok(())
    }
}

/// Aggregate root: Account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    id: AccountId,
    key: String,
    fields: AccountFields,
    created_by: String,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Account {
    /// Empty aggregate for rehydration.
    pub fn empty(id: AccountId) -> Self {
        Self {
            id,
            key: String::new(),
            fields: AccountFields::default(),
            created_by: String::new(),
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> AccountId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn fields(&self) -> &AccountFields {
        &self.fields
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }
}

impl AggregateRoot for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateAccount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccount {
    pub account_id: AccountId,
    pub key: String,
    pub fields: AccountFields,
    pub created_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateAccount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAccount {
    pub account_id: AccountId,
    pub fields: AccountFields,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteAccount.
///
/// The "account has children" guard is an API-side pre-check against the
/// accounts read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAccount {
    pub account_id: AccountId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountCommand {
    CreateAccount(CreateAccount),
    UpdateAccount(UpdateAccount),
    DeleteAccount(DeleteAccount),
}

/// Event: AccountCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreated {
    pub account_id: AccountId,
    pub key: String,
    pub fields: AccountFields,
    pub created_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AccountUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdated {
    pub account_id: AccountId,
    pub key: String,
    pub fields: AccountFields,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AccountDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDeleted {
    pub account_id: AccountId,
    pub key: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountEvent {
    AccountCreated(AccountCreated),
    AccountUpdated(AccountUpdated),
    AccountDeleted(AccountDeleted),
}

impl Event for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::AccountCreated(_) => "accounting.account.created",
            AccountEvent::AccountUpdated(_) => "accounting.account.updated",
            AccountEvent::AccountDeleted(_) => "accounting.account.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AccountEvent::AccountCreated(e) => e.occurred_at,
            AccountEvent::AccountUpdated(e) => e.occurred_at,
            AccountEvent::AccountDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Account {
    type Command = AccountCommand;
    type Event = AccountEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AccountEvent::AccountCreated(e) => {
                self.id = e.account_id;
                self.key = e.key.clone();
                self.fields = e.fields.clone();
                self.created_by = e.created_by.clone();
                self.created = true;
                self.deleted = false;
            }
            AccountEvent::AccountUpdated(e) => {
                self.fields = e.fields.clone();
            }
            AccountEvent::AccountDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AccountCommand::CreateAccount(cmd) => {
                if self.created && !self.deleted {
                    return Err(DomainError::conflict("account already exists"));
                }
                if cmd.key.trim().is_empty() {
                    return Err(DomainError::validation("account key cannot be empty"));
                }
                if cmd.fields.parent_account.as_deref() == Some(cmd.key.as_str()) {
                    return Err(DomainError::validation("account cannot be its own parent"));
                }
                cmd.fields.validate()?;

                Ok(vec![AccountEvent::AccountCreated(AccountCreated {
                    account_id: cmd.account_id,
                    key: cmd.key.clone(),
                    fields: cmd.fields.clone(),
                    created_by: cmd.created_by.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            AccountCommand::UpdateAccount(cmd) => {
                self.ensure_live()?;
                if cmd.fields.parent_account.as_deref() == Some(self.key.as_str()) {
                    return Err(DomainError::validation("account cannot be its own parent"));
                }
                cmd.fields.validate()?;

                Ok(vec![AccountEvent::AccountUpdated(AccountUpdated {
                    account_id: cmd.account_id,
                    key: self.key.clone(),
                    fields: cmd.fields.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            AccountCommand::DeleteAccount(cmd) => {
                self.ensure_live()?;

                Ok(vec![AccountEvent::AccountDeleted(AccountDeleted {
                    account_id: cmd.account_id,
                    key: self.key.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Account {
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

    fn fields() -> AccountFields {
        AccountFields {
            name: "Clientes Nacionales".to_string(),
            code: "1105".to_string(),
            description: String::new(),
            account_type: "ACT".to_string(),
            account_group: "1".to_string(),
            nature: "DEU".to_string(),
            currency: "MXN".to_string(),
            country: "México".to_string(),
            parent_account: None,
            active: true,
        }
    }

    #[test]
    fn create_account_emits_account_created() {
        let account_id = AccountId::for_key("1105");
        let account = Account::empty(account_id);

        let events = account
            .handle(&AccountCommand::CreateAccount(CreateAccount {
                account_id,
                key: "1105".to_string(),
                fields: fields(),
                created_by: "ana".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();

        match &events[0] {
            AccountEvent::AccountCreated(e) => assert_eq!(e.fields.code, "1105"),
            _ => panic!("Expected AccountCreated event"),
        }
    }

    #[test]
    fn an_account_cannot_be_its_own_parent() {
        let account_id = AccountId::for_key("1105");
        let account = Account::empty(account_id);
        let mut bad = fields();
        bad.parent_account = Some("1105".to_string());

        let err = account
            .handle(&AccountCommand::CreateAccount(CreateAccount {
                account_id,
                key: "1105".to_string(),
                fields: bad,
                created_by: "ana".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
