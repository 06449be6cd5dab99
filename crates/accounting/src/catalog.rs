//! Accounting reference catalog: account types, groups and natures.
//!
//! Single aggregate instance; uniqueness-by-code is an aggregate invariant.
//! In-use guards on removal are API-side pre-checks against the accounts
//! read model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use telar_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use telar_events::Event;

/// Catalog identifier (a singleton stream).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountCatalogId(pub AggregateId);

impl AccountCatalogId {
    pub fn singleton() -> Self {
        Self(AggregateId::derive("accounting.catalog", "default"))
    }
}

/// Account type (e.g. "ACT" / "Activo").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountType {
    pub code: String,
    pub name: String,
    pub description: String,
}

/// Account group (e.g. "1" / "Activo circulante", code prefix "11").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountGroup {
    pub code: String,
    pub name: String,
    pub code_prefix: String,
    pub description: String,
}

/// Account nature (e.g. "DEU" / "Deudora", effect on balance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountNature {
    pub code: String,
    pub name: String,
    pub symbol: String,
    pub effect_on_balance: String,
}

/// Aggregate root: AccountCatalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCatalog {
    id: AccountCatalogId,
    types: BTreeMap<String, AccountType>,
    groups: BTreeMap<String, AccountGroup>,
    natures: BTreeMap<String, AccountNature>,
    version: u64,
}

impl AccountCatalog {
    pub fn empty(id: AccountCatalogId) -> Self {
        Self {
            id,
            types: BTreeMap::new(),
            groups: BTreeMap::new(),
            natures: BTreeMap::new(),
            version: 0,
        }
    }

    pub fn id_typed(&self) -> AccountCatalogId {
        self.id
    }

    pub fn account_type(&self, code: &str) -> Option<&AccountType> {
        self.types.get(code)
    }

    pub fn group(&self, code: &str) -> Option<&AccountGroup> {
        self.groups.get(code)
    }

    pub fn nature(&self, code: &str) -> Option<&AccountNature> {
        self.natures.get(code)
    }

    pub fn types(&self) -> impl Iterator<Item = &AccountType> {
        self.types.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &AccountGroup> {
        self.groups.values()
    }

    pub fn natures(&self) -> impl Iterator<Item = &AccountNature> {
        self.natures.values()
    }
}

impl AggregateRoot for AccountCatalog {
    type Id = AccountCatalogId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Commands. `Put*` upserts by code; `Remove*` deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountCatalogCommand {
    PutType { entry: AccountType, occurred_at: DateTime<Utc> },
    RemoveType { code: String, occurred_at: DateTime<Utc> },
    PutGroup { entry: AccountGroup, occurred_at: DateTime<Utc> },
    RemoveGroup { code: String, occurred_at: DateTime<Utc> },
    PutNature { entry: AccountNature, occurred_at: DateTime<Utc> },
    RemoveNature { code: String, occurred_at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountCatalogEvent {
    TypeDefined { entry: AccountType, occurred_at: DateTime<Utc> },
    TypeRemoved { code: String, occurred_at: DateTime<Utc> },
    GroupDefined { entry: AccountGroup, occurred_at: DateTime<Utc> },
    GroupRemoved { code: String, occurred_at: DateTime<Utc> },
    NatureDefined { entry: AccountNature, occurred_at: DateTime<Utc> },
    NatureRemoved { code: String, occurred_at: DateTime<Utc> },
}

impl Event for AccountCatalogEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountCatalogEvent::TypeDefined { .. } => "accounting.catalog.type_defined",
            AccountCatalogEvent::TypeRemoved { .. } => "accounting.catalog.type_removed",
            AccountCatalogEvent::GroupDefined { .. } => "accounting.catalog.group_defined",
            AccountCatalogEvent::GroupRemoved { .. } => "accounting.catalog.group_removed",
            AccountCatalogEvent::NatureDefined { .. } => "accounting.catalog.nature_defined",
            AccountCatalogEvent::NatureRemoved { .. } => "accounting.catalog.nature_removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AccountCatalogEvent::TypeDefined { occurred_at, .. }
            | AccountCatalogEvent::TypeRemoved { occurred_at, .. }
            | AccountCatalogEvent::GroupDefined { occurred_at, .. }
            | AccountCatalogEvent::GroupRemoved { occurred_at, .. }
            | AccountCatalogEvent::NatureDefined { occurred_at, .. }
            | AccountCatalogEvent::NatureRemoved { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for AccountCatalog {
    type Command = AccountCatalogCommand;
    type Event = AccountCatalogEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AccountCatalogEvent::TypeDefined { entry, .. } => {
                self.types.insert(entry.code.clone(), entry.clone());
            }
            AccountCatalogEvent::TypeRemoved { code, .. } => {
                self.types.remove(code);
            }
            AccountCatalogEvent::GroupDefined { entry, .. } => {
                self.groups.insert(entry.code.clone(), entry.clone());
            }
            AccountCatalogEvent::GroupRemoved { code, .. } => {
                self.groups.remove(code);
            }
            AccountCatalogEvent::NatureDefined { entry, .. } => {
                self.natures.insert(entry.code.clone(), entry.clone());
            }
            AccountCatalogEvent::NatureRemoved { code, .. } => {
                self.natures.remove(code);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AccountCatalogCommand::PutType { entry, occurred_at } => {
                if entry.code.trim().is_empty() || entry.name.trim().is_empty() {
                    return Err(DomainError::validation("type code and name are required"));
                }
                Ok(vec![AccountCatalogEvent::TypeDefined {
                    entry: entry.clone(),
                    occurred_at: *occurred_at,
                }])
            }
            AccountCatalogCommand::RemoveType { code, occurred_at } => {
                if !self.types.contains_key(code) {
                    return Err(DomainError::not_found());
                }
                Ok(vec![AccountCatalogEvent::TypeRemoved {
                    code: code.clone(),
                    occurred_at: *occurred_at,
                }])
            }
            AccountCatalogCommand::PutGroup { entry, occurred_at } => {
                if entry.code.trim().is_empty() || entry.name.trim().is_empty() {
                    return Err(DomainError::validation("group code and name are required"));
                }
                Ok(vec![AccountCatalogEvent::GroupDefined {
                    entry: entry.clone(),
                    occurred_at: *occurred_at,
                }])
            }
            AccountCatalogCommand::RemoveGroup { code, occurred_at } => {
                if !self.groups.contains_key(code) {
                    return Err(DomainError::not_found());
                }
                Ok(vec![AccountCatalogEvent::GroupRemoved {
                    code: code.clone(),
                    occurred_at: *occurred_at,
                }])
            }
            AccountCatalogCommand::PutNature { entry, occurred_at } => {
                if entry.code.trim().is_empty() || entry.name.trim().is_empty() {
                    return Err(DomainError::validation("nature code and name are required"));
                }
                Ok(vec![AccountCatalogEvent::NatureDefined {
                    entry: entry.clone(),
                    occurred_at: *occurred_at,
                }])
            }
            AccountCatalogCommand::RemoveNature { code, occurred_at } => {
                if !self.natures.contains_key(code) {
                    return Err(DomainError::not_found());
                }
                Ok(vec![AccountCatalogEvent::NatureRemoved {
                    code: code.clone(),
                    occurred_at: *occurred_at,
                }])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_remove_a_type() {
        let mut catalog = AccountCatalog::empty(AccountCatalogId::singleton());

        let events = catalog
            .handle(&AccountCatalogCommand::PutType {
                entry: AccountType {
                    code: "ACT".to_string(),
                    name: "Activo".to_string(),
                    description: String::new(),
                },
                occurred_at: Utc::now(),
            })
            .unwrap();
        for ev in events {
            catalog.apply(&ev);
        }
        assert!(catalog.account_type("ACT").is_some());

        let events = catalog
            .handle(&AccountCatalogCommand::RemoveType {
                code: "ACT".to_string(),
                occurred_at: Utc::now(),
            })
            .unwrap();
        for ev in events {
            catalog.apply(&ev);
        }
        assert!(catalog.account_type("ACT").is_none());
    }
}
