use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use telar_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use telar_events::Event;

use crate::profile::PartyProfile;

/// Customer identifier, derived from the customer code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub AggregateId);

impl CustomerId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn for_code(code: &str) -> Self {
        Self(AggregateId::derive("parties.customer", code))
    }
}

impl core::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    id: CustomerId,
    code: String,
    profile: PartyProfile,
    created_by: String,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Customer {
    /// Empty aggregate for rehydration.
    pub fn empty(id: CustomerId) -> Self {
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

    pub fn id_typed(&self) -> CustomerId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn profile(&self) -> &PartyProfile {
        &self.profile
    }

    /// Inactive customers cannot be referenced by new sales.
    pub fn can_transact(&self) -> bool {
        self.created && !self.deleted && self.profile.active
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }
}

impl AggregateRoot for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateCustomer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCustomer {
    pub customer_id: CustomerId,
    pub code: String,
    pub profile: PartyProfile,
    pub created_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateCustomer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCustomer {
    pub customer_id: CustomerId,
    pub profile: PartyProfile,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteCustomer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteCustomer {
    pub customer_id: CustomerId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerCommand {
    CreateCustomer(CreateCustomer),
    UpdateCustomer(UpdateCustomer),
    DeleteCustomer(DeleteCustomer),
}

/// Event: CustomerCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerCreated {
    pub customer_id: CustomerId,
    pub code: String,
    pub profile: PartyProfile,
    pub created_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CustomerUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerUpdated {
    pub customer_id: CustomerId,
    pub code: String,
    pub profile: PartyProfile,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CustomerDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDeleted {
    pub customer_id: CustomerId,
    pub code: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerEvent {
    CustomerCreated(CustomerCreated),
    CustomerUpdated(CustomerUpdated),
    CustomerDeleted(CustomerDeleted),
}

impl Event for CustomerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustomerEvent::CustomerCreated(_) => "parties.customer.created",
            CustomerEvent::CustomerUpdated(_) => "parties.customer.updated",
            CustomerEvent::CustomerDeleted(_) => "parties.customer.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CustomerEvent::CustomerCreated(e) => e.occurred_at,
            CustomerEvent::CustomerUpdated(e) => e.occurred_at,
            CustomerEvent::CustomerDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Customer {
    type Command = CustomerCommand;
    type Event = CustomerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CustomerEvent::CustomerCreated(e) => {
                self.id = e.customer_id;
                self.code = e.code.clone();
                self.profile = e.profile.clone();
                self.created_by = e.created_by.clone();
                self.created = true;
                self.deleted = false;
            }
            CustomerEvent::CustomerUpdated(e) => {
                self.profile = e.profile.clone();
            }
            CustomerEvent::CustomerDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CustomerCommand::CreateCustomer(cmd) => {
                if self.created && !self.deleted {
                    return Err(DomainError::conflict("customer already exists"));
                }
                if cmd.code.trim().is_empty() {
                    return Err(DomainError::validation("customer code cannot be empty"));
                }
                cmd.profile.validate()?;

                Ok(vec![CustomerEvent::CustomerCreated(CustomerCreated {
                    customer_id: cmd.customer_id,
                    code: cmd.code.clone(),
                    profile: cmd.profile.clone(),
                    created_by: cmd.created_by.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            CustomerCommand::UpdateCustomer(cmd) => {
                self.ensure_live()?;
                cmd.profile.validate()?;

                Ok(vec![CustomerEvent::CustomerUpdated(CustomerUpdated {
                    customer_id: cmd.customer_id,
                    code: self.code.clone(),
                    profile: cmd.profile.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            CustomerCommand::DeleteCustomer(cmd) => {
                self.ensure_live()?;

                Ok(vec![CustomerEvent::CustomerDeleted(CustomerDeleted {
                    customer_id: cmd.customer_id,
                    code: self.code.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Customer {
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

    #[test]
    fn delete_then_update_is_not_found() {
        let customer_id = CustomerId::for_code("CLI-001");
        let mut customer = Customer::empty(customer_id);

        let profile = PartyProfile {
            legal_name: "Comercial del Bajío SA".to_string(),
            name: "Comercial del Bajío".to_string(),
            country: "México".to_string(),
            currency: "MXN".to_string(),
            active: true,
            ..PartyProfile::default()
        };

        for ev in customer
            .handle(&CustomerCommand::CreateCustomer(CreateCustomer {
                customer_id,
                code: "CLI-001".to_string(),
                profile: profile.clone(),
                created_by: "ana".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap()
        {
            customer.apply(&ev);
        }
        for ev in customer
            .handle(&CustomerCommand::DeleteCustomer(DeleteCustomer {
                customer_id,
                occurred_at: Utc::now(),
            }))
            .unwrap()
        {
            customer.apply(&ev);
        }

        let err = customer
            .handle(&CustomerCommand::UpdateCustomer(UpdateCustomer {
                customer_id,
                profile,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }
}
