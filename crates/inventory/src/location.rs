use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use telar_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use telar_events::Event;

/// Location identifier, derived from the location code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub AggregateId);

impl LocationId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn for_code(code: &str) -> Self {
        Self(AggregateId::derive("inventory.location", code))
    }
}

impl core::fmt::Display for LocationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Editable location fields (everything except the code).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LocationFields {
    pub name: String,
    /// Physical address.
    pub address: String,
    /// Designated default warehouse for full receipts. At most one main
    /// location among active ones is an application convention enforced in
    /// the API layer, not here.
    pub main_location: bool,
    pub active: bool,
}

impl LocationFields {
    fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("location name cannot be empty"));
        }
        Ok(())
    }
}

/// Aggregate root: Location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    id: LocationId,
    code: String,
    fields: LocationFields,
    created_by: String,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Location {
    /// Empty aggregate for rehydration.
    pub fn empty(id: LocationId) -> Self {
        Self {
            id,
            code: String::new(),
            fields: LocationFields::default(),
            created_by: String::new(),
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> LocationId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn fields(&self) -> &LocationFields {
        &self.fields
    }

    pub fn is_active(&self) -> bool {
        self.created && !self.deleted && self.fields.active
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }
}

impl AggregateRoot for Location {
    type Id = LocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateLocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLocation {
    pub location_id: LocationId,
    pub code: String,
    pub fields: LocationFields,
    pub created_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateLocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLocation {
    pub location_id: LocationId,
    pub fields: LocationFields,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteLocation.
///
/// The "location still holds stock/movements" guard is an API-side
/// pre-check against the stock read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteLocation {
    pub location_id: LocationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationCommand {
    CreateLocation(CreateLocation),
    UpdateLocation(UpdateLocation),
    DeleteLocation(DeleteLocation),
}

/// Event: LocationCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationCreated {
    pub location_id: LocationId,
    pub code: String,
    pub fields: LocationFields,
    pub created_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LocationUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationUpdated {
    pub location_id: LocationId,
    pub code: String,
    pub fields: LocationFields,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LocationDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationDeleted {
    pub location_id: LocationId,
    pub code: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationEvent {
    LocationCreated(LocationCreated),
    LocationUpdated(LocationUpdated),
    LocationDeleted(LocationDeleted),
}

impl Event for LocationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LocationEvent::LocationCreated(_) => "inventory.location.created",
            LocationEvent::LocationUpdated(_) => "inventory.location.updated",
            LocationEvent::LocationDeleted(_) => "inventory.location.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LocationEvent::LocationCreated(e) => e.occurred_at,
            LocationEvent::LocationUpdated(e) => e.occurred_at,
            LocationEvent::LocationDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Location {
    type Command = LocationCommand;
    type Event = LocationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LocationEvent::LocationCreated(e) => {
                self.id = e.location_id;
                self.code = e.code.clone();
                self.fields = e.fields.clone();
                self.created_by = e.created_by.clone();
                self.created = true;
                self.deleted = false;
            }
            LocationEvent::LocationUpdated(e) => {
                self.fields = e.fields.clone();
            }
            LocationEvent::LocationDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LocationCommand::CreateLocation(cmd) => {
                if self.created && !self.deleted {
                    return Err(DomainError::conflict("location already exists"));
                }
                if cmd.code.trim().is_empty() {
                    return Err(DomainError::validation("location code cannot be empty"));
                }
                cmd.fields.validate()?;

                Ok(vec![LocationEvent::LocationCreated(LocationCreated {
                    location_id: cmd.location_id,
                    code: cmd.code.clone(),
                    fields: cmd.fields.clone(),
                    created_by: cmd.created_by.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            LocationCommand::UpdateLocation(cmd) => {
                self.ensure_live()?;
                cmd.fields.validate()?;

                Ok(vec![LocationEvent::LocationUpdated(LocationUpdated {
                    location_id: cmd.location_id,
                    code: self.code.clone(),
                    fields: cmd.fields.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            LocationCommand::DeleteLocation(cmd) => {
                self.ensure_live()?;

                Ok(vec![LocationEvent::LocationDeleted(LocationDeleted {
                    location_id: cmd.location_id,
                    code: self.code.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Location {
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
    fn create_location_with_main_flag() {
        let location_id = LocationId::for_code("ALM-01");
        let location = Location::empty(location_id);

        let events = location
            .handle(&LocationCommand::CreateLocation(CreateLocation {
                location_id,
                code: "ALM-01".to_string(),
                fields: LocationFields {
                    name: "Almacén central".to_string(),
                    address: "Av. Industria 100".to_string(),
                    main_location: true,
                    active: true,
                },
                created_by: "ana".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();

        match &events[0] {
            LocationEvent::LocationCreated(e) => assert!(e.fields.main_location),
            _ => panic!("Expected LocationCreated event"),
        }
    }
}
