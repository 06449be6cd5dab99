use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use telar_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use telar_events::Event;

/// Material identifier, derived from the material code (`id_material`).
///
/// The code, not the surrogate id, is the identity of a material.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(pub AggregateId);

impl MaterialId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn for_code(code: &str) -> Self {
        Self(AggregateId::derive("materials.material", code))
    }
}

impl core::fmt::Display for MaterialId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Editable material fields (everything except the code).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialFields {
    pub name: String,
    pub description: String,
    /// Unit-of-measure symbol (e.g. "pza", "kg", "m").
    pub unit: String,
    /// Material type tag, validated against the catalog in the API layer.
    pub material_type: String,
    /// Active flag; inactive materials stay queryable but are excluded from
    /// pick lists.
    pub active: bool,
}

impl MaterialFields {
    fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.unit.trim().is_empty() {
            return Err(DomainError::validation("unit cannot be empty"));
        }
        if self.material_type.trim().is_empty() {
            return Err(DomainError::validation("material type cannot be empty"));
        }
        Ok(())
    }
}

/// Aggregate root: Material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    id: MaterialId,
    code: String,
    fields: MaterialFields,
    created_by: String,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Material {
    /// Empty aggregate for rehydration.
    pub fn empty(id: MaterialId) -> Self {
        Self {
            id,
            code: String::new(),
            fields: MaterialFields {
                name: String::new(),
                description: String::new(),
                unit: String::new(),
                material_type: String::new(),
                active: false,
            },
            created_by: String::new(),
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> MaterialId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn fields(&self) -> &MaterialFields {
        &self.fields
    }

    pub fn is_active(&self) -> bool {
        self.created && !self.deleted && self.fields.active
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }
}

impl AggregateRoot for Material {
    type Id = MaterialId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateMaterial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMaterial {
    pub material_id: MaterialId,
    pub code: String,
    pub fields: MaterialFields,
    pub created_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateMaterial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMaterial {
    pub material_id: MaterialId,
    pub fields: MaterialFields,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteMaterial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteMaterial {
    pub material_id: MaterialId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialCommand {
    CreateMaterial(CreateMaterial),
    UpdateMaterial(UpdateMaterial),
    DeleteMaterial(DeleteMaterial),
}

/// Event: MaterialCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialCreated {
    pub material_id: MaterialId,
    pub code: String,
    pub fields: MaterialFields,
    pub created_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MaterialUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialUpdated {
    pub material_id: MaterialId,
    pub code: String,
    pub fields: MaterialFields,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MaterialDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialDeleted {
    pub material_id: MaterialId,
    pub code: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialEvent {
    MaterialCreated(MaterialCreated),
    MaterialUpdated(MaterialUpdated),
    MaterialDeleted(MaterialDeleted),
}

impl Event for MaterialEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MaterialEvent::MaterialCreated(_) => "materials.material.created",
            MaterialEvent::MaterialUpdated(_) => "materials.material.updated",
            MaterialEvent::MaterialDeleted(_) => "materials.material.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MaterialEvent::MaterialCreated(e) => e.occurred_at,
            MaterialEvent::MaterialUpdated(e) => e.occurred_at,
            MaterialEvent::MaterialDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Material {
    type Command = MaterialCommand;
    type Event = MaterialEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MaterialEvent::MaterialCreated(e) => {
                self.id = e.material_id;
                self.code = e.code.clone();
                self.fields = e.fields.clone();
                self.created_by = e.created_by.clone();
                self.created = true;
                self.deleted = false;
            }
            MaterialEvent::MaterialUpdated(e) => {
                self.fields = e.fields.clone();
            }
            MaterialEvent::MaterialDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MaterialCommand::CreateMaterial(cmd) => self.handle_create(cmd),
            MaterialCommand::UpdateMaterial(cmd) => self.handle_update(cmd),
            MaterialCommand::DeleteMaterial(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Material {
    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateMaterial) -> Result<Vec<MaterialEvent>, DomainError> {
        if self.created && !self.deleted {
            return Err(DomainError::conflict("material already exists"));
        }
        if cmd.code.trim().is_empty() {
            return Err(DomainError::validation("material code cannot be empty"));
        }
        cmd.fields.validate()?;

        Ok(vec![MaterialEvent::MaterialCreated(MaterialCreated {
            material_id: cmd.material_id,
            code: cmd.code.clone(),
            fields: cmd.fields.clone(),
            created_by: cmd.created_by.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateMaterial) -> Result<Vec<MaterialEvent>, DomainError> {
        self.ensure_live()?;
        cmd.fields.validate()?;

        Ok(vec![MaterialEvent::MaterialUpdated(MaterialUpdated {
            material_id: cmd.material_id,
            code: self.code.clone(),
            fields: cmd.fields.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteMaterial) -> Result<Vec<MaterialEvent>, DomainError> {
        self.ensure_live()?;

        Ok(vec![MaterialEvent::MaterialDeleted(MaterialDeleted {
            material_id: cmd.material_id,
            code: self.code.clone(),
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

    fn fields() -> MaterialFields {
        MaterialFields {
            name: "Tornillo hexagonal".to_string(),
            description: "Acero inoxidable".to_string(),
            unit: "pza".to_string(),
            material_type: "Insumo".to_string(),
            active: true,
        }
    }

    fn created_material(code: &str) -> Material {
        let material_id = MaterialId::for_code(code);
        let mut material = Material::empty(material_id);
        let events = material
            .handle(&MaterialCommand::CreateMaterial(CreateMaterial {
                material_id,
                code: code.to_string(),
                fields: fields(),
                created_by: "ana".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for ev in events {
            material.apply(&ev);
        }
        material
    }

    #[test]
    fn create_then_update_replaces_fields() {
        let mut material = created_material("MAT-001");
        assert!(material.is_active());

        let mut updated = fields();
        updated.active = false;
        updated.name = "Tornillo M8".to_string();

        let events = material
            .handle(&MaterialCommand::UpdateMaterial(UpdateMaterial {
                material_id: material.id_typed(),
                fields: updated.clone(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for ev in events {
            material.apply(&ev);
        }

        assert_eq!(material.fields(), &updated);
        assert!(!material.is_active());
    }

    #[test]
    fn duplicate_create_is_a_conflict() {
        let material = created_material("MAT-001");
        let err = material
            .handle(&MaterialCommand::CreateMaterial(CreateMaterial {
                material_id: material.id_typed(),
                code: "MAT-001".to_string(),
                fields: fields(),
                created_by: "ana".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn update_after_delete_is_not_found() {
        let mut material = created_material("MAT-002");
        let events = material
            .handle(&MaterialCommand::DeleteMaterial(DeleteMaterial {
                material_id: material.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for ev in events {
            material.apply(&ev);
        }

        let err = material
            .handle(&MaterialCommand::UpdateMaterial(UpdateMaterial {
                material_id: material.id_typed(),
                fields: fields(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }
}
