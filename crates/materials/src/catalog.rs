//! Materials reference catalog: units of measure and material types.
//!
//! A single aggregate instance owns all entries of both kinds, so
//! uniqueness-by-name is an invariant of the aggregate rather than a
//! database convention.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use telar_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use telar_events::Event;

/// Catalog identifier (a singleton stream).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialCatalogId(pub AggregateId);

impl MaterialCatalogId {
    pub fn singleton() -> Self {
        Self(AggregateId::derive("materials.catalog", "default"))
    }
}

/// Unit of measure (e.g. "pieza" / "pza").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    pub symbol: String,
}

/// Material type tag (e.g. "Insumo", "Materia Prima").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialType {
    pub name: String,
    pub description: String,
}

/// Aggregate root: MaterialCatalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialCatalog {
    id: MaterialCatalogId,
    units: BTreeMap<String, Unit>,
    types: BTreeMap<String, MaterialType>,
    version: u64,
}

impl MaterialCatalog {
    pub fn empty(id: MaterialCatalogId) -> Self {
        Self {
            id,
            units: BTreeMap::new(),
            types: BTreeMap::new(),
            version: 0,
        }
    }

    pub fn id_typed(&self) -> MaterialCatalogId {
        self.id
    }

    pub fn unit(&self, name: &str) -> Option<&Unit> {
        self.units.get(name)
    }

    pub fn material_type(&self, name: &str) -> Option<&MaterialType> {
        self.types.get(name)
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    pub fn types(&self) -> impl Iterator<Item = &MaterialType> {
        self.types.values()
    }
}

impl AggregateRoot for MaterialCatalog {
    type Id = MaterialCatalogId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Commands. `Put*` upserts an entry by name; `Remove*` deletes it.
///
/// The "entry is still referenced by a material" guard on removal is a
/// pre-check in the API layer against the materials read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialCatalogCommand {
    PutUnit { unit: Unit, occurred_at: DateTime<Utc> },
    RemoveUnit { name: String, occurred_at: DateTime<Utc> },
    PutMaterialType { material_type: MaterialType, occurred_at: DateTime<Utc> },
    RemoveMaterialType { name: String, occurred_at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialCatalogEvent {
    UnitDefined { unit: Unit, occurred_at: DateTime<Utc> },
    UnitRemoved { name: String, occurred_at: DateTime<Utc> },
    MaterialTypeDefined { material_type: MaterialType, occurred_at: DateTime<Utc> },
    MaterialTypeRemoved { name: String, occurred_at: DateTime<Utc> },
}

impl Event for MaterialCatalogEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MaterialCatalogEvent::UnitDefined { .. } => "materials.catalog.unit_defined",
            MaterialCatalogEvent::UnitRemoved { .. } => "materials.catalog.unit_removed",
            MaterialCatalogEvent::MaterialTypeDefined { .. } => {
                "materials.catalog.material_type_defined"
            }
            MaterialCatalogEvent::MaterialTypeRemoved { .. } => {
                "materials.catalog.material_type_removed"
            }
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MaterialCatalogEvent::UnitDefined { occurred_at, .. }
            | MaterialCatalogEvent::UnitRemoved { occurred_at, .. }
            | MaterialCatalogEvent::MaterialTypeDefined { occurred_at, .. }
            | MaterialCatalogEvent::MaterialTypeRemoved { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for MaterialCatalog {
    type Command = MaterialCatalogCommand;
    type Event = MaterialCatalogEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MaterialCatalogEvent::UnitDefined { unit, .. } => {
                self.units.insert(unit.name.clone(), unit.clone());
            }
            MaterialCatalogEvent::UnitRemoved { name, .. } => {
                self.units.remove(name);
            }
            MaterialCatalogEvent::MaterialTypeDefined { material_type, .. } => {
                self.types.insert(material_type.name.clone(), material_type.clone());
            }
            MaterialCatalogEvent::MaterialTypeRemoved { name, .. } => {
                self.types.remove(name);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MaterialCatalogCommand::PutUnit { unit, occurred_at } => {
                if unit.name.trim().is_empty() || unit.symbol.trim().is_empty() {
                    return Err(DomainError::validation("unit name and symbol are required"));
                }
                Ok(vec![MaterialCatalogEvent::UnitDefined {
                    unit: unit.clone(),
                    occurred_at: *occurred_at,
                }])
            }
            MaterialCatalogCommand::RemoveUnit { name, occurred_at } => {
                if !self.units.contains_key(name) {
                    return Err(DomainError::not_found());
                }
                Ok(vec![MaterialCatalogEvent::UnitRemoved {
                    name: name.clone(),
                    occurred_at: *occurred_at,
                }])
            }
            MaterialCatalogCommand::PutMaterialType { material_type, occurred_at } => {
                if material_type.name.trim().is_empty() {
                    return Err(DomainError::validation("material type name is required"));
                }
                Ok(vec![MaterialCatalogEvent::MaterialTypeDefined {
                    material_type: material_type.clone(),
                    occurred_at: *occurred_at,
                }])
            }
            MaterialCatalogCommand::RemoveMaterialType { name, occurred_at } => {
                if !self.types.contains_key(name) {
                    return Err(DomainError::not_found());
                }
                Ok(vec![MaterialCatalogEvent::MaterialTypeRemoved {
                    name: name.clone(),
                    occurred_at: *occurred_at,
                }])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply_all(catalog: &mut MaterialCatalog, events: Vec<MaterialCatalogEvent>) {
        for ev in events {
            catalog.apply(&ev);
        }
    }

    #[test]
    fn put_is_an_upsert_by_name() {
        let mut catalog = MaterialCatalog::empty(MaterialCatalogId::singleton());

        let events = catalog
            .handle(&MaterialCatalogCommand::PutUnit {
                unit: Unit { name: "pieza".to_string(), symbol: "pz".to_string() },
                occurred_at: Utc::now(),
            })
            .unwrap();
        apply_all(&mut catalog, events);

        let events = catalog
            .handle(&MaterialCatalogCommand::PutUnit {
                unit: Unit { name: "pieza".to_string(), symbol: "pza".to_string() },
                occurred_at: Utc::now(),
            })
            .unwrap();
        apply_all(&mut catalog, events);

        assert_eq!(catalog.unit("pieza").unwrap().symbol, "pza");
        assert_eq!(catalog.units().count(), 1);
    }

    #[test]
    fn removing_an_unknown_type_is_not_found() {
        let catalog = MaterialCatalog::empty(MaterialCatalogId::singleton());
        let err = catalog
            .handle(&MaterialCatalogCommand::RemoveMaterialType {
                name: "Insumo".to_string(),
                occurred_at: Utc::now(),
            })
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }
}
