//! Reference-catalog read models.
//!
//! The catalogs are small singleton aggregates, so their read model is the
//! aggregate state itself, rehydrated from the published envelopes.

use std::sync::RwLock;

use serde_json::Value as JsonValue;

use telar_accounting::{AccountCatalog, AccountCatalogId, AccountGroup, AccountNature, AccountType};
use telar_core::Aggregate;
use telar_events::EventEnvelope;
use telar_materials::{MaterialCatalog, MaterialCatalogId, MaterialType, Unit};
use telar_parties::{Country, Currency, TradeCatalog, TradeCatalogId};

use super::{Cursors, ProjectionError};

/// All three reference catalogs behind one consumer.
#[derive(Debug)]
pub struct CatalogsProjection {
    materials: RwLock<MaterialCatalog>,
    trade: RwLock<TradeCatalog>,
    accounts: RwLock<AccountCatalog>,
    cursors: Cursors,
}

impl CatalogsProjection {
    pub fn new() -> Self {
        Self {
            materials: RwLock::new(MaterialCatalog::empty(MaterialCatalogId::singleton())),
            trade: RwLock::new(TradeCatalog::empty(TradeCatalogId::singleton())),
            accounts: RwLock::new(AccountCatalog::empty(AccountCatalogId::singleton())),
            cursors: Cursors::new(),
        }
    }

    pub fn units(&self) -> Vec<Unit> {
        self.materials
            .read()
            .map(|c| c.units().cloned().collect())
            .unwrap_or_default()
    }

    pub fn material_types(&self) -> Vec<MaterialType> {
        self.materials
            .read()
            .map(|c| c.types().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_material_type(&self, name: &str) -> bool {
        self.materials
            .read()
            .map(|c| c.material_type(name).is_some())
            .unwrap_or(false)
    }

    pub fn countries(&self) -> Vec<Country> {
        self.trade
            .read()
            .map(|c| c.countries().cloned().collect())
            .unwrap_or_default()
    }

    pub fn currencies(&self) -> Vec<Currency> {
        self.trade
            .read()
            .map(|c| c.currencies().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_country(&self, name: &str) -> bool {
        self.trade.read().map(|c| c.country(name).is_some()).unwrap_or(false)
    }

    pub fn currency(&self, symbol: &str) -> Option<Currency> {
        self.trade.read().ok().and_then(|c| c.currency(symbol).cloned())
    }

    pub fn account_types(&self) -> Vec<AccountType> {
        self.accounts
            .read()
            .map(|c| c.types().cloned().collect())
            .unwrap_or_default()
    }

    pub fn account_groups(&self) -> Vec<AccountGroup> {
        self.accounts
            .read()
            .map(|c| c.groups().cloned().collect())
            .unwrap_or_default()
    }

    pub fn account_natures(&self) -> Vec<AccountNature> {
        self.accounts
            .read()
            .map(|c| c.natures().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_account_type(&self, code: &str) -> bool {
        self.accounts
            .read()
            .map(|c| c.account_type(code).is_some())
            .unwrap_or(false)
    }

    pub fn has_account_group(&self, code: &str) -> bool {
        self.accounts.read().map(|c| c.group(code).is_some()).unwrap_or(false)
    }

    pub fn has_account_nature(&self, code: &str) -> bool {
        self.accounts.read().map(|c| c.nature(code).is_some()).unwrap_or(false)
    }

    /// Apply a catalog envelope (any of the three aggregate types).
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.begin(aggregate_id, seq)? {
            return Ok(());
        }

        match envelope.aggregate_type() {
            "materials.catalog" => {
                let event = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
                if let Ok(mut catalog) = self.materials.write() {
                    catalog.apply(&event);
                }
            }
            "parties.catalog" => {
                let event = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
                if let Ok(mut catalog) = self.trade.write() {
                    catalog.apply(&event);
                }
            }
            _ => {
                let event = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
                if let Ok(mut catalog) = self.accounts.write() {
                    catalog.apply(&event);
                }
            }
        }

        self.cursors.commit(aggregate_id, seq);
        Ok(())
    }
}

impl Default for CatalogsProjection {
    fn default() -> Self {
        Self::new()
    }
}
