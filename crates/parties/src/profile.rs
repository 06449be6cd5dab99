//! Shared trading-party profile (suppliers and customers carry the same
//! contact/commercial field set).

use serde::{Deserialize, Serialize};

use telar_core::DomainError;

/// Editable party fields (everything except the code).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PartyProfile {
    pub legal_name: String,
    pub name: String,
    /// Country name, validated against the catalog in the API layer.
    pub country: String,
    /// Currency symbol (e.g. "MXN"), validated against the catalog.
    pub currency: String,
    pub tax_id: String,
    pub state_province: String,
    pub city: String,
    pub address: String,
    pub zip_code: String,
    pub phone: String,
    pub email: String,
    pub contact_name: String,
    pub contact_role: String,
    pub category: String,
    pub payment_terms: String,
    pub payment_method: String,
    pub bank_account: String,
    pub active: bool,
}

impl PartyProfile {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.legal_name.trim().is_empty() {
            return Err(DomainError::validation("legal name cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.country.trim().is_empty() {
            return Err(DomainError::validation("country cannot be empty"));
        }
        if self.currency.trim().is_empty() {
            return Err(DomainError::validation("currency cannot be empty"));
        }
        Ok(())
    }
}
