//! Trading reference catalog: countries and currencies.
//!
//! Single aggregate instance; uniqueness-by-name is an aggregate invariant.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use telar_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use telar_events::Event;

/// Catalog identifier (a singleton stream).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeCatalogId(pub AggregateId);

impl TradeCatalogId {
    pub fn singleton() -> Self {
        Self(AggregateId::derive("parties.catalog", "default"))
    }
}

/// Country entry (name + short symbol, e.g. "México" / "MX").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub name: String,
    pub symbol: String,
}

/// Currency entry (name + symbol, e.g. "Peso mexicano" / "MXN").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub name: String,
    pub symbol: String,
}

/// Aggregate root: TradeCatalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeCatalog {
    id: TradeCatalogId,
    countries: BTreeMap<String, Country>,
    currencies: BTreeMap<String, Currency>,
    version: u64,
}

impl TradeCatalog {
    pub fn empty(id: TradeCatalogId) -> Self {
        Self {
            id,
            countries: BTreeMap::new(),
            currencies: BTreeMap::new(),
            version: 0,
        }
    }

    pub fn id_typed(&self) -> TradeCatalogId {
        self.id
    }

    pub fn country(&self, name: &str) -> Option<&Country> {
        self.countries.get(name)
    }

    /// Currencies are keyed by symbol (the form/CSV value).
    pub fn currency(&self, symbol: &str) -> Option<&Currency> {
        self.currencies.get(symbol)
    }

    pub fn countries(&self) -> impl Iterator<Item = &Country> {
        self.countries.values()
    }

    pub fn currencies(&self) -> impl Iterator<Item = &Currency> {
        self.currencies.values()
    }
}

impl AggregateRoot for TradeCatalog {
    type Id = TradeCatalogId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Commands. `Put*` upserts; `Remove*` deletes. In-use guards are API-side
/// pre-checks against the suppliers/customers read models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeCatalogCommand {
    PutCountry { country: Country, occurred_at: DateTime<Utc> },
    RemoveCountry { name: String, occurred_at: DateTime<Utc> },
    PutCurrency { currency: Currency, occurred_at: DateTime<Utc> },
    RemoveCurrency { symbol: String, occurred_at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeCatalogEvent {
    CountryDefined { country: Country, occurred_at: DateTime<Utc> },
    CountryRemoved { name: String, occurred_at: DateTime<Utc> },
    CurrencyDefined { currency: Currency, occurred_at: DateTime<Utc> },
    CurrencyRemoved { symbol: String, occurred_at: DateTime<Utc> },
}

impl Event for TradeCatalogEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TradeCatalogEvent::CountryDefined { .. } => "parties.catalog.country_defined",
            TradeCatalogEvent::CountryRemoved { .. } => "parties.catalog.country_removed",
            TradeCatalogEvent::CurrencyDefined { .. } => "parties.catalog.currency_defined",
            TradeCatalogEvent::CurrencyRemoved { .. } => "parties.catalog.currency_removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TradeCatalogEvent::CountryDefined { occurred_at, .. }
            | TradeCatalogEvent::CountryRemoved { occurred_at, .. }
            | TradeCatalogEvent::CurrencyDefined { occurred_at, .. }
            | TradeCatalogEvent::CurrencyRemoved { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for TradeCatalog {
    type Command = TradeCatalogCommand;
    type Event = TradeCatalogEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TradeCatalogEvent::CountryDefined { country, .. } => {
                self.countries.insert(country.name.clone(), country.clone());
            }
            TradeCatalogEvent::CountryRemoved { name, .. } => {
                self.countries.remove(name);
            }
            TradeCatalogEvent::CurrencyDefined { currency, .. } => {
                self.currencies.insert(currency.symbol.clone(), currency.clone());
            }
            TradeCatalogEvent::CurrencyRemoved { symbol, .. } => {
                self.currencies.remove(symbol);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TradeCatalogCommand::PutCountry { country, occurred_at } => {
                if country.name.trim().is_empty() || country.symbol.trim().is_empty() {
                    return Err(DomainError::validation("country name and symbol are required"));
                }
                Ok(vec![TradeCatalogEvent::CountryDefined {
                    country: country.clone(),
                    occurred_at: *occurred_at,
                }])
            }
            TradeCatalogCommand::RemoveCountry { name, occurred_at } => {
                if !self.countries.contains_key(name) {
                    return Err(DomainError::not_found());
                }
                Ok(vec![TradeCatalogEvent::CountryRemoved {
                    name: name.clone(),
                    occurred_at: *occurred_at,
                }])
            }
            TradeCatalogCommand::PutCurrency { currency, occurred_at } => {
                if currency.name.trim().is_empty() || currency.symbol.trim().is_empty() {
                    return Err(DomainError::validation("currency name and symbol are required"));
                }
                Ok(vec![TradeCatalogEvent::CurrencyDefined {
                    currency: currency.clone(),
                    occurred_at: *occurred_at,
                }])
            }
            TradeCatalogCommand::RemoveCurrency { symbol, occurred_at } => {
                if !self.currencies.contains_key(symbol) {
                    return Err(DomainError::not_found());
                }
                Ok(vec![TradeCatalogEvent::CurrencyRemoved {
                    symbol: symbol.clone(),
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
    fn currencies_are_keyed_by_symbol() {
        let mut catalog = TradeCatalog::empty(TradeCatalogId::singleton());
        let events = catalog
            .handle(&TradeCatalogCommand::PutCurrency {
                currency: Currency { name: "Peso mexicano".to_string(), symbol: "MXN".to_string() },
                occurred_at: Utc::now(),
            })
            .unwrap();
        for ev in events {
            catalog.apply(&ev);
        }

        assert!(catalog.currency("MXN").is_some());
        assert!(catalog.currency("Peso mexicano").is_none());
    }
}
