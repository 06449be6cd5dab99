//! Sale orders: one guarded decision that records the sale line and the
//! balanced journal pair in a single event.
//!
//! Stock is decremented by the Salida movement the API bridge dispatches on
//! the stock ledger before recording the sale; this aggregate only decides
//! the sale itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use telar_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use telar_events::Event;

/// Sale order identifier, derived from the sale code (e.g. "VTA-2406151030").
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleOrderId(pub AggregateId);

impl SaleOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn for_code(code: &str) -> Self {
        Self(AggregateId::derive("sales.order", code))
    }
}

impl core::fmt::Display for SaleOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: SaleOrder (header + its single line).
#[derive(Debug, Clone, PartialEq)]
pub struct SaleOrder {
    id: SaleOrderId,
    code: String,
    customer: String,
    location: String,
    material: String,
    quantity: i64,
    unit_price: f64,
    total_amount: f64,
    version: u64,
    created: bool,
}

impl SaleOrder {
    /// Empty aggregate for rehydration.
    pub fn empty(id: SaleOrderId) -> Self {
        Self {
            id,
            code: String::new(),
            customer: String::new(),
            location: String::new(),
            material: String::new(),
            quantity: 0,
            unit_price: 0.0,
            total_amount: 0.0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SaleOrderId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn total_amount(&self) -> f64 {
        self.total_amount
    }

    pub fn customer(&self) -> &str {
        &self.customer
    }

    pub fn material(&self) -> &str {
        &self.material
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> f64 {
        self.unit_price
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

impl AggregateRoot for SaleOrder {
    type Id = SaleOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordSale.
///
/// Both ledger accounts must be supplied; the debit side receives the total
/// (receivable/cash), the credit side the revenue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSale {
    pub sale_id: SaleOrderId,
    pub code: String,
    pub customer: String,
    pub location: String,
    pub material: String,
    pub quantity: i64,
    pub unit: String,
    pub unit_price: f64,
    pub currency: String,
    pub debit_account: String,
    pub credit_account: String,
    pub recorded_by: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SaleCommand {
    RecordSale(RecordSale),
}

/// Event: SaleRecorded.
///
/// Carries the sale line and the two balanced journal amounts; the journal
/// projection consumes this directly as a posted entry referencing the sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub sale_id: SaleOrderId,
    pub code: String,
    pub customer: String,
    pub location: String,
    pub material: String,
    pub quantity: i64,
    pub unit: String,
    pub unit_price: f64,
    pub subtotal: f64,
    pub total_amount: f64,
    pub currency: String,
    pub debit_account: String,
    pub credit_account: String,
    pub recorded_by: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SaleEvent {
    SaleRecorded(SaleRecorded),
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::SaleRecorded(_) => "sales.order.recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::SaleRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SaleOrder {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::SaleRecorded(e) => {
                self.id = e.sale_id;
                self.code = e.code.clone();
                self.customer = e.customer.clone();
                self.location = e.location.clone();
                self.material = e.material.clone();
                self.quantity = e.quantity;
                self.unit_price = e.unit_price;
                self.total_amount = e.total_amount;
                self.created = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::RecordSale(cmd) => self.handle_record(cmd),
        }
    }
}

impl SaleOrder {
    fn handle_record(&self, cmd: &RecordSale) -> Result<Vec<SaleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sale already recorded"));
        }
        if cmd.customer.trim().is_empty() {
            return Err(DomainError::validation("customer is required"));
        }
        if cmd.location.trim().is_empty() {
            return Err(DomainError::validation("location is required"));
        }
        if cmd.material.trim().is_empty() {
            return Err(DomainError::validation("material is required"));
        }
        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if cmd.unit_price < 0.0 {
            return Err(DomainError::validation("price cannot be negative"));
        }
        if cmd.debit_account.trim().is_empty() || cmd.credit_account.trim().is_empty() {
            return Err(DomainError::validation(
                "debit and credit accounts must be selected",
            ));
        }

        let total = cmd.quantity as f64 * cmd.unit_price;

        Ok(vec![SaleEvent::SaleRecorded(SaleRecorded {
            sale_id: cmd.sale_id,
            code: cmd.code.clone(),
            customer: cmd.customer.clone(),
            location: cmd.location.clone(),
            material: cmd.material.clone(),
            quantity: cmd.quantity,
            unit: cmd.unit.clone(),
            unit_price: cmd.unit_price,
            subtotal: total,
            total_amount: total,
            currency: cmd.currency.clone(),
            debit_account: cmd.debit_account.clone(),
            credit_account: cmd.credit_account.clone(),
            recorded_by: cmd.recorded_by.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale_cmd() -> RecordSale {
        RecordSale {
            sale_id: SaleOrderId::for_code("VTA-2406151030"),
            code: "VTA-2406151030".to_string(),
            customer: "CLI-001".to_string(),
            location: "ALM-01".to_string(),
            material: "MAT-001".to_string(),
            quantity: 10,
            unit: "pza".to_string(),
            unit_price: 20.0,
            currency: "MXN".to_string(),
            debit_account: "1105".to_string(),
            credit_account: "4105".to_string(),
            recorded_by: "ana".to_string(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn sale_carries_a_balanced_journal_pair() {
        let sale = SaleOrder::empty(sale_cmd().sale_id);
        let events = sale.handle(&SaleCommand::RecordSale(sale_cmd())).unwrap();

        match &events[0] {
            SaleEvent::SaleRecorded(e) => {
                assert_eq!(e.total_amount, 200.0);
                assert_eq!(e.subtotal, e.total_amount);
                assert_eq!(e.debit_account, "1105");
                assert_eq!(e.credit_account, "4105");
            }
        }
    }

    #[test]
    fn missing_accounts_abort_before_any_event() {
        let sale = SaleOrder::empty(sale_cmd().sale_id);
        let mut cmd = sale_cmd();
        cmd.credit_account = String::new();

        let err = sale.handle(&SaleCommand::RecordSale(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn a_sale_code_can_only_be_recorded_once() {
        let mut sale = SaleOrder::empty(sale_cmd().sale_id);
        let events = sale.handle(&SaleCommand::RecordSale(sale_cmd())).unwrap();
        for ev in events {
            sale.apply(&ev);
        }

        let err = sale.handle(&SaleCommand::RecordSale(sale_cmd())).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }
}
