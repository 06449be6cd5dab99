//! Purchase orders: header + lines, a closed status machine, and the
//! receipt decisions that feed the inventory ledger.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use telar_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use telar_events::Event;

/// Purchase order identifier, derived from the order code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub AggregateId);

impl PurchaseOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn for_code(code: &str) -> Self {
        Self(AggregateId::derive("purchasing.order", code))
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Purchase order status lifecycle.
///
/// Transitions are validated centrally in [`OrderStatus::can_transition_to`];
/// Recibida and Cancelada are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pendiente,
    Aprobada,
    Enviada,
    Recibida,
    Cancelada,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pendiente => "Pendiente",
            OrderStatus::Aprobada => "Aprobada",
            OrderStatus::Enviada => "Enviada",
            OrderStatus::Recibida => "Recibida",
            OrderStatus::Cancelada => "Cancelada",
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pendiente, Aprobada)
                | (Pendiente, Cancelada)
                | (Aprobada, Enviada)
                | (Aprobada, Cancelada)
                | (Enviada, Recibida)
                | (Enviada, Cancelada)
        )
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Pendiente" => Ok(OrderStatus::Pendiente),
            "Aprobada" => Ok(OrderStatus::Aprobada),
            "Enviada" => Ok(OrderStatus::Enviada),
            "Recibida" => Ok(OrderStatus::Recibida),
            "Cancelada" => Ok(OrderStatus::Cancelada),
            other => Err(DomainError::validation(format!(
                "status must be Pendiente, Aprobada, Enviada, Recibida or Cancelada (got '{other}')"
            ))),
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line as supplied by the operator (no receipt bookkeeping yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLine {
    pub material: String,
    pub quantity: i64,
    pub unit: String,
    pub unit_price: f64,
    /// Supplier currency for this line.
    pub currency: String,
}

/// Stored order line with cumulative receipt bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub position: u32,
    pub material: String,
    pub quantity: i64,
    pub unit: String,
    pub unit_price: f64,
    pub currency: String,
    /// Cumulative quantity already received into inventory.
    /// Invariant: `resolved_quantity <= quantity`.
    pub resolved_quantity: i64,
}

impl OrderLine {
    pub fn pending(&self) -> i64 {
        self.quantity - self.resolved_quantity
    }
}

/// One line's share of a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineReceipt {
    pub position: u32,
    pub material: String,
    pub quantity: i64,
    pub unit: String,
}

/// A line the operator asked to receive but that was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLine {
    pub position: u32,
    pub material: String,
    pub reason: String,
}

/// Operator-supplied quantity for one line of a partial receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineQuantity {
    pub position: u32,
    pub quantity: i64,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    code: String,
    supplier: String,
    issue_date: NaiveDate,
    estimated_delivery_date: NaiveDate,
    status: OrderStatus,
    currency: String,
    notes: String,
    created_by: String,
    lines: Vec<OrderLine>,
    version: u64,
    created: bool,
    deleted: bool,
}

impl PurchaseOrder {
    /// Empty aggregate for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            code: String::new(),
            supplier: String::new(),
            issue_date: NaiveDate::default(),
            estimated_delivery_date: NaiveDate::default(),
            status: OrderStatus::Pendiente,
            currency: String::new(),
            notes: String::new(),
            created_by: String::new(),
            lines: Vec::new(),
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Σ quantity × unit price over the lines.
    pub fn total_amount(&self) -> f64 {
        self.lines
            .iter()
            .map(|l| l.quantity as f64 * l.unit_price)
            .sum()
    }

    pub fn has_receipts(&self) -> bool {
        self.lines.iter().any(|l| l.resolved_quantity > 0)
    }

    pub fn supplier(&self) -> &str {
        &self.supplier
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateOrder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub order_id: PurchaseOrderId,
    pub code: String,
    pub supplier: String,
    pub issue_date: NaiveDate,
    pub estimated_delivery_date: NaiveDate,
    pub status: OrderStatus,
    pub currency: String,
    pub notes: String,
    pub lines: Vec<NewLine>,
    pub created_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReviseOrder. Replaces header fields and the whole line set
/// (the edit-form semantics); only allowed before any receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviseOrder {
    pub order_id: PurchaseOrderId,
    pub supplier: String,
    pub issue_date: NaiveDate,
    pub estimated_delivery_date: NaiveDate,
    pub currency: String,
    pub notes: String,
    pub lines: Vec<NewLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub order_id: PurchaseOrderId,
    pub status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOrder {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveFull: receive every pending quantity at the main
/// location. Idempotent: with nothing pending it decides nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveFull {
    pub order_id: PurchaseOrderId,
    pub location: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceivePartial: operator-chosen quantities per line at an
/// operator-chosen location. Lines exceeding their pending amount are
/// skipped with an itemized reason while valid lines proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivePartial {
    pub order_id: PurchaseOrderId,
    pub location: String,
    pub quantities: Vec<LineQuantity>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreateOrder(CreateOrder),
    ReviseOrder(ReviseOrder),
    ChangeStatus(ChangeStatus),
    DeleteOrder(DeleteOrder),
    ReceiveFull(ReceiveFull),
    ReceivePartial(ReceivePartial),
}

/// Event: OrderCreated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: PurchaseOrderId,
    pub code: String,
    pub supplier: String,
    pub issue_date: NaiveDate,
    pub estimated_delivery_date: NaiveDate,
    pub status: OrderStatus,
    pub currency: String,
    pub notes: String,
    pub lines: Vec<OrderLine>,
    pub total_amount: f64,
    pub created_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderRevised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRevised {
    pub order_id: PurchaseOrderId,
    pub code: String,
    pub supplier: String,
    pub issue_date: NaiveDate,
    pub estimated_delivery_date: NaiveDate,
    pub currency: String,
    pub notes: String,
    pub lines: Vec<OrderLine>,
    pub total_amount: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub order_id: PurchaseOrderId,
    pub code: String,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDeleted {
    pub order_id: PurchaseOrderId,
    pub code: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GoodsReceived.
///
/// Carries everything the receipt bridge needs to record the matching
/// Entrada movements, plus the itemized lines that were refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceived {
    pub order_id: PurchaseOrderId,
    pub code: String,
    pub supplier: String,
    pub location: String,
    pub receipts: Vec<LineReceipt>,
    pub skipped: Vec<SkippedLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    OrderCreated(OrderCreated),
    OrderRevised(OrderRevised),
    StatusChanged(StatusChanged),
    OrderDeleted(OrderDeleted),
    GoodsReceived(GoodsReceived),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::OrderCreated(_) => "purchasing.order.created",
            PurchaseOrderEvent::OrderRevised(_) => "purchasing.order.revised",
            PurchaseOrderEvent::StatusChanged(_) => "purchasing.order.status_changed",
            PurchaseOrderEvent::OrderDeleted(_) => "purchasing.order.deleted",
            PurchaseOrderEvent::GoodsReceived(_) => "purchasing.order.goods_received",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::OrderCreated(e) => e.occurred_at,
            PurchaseOrderEvent::OrderRevised(e) => e.occurred_at,
            PurchaseOrderEvent::StatusChanged(e) => e.occurred_at,
            PurchaseOrderEvent::OrderDeleted(e) => e.occurred_at,
            PurchaseOrderEvent::GoodsReceived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::OrderCreated(e) => {
                self.id = e.order_id;
                self.code = e.code.clone();
                self.supplier = e.supplier.clone();
                self.issue_date = e.issue_date;
                self.estimated_delivery_date = e.estimated_delivery_date;
                self.status = e.status;
                self.currency = e.currency.clone();
                self.notes = e.notes.clone();
                self.created_by = e.created_by.clone();
                self.lines = e.lines.clone();
                self.created = true;
                self.deleted = false;
            }
            PurchaseOrderEvent::OrderRevised(e) => {
                self.supplier = e.supplier.clone();
                self.issue_date = e.issue_date;
                self.estimated_delivery_date = e.estimated_delivery_date;
                self.currency = e.currency.clone();
                self.notes = e.notes.clone();
                self.lines = e.lines.clone();
            }
            PurchaseOrderEvent::StatusChanged(e) => {
                self.status = e.to;
            }
            PurchaseOrderEvent::OrderDeleted(_) => {
                self.deleted = true;
            }
            PurchaseOrderEvent::GoodsReceived(e) => {
                for receipt in &e.receipts {
                    if let Some(line) =
                        self.lines.iter_mut().find(|l| l.position == receipt.position)
                    {
                        line.resolved_quantity += receipt.quantity;
                    }
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreateOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::ReviseOrder(cmd) => self.handle_revise(cmd),
            PurchaseOrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            PurchaseOrderCommand::DeleteOrder(cmd) => self.handle_delete(cmd),
            PurchaseOrderCommand::ReceiveFull(cmd) => self.handle_receive_full(cmd),
            PurchaseOrderCommand::ReceivePartial(cmd) => self.handle_receive_partial(cmd),
        }
    }
}

fn number_lines(lines: &[NewLine]) -> Result<Vec<OrderLine>, DomainError> {
    let mut numbered = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if line.material.trim().is_empty() {
            return Err(DomainError::validation("line material cannot be empty"));
        }
        if line.quantity <= 0 {
            return Err(DomainError::validation("line quantity must be positive"));
        }
        if line.unit_price < 0.0 {
            return Err(DomainError::validation("line price cannot be negative"));
        }
        numbered.push(OrderLine {
            position: (idx as u32) + 1,
            material: line.material.clone(),
            quantity: line.quantity,
            unit: line.unit.clone(),
            unit_price: line.unit_price,
            currency: line.currency.clone(),
            resolved_quantity: 0,
        });
    }
    Ok(numbered)
}

fn lines_total(lines: &[OrderLine]) -> f64 {
    lines.iter().map(|l| l.quantity as f64 * l.unit_price).sum()
}

impl PurchaseOrder {
    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created && !self.deleted {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        if cmd.code.trim().is_empty() {
            return Err(DomainError::validation("order code cannot be empty"));
        }
        if cmd.supplier.trim().is_empty() {
            return Err(DomainError::validation("supplier cannot be empty"));
        }
        if cmd.currency.trim().is_empty() {
            return Err(DomainError::validation("currency cannot be empty"));
        }

        let lines = number_lines(&cmd.lines)?;
        let total_amount = lines_total(&lines);

        Ok(vec![PurchaseOrderEvent::OrderCreated(OrderCreated {
            order_id: cmd.order_id,
            code: cmd.code.clone(),
            supplier: cmd.supplier.clone(),
            issue_date: cmd.issue_date,
            estimated_delivery_date: cmd.estimated_delivery_date,
            status: cmd.status,
            currency: cmd.currency.clone(),
            notes: cmd.notes.clone(),
            lines,
            total_amount,
            created_by: cmd.created_by.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revise(&self, cmd: &ReviseOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_live()?;
        if self.has_receipts() {
            return Err(DomainError::invariant(
                "cannot revise an order with received quantities",
            ));
        }
        if self.status == OrderStatus::Cancelada {
            return Err(DomainError::invariant("cannot revise a cancelled order"));
        }
        if cmd.supplier.trim().is_empty() {
            return Err(DomainError::validation("supplier cannot be empty"));
        }

        let lines = number_lines(&cmd.lines)?;
        let total_amount = lines_total(&lines);

        Ok(vec![PurchaseOrderEvent::OrderRevised(OrderRevised {
            order_id: cmd.order_id,
            code: self.code.clone(),
            supplier: cmd.supplier.clone(),
            issue_date: cmd.issue_date,
            estimated_delivery_date: cmd.estimated_delivery_date,
            currency: cmd.currency.clone(),
            notes: cmd.notes.clone(),
            lines,
            total_amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(
        &self,
        cmd: &ChangeStatus,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_live()?;
        if cmd.status == self.status {
            return Ok(vec![]);
        }
        if !self.status.can_transition_to(cmd.status) {
            return Err(DomainError::invariant(format!(
                "invalid status transition {} -> {}",
                self.status, cmd.status
            )));
        }

        Ok(vec![PurchaseOrderEvent::StatusChanged(StatusChanged {
            order_id: cmd.order_id,
            code: self.code.clone(),
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_live()?;
        if self.has_receipts() {
            return Err(DomainError::invariant(
                "cannot delete an order with received quantities",
            ));
        }

        Ok(vec![PurchaseOrderEvent::OrderDeleted(OrderDeleted {
            order_id: cmd.order_id,
            code: self.code.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive_full(
        &self,
        cmd: &ReceiveFull,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_live()?;
        if self.status != OrderStatus::Recibida {
            return Err(DomainError::invariant(
                "order must be in status Recibida to process the receipt",
            ));
        }
        if cmd.location.trim().is_empty() {
            return Err(DomainError::validation("receipt location is required"));
        }

        let receipts: Vec<LineReceipt> = self
            .lines
            .iter()
            .filter(|l| l.pending() > 0)
            .map(|l| LineReceipt {
                position: l.position,
                material: l.material.clone(),
                quantity: l.pending(),
                unit: l.unit.clone(),
            })
            .collect();

        // Nothing pending: a repeated full receipt decides nothing.
        if receipts.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![PurchaseOrderEvent::GoodsReceived(GoodsReceived {
            order_id: cmd.order_id,
            code: self.code.clone(),
            supplier: self.supplier.clone(),
            location: cmd.location.clone(),
            receipts,
            skipped: Vec::new(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive_partial(
        &self,
        cmd: &ReceivePartial,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_live()?;
        if self.status == OrderStatus::Cancelada {
            return Err(DomainError::invariant("cannot receive a cancelled order"));
        }
        if cmd.location.trim().is_empty() {
            return Err(DomainError::validation("receipt location is required"));
        }

        let mut receipts = Vec::new();
        let mut skipped = Vec::new();

        for lq in &cmd.quantities {
            if lq.quantity <= 0 {
                continue;
            }
            let Some(line) = self.lines.iter().find(|l| l.position == lq.position) else {
                skipped.push(SkippedLine {
                    position: lq.position,
                    material: String::new(),
                    reason: "unknown line position".to_string(),
                });
                continue;
            };
            if lq.quantity > line.pending() {
                skipped.push(SkippedLine {
                    position: line.position,
                    material: line.material.clone(),
                    reason: format!(
                        "received quantity exceeds the pending amount (pending {})",
                        line.pending()
                    ),
                });
                continue;
            }
            receipts.push(LineReceipt {
                position: line.position,
                material: line.material.clone(),
                quantity: lq.quantity,
                unit: line.unit.clone(),
            });
        }

        if receipts.is_empty() {
            if skipped.is_empty() {
                return Err(DomainError::validation("no received quantities supplied"));
            }
            let reasons: Vec<String> = skipped
                .iter()
                .map(|s| format!("line {}: {}", s.position, s.reason))
                .collect();
            return Err(DomainError::invariant(reasons.join("; ")));
        }

        Ok(vec![PurchaseOrderEvent::GoodsReceived(GoodsReceived {
            order_id: cmd.order_id,
            code: self.code.clone(),
            supplier: self.supplier.clone(),
            location: cmd.location.clone(),
            receipts,
            skipped,
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

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn two_line_order() -> PurchaseOrder {
        let order_id = PurchaseOrderId::for_code("OC-2024-001");
        let mut order = PurchaseOrder::empty(order_id);
        let events = order
            .handle(&PurchaseOrderCommand::CreateOrder(CreateOrder {
                order_id,
                code: "OC-2024-001".to_string(),
                supplier: "PROV-001".to_string(),
                issue_date: date("2024-01-15"),
                estimated_delivery_date: date("2024-02-01"),
                status: OrderStatus::Pendiente,
                currency: "MXN".to_string(),
                notes: String::new(),
                lines: vec![
                    NewLine {
                        material: "MAT-001".to_string(),
                        quantity: 100,
                        unit: "pza".to_string(),
                        unit_price: 12.5,
                        currency: "MXN".to_string(),
                    },
                    NewLine {
                        material: "MAT-002".to_string(),
                        quantity: 40,
                        unit: "m".to_string(),
                        unit_price: 80.0,
                        currency: "MXN".to_string(),
                    },
                ],
                created_by: "ana".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for ev in events {
            order.apply(&ev);
        }
        order
    }

    fn apply_all(order: &mut PurchaseOrder, events: Vec<PurchaseOrderEvent>) {
        for ev in events {
            order.apply(&ev);
        }
    }

    fn drive_to_recibida(order: &mut PurchaseOrder) {
        for status in [OrderStatus::Aprobada, OrderStatus::Enviada, OrderStatus::Recibida] {
            let events = order
                .handle(&PurchaseOrderCommand::ChangeStatus(ChangeStatus {
                    order_id: order.id_typed(),
                    status,
                    occurred_at: test_time(),
                }))
                .unwrap();
            apply_all(order, events);
        }
    }

    #[test]
    fn total_amount_is_the_sum_of_lines() {
        let order = two_line_order();
        assert_eq!(order.total_amount(), 100.0 * 12.5 + 40.0 * 80.0);
    }

    #[test]
    fn status_must_follow_the_transition_table() {
        let mut order = two_line_order();
        let err = order
            .handle(&PurchaseOrderCommand::ChangeStatus(ChangeStatus {
                order_id: order.id_typed(),
                status: OrderStatus::Recibida,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        drive_to_recibida(&mut order);
        assert_eq!(order.status(), OrderStatus::Recibida);
    }

    #[test]
    fn receive_full_requires_status_recibida() {
        let order = two_line_order();
        let err = order
            .handle(&PurchaseOrderCommand::ReceiveFull(ReceiveFull {
                order_id: order.id_typed(),
                location: "ALM-01".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn receive_full_is_idempotent() {
        let mut order = two_line_order();
        drive_to_recibida(&mut order);

        let cmd = PurchaseOrderCommand::ReceiveFull(ReceiveFull {
            order_id: order.id_typed(),
            location: "ALM-01".to_string(),
            occurred_at: test_time(),
        });

        let events = order.handle(&cmd).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            PurchaseOrderEvent::GoodsReceived(e) => {
                assert_eq!(e.receipts.len(), 2);
                assert_eq!(e.receipts[0].quantity, 100);
                assert_eq!(e.receipts[1].quantity, 40);
            }
            _ => panic!("Expected GoodsReceived event"),
        }
        apply_all(&mut order, events);
        assert!(order.lines().iter().all(|l| l.pending() == 0));

        // Second call: nothing pending, nothing decided.
        let events = order.handle(&cmd).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn receive_partial_skips_overdrawn_lines_and_keeps_the_rest() {
        let mut order = two_line_order();
        drive_to_recibida(&mut order);

        let events = order
            .handle(&PurchaseOrderCommand::ReceivePartial(ReceivePartial {
                order_id: order.id_typed(),
                location: "ALM-02".to_string(),
                quantities: vec![
                    LineQuantity { position: 1, quantity: 60 },
                    LineQuantity { position: 2, quantity: 500 },
                ],
                occurred_at: test_time(),
            }))
            .unwrap();

        match &events[0] {
            PurchaseOrderEvent::GoodsReceived(e) => {
                assert_eq!(e.receipts.len(), 1);
                assert_eq!(e.receipts[0].position, 1);
                assert_eq!(e.receipts[0].quantity, 60);
                assert_eq!(e.skipped.len(), 1);
                assert_eq!(e.skipped[0].position, 2);
            }
            _ => panic!("Expected GoodsReceived event"),
        }
        apply_all(&mut order, events);
        assert_eq!(order.lines()[0].resolved_quantity, 60);
        assert_eq!(order.lines()[1].resolved_quantity, 0);
    }

    #[test]
    fn resolved_quantity_never_exceeds_quantity() {
        let mut order = two_line_order();
        drive_to_recibida(&mut order);

        // Partial 60, then a full receipt resolves only the remaining 40.
        let events = order
            .handle(&PurchaseOrderCommand::ReceivePartial(ReceivePartial {
                order_id: order.id_typed(),
                location: "ALM-01".to_string(),
                quantities: vec![LineQuantity { position: 1, quantity: 60 }],
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, events);

        let events = order
            .handle(&PurchaseOrderCommand::ReceiveFull(ReceiveFull {
                order_id: order.id_typed(),
                location: "ALM-01".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap();
        match &events[0] {
            PurchaseOrderEvent::GoodsReceived(e) => {
                let first = e.receipts.iter().find(|r| r.position == 1).unwrap();
                assert_eq!(first.quantity, 40);
            }
            _ => panic!("Expected GoodsReceived event"),
        }
        apply_all(&mut order, events);

        for line in order.lines() {
            assert!(line.resolved_quantity <= line.quantity);
            assert_eq!(line.pending(), 0);
        }
    }

    #[test]
    fn revise_is_refused_after_a_receipt() {
        let mut order = two_line_order();
        drive_to_recibida(&mut order);
        let events = order
            .handle(&PurchaseOrderCommand::ReceivePartial(ReceivePartial {
                order_id: order.id_typed(),
                location: "ALM-01".to_string(),
                quantities: vec![LineQuantity { position: 1, quantity: 10 }],
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, events);

        let err = order
            .handle(&PurchaseOrderCommand::ReviseOrder(ReviseOrder {
                order_id: order.id_typed(),
                supplier: "PROV-002".to_string(),
                issue_date: date("2024-01-20"),
                estimated_delivery_date: date("2024-02-10"),
                currency: "MXN".to_string(),
                notes: String::new(),
                lines: vec![],
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }
}
