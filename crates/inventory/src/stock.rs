//! Stock ledger: the movement log per (location, material) pair.
//!
//! Movements are the source of truth; the running balance is folded from
//! them inside the aggregate and mirrored by the stock projection. A
//! balance can therefore never diverge from its movement log, and two
//! concurrent writers to the same pair collide on the optimistic append
//! instead of losing an update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use telar_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use telar_events::Event;

/// Stock ledger identifier, derived from the (location, material) pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockLedgerId(pub AggregateId);

impl StockLedgerId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// One ledger per (location code, material code) pair.
    pub fn for_pair(location: &str, material: &str) -> Self {
        Self(AggregateId::derive("inventory.stock", &format!("{location}\u{1f}{material}")))
    }
}

impl core::fmt::Display for StockLedgerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Inventory movement kind.
///
/// Entrada adds to stock, Salida subtracts (guarded), Ajuste overwrites the
/// balance with an absolute value (not a delta).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementKind {
    Entrada,
    Salida,
    Ajuste,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Entrada => "ENTRADA",
            MovementKind::Salida => "SALIDA",
            MovementKind::Ajuste => "AJUSTE",
        }
    }
}

impl core::str::FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ENTRADA" => Ok(MovementKind::Entrada),
            "SALIDA" => Ok(MovementKind::Salida),
            "AJUSTE" => Ok(MovementKind::Ajuste),
            other => Err(DomainError::validation(format!(
                "movement kind must be ENTRADA, SALIDA or AJUSTE (got '{other}')"
            ))),
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded movement, kept in aggregate state so reversals can be
/// validated and `last_movement` recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MovementRecord {
    movement_id: Uuid,
    kind: MovementKind,
    quantity: i64,
    occurred_at: DateTime<Utc>,
    reversed: bool,
}

/// Aggregate root: StockLedger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLedger {
    id: StockLedgerId,
    location: String,
    material: String,
    balance: i64,
    unit: String,
    min_stock: i64,
    max_stock: i64,
    last_movement: Option<DateTime<Utc>>,
    movements: Vec<MovementRecord>,
    version: u64,
    created: bool,
}

impl StockLedger {
    /// Empty aggregate for rehydration. The ledger springs into existence
    /// with its first movement, seeded at quantity 0.
    pub fn empty(id: StockLedgerId) -> Self {
        Self {
            id,
            location: String::new(),
            material: String::new(),
            balance: 0,
            unit: String::new(),
            min_stock: 0,
            max_stock: 0,
            last_movement: None,
            movements: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> StockLedgerId {
        self.id
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn last_movement(&self) -> Option<DateTime<Utc>> {
        self.last_movement
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn material(&self) -> &str {
        &self.material
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn stock_levels(&self) -> (i64, i64) {
        (self.min_stock, self.max_stock)
    }
}

impl AggregateRoot for StockLedger {
    type Id = StockLedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordMovement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub ledger_id: StockLedgerId,
    /// Caller-supplied so decisions stay deterministic.
    pub movement_id: Uuid,
    pub location: String,
    pub material: String,
    pub kind: MovementKind,
    pub quantity: i64,
    pub unit: String,
    pub note: String,
    pub recorded_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseMovement (movement deletion semantics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseMovement {
    pub ledger_id: StockLedgerId,
    pub movement_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetStockLevels (min/max threshold maintenance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStockLevels {
    pub ledger_id: StockLedgerId,
    pub min_stock: i64,
    pub max_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    RecordMovement(RecordMovement),
    ReverseMovement(ReverseMovement),
    SetStockLevels(SetStockLevels),
}

/// Event: MovementRecorded. Carries the post-movement balance so
/// projections fold without re-deriving arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecorded {
    pub ledger_id: StockLedgerId,
    pub movement_id: Uuid,
    pub location: String,
    pub material: String,
    pub kind: MovementKind,
    pub quantity: i64,
    pub unit: String,
    pub note: String,
    pub recorded_by: String,
    /// Balance after applying this movement.
    pub balance: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MovementReversed.
///
/// `stock_unchanged` marks an Ajuste reversal: the prior value is not
/// retained, so the balance is left alone and the caller surfaces a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementReversed {
    pub ledger_id: StockLedgerId,
    pub location: String,
    pub material: String,
    pub movement_id: Uuid,
    /// Signed correction applied to the balance (0 for Ajuste reversals;
    /// Entrada reversals clamp at zero rather than going negative).
    pub applied_delta: i64,
    /// Balance after the reversal.
    pub balance: i64,
    /// Recomputed from the latest remaining movement, or None.
    pub last_movement: Option<DateTime<Utc>>,
    pub stock_unchanged: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockLevelsSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevelsSet {
    pub ledger_id: StockLedgerId,
    pub location: String,
    pub material: String,
    pub min_stock: i64,
    pub max_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    MovementRecorded(MovementRecorded),
    MovementReversed(MovementReversed),
    StockLevelsSet(StockLevelsSet),
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::MovementRecorded(_) => "inventory.stock.movement_recorded",
            StockEvent::MovementReversed(_) => "inventory.stock.movement_reversed",
            StockEvent::StockLevelsSet(_) => "inventory.stock.levels_set",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::MovementRecorded(e) => e.occurred_at,
            StockEvent::MovementReversed(e) => e.occurred_at,
            StockEvent::StockLevelsSet(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockLedger {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::MovementRecorded(e) => {
                if !self.created {
                    self.location = e.location.clone();
                    self.material = e.material.clone();
                    self.unit = e.unit.clone();
                    self.created = true;
                }
                self.balance = e.balance;
                self.last_movement = Some(e.occurred_at);
                self.movements.push(MovementRecord {
                    movement_id: e.movement_id,
                    kind: e.kind,
                    quantity: e.quantity,
                    occurred_at: e.occurred_at,
                    reversed: false,
                });
            }
            StockEvent::MovementReversed(e) => {
                if let Some(rec) = self
                    .movements
                    .iter_mut()
                    .find(|m| m.movement_id == e.movement_id)
                {
                    rec.reversed = true;
                }
                self.balance = e.balance;
                self.last_movement = e.last_movement;
            }
            StockEvent::StockLevelsSet(e) => {
                self.min_stock = e.min_stock;
                self.max_stock = e.max_stock;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::RecordMovement(cmd) => self.handle_record(cmd),
            StockCommand::ReverseMovement(cmd) => self.handle_reverse(cmd),
            StockCommand::SetStockLevels(cmd) => self.handle_set_levels(cmd),
        }
    }
}

impl StockLedger {
    fn ensure_pair(&self, location: &str, material: &str) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.location != location || self.material != material {
            return Err(DomainError::invariant(
                "movement location/material does not match this stock ledger",
            ));
        }
        Ok(())
    }

    fn handle_record(&self, cmd: &RecordMovement) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_pair(&cmd.location, &cmd.material)?;

        if cmd.location.trim().is_empty() || cmd.material.trim().is_empty() {
            return Err(DomainError::validation("location and material are required"));
        }
        if cmd.unit.trim().is_empty() {
            return Err(DomainError::validation("unit is required"));
        }
        if self
            .movements
            .iter()
            .any(|m| m.movement_id == cmd.movement_id)
        {
            return Err(DomainError::conflict("movement id already recorded"));
        }

        let balance = match cmd.kind {
            MovementKind::Entrada => {
                if cmd.quantity <= 0 {
                    return Err(DomainError::validation("quantity must be positive"));
                }
                self.balance + cmd.quantity
            }
            MovementKind::Salida => {
                if cmd.quantity <= 0 {
                    return Err(DomainError::validation("quantity must be positive"));
                }
                if self.balance < cmd.quantity {
                    return Err(DomainError::invariant(format!(
                        "insufficient stock (available {}, requested {})",
                        self.balance, cmd.quantity
                    )));
                }
                self.balance - cmd.quantity
            }
            MovementKind::Ajuste => {
                if cmd.quantity < 0 {
                    return Err(DomainError::validation(
                        "adjustment quantity cannot be negative",
                    ));
                }
                cmd.quantity
            }
        };

        Ok(vec![StockEvent::MovementRecorded(MovementRecorded {
            ledger_id: cmd.ledger_id,
            movement_id: cmd.movement_id,
            location: cmd.location.clone(),
            material: cmd.material.clone(),
            kind: cmd.kind,
            quantity: cmd.quantity,
            unit: cmd.unit.clone(),
            note: cmd.note.clone(),
            recorded_by: cmd.recorded_by.clone(),
            balance,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse(&self, cmd: &ReverseMovement) -> Result<Vec<StockEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }

        let record = self
            .movements
            .iter()
            .find(|m| m.movement_id == cmd.movement_id)
            .ok_or(DomainError::NotFound)?;
        if record.reversed {
            return Err(DomainError::conflict("movement already reversed"));
        }

        let (applied_delta, stock_unchanged) = match record.kind {
            // Corrective deletes clamp at zero rather than going negative.
            MovementKind::Entrada => (-(record.quantity.min(self.balance)), false),
            MovementKind::Salida => (record.quantity, false),
            // No prior value is retained for an Ajuste, so it cannot be
            // undone; the balance stays put and the caller warns the user.
            MovementKind::Ajuste => (0, true),
        };

        let last_movement = self
            .movements
            .iter()
            .filter(|m| !m.reversed && m.movement_id != cmd.movement_id)
            .map(|m| m.occurred_at)
            .max();

        Ok(vec![StockEvent::MovementReversed(MovementReversed {
            ledger_id: cmd.ledger_id,
            location: self.location.clone(),
            material: self.material.clone(),
            movement_id: cmd.movement_id,
            applied_delta,
            balance: self.balance + applied_delta,
            last_movement,
            stock_unchanged,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_levels(&self, cmd: &SetStockLevels) -> Result<Vec<StockEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if cmd.min_stock < 0 || cmd.max_stock < 0 {
            return Err(DomainError::validation("stock thresholds cannot be negative"));
        }

        Ok(vec![StockEvent::StockLevelsSet(StockLevelsSet {
            ledger_id: cmd.ledger_id,
            location: self.location.clone(),
            material: self.material.clone(),
            min_stock: cmd.min_stock,
            max_stock: cmd.max_stock,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ledger_id() -> StockLedgerId {
        StockLedgerId::for_pair("ALM-01", "MAT-001")
    }

    fn record(kind: MovementKind, quantity: i64) -> StockCommand {
        StockCommand::RecordMovement(RecordMovement {
            ledger_id: ledger_id(),
            movement_id: Uuid::now_v7(),
            location: "ALM-01".to_string(),
            material: "MAT-001".to_string(),
            kind,
            quantity,
            unit: "pza".to_string(),
            note: String::new(),
            recorded_by: "ana".to_string(),
            occurred_at: Utc::now(),
        })
    }

    fn dispatch(ledger: &mut StockLedger, cmd: &StockCommand) -> Vec<StockEvent> {
        let events = ledger.handle(cmd).unwrap();
        for ev in &events {
            ledger.apply(ev);
        }
        events
    }

    #[test]
    fn entrada_and_salida_move_the_balance() {
        let mut ledger = StockLedger::empty(ledger_id());
        dispatch(&mut ledger, &record(MovementKind::Entrada, 100));
        dispatch(&mut ledger, &record(MovementKind::Salida, 30));
        assert_eq!(ledger.balance(), 70);
    }

    #[test]
    fn ajuste_is_absolute_not_a_delta() {
        let mut ledger = StockLedger::empty(ledger_id());
        dispatch(&mut ledger, &record(MovementKind::Entrada, 100));
        dispatch(&mut ledger, &record(MovementKind::Ajuste, 12));
        assert_eq!(ledger.balance(), 12);
    }

    #[test]
    fn salida_beyond_stock_is_rejected() {
        let mut ledger = StockLedger::empty(ledger_id());
        dispatch(&mut ledger, &record(MovementKind::Entrada, 5));

        let err = ledger.handle(&record(MovementKind::Salida, 10)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(ledger.balance(), 5);
    }

    #[test]
    fn salida_on_a_fresh_pair_is_rejected() {
        let ledger = StockLedger::empty(ledger_id());
        let err = ledger.handle(&record(MovementKind::Salida, 1)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn reversing_an_entrada_subtracts_and_clamps_at_zero() {
        let mut ledger = StockLedger::empty(ledger_id());
        let events = dispatch(&mut ledger, &record(MovementKind::Entrada, 100));
        let StockEvent::MovementRecorded(entrada) = &events[0] else {
            panic!("Expected MovementRecorded");
        };
        let entrada_id = entrada.movement_id;

        // Drain the stock below the entrada amount, then reverse it.
        dispatch(&mut ledger, &record(MovementKind::Salida, 80));
        let events = dispatch(
            &mut ledger,
            &StockCommand::ReverseMovement(ReverseMovement {
                ledger_id: ledger_id(),
                movement_id: entrada_id,
                occurred_at: Utc::now(),
            }),
        );

        let StockEvent::MovementReversed(rev) = &events[0] else {
            panic!("Expected MovementReversed");
        };
        assert_eq!(rev.applied_delta, -20);
        assert_eq!(ledger.balance(), 0);
    }

    #[test]
    fn reversing_a_salida_returns_the_quantity() {
        let mut ledger = StockLedger::empty(ledger_id());
        dispatch(&mut ledger, &record(MovementKind::Entrada, 50));
        let events = dispatch(&mut ledger, &record(MovementKind::Salida, 20));
        let StockEvent::MovementRecorded(salida) = &events[0] else {
            panic!("Expected MovementRecorded");
        };
        let salida_id = salida.movement_id;

        dispatch(
            &mut ledger,
            &StockCommand::ReverseMovement(ReverseMovement {
                ledger_id: ledger_id(),
                movement_id: salida_id,
                occurred_at: Utc::now(),
            }),
        );
        assert_eq!(ledger.balance(), 50);
    }

    #[test]
    fn reversing_an_ajuste_leaves_stock_unchanged() {
        let mut ledger = StockLedger::empty(ledger_id());
        dispatch(&mut ledger, &record(MovementKind::Entrada, 10));
        let events = dispatch(&mut ledger, &record(MovementKind::Ajuste, 42));
        let StockEvent::MovementRecorded(ajuste) = &events[0] else {
            panic!("Expected MovementRecorded");
        };
        let ajuste_id = ajuste.movement_id;

        let events = dispatch(
            &mut ledger,
            &StockCommand::ReverseMovement(ReverseMovement {
                ledger_id: ledger_id(),
                movement_id: ajuste_id,
                occurred_at: Utc::now(),
            }),
        );
        let StockEvent::MovementReversed(rev) = &events[0] else {
            panic!("Expected MovementReversed");
        };
        assert!(rev.stock_unchanged);
        assert_eq!(ledger.balance(), 42);
    }

    #[test]
    fn a_movement_can_only_be_reversed_once() {
        let mut ledger = StockLedger::empty(ledger_id());
        let events = dispatch(&mut ledger, &record(MovementKind::Entrada, 10));
        let StockEvent::MovementRecorded(rec) = &events[0] else {
            panic!("Expected MovementRecorded");
        };
        let reverse = StockCommand::ReverseMovement(ReverseMovement {
            ledger_id: ledger_id(),
            movement_id: rec.movement_id,
            occurred_at: Utc::now(),
        });

        dispatch(&mut ledger, &reverse);
        let err = ledger.handle(&reverse).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn last_movement_is_cleared_when_nothing_remains() {
        let mut ledger = StockLedger::empty(ledger_id());
        let events = dispatch(&mut ledger, &record(MovementKind::Entrada, 10));
        let StockEvent::MovementRecorded(rec) = &events[0] else {
            panic!("Expected MovementRecorded");
        };

        dispatch(
            &mut ledger,
            &StockCommand::ReverseMovement(ReverseMovement {
                ledger_id: ledger_id(),
                movement_id: rec.movement_id,
                occurred_at: Utc::now(),
            }),
        );
        assert_eq!(ledger.last_movement(), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the balance always equals the fold of accepted
        /// movements (Entrada positive, Salida negative, Ajuste absolute),
        /// and a Salida never drives it negative.
        #[test]
        fn balance_equals_the_fold_of_accepted_movements(
            ops in prop::collection::vec((0u8..3, 1i64..500), 1..40)
        ) {
            let mut ledger = StockLedger::empty(ledger_id());
            let mut expected: i64 = 0;

            for (op, qty) in ops {
                let kind = match op {
                    0 => MovementKind::Entrada,
                    1 => MovementKind::Salida,
                    _ => MovementKind::Ajuste,
                };

                match ledger.handle(&record(kind, qty)) {
                    Ok(events) => {
                        for ev in &events {
                            ledger.apply(ev);
                        }
                        expected = match kind {
                            MovementKind::Entrada => expected + qty,
                            MovementKind::Salida => expected - qty,
                            MovementKind::Ajuste => qty,
                        };
                    }
                    Err(_) => {
                        // Only an over-drawing Salida is refused here.
                        prop_assert_eq!(kind, MovementKind::Salida);
                        prop_assert!(expected < qty);
                    }
                }

                prop_assert_eq!(ledger.balance(), expected);
                prop_assert!(ledger.balance() >= 0);
            }
        }
    }
}
