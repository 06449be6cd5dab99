use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use telar_auth::{Module, PermissionLevel};
use telar_inventory::{MovementKind, RecordMovement, StockCommand, StockLedger, StockLedgerId};
use telar_purchasing::{
    ChangeStatus, CreateOrder, DeleteOrder, GoodsReceived, LineQuantity, NewLine, OrderStatus,
    PurchaseOrder, PurchaseOrderCommand, PurchaseOrderEvent, PurchaseOrderId, ReceiveFull,
    ReceivePartial, ReviseOrder,
};

use crate::app::services::{AppServices, aggregate_types};
use crate::app::{csv_io, dto, errors};
use crate::authz;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/export", get(export))
        .route("/template", get(template))
        .route("/import", post(import))
        .route("/:code", get(detail).put(revise).delete(delete))
        .route("/:code/status", post(change_status))
        .route("/:code/receive", post(receive))
        .route("/:code/receive_partial", post(receive_partial))
}

#[derive(Debug, Deserialize, Default)]
pub struct OrderFilters {
    pub id_purchase_order: Option<String>,
    pub id_supplier: Option<String>,
    pub status: Option<String>,
}

fn filtered(
    services: &AppServices,
    filters: &OrderFilters,
) -> Vec<telar_infra::projections::purchases::PurchaseOrderRow> {
    services
        .purchases
        .list()
        .into_iter()
        .filter(|o| {
            filters
                .id_purchase_order
                .as_deref()
                .is_none_or(|f| f.is_empty() || o.code.contains(f))
        })
        .filter(|o| {
            filters
                .id_supplier
                .as_deref()
                .is_none_or(|f| f.is_empty() || o.supplier == f)
        })
        .filter(|o| {
            filters
                .status
                .as_deref()
                .is_none_or(|f| f.is_empty() || o.status.as_str() == f)
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub id_material: String,
    pub quantity: i64,
    #[serde(default)]
    pub unit_material: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub currency_suppliers: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub id_purchase_order: String,
    pub id_supplier: String,
    pub issue_date: NaiveDate,
    pub estimated_delivery_date: NaiveDate,
    #[serde(default)]
    pub status: Option<String>,
    pub currency: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub lines: Vec<OrderLineRequest>,
}

/// Resolve request lines against the material master (unit defaults to the
/// material's unit, line currency to the order currency).
fn resolve_lines(
    services: &AppServices,
    lines: Vec<OrderLineRequest>,
    order_currency: &str,
) -> Result<Vec<NewLine>, axum::response::Response> {
    let mut resolved = Vec::with_capacity(lines.len());
    for line in lines {
        let Some(material) = services.materials.get(&line.id_material) else {
            return Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "unknown_reference",
                format!("material '{}' does not exist", line.id_material),
            ));
        };
        resolved.push(NewLine {
            material: line.id_material,
            quantity: line.quantity,
            unit: line.unit_material.unwrap_or(material.unit),
            unit_price: line.price,
            currency: line
                .currency_suppliers
                .unwrap_or_else(|| order_currency.to_string()),
        });
    }
    Ok(resolved)
}

fn parse_order_status(value: Option<&str>) -> Result<OrderStatus, axum::response::Response> {
    match value {
        None => Ok(OrderStatus::Pendiente),
        Some(s) => s.parse().map_err(|e: telar_core::DomainError| {
            errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        }),
    }
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(filters): Query<OrderFilters>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Purchases, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = filtered(&services, &filters)
        .into_iter()
        .map(dto::purchase_order_to_json)
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateOrderRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Purchases, PermissionLevel::Write) {
        return resp;
    }

    let Some(supplier) = services.suppliers.get(&body.id_supplier) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "unknown_reference",
            format!("supplier '{}' does not exist", body.id_supplier),
        );
    };
    if !supplier.profile.active {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "unknown_reference",
            format!("supplier '{}' is inactive", body.id_supplier),
        );
    }

    let status = match parse_order_status(body.status.as_deref()) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let lines = match resolve_lines(&services, body.lines, &body.currency) {
        Ok(l) => l,
        Err(resp) => return resp,
    };

    let order_id = PurchaseOrderId::for_code(&body.id_purchase_order);
    let cmd = PurchaseOrderCommand::CreateOrder(CreateOrder {
        order_id,
        code: body.id_purchase_order.clone(),
        supplier: body.id_supplier,
        issue_date: body.issue_date,
        estimated_delivery_date: body.estimated_delivery_date,
        status,
        currency: body.currency,
        notes: body.notes,
        lines,
        created_by: user.username().to_string(),
        occurred_at: Utc::now(),
    });

    match services.dispatch::<PurchaseOrder>(order_id.0, aggregate_types::PURCHASE_ORDER, cmd, |id| {
        PurchaseOrder::empty(PurchaseOrderId::new(id))
    }) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id_purchase_order": body.id_purchase_order })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn detail(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Purchases, PermissionLevel::Read) {
        return resp;
    }

    match services.purchases.get(&code) {
        Some(row) => (StatusCode::OK, Json(dto::purchase_order_to_json(row))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "purchase order not found"),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviseOrderRequest {
    pub id_supplier: String,
    pub issue_date: NaiveDate,
    pub estimated_delivery_date: NaiveDate,
    pub currency: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub lines: Vec<OrderLineRequest>,
}

pub async fn revise(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
    Json(body): Json<ReviseOrderRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Purchases, PermissionLevel::Write) {
        return resp;
    }

    let lines = match resolve_lines(&services, body.lines, &body.currency) {
        Ok(l) => l,
        Err(resp) => return resp,
    };

    let order_id = PurchaseOrderId::for_code(&code);
    let cmd = PurchaseOrderCommand::ReviseOrder(ReviseOrder {
        order_id,
        supplier: body.id_supplier,
        issue_date: body.issue_date,
        estimated_delivery_date: body.estimated_delivery_date,
        currency: body.currency,
        notes: body.notes,
        lines,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<PurchaseOrder>(order_id.0, aggregate_types::PURCHASE_ORDER, cmd, |id| {
        PurchaseOrder::empty(PurchaseOrderId::new(id))
    }) {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "id_purchase_order": code }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
    Json(body): Json<StatusRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Purchases, PermissionLevel::Write) {
        return resp;
    }

    let status = match parse_order_status(Some(&body.status)) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let order_id = PurchaseOrderId::for_code(&code);
    let cmd = PurchaseOrderCommand::ChangeStatus(ChangeStatus {
        order_id,
        status,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<PurchaseOrder>(order_id.0, aggregate_types::PURCHASE_ORDER, cmd, |id| {
        PurchaseOrder::empty(PurchaseOrderId::new(id))
    }) {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({ "id_purchase_order": code, "status": status.as_str() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Purchases, PermissionLevel::Write) {
        return resp;
    }

    let order_id = PurchaseOrderId::for_code(&code);
    let cmd = PurchaseOrderCommand::DeleteOrder(DeleteOrder {
        order_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<PurchaseOrder>(order_id.0, aggregate_types::PURCHASE_ORDER, cmd, |id| {
        PurchaseOrder::empty(PurchaseOrderId::new(id))
    }) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

// ─────────────────────── receipt bridge (§ goods-in) ───────────────────────

/// Extract the GoodsReceived payload from the committed events.
fn committed_receipt(
    committed: &[telar_infra::event_store::StoredEvent],
) -> Option<GoodsReceived> {
    committed.iter().find_map(|stored| {
        match serde_json::from_value::<PurchaseOrderEvent>(stored.payload.clone()) {
            Ok(PurchaseOrderEvent::GoodsReceived(e)) => Some(e),
            _ => None,
        }
    })
}

/// Record one Entrada movement per received line. These are unguarded
/// additions and cannot fail on domain grounds; store faults are logged
/// and surfaced as a count mismatch.
fn record_receipt_movements(
    services: &AppServices,
    receipt: &GoodsReceived,
    note_for: impl Fn(&GoodsReceived) -> String,
    recorded_by: &str,
) -> usize {
    let mut movements_created = 0;
    for line in &receipt.receipts {
        let ledger_id = StockLedgerId::for_pair(&receipt.location, &line.material);
        let cmd = StockCommand::RecordMovement(RecordMovement {
            ledger_id,
            movement_id: Uuid::now_v7(),
            location: receipt.location.clone(),
            material: line.material.clone(),
            kind: MovementKind::Entrada,
            quantity: line.quantity,
            unit: line.unit.clone(),
            note: note_for(receipt),
            recorded_by: recorded_by.to_string(),
            occurred_at: Utc::now(),
        });

        match services.dispatch::<StockLedger>(ledger_id.0, aggregate_types::STOCK, cmd, |id| {
            StockLedger::empty(StockLedgerId::new(id))
        }) {
            Ok(_) => movements_created += 1,
            Err(e) => {
                tracing::error!(
                    "receipt movement failed for order {} material {}: {e:?}",
                    receipt.code,
                    line.material
                );
            }
        }
    }
    movements_created
}

/// Full receipt at the main location: every pending quantity comes in.
pub async fn receive(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Purchases, PermissionLevel::Write) {
        return resp;
    }

    let Some(main) = services.locations.main_location() else {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invariant_violation",
            "no main location configured",
        );
    };

    let order_id = PurchaseOrderId::for_code(&code);
    let cmd = PurchaseOrderCommand::ReceiveFull(ReceiveFull {
        order_id,
        location: main.code.clone(),
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch::<PurchaseOrder>(
        order_id.0,
        aggregate_types::PURCHASE_ORDER,
        cmd,
        |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let Some(receipt) = committed_receipt(&committed) else {
        // Nothing pending: repeated receipts are a no-op.
        return (
            StatusCode::OK,
            Json(serde_json::json!({
                "id_purchase_order": code,
                "movements_created": 0,
                "message": "no hay cantidades pendientes por recibir",
            })),
        )
            .into_response();
    };

    let movements_created = record_receipt_movements(
        &services,
        &receipt,
        |r| format!("Recepcion orden {}", r.code),
        user.username(),
    );

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id_purchase_order": code,
            "movements_created": movements_created,
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ReceivePartialRequest {
    pub location: String,
    pub quantities: Vec<LineQuantityRequest>,
}

#[derive(Debug, Deserialize)]
pub struct LineQuantityRequest {
    pub position: u32,
    pub quantity: i64,
}

/// Partial receipt at an operator-chosen location. Lines exceeding their
/// pending amount are skipped with an itemized warning; valid lines commit.
pub async fn receive_partial(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
    Json(body): Json<ReceivePartialRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Purchases, PermissionLevel::Write) {
        return resp;
    }

    let Some(location) = services.locations.get(&body.location) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "unknown_reference",
            format!("location '{}' does not exist", body.location),
        );
    };

    let order_id = PurchaseOrderId::for_code(&code);
    let cmd = PurchaseOrderCommand::ReceivePartial(ReceivePartial {
        order_id,
        location: location.code.clone(),
        quantities: body
            .quantities
            .iter()
            .map(|q| LineQuantity { position: q.position, quantity: q.quantity })
            .collect(),
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch::<PurchaseOrder>(
        order_id.0,
        aggregate_types::PURCHASE_ORDER,
        cmd,
        |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let Some(receipt) = committed_receipt(&committed) else {
        return (
            StatusCode::OK,
            Json(serde_json::json!({
                "id_purchase_order": code,
                "movements_created": 0,
                "warnings": [],
            })),
        )
            .into_response();
    };

    let movements_created = record_receipt_movements(
        &services,
        &receipt,
        |r| format!("Recepcion parcial orden {} - Proveedor: {}", r.code, r.supplier),
        user.username(),
    );

    let warnings: Vec<String> = receipt
        .skipped
        .iter()
        .map(|s| format!("línea {} ({}): {}", s.position, s.material, s.reason))
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id_purchase_order": code,
            "movements_created": movements_created,
            "warnings": warnings,
        })),
    )
        .into_response()
}

// ───────────────────────────── CSV ─────────────────────────────

const CSV_HEADERS: [&str; 11] = [
    "ID_Orden_Compra",
    "ID_Proveedor",
    "Fecha_Emision",
    "Fecha_Estimada_Entrega",
    "Estado",
    "Monto_Total",
    "Moneda",
    "Notas",
    "Creado_Por",
    "Fecha_Creacion",
    "Fecha_Actualizacion",
];

pub async fn export(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(filters): Query<OrderFilters>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Purchases, PermissionLevel::Read) {
        return resp;
    }

    let rows = filtered(&services, &filters)
        .into_iter()
        .map(|o| {
            vec![
                o.code,
                o.supplier,
                o.issue_date.format("%Y-%m-%d").to_string(),
                o.estimated_delivery_date.format("%Y-%m-%d").to_string(),
                o.status.as_str().to_string(),
                o.total_amount.to_string(),
                o.currency,
                o.notes,
                o.created_by,
                o.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                o.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();

    csv_io::csv_response("ordenes_compra_exportacion", &CSV_HEADERS, rows)
}

pub async fn template(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Purchases, PermissionLevel::Write) {
        return resp;
    }

    let headers = [
        "ID_Orden_Compra",
        "ID_Proveedor",
        "Fecha_Emision",
        "Fecha_Estimada_Entrega",
        "Estado",
        "Moneda",
        "Notas",
    ];
    let rows = vec![vec![
        "OC-2024-001".to_string(),
        "PROV-001".to_string(),
        "2024-01-15".to_string(),
        "2024-02-01".to_string(),
        "Pendiente".to_string(),
        "MXN".to_string(),
        "Notas de ejemplo".to_string(),
    ]];

    csv_io::csv_response("plantilla_ordenes_compra", &headers, rows)
}

/// Bulk import of order headers. Duplicate order codes are row-level
/// errors; the supplier must exist.
pub async fn import(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    body: String,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Purchases, PermissionLevel::Write) {
        return resp;
    }

    let rows = match csv_io::parse_rows(&body) {
        Ok(rows) => rows,
        Err(resp) => return resp,
    };

    let mut report = csv_io::ImportReport::default();

    for (idx, row) in rows.iter().enumerate() {
        let row_num = idx + 2;

        if row.len() < 6 {
            report.row_error(row_num, "No tiene suficientes columnas");
            continue;
        }
        let (code, supplier, issue_cell, delivery_cell, status_cell, currency) =
            (&row[0], &row[1], &row[2], &row[3], &row[4], &row[5]);
        let notes = row.get(6).cloned().unwrap_or_default();

        if code.is_empty()
            || supplier.is_empty()
            || issue_cell.is_empty()
            || delivery_cell.is_empty()
            || status_cell.is_empty()
            || currency.is_empty()
        {
            report.row_error(row_num, "Campos obligatorios faltantes");
            continue;
        }

        let order_id = PurchaseOrderId::for_code(code);
        if services.stream_exists(order_id.0) {
            report.row_error(row_num, format!("La orden {code} ya existe"));
            continue;
        }
        if services.suppliers.get(supplier).is_none() {
            report.row_error(row_num, format!("El proveedor {supplier} no existe"));
            continue;
        }
        let issue_date: NaiveDate = match issue_cell.parse() {
            Ok(d) => d,
            Err(_) => {
                report.row_error(row_num, "Fecha_Emision inválida (use AAAA-MM-DD)");
                continue;
            }
        };
        let estimated_delivery_date: NaiveDate = match delivery_cell.parse() {
            Ok(d) => d,
            Err(_) => {
                report.row_error(row_num, "Fecha_Estimada_Entrega inválida (use AAAA-MM-DD)");
                continue;
            }
        };
        let status: OrderStatus = match status_cell.parse() {
            Ok(s) => s,
            Err(_) => {
                report.row_error(row_num, format!("Estado '{status_cell}' no es válido"));
                continue;
            }
        };

        let cmd = PurchaseOrderCommand::CreateOrder(CreateOrder {
            order_id,
            code: code.clone(),
            supplier: supplier.clone(),
            issue_date,
            estimated_delivery_date,
            status,
            currency: currency.clone(),
            notes,
            lines: Vec::new(),
            created_by: user.username().to_string(),
            occurred_at: Utc::now(),
        });

        match services.dispatch::<PurchaseOrder>(
            order_id.0,
            aggregate_types::PURCHASE_ORDER,
            cmd,
            |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
        ) {
            Ok(_) => report.created += 1,
            Err(e) => report.row_error(row_num, format!("{e:?}")),
        }
    }

    report.into_response()
}
