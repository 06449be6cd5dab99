use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use telar_auth::{Module, PermissionLevel};
use telar_inventory::{
    CreateLocation, DeleteLocation, Location, LocationCommand, LocationFields, LocationId,
    MovementKind, RecordMovement, ReverseMovement, SetStockLevels, StockCommand, StockEvent,
    StockLedger, StockLedgerId, UpdateLocation,
};

use crate::app::services::{AppServices, aggregate_types};
use crate::app::{csv_io, dto, errors};
use crate::authz;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/stock", get(stock_list).put(stock_edit))
        .route("/stock/export", get(stock_export))
        .route("/movements", get(movement_list).post(movement_create))
        .route("/movements/export", get(movement_export))
        .route("/movements/template", get(movement_template))
        .route("/movements/import", post(movement_import))
        .route("/movements/:id/reverse", post(movement_reverse))
        .route("/locations", get(location_list).post(location_create))
        .route("/locations/:code", put(location_update).delete(location_delete))
}

// ───────────────────────────── stock ─────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct StockFilters {
    pub location: Option<String>,
    pub material: Option<String>,
}

pub async fn stock_list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(filters): Query<StockFilters>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Inventory, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = services
        .stock
        .list()
        .into_iter()
        .filter(|s| {
            filters
                .location
                .as_deref()
                .is_none_or(|f| f.is_empty() || s.location == f)
        })
        .filter(|s| {
            filters
                .material
                .as_deref()
                .is_none_or(|f| f.is_empty() || s.material == f)
        })
        .map(dto::stock_to_json)
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct StockEditRequest {
    pub id_location: String,
    pub id_material: String,
    pub min_stock: i64,
    pub max_stock: i64,
}

pub async fn stock_edit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<StockEditRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Inventory, PermissionLevel::Write) {
        return resp;
    }

    let ledger_id = StockLedgerId::for_pair(&body.id_location, &body.id_material);
    let cmd = StockCommand::SetStockLevels(SetStockLevels {
        ledger_id,
        min_stock: body.min_stock,
        max_stock: body.max_stock,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<StockLedger>(ledger_id.0, aggregate_types::STOCK, cmd, |id| {
        StockLedger::empty(StockLedgerId::new(id))
    }) {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn stock_export(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Inventory, PermissionLevel::Read) {
        return resp;
    }

    let headers = [
        "Ubicación",
        "Material",
        "Stock Actual",
        "Unidad",
        "Stock Mínimo",
        "Stock Máximo",
        "Último Movimiento",
    ];

    let rows = services
        .stock
        .list()
        .into_iter()
        .map(|s| {
            let location_name = services
                .locations
                .get(&s.location)
                .map(|l| l.name)
                .unwrap_or_else(|| s.location.clone());
            let material_label = services
                .materials
                .get(&s.material)
                .map(|m| format!("{} - {}", s.material, m.name))
                .unwrap_or_else(|| s.material.clone());
            vec![
                location_name,
                material_label,
                s.quantity.to_string(),
                s.unit,
                s.min_stock.to_string(),
                s.max_stock.to_string(),
                s.last_movement
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default(),
            ]
        })
        .collect();

    csv_io::csv_response("inventario_stock", &headers, rows)
}

// ─────────────────────────── movements ───────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct MovementFilters {
    pub location: Option<String>,
    pub material: Option<String>,
    pub movement_type: Option<String>,
}

pub async fn movement_list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(filters): Query<MovementFilters>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Inventory, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = services
        .movements
        .list()
        .into_iter()
        .filter(|m| {
            filters
                .location
                .as_deref()
                .is_none_or(|f| f.is_empty() || m.location == f)
        })
        .filter(|m| {
            filters
                .material
                .as_deref()
                .is_none_or(|f| f.is_empty() || m.material.contains(f))
        })
        .filter(|m| {
            filters
                .movement_type
                .as_deref()
                .is_none_or(|f| f.is_empty() || m.kind.as_str() == f)
        })
        .map(dto::movement_to_json)
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub id_location: String,
    pub id_material: String,
    pub quantity: i64,
    pub movement_type: String,
    #[serde(default)]
    pub unit_type: Option<String>,
    #[serde(default)]
    pub notes: String,
}

pub async fn movement_create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<MovementRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Inventory, PermissionLevel::Write) {
        return resp;
    }

    let kind: MovementKind = match body.movement_type.parse() {
        Ok(k) => k,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };

    let Some(location) = services.locations.get(&body.id_location) else {
        return errors::json_error(StatusCode::BAD_REQUEST, "unknown_reference", "location does not exist");
    };
    if !location.active {
        return errors::json_error(StatusCode::BAD_REQUEST, "unknown_reference", "location is inactive");
    }
    let Some(material) = services.materials.get(&body.id_material) else {
        return errors::json_error(StatusCode::BAD_REQUEST, "unknown_reference", "material does not exist");
    };

    let unit = body.unit_type.unwrap_or(material.unit);
    let ledger_id = StockLedgerId::for_pair(&body.id_location, &body.id_material);
    let movement_id = Uuid::now_v7();
    let cmd = StockCommand::RecordMovement(RecordMovement {
        ledger_id,
        movement_id,
        location: body.id_location,
        material: body.id_material,
        kind,
        quantity: body.quantity,
        unit,
        note: body.notes,
        recorded_by: user.username().to_string(),
        occurred_at: Utc::now(),
    });

    match services.dispatch::<StockLedger>(ledger_id.0, aggregate_types::STOCK, cmd, |id| {
        StockLedger::empty(StockLedgerId::new(id))
    }) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": movement_id })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn movement_reverse(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Inventory, PermissionLevel::Write) {
        return resp;
    }

    let Some(movement) = services.movements.get(&id) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "movement not found");
    };

    let ledger_id = StockLedgerId::for_pair(&movement.location, &movement.material);
    let cmd = StockCommand::ReverseMovement(ReverseMovement {
        ledger_id,
        movement_id: id,
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch::<StockLedger>(
        ledger_id.0,
        aggregate_types::STOCK,
        cmd,
        |lid| StockLedger::empty(StockLedgerId::new(lid)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    // An Ajuste reversal leaves the balance untouched; surface the warning.
    let mut warning: Option<&str> = None;
    for stored in &committed {
        if let Ok(StockEvent::MovementReversed(e)) =
            serde_json::from_value::<StockEvent>(stored.payload.clone())
        {
            if e.stock_unchanged {
                warning = Some(
                    "al eliminar un ajuste, el stock actual no se modifica automáticamente; \
                     verifique manualmente el stock",
                );
            }
        }
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({ "id": id, "warning": warning })),
    )
        .into_response()
}

pub async fn movement_export(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Inventory, PermissionLevel::Read) {
        return resp;
    }

    let headers = [
        "Ubicacion",
        "Material",
        "Cantidad",
        "Tipo_Movimiento",
        "Unidad",
        "Notas",
        "Creado_Por",
        "Fecha_Creacion",
    ];
    let rows = services
        .movements
        .list()
        .into_iter()
        .map(|m| {
            vec![
                m.location,
                m.material,
                m.quantity.to_string(),
                m.kind.as_str().to_string(),
                m.unit,
                m.note,
                m.recorded_by,
                m.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();

    csv_io::csv_response("movimientos_inventario", &headers, rows)
}

pub async fn movement_template(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Inventory, PermissionLevel::Write) {
        return resp;
    }

    let headers = ["Ubicacion", "Material", "Cantidad", "Tipo_Movimiento", "Unidad", "Notas"];
    let rows = vec![vec![
        "ALM-01".to_string(),
        "MAT-001".to_string(),
        "100".to_string(),
        "ENTRADA".to_string(),
        "pza".to_string(),
        "Carga inicial de inventario".to_string(),
    ]];

    csv_io::csv_response("plantilla_movimientos_inventario", &headers, rows)
}

/// Bulk movement import. Row-level policy: an invalid row (unknown
/// location/material, bad quantity or kind, Salida beyond stock) is
/// reported and skipped; valid rows commit.
pub async fn movement_import(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    body: String,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Inventory, PermissionLevel::Write) {
        return resp;
    }

    let rows = match csv_io::parse_rows(&body) {
        Ok(rows) => rows,
        Err(resp) => return resp,
    };

    let mut report = csv_io::ImportReport::default();

    for (idx, row) in rows.iter().enumerate() {
        let row_num = idx + 2;

        if row.len() < 5 {
            report.row_error(row_num, "No tiene suficientes columnas");
            continue;
        }
        let (location, material, quantity_cell, kind_cell, unit) =
            (&row[0], &row[1], &row[2], &row[3], &row[4]);
        let note = row.get(5).cloned().unwrap_or_default();

        if location.is_empty() || material.is_empty() || quantity_cell.is_empty() || kind_cell.is_empty() || unit.is_empty()
        {
            report.row_error(row_num, "Campos obligatorios faltantes");
            continue;
        }
        if services.locations.get(location).is_none() {
            report.row_error(row_num, format!("La ubicación {location} no existe"));
            continue;
        }
        if services.materials.get(material).is_none() {
            report.row_error(row_num, format!("El material {material} no existe"));
            continue;
        }
        let quantity: i64 = match quantity_cell.parse() {
            Ok(q) if q > 0 => q,
            Ok(_) => {
                report.row_error(row_num, "La cantidad debe ser un entero positivo");
                continue;
            }
            Err(_) => {
                report.row_error(row_num, "La cantidad debe ser un número entero");
                continue;
            }
        };
        let kind: MovementKind = match kind_cell.parse() {
            Ok(k) => k,
            Err(_) => {
                report.row_error(row_num, "Tipo de movimiento debe ser ENTRADA, SALIDA o AJUSTE");
                continue;
            }
        };

        let ledger_id = StockLedgerId::for_pair(location, material);
        let cmd = StockCommand::RecordMovement(RecordMovement {
            ledger_id,
            movement_id: Uuid::now_v7(),
            location: location.clone(),
            material: material.clone(),
            kind,
            quantity,
            unit: unit.clone(),
            note,
            recorded_by: user.username().to_string(),
            occurred_at: Utc::now(),
        });

        match services.dispatch::<StockLedger>(ledger_id.0, aggregate_types::STOCK, cmd, |id| {
            StockLedger::empty(StockLedgerId::new(id))
        }) {
            Ok(_) => report.created += 1,
            Err(e) => report.row_error(row_num, dispatch_error_text(e)),
        }
    }

    report.into_response()
}

fn dispatch_error_text(err: telar_infra::command_dispatcher::DispatchError) -> String {
    use telar_infra::command_dispatcher::DispatchError;
    match err {
        DispatchError::Validation(msg)
        | DispatchError::InvariantViolation(msg)
        | DispatchError::Concurrency(msg) => msg,
        other => format!("{other:?}"),
    }
}

// ─────────────────────────── locations ───────────────────────────

pub async fn location_list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Inventory, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = services
        .locations
        .list()
        .into_iter()
        .map(dto::location_to_json)
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    #[serde(default)]
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub main_location: bool,
    #[serde(default = "default_true")]
    pub status: bool,
}

fn default_true() -> bool {
    true
}

pub async fn location_create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<LocationRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Inventory, PermissionLevel::Write) {
        return resp;
    }

    // One main warehouse among active locations is an application
    // convention; refuse a second one here.
    if body.main_location && services.locations.main_location().is_some() {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invariant_violation",
            "a main location is already configured",
        );
    }

    let location_id = LocationId::for_code(&body.code);
    let cmd = LocationCommand::CreateLocation(CreateLocation {
        location_id,
        code: body.code.clone(),
        fields: LocationFields {
            name: body.name,
            address: body.location,
            main_location: body.main_location,
            active: body.status,
        },
        created_by: user.username().to_string(),
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Location>(location_id.0, aggregate_types::LOCATION, cmd, |id| {
        Location::empty(LocationId::new(id))
    }) {
        Ok(_) => (StatusCode::CREATED, Json(serde_json::json!({ "code": body.code }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn location_update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
    Json(body): Json<LocationRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Inventory, PermissionLevel::Write) {
        return resp;
    }

    if body.main_location {
        if let Some(main) = services.locations.main_location() {
            if main.code != code {
                return errors::json_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "invariant_violation",
                    "a main location is already configured",
                );
            }
        }
    }

    let location_id = LocationId::for_code(&code);
    let cmd = LocationCommand::UpdateLocation(UpdateLocation {
        location_id,
        fields: LocationFields {
            name: body.name,
            address: body.location,
            main_location: body.main_location,
            active: body.status,
        },
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Location>(location_id.0, aggregate_types::LOCATION, cmd, |id| {
        Location::empty(LocationId::new(id))
    }) {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "code": code }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn location_delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Inventory, PermissionLevel::Write) {
        return resp;
    }

    if services.stock.list().iter().any(|s| s.location == code) {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "in_use",
            "location holds stock records",
        );
    }

    let location_id = LocationId::for_code(&code);
    let cmd = LocationCommand::DeleteLocation(DeleteLocation {
        location_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Location>(location_id.0, aggregate_types::LOCATION, cmd, |id| {
        Location::empty(LocationId::new(id))
    }) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Thin JSON lookup: current stock for a (location, material) pair.
#[derive(Debug, Deserialize)]
pub struct StockInfoQuery {
    pub location_id: String,
    pub material_id: String,
}

pub async fn stock_info(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<StockInfoQuery>,
) -> axum::response::Response {
    match services.stock.get(&query.location_id, &query.material_id) {
        Some(s) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "current_stock": s.quantity,
                "unit_type": s.unit,
            })),
        )
            .into_response(),
        None => (
            StatusCode::OK,
            Json(serde_json::json!({ "current_stock": 0, "unit_type": "" })),
        )
            .into_response(),
    }
}
