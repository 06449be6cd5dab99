//! Sales: the inventory + ledger bridge.
//!
//! One request records the sale, decrements stock through a guarded Salida
//! movement, and posts the balanced journal pair. The order of operations
//! makes the flow all-or-nothing in practice: every referential check and
//! the pure sale validation run before any write; the only guarded write
//! (the Salida) happens first, so a rejected sale leaves no stock
//! mutation, no movement, no journal entry and no sale row.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use telar_auth::{Module, PermissionLevel};
use telar_core::Aggregate;
use telar_inventory::{MovementKind, RecordMovement, StockCommand, StockLedger, StockLedgerId};
use telar_sales::{RecordSale, SaleCommand, SaleOrder, SaleOrderId};

use crate::app::services::{AppServices, aggregate_types};
use crate::app::{dto, errors};
use crate::authz;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:code", get(detail))
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Sales, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = services.sales.list().into_iter().map(dto::sale_to_json).collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn detail(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Sales, PermissionLevel::Read) {
        return resp;
    }

    match services.sales.get(&code) {
        Some(row) => (StatusCode::OK, Json(dto::sale_to_json(row))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "sale not found"),
    }
}

#[derive(Debug, Deserialize)]
pub struct SaleRequest {
    pub id_customer: String,
    pub id_location: String,
    pub id_material: String,
    pub quantity: i64,
    pub price: f64,
    pub acc_debit: String,
    pub acc_credit: String,
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<SaleRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Sales, PermissionLevel::Write) {
        return resp;
    }

    // Referential checks before any write.
    let Some(material) = services.materials.get(&body.id_material) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "unknown_reference",
            format!("material '{}' does not exist", body.id_material),
        );
    };
    let Some(customer) = services.customers.get(&body.id_customer) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "unknown_reference",
            format!("customer '{}' does not exist", body.id_customer),
        );
    };
    if services.locations.get(&body.id_location).is_none() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "unknown_reference",
            format!("location '{}' does not exist", body.id_location),
        );
    }
    for account in [&body.acc_debit, &body.acc_credit] {
        if services.accounts.get(account).is_none() {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "unknown_reference",
                format!("account '{account}' does not exist"),
            );
        }
    }

    // A stock record must already exist for the pair, with enough on hand.
    // The Salida dispatch below re-checks the balance atomically.
    let Some(stock) = services.stock.get(&body.id_location, &body.id_material) else {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invariant_violation",
            format!(
                "no stock record for '{}' at '{}'",
                body.id_material, body.id_location
            ),
        );
    };
    if stock.quantity < body.quantity {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invariant_violation",
            format!("insufficient stock (available {})", stock.quantity),
        );
    }

    let code = format!("VTA-{}", Utc::now().format("%y%m%d%H%M%S"));
    let sale_id = SaleOrderId::for_code(&code);
    if services.stream_exists(sale_id.0) {
        return errors::json_error(
            StatusCode::CONFLICT,
            "conflict",
            "a sale with this code was just recorded; retry",
        );
    }

    let sale_cmd = RecordSale {
        sale_id,
        code: code.clone(),
        customer: customer.code.clone(),
        location: body.id_location.clone(),
        material: body.id_material.clone(),
        quantity: body.quantity,
        unit: material.unit.clone(),
        unit_price: body.price,
        currency: customer.profile.currency.clone(),
        debit_account: body.acc_debit.clone(),
        credit_account: body.acc_credit.clone(),
        recorded_by: user.username().to_string(),
        occurred_at: Utc::now(),
    };

    // Pure pre-validation: the sale decision must be acceptable before the
    // stock write happens.
    if let Err(e) = SaleOrder::empty(sale_id).handle(&SaleCommand::RecordSale(sale_cmd.clone())) {
        return errors::dispatch_error_to_response(e.into());
    }

    // Guarded atomic step: the stock ledger enforces the balance.
    let ledger_id = StockLedgerId::for_pair(&body.id_location, &body.id_material);
    let movement_cmd = StockCommand::RecordMovement(RecordMovement {
        ledger_id,
        movement_id: Uuid::now_v7(),
        location: body.id_location.clone(),
        material: body.id_material.clone(),
        kind: MovementKind::Salida,
        quantity: body.quantity,
        unit: material.unit.clone(),
        note: format!("Venta {code}"),
        recorded_by: user.username().to_string(),
        occurred_at: Utc::now(),
    });
    if let Err(e) = services.dispatch::<StockLedger>(
        ledger_id.0,
        aggregate_types::STOCK,
        movement_cmd,
        |id| StockLedger::empty(StockLedgerId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    // The sale itself: already pre-validated, so only a store fault can
    // fail here.
    let total = sale_cmd.quantity as f64 * sale_cmd.unit_price;
    match services.dispatch::<SaleOrder>(
        sale_id.0,
        aggregate_types::SALE_ORDER,
        SaleCommand::RecordSale(sale_cmd),
        |id| SaleOrder::empty(SaleOrderId::new(id)),
    ) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id_sale_order": code,
                "total_amount": total,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("sale record failed after stock movement for {code}: {e:?}");
            errors::dispatch_error_to_response(e)
        }
    }
}
