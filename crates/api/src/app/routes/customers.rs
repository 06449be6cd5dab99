use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;

use telar_auth::{Module, PermissionLevel};
use telar_parties::{
    CreateCustomer, Customer, CustomerCommand, CustomerId, DeleteCustomer, PartyProfile,
    UpdateCustomer,
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
        .route("/:code", get(detail).put(update).delete(delete))
}

#[derive(Debug, Deserialize, Default)]
pub struct CustomerFilters {
    pub id_customer: Option<String>,
    pub name: Option<String>,
    pub country: Option<String>,
    pub status: Option<String>,
}

fn filtered(
    services: &AppServices,
    filters: &CustomerFilters,
) -> Vec<telar_infra::projections::parties::CustomerRow> {
    services
        .customers
        .list()
        .into_iter()
        .filter(|c| {
            filters
                .id_customer
                .as_deref()
                .is_none_or(|f| f.is_empty() || c.code.contains(f))
        })
        .filter(|c| {
            filters
                .name
                .as_deref()
                .is_none_or(|f| f.is_empty() || c.profile.name.contains(f))
        })
        .filter(|c| {
            filters
                .country
                .as_deref()
                .is_none_or(|f| f.is_empty() || c.profile.country == f)
        })
        .filter(|c| match filters.status.as_deref() {
            Some("true") => c.profile.active,
            Some("false") => !c.profile.active,
            _ => true,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct CustomerRequest {
    #[serde(default)]
    pub id_customer: String,
    pub legal_name: String,
    pub name: String,
    pub country: String,
    pub currency: String,
    #[serde(default)]
    pub text_id: String,
    #[serde(default)]
    pub state_province: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub contact_role: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub payments_terms: String,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub bank_account: String,
    #[serde(default = "default_true")]
    pub status: bool,
}

fn default_true() -> bool {
    true
}

impl CustomerRequest {
    fn into_profile(self) -> PartyProfile {
        PartyProfile {
            legal_name: self.legal_name,
            name: self.name,
            country: self.country,
            currency: self.currency,
            tax_id: self.text_id,
            state_province: self.state_province,
            city: self.city,
            address: self.address,
            zip_code: self.zip_code,
            phone: self.phone,
            email: self.email,
            contact_name: self.contact_name,
            contact_role: self.contact_role,
            category: self.category,
            payment_terms: self.payments_terms,
            payment_method: self.payment_method,
            bank_account: self.bank_account,
            active: self.status,
        }
    }
}

fn check_references(
    services: &AppServices,
    country: &str,
    currency: &str,
) -> Result<(), axum::response::Response> {
    if !services.catalogs.has_country(country) {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "unknown_reference",
            format!("country '{country}' does not exist"),
        ));
    }
    if services.catalogs.currency(currency).is_none() {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "unknown_reference",
            format!("currency '{currency}' does not exist"),
        ));
    }
    Ok(())
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(filters): Query<CustomerFilters>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Customers, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = filtered(&services, &filters)
        .into_iter()
        .map(dto::customer_to_json)
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CustomerRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Customers, PermissionLevel::Write) {
        return resp;
    }
    if let Err(resp) = check_references(&services, &body.country, &body.currency) {
        return resp;
    }

    let code = body.id_customer.clone();
    let customer_id = CustomerId::for_code(&code);
    let cmd = CustomerCommand::CreateCustomer(CreateCustomer {
        customer_id,
        code: code.clone(),
        profile: body.into_profile(),
        created_by: user.username().to_string(),
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Customer>(customer_id.0, aggregate_types::CUSTOMER, cmd, |id| {
        Customer::empty(CustomerId::new(id))
    }) {
        Ok(_) => (StatusCode::CREATED, Json(serde_json::json!({ "id_customer": code }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn detail(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Customers, PermissionLevel::Read) {
        return resp;
    }

    match services.customers.get(&code) {
        Some(row) => (StatusCode::OK, Json(dto::customer_to_json(row))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "customer not found"),
    }
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
    Json(body): Json<CustomerRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Customers, PermissionLevel::Write) {
        return resp;
    }
    if let Err(resp) = check_references(&services, &body.country, &body.currency) {
        return resp;
    }

    let customer_id = CustomerId::for_code(&code);
    let cmd = CustomerCommand::UpdateCustomer(UpdateCustomer {
        customer_id,
        profile: body.into_profile(),
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Customer>(customer_id.0, aggregate_types::CUSTOMER, cmd, |id| {
        Customer::empty(CustomerId::new(id))
    }) {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "id_customer": code }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Customers, PermissionLevel::Write) {
        return resp;
    }

    let customer_id = CustomerId::for_code(&code);
    let cmd = CustomerCommand::DeleteCustomer(DeleteCustomer {
        customer_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Customer>(customer_id.0, aggregate_types::CUSTOMER, cmd, |id| {
        Customer::empty(CustomerId::new(id))
    }) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

const CSV_HEADERS: [&str; 22] = [
    "ID_Cliente",
    "Razon_Social",
    "Nombre",
    "Pais",
    "Moneda",
    "RFC",
    "Estado_Provincia",
    "Ciudad",
    "Direccion",
    "Codigo_Postal",
    "Telefono",
    "Email",
    "Nombre_Contacto",
    "Rol_Contacto",
    "Categoria",
    "Terminos_Pago",
    "Metodo_Pago",
    "Cuenta_Bancaria",
    "Estado",
    "Creado_Por",
    "Fecha_Creacion",
    "Fecha_Actualizacion",
];

pub async fn export(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(filters): Query<CustomerFilters>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Customers, PermissionLevel::Read) {
        return resp;
    }

    let rows = filtered(&services, &filters)
        .iter()
        .map(|c| {
            let p = &c.profile;
            vec![
                c.code.clone(),
                p.legal_name.clone(),
                p.name.clone(),
                p.country.clone(),
                p.currency.clone(),
                p.tax_id.clone(),
                p.state_province.clone(),
                p.city.clone(),
                p.address.clone(),
                p.zip_code.clone(),
                p.phone.clone(),
                p.email.clone(),
                p.contact_name.clone(),
                p.contact_role.clone(),
                p.category.clone(),
                p.payment_terms.clone(),
                p.payment_method.clone(),
                p.bank_account.clone(),
                csv_io::status_label(p.active).to_string(),
                c.created_by.clone(),
                c.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                c.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();

    csv_io::csv_response("clientes_exportacion", &CSV_HEADERS, rows)
}

pub async fn template(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Customers, PermissionLevel::Write) {
        return resp;
    }

    let headers = &CSV_HEADERS[..19];
    let rows = vec![vec![
        "CLI-001".to_string(),
        "Comercial del Bajío SA de CV".to_string(),
        "Comercial del Bajío".to_string(),
        "México".to_string(),
        "MXN".to_string(),
        "CBA010203AB1".to_string(),
        "Guanajuato".to_string(),
        "León".to_string(),
        "Blvd. López Mateos 2000".to_string(),
        "37000".to_string(),
        "4771234567".to_string(),
        "compras@cbajio.mx".to_string(),
        "Jorge Ramírez".to_string(),
        "Compras".to_string(),
        "Mayoreo".to_string(),
        "15 días".to_string(),
        "Transferencia".to_string(),
        "012345678901234567".to_string(),
        "1".to_string(),
    ]];

    csv_io::csv_response("plantilla_carga_clientes", headers, rows)
}

/// Bulk import. Upsert by customer code; countries and currencies must
/// exist in the catalog.
pub async fn import(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    body: String,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Customers, PermissionLevel::Write) {
        return resp;
    }

    let rows = match csv_io::parse_rows(&body) {
        Ok(rows) => rows,
        Err(resp) => return resp,
    };

    let mut report = csv_io::ImportReport::default();

    for (idx, row) in rows.iter().enumerate() {
        let row_num = idx + 2;

        if row.len() < 18 {
            report.row_error(row_num, "No tiene suficientes columnas");
            continue;
        }

        let code = &row[0];
        if code.is_empty() || row[1].is_empty() || row[2].is_empty() || row[3].is_empty() || row[4].is_empty() {
            report.row_error(row_num, "Campos obligatorios faltantes");
            continue;
        }
        let country = &row[3];
        let currency = &row[4];
        if !services.catalogs.has_country(country) {
            report.row_error(row_num, format!("País '{country}' no existe"));
            continue;
        }
        if services.catalogs.currency(currency).is_none() {
            report.row_error(
                row_num,
                format!("Moneda '{currency}' no existe. Use símbolos como MXN, USD, EUR"),
            );
            continue;
        }

        let profile = PartyProfile {
            legal_name: row[1].clone(),
            name: row[2].clone(),
            country: country.clone(),
            currency: currency.clone(),
            tax_id: row[5].clone(),
            state_province: row[6].clone(),
            city: row[7].clone(),
            address: row[8].clone(),
            zip_code: row[9].clone(),
            phone: row[10].clone(),
            email: row[11].clone(),
            contact_name: row[12].clone(),
            contact_role: row[13].clone(),
            category: row[14].clone(),
            payment_terms: row[15].clone(),
            payment_method: row[16].clone(),
            bank_account: row[17].clone(),
            active: csv_io::parse_status(row.get(18).map(String::as_str).unwrap_or("")),
        };

        let customer_id = CustomerId::for_code(code);
        let exists = services.stream_exists(customer_id.0);
        let cmd = if exists {
            CustomerCommand::UpdateCustomer(UpdateCustomer {
                customer_id,
                profile,
                occurred_at: Utc::now(),
            })
        } else {
            CustomerCommand::CreateCustomer(CreateCustomer {
                customer_id,
                code: code.clone(),
                profile,
                created_by: user.username().to_string(),
                occurred_at: Utc::now(),
            })
        };

        match services.dispatch::<Customer>(customer_id.0, aggregate_types::CUSTOMER, cmd, |id| {
            Customer::empty(CustomerId::new(id))
        }) {
            Ok(_) if exists => report.updated += 1,
            Ok(_) => report.created += 1,
            Err(e) => report.row_error(row_num, format!("{e:?}")),
        }
    }

    report.into_response()
}
