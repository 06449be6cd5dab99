use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete as delete_route, get, post},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use telar_accounting::{
    Account, AccountCatalog, AccountCatalogCommand, AccountCatalogId, AccountCommand,
    AccountFields, AccountGroup, AccountId, AccountNature, AccountType, CreateAccount,
    DeleteAccount, EntryLine, Journal, JournalCommand, JournalId, PostEntry, UpdateAccount,
};
use telar_auth::{Module, PermissionLevel};

use crate::app::services::{AppServices, aggregate_types};
use crate::app::{csv_io, dto, errors};
use crate::authz;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/types", get(list_types).post(put_type))
        .route("/types/:code", delete_route(remove_type))
        .route("/groups", get(list_groups).post(put_group))
        .route("/groups/:code", delete_route(remove_group))
        .route("/natures", get(list_natures).post(put_nature))
        .route("/natures/:code", delete_route(remove_nature))
        .route("/accounts", get(account_list).post(account_create))
        .route("/accounts/export", get(account_export))
        .route("/accounts/:key", get(account_detail).put(account_update).delete(account_delete))
        .route("/journal", get(journal_list).post(journal_create))
        .route("/balances", get(balances))
}

// ───────────────────────── reference catalog ─────────────────────────

pub async fn list_types(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = services
        .catalogs
        .account_types()
        .into_iter()
        .map(|t| serde_json::json!({ "id_account_type": t.code, "name": t.name, "description": t.description }))
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct TypeRequest {
    pub id_account_type: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

pub async fn put_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<TypeRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Write) {
        return resp;
    }

    dispatch_catalog(
        &services,
        AccountCatalogCommand::PutType {
            entry: AccountType {
                code: body.id_account_type,
                name: body.name,
                description: body.description,
            },
            occurred_at: Utc::now(),
        },
        StatusCode::CREATED,
    )
}

pub async fn remove_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Write) {
        return resp;
    }

    if services.accounts.list().iter().any(|a| a.fields.account_type == code) {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "in_use",
            "account type is used by one or more accounts",
        );
    }

    dispatch_catalog(
        &services,
        AccountCatalogCommand::RemoveType { code, occurred_at: Utc::now() },
        StatusCode::NO_CONTENT,
    )
}

pub async fn list_groups(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = services
        .catalogs
        .account_groups()
        .into_iter()
        .map(|g| {
            serde_json::json!({
                "id_account_group": g.code,
                "name": g.name,
                "code_prefix": g.code_prefix,
                "description": g.description,
            })
        })
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct GroupRequest {
    pub id_account_group: String,
    pub name: String,
    #[serde(default)]
    pub code_prefix: String,
    #[serde(default)]
    pub description: String,
}

pub async fn put_group(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<GroupRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Write) {
        return resp;
    }

    dispatch_catalog(
        &services,
        AccountCatalogCommand::PutGroup {
            entry: AccountGroup {
                code: body.id_account_group,
                name: body.name,
                code_prefix: body.code_prefix,
                description: body.description,
            },
            occurred_at: Utc::now(),
        },
        StatusCode::CREATED,
    )
}

pub async fn remove_group(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Write) {
        return resp;
    }

    if services.accounts.list().iter().any(|a| a.fields.account_group == code) {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "in_use",
            "account group is used by one or more accounts",
        );
    }

    dispatch_catalog(
        &services,
        AccountCatalogCommand::RemoveGroup { code, occurred_at: Utc::now() },
        StatusCode::NO_CONTENT,
    )
}

pub async fn list_natures(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = services
        .catalogs
        .account_natures()
        .into_iter()
        .map(|n| {
            serde_json::json!({
                "id_account_nature": n.code,
                "name": n.name,
                "symbol": n.symbol,
                "effect_on_balance": n.effect_on_balance,
            })
        })
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct NatureRequest {
    pub id_account_nature: String,
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub effect_on_balance: String,
}

pub async fn put_nature(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<NatureRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Write) {
        return resp;
    }

    dispatch_catalog(
        &services,
        AccountCatalogCommand::PutNature {
            entry: AccountNature {
                code: body.id_account_nature,
                name: body.name,
                symbol: body.symbol,
                effect_on_balance: body.effect_on_balance,
            },
            occurred_at: Utc::now(),
        },
        StatusCode::CREATED,
    )
}

pub async fn remove_nature(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Write) {
        return resp;
    }

    if services.accounts.list().iter().any(|a| a.fields.nature == code) {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "in_use",
            "account nature is used by one or more accounts",
        );
    }

    dispatch_catalog(
        &services,
        AccountCatalogCommand::RemoveNature { code, occurred_at: Utc::now() },
        StatusCode::NO_CONTENT,
    )
}

fn dispatch_catalog(
    services: &AppServices,
    cmd: AccountCatalogCommand,
    ok_status: StatusCode,
) -> axum::response::Response {
    let catalog_id = AccountCatalogId::singleton();
    match services.dispatch::<AccountCatalog>(
        catalog_id.0,
        aggregate_types::ACCOUNT_CATALOG,
        cmd,
        |_id| AccountCatalog::empty(AccountCatalogId::singleton()),
    ) {
        Ok(_) => ok_status.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

// ──────────────────────── chart of accounts ────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct AccountFilters {
    pub code: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    #[serde(default)]
    pub id_account: String,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub account_type: String,
    pub account_group: String,
    pub nature: String,
    #[serde(default)]
    pub currency_id: String,
    #[serde(default)]
    pub country_id: String,
    #[serde(default)]
    pub parent_account: Option<String>,
    #[serde(default = "default_true")]
    pub status: bool,
}

fn default_true() -> bool {
    true
}

fn check_account_references(
    services: &AppServices,
    body: &AccountRequest,
) -> Result<(), axum::response::Response> {
    if !services.catalogs.has_account_type(&body.account_type) {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "unknown_reference",
            format!("account type '{}' does not exist", body.account_type),
        ));
    }
    if !services.catalogs.has_account_group(&body.account_group) {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "unknown_reference",
            format!("account group '{}' does not exist", body.account_group),
        ));
    }
    if !services.catalogs.has_account_nature(&body.nature) {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "unknown_reference",
            format!("account nature '{}' does not exist", body.nature),
        ));
    }
    if let Some(parent) = body.parent_account.as_deref() {
        if !parent.is_empty() && services.accounts.get(parent).is_none() {
            return Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "unknown_reference",
                format!("parent account '{parent}' does not exist"),
            ));
        }
    }
    Ok(())
}

fn account_fields(body: AccountRequest) -> AccountFields {
    AccountFields {
        name: body.name,
        code: body.code,
        description: body.description,
        account_type: body.account_type,
        account_group: body.account_group,
        nature: body.nature,
        currency: body.currency_id,
        country: body.country_id,
        parent_account: body.parent_account.filter(|p| !p.is_empty()),
        active: body.status,
    }
}

pub async fn account_list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(filters): Query<AccountFilters>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = services
        .accounts
        .list()
        .into_iter()
        .filter(|a| {
            filters
                .code
                .as_deref()
                .is_none_or(|f| f.is_empty() || a.fields.code.contains(f))
        })
        .filter(|a| {
            filters
                .name
                .as_deref()
                .is_none_or(|f| f.is_empty() || a.fields.name.contains(f))
        })
        .filter(|a| match filters.status.as_deref() {
            Some("Activo") => a.fields.active,
            Some("Inactivo") => !a.fields.active,
            _ => true,
        })
        .map(dto::account_to_json)
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn account_create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<AccountRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Write) {
        return resp;
    }
    if let Err(resp) = check_account_references(&services, &body) {
        return resp;
    }

    let key = body.id_account.clone();
    let account_id = AccountId::for_key(&key);
    let cmd = AccountCommand::CreateAccount(CreateAccount {
        account_id,
        key: key.clone(),
        fields: account_fields(body),
        created_by: user.username().to_string(),
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Account>(account_id.0, aggregate_types::ACCOUNT, cmd, |id| {
        Account::empty(AccountId::new(id))
    }) {
        Ok(_) => (StatusCode::CREATED, Json(serde_json::json!({ "id_account": key }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn account_detail(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(key): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Read) {
        return resp;
    }

    match services.accounts.get(&key) {
        Some(row) => (StatusCode::OK, Json(dto::account_to_json(row))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "account not found"),
    }
}

pub async fn account_update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(key): Path<String>,
    Json(body): Json<AccountRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Write) {
        return resp;
    }
    if let Err(resp) = check_account_references(&services, &body) {
        return resp;
    }

    let account_id = AccountId::for_key(&key);
    let cmd = AccountCommand::UpdateAccount(UpdateAccount {
        account_id,
        fields: account_fields(body),
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Account>(account_id.0, aggregate_types::ACCOUNT, cmd, |id| {
        Account::empty(AccountId::new(id))
    }) {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "id_account": key }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn account_delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(key): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Write) {
        return resp;
    }

    if services.accounts.has_children(&key) {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "in_use",
            "account has child accounts assigned",
        );
    }

    let account_id = AccountId::for_key(&key);
    let cmd = AccountCommand::DeleteAccount(DeleteAccount {
        account_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Account>(account_id.0, aggregate_types::ACCOUNT, cmd, |id| {
        Account::empty(AccountId::new(id))
    }) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

const ACCOUNTS_CSV_HEADERS: [&str; 14] = [
    "ID_Cuenta",
    "Nombre",
    "Código",
    "Descripción",
    "Tipo",
    "Grupo",
    "Naturaleza",
    "Moneda",
    "País",
    "Cuenta_Padre",
    "Estado",
    "Fecha_Creación",
    "Última_Actualización",
    "Creado_Por",
];

pub async fn account_export(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Read) {
        return resp;
    }

    let rows = services
        .accounts
        .list()
        .into_iter()
        .map(|a| {
            vec![
                a.key.clone(),
                a.fields.name.clone(),
                a.fields.code.clone(),
                a.fields.description.clone(),
                a.fields.account_type.clone(),
                a.fields.account_group.clone(),
                a.fields.nature.clone(),
                a.fields.currency.clone(),
                a.fields.country.clone(),
                a.fields.parent_account.clone().unwrap_or_default(),
                csv_io::status_label(a.fields.active).to_string(),
                a.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                a.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                a.created_by,
            ]
        })
        .collect();

    csv_io::csv_response("cuentas_contables", &ACCOUNTS_CSV_HEADERS, rows)
}

/// Thin JSON lookup: active accounts as `code - name` pairs for selects.
pub async fn accounts_lookup(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let items: Vec<_> = services
        .accounts
        .list()
        .into_iter()
        .filter(|a| a.fields.active)
        .map(|a| {
            serde_json::json!({
                "id": a.key,
                "text": format!("{} - {}", a.fields.code, a.fields.name),
            })
        })
        .collect();
    (StatusCode::OK, Json(items)).into_response()
}

// ─────────────────────────── journal ───────────────────────────

#[derive(Debug, Deserialize)]
pub struct JournalLineRequest {
    pub account_id: String,
    #[serde(default)]
    pub debit: f64,
    #[serde(default)]
    pub credit: f64,
}

#[derive(Debug, Deserialize)]
pub struct JournalEntryRequest {
    pub date: NaiveDate,
    pub description: String,
    #[serde(default)]
    pub reference: Option<String>,
    pub lines: Vec<JournalLineRequest>,
}

pub async fn journal_create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<JournalEntryRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Write) {
        return resp;
    }

    // Referential check before the balance validation in the aggregate.
    for line in &body.lines {
        if !line.account_id.is_empty() && services.accounts.get(&line.account_id).is_none() {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "unknown_reference",
                format!("account '{}' does not exist", line.account_id),
            );
        }
    }

    let journal_id = JournalId::general();
    let entry_id = Uuid::now_v7();
    let cmd = JournalCommand::PostEntry(PostEntry {
        journal_id,
        entry_id,
        date: body.date,
        description: body.description,
        reference: body.reference,
        lines: body
            .lines
            .into_iter()
            .map(|l| EntryLine { account: l.account_id, debit: l.debit, credit: l.credit })
            .collect(),
        recorded_by: user.username().to_string(),
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Journal>(journal_id.0, aggregate_types::JOURNAL, cmd, |id| {
        Journal::empty(JournalId::new(id))
    }) {
        Ok(_) => (StatusCode::CREATED, Json(serde_json::json!({ "id": entry_id }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn journal_list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = services
        .journal
        .entries()
        .into_iter()
        .map(dto::journal_entry_to_json)
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn balances(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Accounting, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = services
        .journal
        .balances()
        .into_iter()
        .map(dto::balance_to_json)
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
