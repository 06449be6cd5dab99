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
use telar_materials::{
    CreateMaterial, DeleteMaterial, Material, MaterialCatalog, MaterialCatalogCommand,
    MaterialCatalogId, MaterialCommand, MaterialFields, MaterialId, MaterialType, Unit,
    UpdateMaterial,
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
        .route("/units", get(list_units).post(put_unit))
        .route("/units/:name", axum::routing::delete(remove_unit))
        .route("/types", get(list_types).post(put_type))
        .route("/types/:name", axum::routing::delete(remove_type))
        .route("/:code", get(detail).put(update).delete(delete))
}

#[derive(Debug, Deserialize, Default)]
pub struct MaterialFilters {
    pub id_material: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub material_type: Option<String>,
    pub status: Option<String>,
}

fn filtered(services: &AppServices, filters: &MaterialFilters) -> Vec<telar_infra::projections::materials::MaterialRow> {
    services
        .materials
        .list()
        .into_iter()
        .filter(|m| {
            filters
                .id_material
                .as_deref()
                .is_none_or(|f| f.is_empty() || m.code.contains(f))
        })
        .filter(|m| {
            filters
                .name
                .as_deref()
                .is_none_or(|f| f.is_empty() || m.name.contains(f))
        })
        .filter(|m| {
            filters
                .material_type
                .as_deref()
                .is_none_or(|f| f.is_empty() || m.material_type == f)
        })
        .filter(|m| match filters.status.as_deref() {
            Some("true") => m.active,
            Some("false") => !m.active,
            _ => true,
        })
        .collect()
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(filters): Query<MaterialFilters>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Materials, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = filtered(&services, &filters)
        .into_iter()
        .map(dto::material_to_json)
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct MaterialRequest {
    pub id_material: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub unit: String,
    #[serde(rename = "type")]
    pub material_type: String,
    #[serde(default = "default_true")]
    pub status: bool,
}

fn default_true() -> bool {
    true
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<MaterialRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Materials, PermissionLevel::Write) {
        return resp;
    }

    if !services.catalogs.has_material_type(&body.material_type) {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "unknown_reference",
            format!("material type '{}' does not exist", body.material_type),
        );
    }

    let material_id = MaterialId::for_code(&body.id_material);
    let cmd = MaterialCommand::CreateMaterial(CreateMaterial {
        material_id,
        code: body.id_material.clone(),
        fields: MaterialFields {
            name: body.name,
            description: body.description,
            unit: body.unit,
            material_type: body.material_type,
            active: body.status,
        },
        created_by: user.username().to_string(),
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Material>(material_id.0, aggregate_types::MATERIAL, cmd, |id| {
        Material::empty(MaterialId::new(id))
    }) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id_material": body.id_material })),
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
    if let Err(resp) = authz::require(&services, &user, Module::Materials, PermissionLevel::Read) {
        return resp;
    }

    match services.materials.get(&code) {
        Some(row) => (StatusCode::OK, Json(dto::material_to_json(row))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "material not found"),
    }
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
    Json(body): Json<MaterialRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Materials, PermissionLevel::Write) {
        return resp;
    }

    if !services.catalogs.has_material_type(&body.material_type) {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "unknown_reference",
            format!("material type '{}' does not exist", body.material_type),
        );
    }

    let material_id = MaterialId::for_code(&code);
    let cmd = MaterialCommand::UpdateMaterial(UpdateMaterial {
        material_id,
        fields: MaterialFields {
            name: body.name,
            description: body.description,
            unit: body.unit,
            material_type: body.material_type,
            active: body.status,
        },
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Material>(material_id.0, aggregate_types::MATERIAL, cmd, |id| {
        Material::empty(MaterialId::new(id))
    }) {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "id_material": code }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Materials, PermissionLevel::Write) {
        return resp;
    }

    let material_id = MaterialId::for_code(&code);
    let cmd = MaterialCommand::DeleteMaterial(DeleteMaterial {
        material_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Material>(material_id.0, aggregate_types::MATERIAL, cmd, |id| {
        Material::empty(MaterialId::new(id))
    }) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

const CSV_HEADERS: [&str; 9] = [
    "ID_Material",
    "Nombre",
    "Descripcion",
    "Unidad",
    "Tipo",
    "Estado",
    "Creado_Por",
    "Fecha_Creacion",
    "Fecha_Actualizacion",
];

pub async fn export(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(filters): Query<MaterialFilters>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Materials, PermissionLevel::Read) {
        return resp;
    }

    let rows = filtered(&services, &filters)
        .into_iter()
        .map(|m| {
            vec![
                m.code,
                m.name,
                m.description,
                m.unit,
                m.material_type,
                csv_io::status_label(m.active).to_string(),
                m.created_by,
                m.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                m.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();

    csv_io::csv_response("materiales_exportacion", &CSV_HEADERS, rows)
}

pub async fn template(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Materials, PermissionLevel::Write) {
        return resp;
    }

    let headers = ["ID_Material", "Nombre", "Descripcion", "Unidad", "Tipo", "Estado"];
    let rows = vec![
        vec![
            "MAT-001".to_string(),
            "Tornillo hexagonal".to_string(),
            "Tornillo hexagonal acero inoxidable".to_string(),
            "pza".to_string(),
            "Insumo".to_string(),
            "1".to_string(),
        ],
        vec![
            "MAT-002".to_string(),
            "Madera pino".to_string(),
            "Tabla de madera de pino 2x4".to_string(),
            "m".to_string(),
            "Materia Prima".to_string(),
            "1".to_string(),
        ],
    ];

    csv_io::csv_response("plantilla_carga_materiales", &headers, rows)
}

/// Bulk import. Row policy: malformed rows are skipped and reported;
/// an existing material code updates the record, a new one creates it.
pub async fn import(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    body: String,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Materials, PermissionLevel::Write) {
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
        let (code, name, description, unit, material_type, status_cell) =
            (&row[0], &row[1], &row[2], &row[3], &row[4], &row[5]);

        if code.is_empty() || name.is_empty() || unit.is_empty() || material_type.is_empty() {
            report.row_error(row_num, "Campos obligatorios faltantes");
            continue;
        }
        if !services.catalogs.has_material_type(material_type) {
            report.row_error(row_num, format!("Tipo de material '{material_type}' no existe"));
            continue;
        }

        let fields = MaterialFields {
            name: name.clone(),
            description: description.clone(),
            unit: unit.clone(),
            material_type: material_type.clone(),
            active: csv_io::parse_status(status_cell),
        };

        let material_id = MaterialId::for_code(code);
        let exists = services.stream_exists(material_id.0);
        let cmd = if exists {
            MaterialCommand::UpdateMaterial(UpdateMaterial {
                material_id,
                fields,
                occurred_at: Utc::now(),
            })
        } else {
            MaterialCommand::CreateMaterial(CreateMaterial {
                material_id,
                code: code.clone(),
                fields,
                created_by: user.username().to_string(),
                occurred_at: Utc::now(),
            })
        };

        match services.dispatch::<Material>(material_id.0, aggregate_types::MATERIAL, cmd, |id| {
            Material::empty(MaterialId::new(id))
        }) {
            Ok(_) if exists => report.updated += 1,
            Ok(_) => report.created += 1,
            Err(e) => report.row_error(row_num, format!("{e:?}")),
        }
    }

    report.into_response()
}

// ───────────────────────── reference catalog ─────────────────────────

pub async fn list_units(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Materials, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = services
        .catalogs
        .units()
        .into_iter()
        .map(|u| serde_json::json!({ "name": u.name, "symbol": u.symbol }))
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct UnitRequest {
    pub name: String,
    pub symbol: String,
}

pub async fn put_unit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<UnitRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Materials, PermissionLevel::Write) {
        return resp;
    }

    dispatch_catalog(
        &services,
        MaterialCatalogCommand::PutUnit {
            unit: Unit { name: body.name, symbol: body.symbol },
            occurred_at: Utc::now(),
        },
        StatusCode::CREATED,
    )
}

pub async fn remove_unit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(name): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Materials, PermissionLevel::Write) {
        return resp;
    }

    let symbol = services
        .catalogs
        .units()
        .into_iter()
        .find(|u| u.name == name)
        .map(|u| u.symbol);
    if let Some(symbol) = symbol {
        if services.materials.list().iter().any(|m| m.unit == symbol) {
            return errors::json_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "in_use",
                "unit is referenced by one or more materials",
            );
        }
    }

    dispatch_catalog(
        &services,
        MaterialCatalogCommand::RemoveUnit { name, occurred_at: Utc::now() },
        StatusCode::NO_CONTENT,
    )
}

pub async fn list_types(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Materials, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = services
        .catalogs
        .material_types()
        .into_iter()
        .map(|t| serde_json::json!({ "name": t.name, "description": t.description }))
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct MaterialTypeRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

pub async fn put_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<MaterialTypeRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Materials, PermissionLevel::Write) {
        return resp;
    }

    dispatch_catalog(
        &services,
        MaterialCatalogCommand::PutMaterialType {
            material_type: MaterialType { name: body.name, description: body.description },
            occurred_at: Utc::now(),
        },
        StatusCode::CREATED,
    )
}

pub async fn remove_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(name): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Materials, PermissionLevel::Write) {
        return resp;
    }

    if services.materials.list().iter().any(|m| m.material_type == name) {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "in_use",
            "material type is referenced by one or more materials",
        );
    }

    dispatch_catalog(
        &services,
        MaterialCatalogCommand::RemoveMaterialType { name, occurred_at: Utc::now() },
        StatusCode::NO_CONTENT,
    )
}

fn dispatch_catalog(
    services: &AppServices,
    cmd: MaterialCatalogCommand,
    ok_status: StatusCode,
) -> axum::response::Response {
    let catalog_id = MaterialCatalogId::singleton();
    match services.dispatch::<MaterialCatalog>(
        catalog_id.0,
        aggregate_types::MATERIAL_CATALOG,
        cmd,
        |_id| MaterialCatalog::empty(MaterialCatalogId::singleton()),
    ) {
        Ok(_) => ok_status.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Thin JSON lookup used by purchase/sale forms.
pub async fn material_info(
    Extension(services): Extension<Arc<AppServices>>,
    Path(code): Path<String>,
) -> axum::response::Response {
    match services.materials.get(&code) {
        Some(m) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "name": m.name,
                "unit": m.unit,
                "description": m.description,
            })),
        )
            .into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "Material no encontrado"),
    }
}
