//! User and role administration.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;

use telar_auth::{
    ChangePassword, CreateRole, CreateUser, DeleteRole, DeleteUser, Module, PermissionLevel,
    PermissionSet, Role, RoleCommand, RoleId, UpdateRole, UpdateUser, User, UserCommand, UserId,
    hash_password,
};

use crate::app::services::{AppServices, aggregate_types};
use crate::app::{dto, errors};
use crate::authz;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/users", get(user_list).post(user_create))
        .route("/users/:username", axum::routing::put(user_update).delete(user_delete))
        .route("/users/:username/password", post(user_change_password))
        .route("/roles", get(role_list).post(role_create))
        .route("/roles/:name", axum::routing::put(role_update).delete(role_delete))
}

// ───────────────────────────── users ─────────────────────────────

pub async fn user_list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Users, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = services.users.list().into_iter().map(dto::user_to_json).collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_superuser: bool,
}

pub async fn user_create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateUserRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Users, PermissionLevel::Write) {
        return resp;
    }

    if let Some(role) = body.role.as_deref() {
        if services.roles.get(role).is_none() {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "unknown_reference",
                format!("role '{role}' does not exist"),
            );
        }
    }

    let password_hash = match hash_password(&body.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("password hashing failed: {e}");
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            );
        }
    };

    let user_id = UserId::for_username(&body.username);
    let cmd = UserCommand::CreateUser(CreateUser {
        user_id,
        username: body.username.clone(),
        email: body.email,
        password_hash,
        role: body.role,
        superuser: body.is_superuser,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<User>(user_id.0, aggregate_types::USER, cmd, |id| {
        User::empty(UserId::new(id))
    }) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "username": body.username })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

pub async fn user_update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(username): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Users, PermissionLevel::Write) {
        return resp;
    }

    if let Some(role) = body.role.as_deref() {
        if services.roles.get(role).is_none() {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "unknown_reference",
                format!("role '{role}' does not exist"),
            );
        }
    }

    let user_id = UserId::for_username(&username);
    let cmd = UserCommand::UpdateUser(UpdateUser {
        user_id,
        email: body.email,
        role: body.role,
        superuser: body.is_superuser,
        active: body.is_active,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<User>(user_id.0, aggregate_types::USER, cmd, |id| {
        User::empty(UserId::new(id))
    }) {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "username": username }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub password: String,
}

pub async fn user_change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(username): Path<String>,
    Json(body): Json<ChangePasswordRequest>,
) -> axum::response::Response {
    // Users can always change their own password; changing someone
    // else's requires the Users write permission.
    if username != user.username() {
        if let Err(resp) = authz::require(&services, &user, Module::Users, PermissionLevel::Write) {
            return resp;
        }
    }

    let password_hash = match hash_password(&body.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("password hashing failed: {e}");
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            );
        }
    };

    let user_id = UserId::for_username(&username);
    let cmd = UserCommand::ChangePassword(ChangePassword {
        user_id,
        password_hash,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<User>(user_id.0, aggregate_types::USER, cmd, |id| {
        User::empty(UserId::new(id))
    }) {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn user_delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Users, PermissionLevel::Write) {
        return resp;
    }

    let user_id = UserId::for_username(&username);
    let cmd = UserCommand::DeleteUser(DeleteUser {
        user_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<User>(user_id.0, aggregate_types::USER, cmd, |id| {
        User::empty(UserId::new(id))
    }) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

// ───────────────────────────── roles ─────────────────────────────

pub async fn role_list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Users, PermissionLevel::Read) {
        return resp;
    }

    let items: Vec<_> = services.roles.list().into_iter().map(dto::role_to_json).collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Permission levels per module, 0/1/2 keyed by module name.
    #[serde(default)]
    pub permissions: BTreeMap<String, u8>,
}

fn parse_permissions(raw: &BTreeMap<String, u8>) -> Result<PermissionSet, axum::response::Response> {
    let mut set = PermissionSet::new();
    for (module_name, level_value) in raw {
        let Ok(module) = module_name.parse::<Module>() else {
            return Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                format!("unknown module '{module_name}'"),
            ));
        };
        let Some(level) = PermissionLevel::from_u8(*level_value) else {
            return Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                format!("permission level for '{module_name}' must be 0, 1 or 2"),
            ));
        };
        set.set(module, level);
    }
    Ok(set)
}

pub async fn role_create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<RoleRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Users, PermissionLevel::Write) {
        return resp;
    }

    let permissions = match parse_permissions(&body.permissions) {
        Ok(set) => set,
        Err(resp) => return resp,
    };

    let role_id = RoleId::for_name(&body.name);
    let cmd = RoleCommand::CreateRole(CreateRole {
        role_id,
        name: body.name.clone(),
        description: body.description,
        permissions,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Role>(role_id.0, aggregate_types::ROLE, cmd, |id| {
        Role::empty(RoleId::new(id))
    }) {
        Ok(_) => (StatusCode::CREATED, Json(serde_json::json!({ "name": body.name }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn role_update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(name): Path<String>,
    Json(body): Json<RoleRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Users, PermissionLevel::Write) {
        return resp;
    }

    let permissions = match parse_permissions(&body.permissions) {
        Ok(set) => set,
        Err(resp) => return resp,
    };

    let role_id = RoleId::for_name(&name);
    let cmd = RoleCommand::UpdateRole(UpdateRole {
        role_id,
        description: body.description,
        permissions,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Role>(role_id.0, aggregate_types::ROLE, cmd, |id| {
        Role::empty(RoleId::new(id))
    }) {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "name": name }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn role_delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(name): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, Module::Users, PermissionLevel::Write) {
        return resp;
    }

    if services.users.any_with_role(&name) {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "in_use",
            "role is assigned to one or more users",
        );
    }

    let role_id = RoleId::for_name(&name);
    let cmd = RoleCommand::DeleteRole(DeleteRole {
        role_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Role>(role_id.0, aggregate_types::ROLE, cmd, |id| {
        Role::empty(RoleId::new(id))
    }) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
