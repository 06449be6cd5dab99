//! The per-module permission gate, enforced before any handler work.
//!
//! A handler declares the `(module, level)` it requires; the gate resolves
//! the caller's role against the roles read model. Superusers bypass the
//! matrix entirely.

use axum::http::StatusCode;

use telar_auth::{Module, PermissionLevel, has_permission};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::CurrentUser;

/// Check that `user` holds at least `required` on `module`.
///
/// Returns the ready-to-send 403 response on failure so handlers can
/// `return Err(...)` with `?`-like brevity.
pub fn require(
    services: &AppServices,
    user: &CurrentUser,
    module: Module,
    required: PermissionLevel,
) -> Result<(), axum::response::Response> {
    let permissions = user
        .role()
        .and_then(|name| services.roles.get(name))
        .map(|row| row.permissions);

    if has_permission(user.is_superuser(), permissions.as_ref(), module, required) {
        Ok(())
    } else {
        Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            format!("missing {module} permission"),
        ))
    }
}
