use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use serde::Deserialize;

use telar_auth::{JwtClaims, UserId, encode_token, verify_password};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::middleware::AuthState;

/// Issued tokens live for one working day.
const TOKEN_TTL_HOURS: i64 = 8;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<AuthState>,
    Json(body): Json<LoginRequest>,
) -> axum::response::Response {
    let Some(user) = services.users.get(&body.username) else {
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid username or password",
        );
    };

    if !user.active || !verify_password(&body.password, &user.password_hash) {
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid username or password",
        );
    }

    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::for_username(&user.username),
        username: user.username.clone(),
        role: user.role.clone(),
        superuser: user.superuser,
        iat: now.timestamp(),
        exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
    };

    match encode_token(&claims, &auth.secret) {
        Ok(token) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "token": token,
                "username": user.username,
                "role": user.role,
                "is_superuser": user.superuser,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("token issuance failed: {e}");
            errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            )
        }
    }
}
