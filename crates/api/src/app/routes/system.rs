use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::context::CurrentUser;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(user): Extension<CurrentUser>) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": user.user_id().to_string(),
        "username": user.username(),
        "role": user.role(),
        "is_superuser": user.is_superuser(),
    }))
}
