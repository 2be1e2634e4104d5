use super::middleware::AdminToken;
use crate::error::Result;
use crate::models::User;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

/// GET /api/admin/users
#[tracing::instrument(skip(state, _admin))]
pub async fn list_users(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.api.all_users().await?))
}

/// DELETE /api/admin/users/{user_id}
#[tracing::instrument(skip(state, _admin))]
pub async fn delete_user(
    _admin: AdminToken,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse> {
    state.api.delete_user(&user_id).await?;
    Ok(Json(json!({ "success": true })))
}
