use super::extract::JsonBody;
use crate::api::ProfileUpdate;
use crate::error::Result;
use crate::models::{ClientProfile, User};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub update: ProfileUpdate,
}

/// POST /api/users/profile
#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id))]
pub async fn update_profile(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ProfileUpdateRequest>,
) -> Result<Json<User>> {
    let user = state.api.update_profile(&req.user_id, req.update).await?;
    Ok(Json(user))
}

/// POST /api/clients/profile
#[tracing::instrument(skip(state, profile), fields(user_id = %profile.user_id))]
pub async fn save_client_profile(
    State(state): State<AppState>,
    JsonBody(profile): JsonBody<ClientProfile>,
) -> Result<Json<ClientProfile>> {
    let profile = state.api.save_client_profile(profile).await?;
    Ok(Json(profile))
}

/// GET /api/clients/profile/{user_id} -- `null` when none was saved
#[tracing::instrument(skip(state))]
pub async fn get_client_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Option<ClientProfile>>> {
    Ok(Json(state.api.client_profile(&user_id).await?))
}
