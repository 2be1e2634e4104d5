use super::extract::JsonBody;
use crate::api::NewAccount;
use crate::error::Result;
use crate::models::User;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/register
#[tracing::instrument(skip(state, account))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(account): JsonBody<NewAccount>,
) -> Result<(StatusCode, Json<User>)> {
    let user = state.api.register(account).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/auth/login
#[tracing::instrument(skip(state, req))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<User>> {
    let user = state.api.login(&req.email, &req.password).await?;
    Ok(Json(user))
}
