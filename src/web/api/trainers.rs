use super::extract::JsonBody;
use crate::error::Result;
use crate::hire::Decision;
use crate::models::{HireRequest, PendingHireRequest, User};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HireRequestBody {
    pub client_id: String,
    pub trainer_id: String,
}

#[derive(Debug, Serialize)]
pub struct HireResponse {
    pub user: User,
    pub request: HireRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondBody {
    pub request_id: String,
    pub status: Decision,
    /// The responding trainer, checked against the request when present.
    #[serde(default)]
    pub trainer_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RespondResponse {
    pub message: String,
    pub client: Option<User>,
    pub request: HireRequest,
}

/// GET /api/trainers
#[tracing::instrument(skip(state))]
pub async fn list_trainers(State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    Ok(Json(state.api.trainers().await?))
}

/// GET /api/trainers/clients/{trainer_id}
#[tracing::instrument(skip(state))]
pub async fn list_clients(
    State(state): State<AppState>,
    Path(trainer_id): Path<String>,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.api.clients_of(&trainer_id).await?))
}

/// POST /api/trainers/request-hire
#[tracing::instrument(skip(state))]
pub async fn request_hire(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<HireRequestBody>,
) -> Result<Json<HireResponse>> {
    let (user, request) = state
        .api
        .request_hire(&body.client_id, &body.trainer_id)
        .await?;
    Ok(Json(HireResponse { user, request }))
}

/// GET /api/trainers/requests/{trainer_id}
#[tracing::instrument(skip(state))]
pub async fn pending_requests(
    State(state): State<AppState>,
    Path(trainer_id): Path<String>,
) -> Result<Json<Vec<PendingHireRequest>>> {
    Ok(Json(state.api.pending_requests(&trainer_id).await?))
}

/// POST /api/trainers/respond-request
#[tracing::instrument(skip(state))]
pub async fn respond_request(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RespondBody>,
) -> Result<Json<RespondResponse>> {
    let (request, client) = state
        .api
        .respond_to_request(&body.request_id, body.status, body.trainer_id.as_deref())
        .await?;
    Ok(Json(RespondResponse {
        message: format!("Request {}", request.status),
        client,
        request,
    }))
}
