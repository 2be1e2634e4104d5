use super::extract::JsonBody;
use crate::error::Result;
use crate::models::ChatMessage;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
}

/// GET /api/chat/{user_id}/{other_id}
#[tracing::instrument(skip(state))]
pub async fn history(
    State(state): State<AppState>,
    Path((user_id, other_id)): Path<(String, String)>,
) -> Result<Json<Vec<ChatMessage>>> {
    Ok(Json(state.api.fetch_history(&user_id, &other_id).await?))
}

/// POST /api/chat -- the request/response twin of a live `chat` frame
#[tracing::instrument(skip(state, req), fields(sender_id = %req.sender_id, receiver_id = %req.receiver_id))]
pub async fn send_message(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>)> {
    let message = state
        .api
        .send_message(&req.sender_id, &req.receiver_id, &req.text)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}
