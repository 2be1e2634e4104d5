use crate::session;
use crate::state::AppState;
use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
};

/// GET /ws -- upgrade to the live chat channel
pub async fn live_channel(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let api = state.api.clone();
    ws.on_upgrade(move |socket| session::serve(socket, api))
}
