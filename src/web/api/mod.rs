pub mod admin;
pub mod auth;
pub mod chat;
pub mod extract;
pub mod middleware;
pub mod plans;
pub mod trainers;
pub mod users;

use crate::state::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::{routing::delete, routing::get, routing::post, Json, Router};
use serde_json::json;

/// GET /api/health
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "storage": state.api.store().backend(),
        "liveConnections": state.api.live().len(),
    }))
}

pub fn build_api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // Accounts, under both deployment layouts
        .route("/auth/register", post(auth::register))
        .route("/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/login", post(auth::login))
        // Profiles
        .route("/users/profile", post(users::update_profile))
        .route("/clients/profile", post(users::save_client_profile))
        .route("/clients/profile/{user_id}", get(users::get_client_profile))
        // Trainers and hire requests
        .route("/trainers", get(trainers::list_trainers))
        .route("/trainers/clients/{trainer_id}", get(trainers::list_clients))
        .route("/trainers/request-hire", post(trainers::request_hire))
        .route("/trainers/requests/{trainer_id}", get(trainers::pending_requests))
        .route("/trainers/respond-request", post(trainers::respond_request))
        // Chat
        .route("/chat", post(chat::send_message))
        .route("/chat/{user_id}/{other_id}", get(chat::history))
        // Plans
        .route("/plans/training", post(plans::create_training_plan))
        .route("/plans/diet", post(plans::create_diet_plan))
        .route("/plans/{client_id}", get(plans::plans_for))
        // Admin
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{user_id}", delete(admin::delete_user))
}
