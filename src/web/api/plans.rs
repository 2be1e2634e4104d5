use super::extract::JsonBody;
use crate::api::{NewDietPlan, NewTrainingPlan};
use crate::error::Result;
use crate::models::{DietPlan, PlanBundle, TrainingPlan};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};

/// POST /api/plans/training
#[tracing::instrument(skip(state, plan), fields(client_id = %plan.client_id, trainer_id = %plan.trainer_id))]
pub async fn create_training_plan(
    State(state): State<AppState>,
    JsonBody(plan): JsonBody<NewTrainingPlan>,
) -> Result<Json<TrainingPlan>> {
    Ok(Json(state.api.create_training_plan(plan).await?))
}

/// POST /api/plans/diet
#[tracing::instrument(skip(state, plan), fields(client_id = %plan.client_id, trainer_id = %plan.trainer_id))]
pub async fn create_diet_plan(
    State(state): State<AppState>,
    JsonBody(plan): JsonBody<NewDietPlan>,
) -> Result<Json<DietPlan>> {
    Ok(Json(state.api.create_diet_plan(plan).await?))
}

/// GET /api/plans/{client_id}
#[tracing::instrument(skip(state))]
pub async fn plans_for(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<PlanBundle>> {
    Ok(Json(state.api.plans_for(&client_id).await?))
}
