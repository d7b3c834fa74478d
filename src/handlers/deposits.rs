use axum::{extract::State, Json};

use crate::error::EngineError;
use crate::models::{CreateDepositRequest, CreateDepositResponse};
use crate::services::deposits::create_deposit;
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateDepositRequest>,
) -> Result<Json<CreateDepositResponse>, EngineError> {
    let response = create_deposit(&state, payload.user_id, payload.amount).await?;
    Ok(Json(response))
}
