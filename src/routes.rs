use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::handlers::{deposits, health, users};
use crate::state::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(health::health_check))
        .route("/deposits", post(deposits::create))
        .route("/users/{user_id}/balance", get(users::get_balance))
        .route("/users/{user_id}/transactions", get(users::list_transactions))
        .route("/users/{user_id}/credit", post(users::credit))
        .layer(CorsLayer::permissive())
}
