use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Central error type for the top-up engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("too many requests, try again shortly")]
    RateLimited,

    #[error("minimum top-up amount is {0}")]
    AmountBelowMinimum(i64),

    #[error("no payable amount available right now, try again")]
    AmountUnavailable,

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("notification error: {0}")]
    Notify(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl EngineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::AmountBelowMinimum(_) => StatusCode::BAD_REQUEST,
            Self::AmountUnavailable => StatusCode::CONFLICT,
            Self::UserNotFound(_) => StatusCode::NOT_FOUND,
            Self::Gateway(_) | Self::Notify(_) | Self::Http(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
