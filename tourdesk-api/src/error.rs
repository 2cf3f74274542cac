use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tourdesk_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::Core(err) => match err {
                CoreError::ValidationError(_) => StatusCode::BAD_REQUEST,
                CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                CoreError::SeatConflict { .. } | CoreError::InvalidTransition { .. } => StatusCode::CONFLICT,
                CoreError::CapacityExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                CoreError::StorageError(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::AuthenticationError(_) => "UNAUTHENTICATED",
            AppError::Core(err) => err.code(),
            AppError::Anyhow(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match self {
            AppError::Core(CoreError::SeatConflict { contested_seats }) => json!({
                "error": format!("Seats already held: {:?}", contested_seats),
                "code": code,
                "contested_seats": contested_seats,
            }),
            AppError::Core(CoreError::StorageError(msg)) => {
                tracing::error!("Seat ledger unavailable: {}", msg);
                json!({
                    "error": "Seat ledger unavailable; re-check occupancy before retrying",
                    "code": code,
                })
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                json!({ "error": "Internal Server Error", "code": code })
            }
            other => json!({ "error": other.to_string(), "code": code }),
        };

        (status, Json(body)).into_response()
    }
}
