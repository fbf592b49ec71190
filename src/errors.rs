use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Public fields of the booking that blocked a proposal, echoed back on 409.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictDetails {
    pub id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{kind} is {status}")]
    ResourceUnavailable {
        kind: &'static str,
        status: String,
    },

    #[error("booking conflict")]
    Conflict(ConflictDetails),

    #[error("email already in use")]
    EmailInUse,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) | AppError::ResourceUnavailable { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::EmailInUse => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let AppError::Database(e) = &self {
            tracing::error!(error = %e, "internal error");
        }

        let mut body = serde_json::json!({ "error": { "message": self.to_string() } });
        if let AppError::Conflict(details) = &self {
            body["conflict"] = serde_json::to_value(details).unwrap_or_default();
        }

        (status, axum::Json(body)).into_response()
    }
}
