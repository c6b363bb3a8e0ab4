use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use courier_core::{CoreError, CoreResult};

/// Every failure a handler can return. Core errors keep their meaning;
/// token problems get their own codes.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not authenticated")]
    TokenMissing,
    #[error("Could not validate credentials")]
    TokenInvalid,
    #[error(transparent)]
    Core(#[from] CoreError),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub code: &'static str,
    pub detail: String,
}

impl AppError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::Core(CoreError::bad_request(detail))
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Core(CoreError::Internal(err.into()))
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::TokenMissing => (StatusCode::UNAUTHORIZED, "TOKEN_MISSING"),
            Self::TokenInvalid => (StatusCode::UNAUTHORIZED, "TOKEN_INVALID"),
            Self::Core(e) => match e {
                CoreError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                CoreError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
                CoreError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                CoreError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                CoreError::PayloadTooLarge(_) => {
                    (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE")
                }
                CoreError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let detail = match &self {
            Self::Core(CoreError::Internal(e)) => {
                error!("Internal error: {:#}", e);
                "Internal server error".to_string()
            }
            other => {
                warn!("Request rejected ({}): {}", code, other);
                other.to_string()
            }
        };

        (
            status,
            Json(ErrorBody {
                ok: false,
                code,
                detail,
            }),
        )
            .into_response()
    }
}

/// Run a synchronous core operation off the async runtime.
pub async fn blocking<F, T>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            AppError::internal(e)
        })?
        .map_err(AppError::from)
}
