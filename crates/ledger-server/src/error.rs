use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ledger_core::LedgerError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Ledger(#[from] LedgerError),

    #[error("Upload is empty")]
    EmptyUpload,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Ledger(e) => match e {
                LedgerError::Schema(_) | LedgerError::Parse { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, e.code())
                }
                LedgerError::Csv(_) => (StatusCode::BAD_REQUEST, e.code()),
                LedgerError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, e.code()),
            },
            AppError::EmptyUpload => (StatusCode::BAD_REQUEST, "EMPTY_UPLOAD"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            AppError::InvalidParam(_) => (StatusCode::BAD_REQUEST, "INVALID_PARAM"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        match &self {
            AppError::Ledger(LedgerError::Io(e)) => {
                tracing::error!(error = %e, error_code = code, "Ledger could not be read");
            }
            AppError::Ledger(e) => {
                tracing::warn!(error = %e, error_code = code, "Ledger rejected");
            }
            AppError::EmptyUpload => {
                tracing::warn!(error_code = code, "Empty ledger upload");
            }
            AppError::InvalidParam(param) => {
                tracing::warn!(param = %param, error_code = code, "Invalid parameter");
            }
            AppError::Config(msg) => {
                tracing::error!(message = %msg, error_code = code, "Configuration error");
            }
        }

        tracing::debug!(
            status_code = %status.as_u16(),
            error_code = %code,
            error_message = %self.to_string(),
            "Returning error response"
        );

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidParam(rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;
