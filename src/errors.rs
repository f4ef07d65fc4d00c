use http::StatusCode;
use serde_json::json;
use thiserror::Error;
use worker::{Error as WorkerError, Response};

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Cancelled: {0}")]
    Cancelled(String),
    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("File too large: {size} bytes exceeds {max} bytes")]
    FileTooLarge { size: u64, max: u64 },
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Worker(_) | AppError::Backend(_) | AppError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            // The browser needs to confirm first; nothing happened server side.
            AppError::Cancelled(_) => StatusCode::CONFLICT,
            AppError::UnknownIdentity(_) | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Short machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Worker(_) => "worker_error",
            AppError::Backend(_) => "backend_error",
            AppError::NotFound(_) => "not_found",
            AppError::Cancelled(_) => "cancelled",
            AppError::UnknownIdentity(_) => "unknown_identity",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::BadRequest(_) => "bad_request",
            AppError::FileTooLarge { .. } => "file_too_large",
            AppError::Config(_) => "invalid_configuration",
        }
    }

    pub fn to_response(&self) -> worker::Result<Response> {
        let status = self.status_code();
        // Internal details stay in the logs.
        let message = if status.is_server_error() {
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };
        Ok(Response::from_json(&json!({
            "error": self.code(),
            "message": message,
        }))?
        .with_status(status.as_u16()))
    }
}

impl From<AppError> for WorkerError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Worker(e) => e,
            other => WorkerError::RustError(other.to_string()),
        }
    }
}

impl From<worker::kv::KvError> for AppError {
    fn from(error: worker::kv::KvError) -> Self {
        AppError::Worker(WorkerError::from(error))
    }
}
