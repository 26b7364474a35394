use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::{engine::EngineError, storage::StoreError},
    state::race_machine::{IllegalCommand, PlanError, ResolveError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The command is not legal in the current phase; nothing was sent.
    #[error("refused: {0}")]
    Refused(#[source] IllegalCommand),
    /// The race engine answered and rejected the command.
    #[error("race engine rejected the command: {0}")]
    Rejected(String),
    /// The race engine could not be reached or answered garbage.
    #[error("race engine unavailable")]
    Unavailable(#[source] EngineError),
    /// Preferences could not be read or written.
    #[error("preference storage failed")]
    Storage(#[source] StoreError),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl ServiceError {
    /// One-line text shown to the operator as a notice.
    pub fn notice_message(&self) -> String {
        match self {
            ServiceError::Unavailable(err) => err.summary(),
            ServiceError::Rejected(message) => message.clone(),
            ServiceError::Refused(illegal) => illegal.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Rejected { message, .. } => ServiceError::Rejected(message),
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        ServiceError::Storage(err)
    }
}

impl From<PlanError> for ServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                ServiceError::InvalidState("another command is still pending".into())
            }
            PlanError::Illegal(illegal) => ServiceError::Refused(illegal),
        }
    }
}

impl From<ResolveError> for ServiceError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NoPending => ServiceError::InvalidState("no command is pending".into()),
            ResolveError::IdMismatch { .. } => {
                ServiceError::InvalidState("pending command does not match".into())
            }
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The upstream race engine said no or failed.
    #[error("bad gateway: {0}")]
    BadGateway(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Upstream did not answer in time.
    #[error("gateway timeout: {0}")]
    GatewayTimeout(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Refused(illegal) => AppError::Conflict(illegal.to_string()),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::Rejected(message) => AppError::BadGateway(message),
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.summary()),
            ServiceError::Storage(source) => AppError::Internal(source.to_string()),
            ServiceError::Timeout => AppError::GatewayTimeout("race engine timed out".into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
