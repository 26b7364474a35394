//! Error types shared by the race engine client.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`EngineError`] failures.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failures that can occur while talking to the race engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build race engine client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent or timed out.
    #[error("failed to send race engine request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The engine answered a poll with an unexpected status code.
    #[error("unexpected race engine response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// The snapshot payload could not be read or parsed.
    #[error("failed to decode race engine response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The engine refused a command.
    #[error("race engine rejected `{path}`: {message}")]
    Rejected {
        path: String,
        status: StatusCode,
        message: String,
    },
}

impl EngineError {
    /// Whether the engine answered and said no, as opposed to being unreachable.
    pub fn is_rejection(&self) -> bool {
        matches!(self, EngineError::Rejected { .. })
    }

    /// Short operator-facing text.
    pub fn summary(&self) -> String {
        match self {
            EngineError::Rejected { message, .. } => message.clone(),
            EngineError::RequestStatus { status, .. } => format!("race engine answered {status}"),
            EngineError::DecodeResponse { .. } => "race engine sent an unreadable answer".into(),
            EngineError::ClientBuilder { .. } | EngineError::RequestSend { .. } => {
                "race engine unreachable".into()
            }
        }
    }
}
