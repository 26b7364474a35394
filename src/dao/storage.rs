use std::path::PathBuf;

use thiserror::Error;

/// Result alias for preference storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by preference stores regardless of the backing medium.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access preference file `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("preference file `{path}` is not valid JSON")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode preferences")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
}
