use thiserror::Error;

pub type Result<T> = std::result::Result<T, MeshError>;

/// Error kinds surfaced by the coordination core.
///
/// `Validation`, `Permission` and `InvalidState` are deterministic and must
/// not be retried. `Storage` is the only kind worth retrying; the core never
/// retries internally so callers can apply their own backoff budget.
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<std::io::Error> for MeshError {
    fn from(err: std::io::Error) -> Self {
        MeshError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for MeshError {
    fn from(err: serde_json::Error) -> Self {
        MeshError::Storage(err.to_string())
    }
}
