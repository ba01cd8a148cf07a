use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArtioError>;

/// Error taxonomy for artifact operations.
///
/// `Inconsistency` is the one variant callers must never retry blindly:
/// it means the metadata record and the blob disagree and the state needs
/// external reconciliation.
#[derive(Error, Debug)]
pub enum ArtioError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("name conflict: {0}")]
    Conflict(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("metadata store unavailable: {0}")]
    Unavailable(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("store divergence: {0}")]
    Inconsistency(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}
