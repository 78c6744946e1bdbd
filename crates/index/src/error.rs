//! Index store error types.

use thiserror::Error;

/// Index store operation errors.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("connection failed after {attempts} attempts: {source}")]
    ConnectExhausted {
        attempts: u32,
        #[source]
        source: Box<IndexError>,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for IndexError {
    fn from(e: std::io::Error) -> Self {
        IndexError::Config(e.to_string())
    }
}

/// Result type for index operations.
pub type IndexResult<T> = std::result::Result<T, IndexError>;
