use thiserror::Error;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Migration to version {} failed: {source}", .version + 1)]
    Migration {
        /// Version the store stayed at.
        version: i64,
        #[source]
        source: rusqlite::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database connection poisoned by a panicked thread")]
    LockPoisoned,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, TagError>;
