use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file does not exist yet ("no history").
    #[error("history store not found at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("no command with id {0}")]
    CommandNotFound(i64),

    #[error("history store at {} is still locked after {attempts} attempts", path.display())]
    Busy { path: PathBuf, attempts: u32 },

    #[error("history store at {}: {source}", path.display())]
    Sqlite {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Usage(String),
}

impl StoreError {
    pub fn usage(message: impl Into<String>) -> Self {
        StoreError::Usage(message.into())
    }

    /// Fatal storage failures, as opposed to absence, usage and not-found.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            StoreError::Busy { .. } | StoreError::Sqlite { .. } | StoreError::Io { .. }
        )
    }
}
