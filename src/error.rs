use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Whether this failure means the backing store ran out of room.
    pub fn is_quota_exceeded(&self) -> bool {
        match self {
            AppError::QuotaExceeded(_) => true,
            AppError::Io(e) => e.kind() == std::io::ErrorKind::StorageFull,
            AppError::Sqlite(e) => sqlite_is_full(e),
            AppError::Database(tokio_rusqlite::Error::Rusqlite(e)) => sqlite_is_full(e),
            _ => false,
        }
    }
}

fn sqlite_is_full(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::DiskFull
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_classification() {
        assert!(AppError::QuotaExceeded("5 MiB".into()).is_quota_exceeded());
        assert!(AppError::Io(std::io::Error::from(std::io::ErrorKind::StorageFull)).is_quota_exceeded());

        let full = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL),
            None,
        );
        assert!(AppError::Sqlite(full).is_quota_exceeded());

        assert!(!AppError::Storage("driver hiccup".into()).is_quota_exceeded());
        assert!(!AppError::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied)).is_quota_exceeded());
    }
}
