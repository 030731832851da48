use thiserror::Error;

/// Errors from repository operations (used by trait definitions in chanops-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors related to channel export, import, backup and restore.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("filesystem error: {0}")]
    Io(String),

    #[error("invalid backup file: {0}")]
    InvalidBackup(String),

    #[error("failed to render {0}")]
    Render(String),
}

/// Errors related to database cleanup.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("filesystem error: {0}")]
    Io(String),

    #[error("table '{0}' does not exist")]
    UnknownTable(String),
}

/// Errors resolving configuration and connection settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("unrecognized DSN: {0}")]
    InvalidDsn(String),
}
