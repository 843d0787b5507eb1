//! Error types for Tootbox

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TootboxError>;

#[derive(Error, Debug)]
pub enum TootboxError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Observation error: {0}")]
    Observation(#[from] ObservationError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl TootboxError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            TootboxError::InvalidInput(_) => 3,
            TootboxError::Config(_) => 2,
            TootboxError::Database(_) => 1,
            TootboxError::Observation(_) => 1,
            TootboxError::Publish(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid duration for {field}: {message}")]
    InvalidDuration { field: String, message: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failure to observe the remote account's post history.
///
/// Observation failures are never fatal: the scheduler skips the
/// affected user for the cycle and re-observes next time.
#[derive(Error, Debug, Clone)]
pub enum ObservationError {
    #[error("Remote query failed: {0}")]
    Network(String),

    #[error("Remote returned status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed remote response: {0}")]
    MalformedResponse(String),

    /// The fetched status page contains no non-reply post. Treated
    /// as a failed observation, not as eligible, so a brand-new or
    /// all-reply account cannot trigger a posting burst.
    #[error("No original (non-reply) post found in recent history")]
    NoOriginalPost,
}

/// The remote service rejected or failed a publish attempt.
#[derive(Error, Debug, Clone)]
pub struct PublishError {
    pub status_code: Option<u16>,
    pub message: String,
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "Publishing failed (HTTP {}): {}", code, self.message),
            None => write!(f, "Publishing failed: {}", self.message),
        }
    }
}
