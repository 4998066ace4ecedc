use thiserror::Error;

/// Top-level error type for the Compass core.
///
/// Classification, scoring and composition never fail; this type only covers
/// configuration, serialization and session storage. Subsystem crates define
/// their own error types and implement `From<CompassError>` so that `?` works
/// across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompassError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for CompassError {
    fn from(err: toml::de::Error) -> Self {
        CompassError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CompassError {
    fn from(err: toml::ser::Error) -> Self {
        CompassError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CompassError {
    fn from(err: serde_json::Error) -> Self {
        CompassError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Compass operations.
pub type Result<T> = std::result::Result<T, CompassError>;
