//! Error types for the lexicon repository.

use thiserror::Error;

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, LexiconError>;

/// Errors that can occur in the lexicon repository.
#[derive(Error, Debug)]
pub enum LexiconError {
    /// A required parameter was empty or otherwise unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An entry or id is not resident in the store, or is missing from a
    /// view that claims to cover every entry.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store holds data that breaks a uniqueness guarantee.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create storage directory.
    #[error("failed to create directory: {0}")]
    CreateDirectory(String),

    /// Failed to read the entry file.
    #[error("failed to read file: {0}")]
    ReadFile(String),

    /// Failed to write the entry file.
    #[error("failed to write file: {0}")]
    WriteFile(String),
}
