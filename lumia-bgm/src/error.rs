//! Error types for lumia-bgm
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Session-level failures that are reported rather than propagated live in
//! [`crate::session::SessionError`].

use lumia_common::TrackId;
use thiserror::Error;

/// Main error type for lumia-bgm
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Errors surfaced from lumia-common
    #[error(transparent)]
    Common(#[from] lumia_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    Audio(String),

    /// Track id not present in the catalog
    #[error("Unknown track: {0}")]
    UnknownTrack(TrackId),

    /// Console command could not be parsed
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

/// Convenience Result type using lumia-bgm Error
pub type Result<T> = std::result::Result<T, Error>;
