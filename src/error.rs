//! Error types shared across the grid components.

use thiserror::Error;

/// Errors raised by the media model, configuration and update handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    /// A collection must hold at least one member.
    #[error("cannot build a collection from zero members")]
    EmptyCollection,

    #[error("invalid grid configuration: {0}")]
    InvalidConfig(String),

    /// A content or service update that cannot be applied.
    #[error("malformed {kind} update: {reason}")]
    MalformedUpdate { kind: &'static str, reason: String },
}

/// Errors produced while loading a thumbnail bitmap.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThumbnailError {
    /// The media carries no location the source can read from.
    #[error("media has no readable source")]
    NoSource,

    #[error("failed to decode thumbnail: {0}")]
    Decode(String),

    #[error("thumbnail i/o error: {0}")]
    Io(String),

    /// The request was cancelled before a worker picked it up.
    #[error("thumbnail request cancelled")]
    Cancelled,
}

impl From<anyhow::Error> for ThumbnailError {
    fn from(err: anyhow::Error) -> Self {
        // `{:#}` keeps the context chain on one line.
        ThumbnailError::Decode(format!("{:#}", err))
    }
}
