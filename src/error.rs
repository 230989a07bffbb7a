//! Error types for the audio orchestrator.
//!
//! Protocol violations that the orchestrator tolerates (stray chunks, stray
//! stream controls) are not errors and never show up here; they are logged
//! and dropped at the call site.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    /// Only `file://` references can be played.
    #[error("unsupported URI scheme: {0}")]
    UnsupportedScheme(String),

    #[error("audio file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("malformed payload for {topic}: {source}")]
    Payload {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    /// Failure reported by the hardware abstraction layer.
    #[error("audio HAL error: {0}")]
    Hal(String),

    #[error("event bus closed")]
    BusClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AudioError>;
