//! Error types for vibe-playback
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//!
//! Only the pre-flight source checks in [`crate::playback::AudioPlayer::play`] are
//! surfaced synchronously; decode and device failures during playback are reported
//! through [`crate::events::PlaybackEvent`] because the work continues after the
//! call returns.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the playback engine
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audio source does not exist at the time play() is called
    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),

    /// Source addressing errors (malformed URI, unsupported scheme)
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Playback engine errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the vibe-playback Error
pub type Result<T> = std::result::Result<T, Error>;
