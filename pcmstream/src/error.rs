//! Error types for pcmstream
//!
//! Defines the decode engine's error taxonomy using thiserror.

use thiserror::Error;

/// Main error type for the decode engine
#[derive(Error, Debug)]
pub enum Error {
    /// Source path could not be opened or read
    #[error("Audio source not found: {0}")]
    SourceNotFound(String),

    /// Container format is unknown or not one of the supported four
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Header or mid-stream bitstream decode failure
    #[error("Corrupt audio stream: {0}")]
    CorruptStream(String),

    /// Operation requires a live resource that has already been released
    #[error("Disposed resource used: {0}")]
    DisposedResourceUsed(String),

    /// ReplayGain tag present but unparseable.
    ///
    /// Never returned from public entry points; the analyzer defaults to 0 dB.
    #[error("Invalid ReplayGain metadata: {0}")]
    InvalidReplayGainMetadata(String),

    /// Sample rate conversion failed
    #[error("Resampling error: {0}")]
    Resample(String),

    /// Read buffer cannot hold one whole frame
    #[error("Read buffer of {len} samples is smaller than one {channels}-channel frame")]
    BufferTooSmall { len: usize, channels: usize },

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if the sound is unavailable because of its container or content,
    /// as opposed to the source being missing.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Error::UnsupportedFormat(_) | Error::CorruptStream(_))
    }
}

impl From<pcmstream_common::Error> for Error {
    fn from(err: pcmstream_common::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Convenience Result type using the engine Error
pub type Result<T> = std::result::Result<T, Error>;
