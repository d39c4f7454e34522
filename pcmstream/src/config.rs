//! Decode engine configuration
//!
//! All fields carry built-in defaults so an empty `[engine]` table (or no
//! config file at all) yields a working engine.

use crate::error::{Error, Result};
use pcmstream_common::LoggingConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Canonical output sample rate for all decoded audio
pub const CANONICAL_SAMPLE_RATE: u32 = 44100;

/// Samples decoded per background chunk
pub const DEFAULT_CHUNK_SIZE_SAMPLES: usize = 22050;

/// Engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// If false, every source is decoded eagerly regardless of source kind.
    #[serde(default = "default_enable_background_streaming")]
    pub enable_background_streaming: bool,

    /// Output sample rate all sources are normalized to.
    #[serde(default = "default_canonical_sample_rate")]
    pub canonical_sample_rate: u32,

    /// Upper bound on samples (not frames) decoded per background iteration.
    #[serde(default = "default_chunk_size_samples")]
    pub chunk_size_samples: usize,

    /// Pause between background chunks, in milliseconds.
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,

    /// Shared buffer capacity claimed for streams whose total length is unknown.
    #[serde(default = "default_initial_buffer_samples")]
    pub initial_buffer_samples: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_background_streaming: default_enable_background_streaming(),
            canonical_sample_rate: default_canonical_sample_rate(),
            chunk_size_samples: default_chunk_size_samples(),
            chunk_delay_ms: default_chunk_delay_ms(),
            initial_buffer_samples: default_initial_buffer_samples(),
        }
    }
}

impl EngineConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.canonical_sample_rate == 0 {
            return Err(Error::Config("canonical_sample_rate must be > 0".to_string()));
        }
        if self.chunk_size_samples == 0 {
            return Err(Error::Config("chunk_size_samples must be > 0".to_string()));
        }
        if self.initial_buffer_samples == 0 {
            return Err(Error::Config("initial_buffer_samples must be > 0".to_string()));
        }
        Ok(())
    }

    /// Delay between background chunks
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

fn default_enable_background_streaming() -> bool {
    true
}

fn default_canonical_sample_rate() -> u32 {
    CANONICAL_SAMPLE_RATE
}

fn default_chunk_size_samples() -> usize {
    DEFAULT_CHUNK_SIZE_SAMPLES
}

fn default_chunk_delay_ms() -> u64 {
    10
}

fn default_initial_buffer_samples() -> usize {
    88200 // 1 second of stereo at 44.1kHz
}

/// Config file layout: `[engine]` and `[logging]` tables, both optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FileConfig {
    /// Load from a TOML file and validate the engine section.
    pub fn load(path: &Path) -> Result<Self> {
        let config: FileConfig = pcmstream_common::load_toml_file(path)?;
        config.engine.validate()?;
        Ok(config)
    }
}
