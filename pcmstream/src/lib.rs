//! # pcmstream
//!
//! Streaming audio decode engine.
//!
//! Turns WAV, MP3, AIFF and OGG sources into 44.1kHz interleaved f32
//! samples, either decoded up front or streamed chunk by chunk from a
//! background task into a shared growable buffer.
//!
//! **Architecture:** symphonia container readers + rubato resampling, with
//! producers scheduled on tokio.

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;

pub use audio::{AudioSource, ContainerFormat, SampleEncoding};
pub use config::{EngineConfig, FileConfig, CANONICAL_SAMPLE_RATE};
pub use error::{Error, Result};
pub use playback::{
    ChunkProgress, ContentBudget, DecodeEngine, DecodeMode, DecodeRequest, DecodeSession, ModePreference,
    SessionState,
};
