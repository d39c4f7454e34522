//! Audio decoding pipeline
//!
//! Source bytes → container dispatch → symphonia decoder → rate normalization.

pub mod decoder;
pub mod format;
pub mod normalizer;
pub mod replaygain;
pub mod resampler;
pub mod source;

pub use decoder::{DecoderHandle, SampleEncoding};
pub use format::{dispatch, ContainerFormat, DispatchedSource};
pub use normalizer::NormalizedStream;
pub use resampler::StreamingResampler;
pub use source::{AudioSource, ByteSource, SourceKind};
