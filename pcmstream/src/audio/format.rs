//! Container format detection and dispatch
//!
//! Maps an extension hint (or, without one, the leading magic bytes) to
//! exactly one of the four supported containers, and builds that
//! container's symphonia reader directly. Probing across readers is never
//! used, so one container is never decoded as another.

use crate::audio::decoder::DecoderHandle;
use crate::audio::replaygain;
use crate::audio::source::{peek_prefix, AudioSource};
use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::default::formats::{AiffReader, MpaReader, OggReader, WavReader};
use tracing::debug;

/// Bytes inspected when sniffing a source without a format hint
const SNIFF_LEN: usize = 12;

/// Supported container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Wav,
    Mp3,
    Aiff,
    Ogg,
}

impl ContainerFormat {
    /// Match a file extension or explicit hint.
    ///
    /// Case-insensitive; a single leading dot is ignored.
    pub fn from_extension(ext: &str) -> Result<Self> {
        let ext = ext.strip_prefix('.').unwrap_or(ext);
        match ext.to_ascii_lowercase().as_str() {
            "wav" => Ok(ContainerFormat::Wav),
            "mp3" => Ok(ContainerFormat::Mp3),
            "aiff" | "aif" => Ok(ContainerFormat::Aiff),
            "ogg" => Ok(ContainerFormat::Ogg),
            other => Err(Error::UnsupportedFormat(format!("'{}'", other))),
        }
    }

    /// Identify a container from its leading bytes.
    pub fn sniff(prefix: &[u8]) -> Option<Self> {
        if prefix.len() >= 12 && &prefix[0..4] == b"RIFF" && &prefix[8..12] == b"WAVE" {
            return Some(ContainerFormat::Wav);
        }
        if prefix.len() >= 12
            && &prefix[0..4] == b"FORM"
            && (&prefix[8..12] == b"AIFF" || &prefix[8..12] == b"AIFC")
        {
            return Some(ContainerFormat::Aiff);
        }
        if prefix.starts_with(b"OggS") {
            return Some(ContainerFormat::Ogg);
        }
        if prefix.starts_with(b"ID3") {
            return Some(ContainerFormat::Mp3);
        }
        // MPEG audio frame sync: 11 set bits
        if prefix.len() >= 2 && prefix[0] == 0xFF && prefix[1] & 0xE0 == 0xE0 {
            return Some(ContainerFormat::Mp3);
        }
        None
    }

    pub fn name(&self) -> &'static str {
        match self {
            ContainerFormat::Wav => "wav",
            ContainerFormat::Mp3 => "mp3",
            ContainerFormat::Aiff => "aiff",
            ContainerFormat::Ogg => "ogg",
        }
    }

    /// Symphonia reader for this container
    fn open_reader(self, mss: MediaSourceStream) -> Result<Box<dyn FormatReader>> {
        let options = FormatOptions::default();
        let header_error =
            |e: symphonia::core::errors::Error| Error::CorruptStream(format!("{} header: {}", self, e));

        Ok(match self {
            ContainerFormat::Wav => Box::new(WavReader::try_new(mss, &options).map_err(header_error)?),
            ContainerFormat::Mp3 => Box::new(MpaReader::try_new(mss, &options).map_err(header_error)?),
            ContainerFormat::Aiff => Box::new(AiffReader::try_new(mss, &options).map_err(header_error)?),
            ContainerFormat::Ogg => Box::new(OggReader::try_new(mss, &options).map_err(header_error)?),
        })
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoder plus the metadata gathered while dispatching
#[derive(Debug)]
pub struct DispatchedSource {
    pub decoder: DecoderHandle,
    pub replaygain: f32,
}

/// Resolve the container for `source` and open its decoder.
///
/// An explicit `hint` wins over the source's own extension. Only when
/// neither exists are the leading bytes sniffed. An unsupported hint fails
/// before the byte source is opened.
pub fn dispatch(source: &AudioSource, hint: Option<&str>) -> Result<DispatchedSource> {
    let hinted = match hint.or_else(|| source.extension()) {
        Some(ext) => Some(ContainerFormat::from_extension(ext)?),
        None => None,
    };

    let mut stream = source.open()?;

    let format = match hinted {
        Some(format) => format,
        None => {
            let mut prefix = [0u8; SNIFF_LEN];
            let read = peek_prefix(&mut stream, &mut prefix)?;
            ContainerFormat::sniff(&prefix[..read]).ok_or_else(|| {
                Error::UnsupportedFormat(format!("unrecognised content in {}", source.display_name()))
            })?
        }
    };

    let replaygain = if format == ContainerFormat::Ogg {
        replaygain::analyze(&mut stream)
    } else {
        1.0
    };

    debug!("Dispatching {} as {}", source.display_name(), format);

    let mss = MediaSourceStream::new(Box::new(stream), Default::default());
    let reader = format.open_reader(mss)?;
    let decoder = DecoderHandle::from_reader(format, reader)?;

    Ok(DispatchedSource { decoder, replaygain })
}
