//! Per-format decoder handle using symphonia
//!
//! Wraps one container reader plus its codec decoder and exposes native
//! stream properties and a single mutation point, [`DecoderHandle::read`],
//! which yields interleaved f32 samples at the native rate and channel count.

use crate::audio::format::ContainerFormat;
use crate::error::{Error, Result};
use serde::Serialize;
use std::sync::OnceLock;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{self, CodecRegistry, CodecType, Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatReader, SeekMode, SeekTo};
use tracing::{debug, warn};

/// Codec registry limited to the codecs the four containers can carry
fn codec_registry() -> &'static CodecRegistry {
    static CODEC_REGISTRY: OnceLock<CodecRegistry> = OnceLock::new();
    CODEC_REGISTRY.get_or_init(|| {
        let mut registry = CodecRegistry::new();
        registry.register_all::<symphonia::default::codecs::PcmDecoder>();
        registry.register_all::<symphonia::default::codecs::AdpcmDecoder>();
        registry.register_all::<symphonia::default::codecs::MpaDecoder>();
        registry.register_all::<symphonia::default::codecs::VorbisDecoder>();
        registry
    })
}

/// How samples are stored in the source bitstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SampleEncoding {
    /// Integer PCM of the given bit depth
    Int { bits: u32 },
    /// IEEE float of the given bit depth
    Float { bits: u32 },
    /// Perceptual codec (MP3, Vorbis); no meaningful bit depth
    Compressed,
}

impl SampleEncoding {
    pub fn bits_per_sample(&self) -> Option<u32> {
        match self {
            SampleEncoding::Int { bits } | SampleEncoding::Float { bits } => Some(*bits),
            SampleEncoding::Compressed => None,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, SampleEncoding::Float { .. })
    }
}

/// Opaque per-format decoder state.
pub struct DecoderHandle {
    format: ContainerFormat,
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
    encoding: SampleEncoding,
    total_frames: Option<u64>,

    /// WAV track whose codec is neither integer PCM nor float
    pcm_conversion: bool,

    sample_buf: Option<SampleBuffer<f32>>,
    pending: Vec<f32>,
    pending_pos: usize,
    finished: bool,
}

impl std::fmt::Debug for DecoderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderHandle")
            .field("format", &self.format)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("encoding", &self.encoding)
            .field("total_frames", &self.total_frames)
            .field("pcm_conversion", &self.pcm_conversion)
            .finish()
    }
}

impl DecoderHandle {
    /// Build a decoder for the first audio track of an opened container.
    ///
    /// # Errors
    /// - `CorruptStream` if the track lacks a sample rate or channel layout
    /// - `UnsupportedFormat` if symphonia has no codec for the track
    pub(crate) fn from_reader(format: ContainerFormat, reader: Box<dyn FormatReader>) -> Result<Self> {
        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::CorruptStream(format!("No audio track in {} stream", format)))?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| Error::CorruptStream("Sample rate not found".to_string()))?;

        let channels = params
            .channels
            .map(|c| c.count() as u16)
            .filter(|&c| c > 0)
            .ok_or_else(|| Error::CorruptStream("Channel count not found".to_string()))?;

        let mut encoding = classify_codec(params.codec, params.bits_per_sample);
        let pcm_conversion = format == ContainerFormat::Wav && encoding == SampleEncoding::Compressed;
        if pcm_conversion {
            debug!("WAV codec {:?} is not PCM/float, inserting 16-bit PCM conversion", params.codec);
            encoding = SampleEncoding::Int { bits: 16 };
        }

        let decoder = codec_registry()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| match e {
                SymphoniaError::Unsupported(what) => {
                    Error::UnsupportedFormat(format!("{} codec: {}", format, what))
                }
                other => Error::CorruptStream(format!("Failed to create decoder: {}", other)),
            })?;

        debug!(
            "Opened {} decoder: {}Hz, {} channels, {:?}, {:?} frames",
            format, sample_rate, channels, encoding, params.n_frames
        );

        Ok(Self {
            format,
            reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            encoding,
            total_frames: params.n_frames,
            pcm_conversion,
            sample_buf: None,
            pending: Vec::new(),
            pending_pos: 0,
            finished: false,
        })
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn encoding(&self) -> SampleEncoding {
        self.encoding
    }

    /// True when a WAV PCM conversion stage sits in front of the float output
    pub fn has_pcm_conversion(&self) -> bool {
        self.pcm_conversion
    }

    /// Total frames reported by the container, if known
    pub fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    /// Total interleaved samples reported by the container, if known
    pub fn total_samples(&self) -> Option<u64> {
        self.total_frames.map(|frames| frames * self.channels as u64)
    }

    /// Read up to `out.len()` interleaved samples.
    ///
    /// Returns 0 only at end of stream. Recoverable packet decode errors are
    /// skipped; container-level failures surface as `CorruptStream`.
    pub fn read(&mut self, out: &mut [f32]) -> Result<usize> {
        let mut written = 0;

        while written < out.len() {
            if self.pending_pos < self.pending.len() {
                let available = &self.pending[self.pending_pos..];
                let count = available.len().min(out.len() - written);
                out[written..written + count].copy_from_slice(&available[..count]);
                self.pending_pos += count;
                written += count;
                continue;
            }

            if self.finished || !self.decode_next_packet()? {
                self.finished = true;
                break;
            }
        }

        Ok(written)
    }

    /// Seek back to the first frame and reset codec state.
    ///
    /// # Errors
    /// `CorruptStream` if the container cannot seek to the start
    pub fn rewind(&mut self) -> Result<()> {
        self.reader
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: 0,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| Error::CorruptStream(format!("Failed to seek {} stream to start: {}", self.format, e)))?;
        self.decoder.reset();

        self.pending.clear();
        self.pending_pos = 0;
        self.finished = false;
        debug!("Rewound {} decoder", self.format);
        Ok(())
    }

    /// Decode the next packet of our track into `pending`.
    ///
    /// Returns `Ok(false)` at end of stream.
    fn decode_next_packet(&mut self) -> Result<bool> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("Reached end of {} stream", self.format);
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    warn!("{} stream requested decoder reset, treating as end of stream", self.format);
                    return Ok(false);
                }
                Err(e) => {
                    return Err(Error::CorruptStream(format!("Error reading packet: {}", e)));
                }
            };

            // Skip packets for other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping undecodable {} packet: {}", self.format, e);
                    continue;
                }
                Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(e) => {
                    return Err(Error::CorruptStream(format!("Decode error: {}", e)));
                }
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let needed = decoded.capacity() * spec.channels.count();
            if self.sample_buf.as_ref().is_some_and(|buf| buf.capacity() < needed) {
                self.sample_buf = None;
            }
            let frames = decoded.capacity() as u64;
            let sample_buf = self
                .sample_buf
                .get_or_insert_with(|| SampleBuffer::new(frames, spec));
            sample_buf.copy_interleaved_ref(decoded);

            self.pending.clear();
            self.pending.extend_from_slice(sample_buf.samples());
            self.pending_pos = 0;

            if self.pcm_conversion {
                quantize_to_pcm16(&mut self.pending);
            }

            return Ok(true);
        }
    }
}

/// Map a codec to its sample encoding. Non-PCM codecs report `Compressed`.
fn classify_codec(codec: CodecType, bits_per_sample: Option<u32>) -> SampleEncoding {
    let int = |default_bits: u32| SampleEncoding::Int {
        bits: bits_per_sample.unwrap_or(default_bits),
    };

    match codec {
        codecs::CODEC_TYPE_PCM_S8 | codecs::CODEC_TYPE_PCM_U8 => int(8),
        codecs::CODEC_TYPE_PCM_S16LE
        | codecs::CODEC_TYPE_PCM_S16BE
        | codecs::CODEC_TYPE_PCM_U16LE
        | codecs::CODEC_TYPE_PCM_U16BE => int(16),
        codecs::CODEC_TYPE_PCM_S24LE
        | codecs::CODEC_TYPE_PCM_S24BE
        | codecs::CODEC_TYPE_PCM_U24LE
        | codecs::CODEC_TYPE_PCM_U24BE => int(24),
        codecs::CODEC_TYPE_PCM_S32LE
        | codecs::CODEC_TYPE_PCM_S32BE
        | codecs::CODEC_TYPE_PCM_U32LE
        | codecs::CODEC_TYPE_PCM_U32BE => int(32),
        codecs::CODEC_TYPE_PCM_F32LE | codecs::CODEC_TYPE_PCM_F32BE => SampleEncoding::Float { bits: 32 },
        codecs::CODEC_TYPE_PCM_F64LE | codecs::CODEC_TYPE_PCM_F64BE => SampleEncoding::Float { bits: 64 },
        _ => SampleEncoding::Compressed,
    }
}

/// Round samples to the 16-bit PCM grid.
///
/// ADPCM and companded WAV codecs expand to 16-bit PCM, so this is lossless
/// for them and pins the output to exactly what a PCM stream would carry.
fn quantize_to_pcm16(samples: &mut [f32]) {
    const SCALE: f32 = 32768.0;
    for sample in samples.iter_mut() {
        *sample = (*sample * SCALE).round().clamp(-SCALE, SCALE - 1.0) / SCALE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_integer_pcm() {
        assert_eq!(
            classify_codec(codecs::CODEC_TYPE_PCM_S16LE, Some(16)),
            SampleEncoding::Int { bits: 16 }
        );
        assert_eq!(
            classify_codec(codecs::CODEC_TYPE_PCM_S24LE, None),
            SampleEncoding::Int { bits: 24 }
        );
        assert_eq!(
            classify_codec(codecs::CODEC_TYPE_PCM_U8, Some(8)),
            SampleEncoding::Int { bits: 8 }
        );
    }

    #[test]
    fn test_classify_float_pcm() {
        let encoding = classify_codec(codecs::CODEC_TYPE_PCM_F32LE, Some(32));
        assert_eq!(encoding, SampleEncoding::Float { bits: 32 });
        assert!(encoding.is_float());
        assert_eq!(encoding.bits_per_sample(), Some(32));
    }

    #[test]
    fn test_classify_compressed() {
        assert_eq!(classify_codec(codecs::CODEC_TYPE_MP3, None), SampleEncoding::Compressed);
        assert_eq!(classify_codec(codecs::CODEC_TYPE_VORBIS, None), SampleEncoding::Compressed);
        assert_eq!(classify_codec(codecs::CODEC_TYPE_ADPCM_IMA_WAV, Some(4)), SampleEncoding::Compressed);
        assert_eq!(classify_codec(codecs::CODEC_TYPE_PCM_MULAW, Some(8)), SampleEncoding::Compressed);
        assert_eq!(SampleEncoding::Compressed.bits_per_sample(), None);
    }

    #[test]
    fn test_quantize_to_pcm16() {
        let mut samples = vec![0.0, 0.5, -1.0, 1.0, 0.25 + 1.0 / 131072.0];
        quantize_to_pcm16(&mut samples);

        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[1], 0.5);
        assert_eq!(samples[2], -1.0);
        assert_eq!(samples[3], 32767.0 / 32768.0);
        assert_eq!(samples[4], 0.25);
    }
}
