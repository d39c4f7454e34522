//! Audio Test File Generation Utilities
//!
//! Builds deterministic sine-wave fixtures with known characteristics:
//! 16-bit and 32-bit float WAV through hound, plus containers hound cannot
//! write, built by hand: 16-bit AIFF, G.711 mu-law WAV, and WAV headers that
//! overstate their length.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;
use std::path::Path;

/// Sine tone description
#[derive(Debug, Clone, Copy)]
pub struct Tone {
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: usize,
    pub frequency_hz: f32,
    /// 0.0-1.0 (0.5 recommended to avoid clipping)
    pub amplitude: f32,
}

impl Tone {
    /// `duration_ms` of a 440 Hz tone at half amplitude
    pub fn new(sample_rate: u32, channels: u16, duration_ms: u64) -> Self {
        Self {
            sample_rate,
            channels,
            frames: (sample_rate as u64 * duration_ms / 1000) as usize,
            frequency_hz: 440.0,
            amplitude: 0.5,
        }
    }

    pub fn with_frequency(mut self, frequency_hz: f32) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    /// Interleaved samples in [-1, 1], same value on every channel
    pub fn samples(&self) -> Vec<f32> {
        let mut samples = Vec::with_capacity(self.frames * self.channels as usize);
        for frame_idx in 0..self.frames {
            let t = frame_idx as f32 / self.sample_rate as f32;
            let value = (2.0 * PI * self.frequency_hz * t).sin() * self.amplitude;
            for _ in 0..self.channels {
                samples.push(value);
            }
        }
        samples
    }

    /// Samples quantized to 16-bit PCM
    pub fn samples_i16(&self) -> Vec<i16> {
        self.samples()
            .iter()
            .map(|s| (s * i16::MAX as f32) as i16)
            .collect()
    }

    pub fn total_samples(&self) -> usize {
        self.frames * self.channels as usize
    }
}

fn int_spec(tone: &Tone) -> WavSpec {
    WavSpec {
        channels: tone.channels,
        sample_rate: tone.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// 16-bit PCM WAV in memory
pub fn wav_bytes(tone: &Tone) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, int_spec(tone)).unwrap();
        for sample in tone.samples_i16() {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// 32-bit IEEE float WAV in memory
pub fn float_wav_bytes(tone: &Tone) -> Vec<u8> {
    let spec = WavSpec {
        channels: tone.channels,
        sample_rate: tone.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for sample in tone.samples() {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// 16-bit PCM WAV file
pub fn write_wav<P: AsRef<Path>>(path: P, tone: &Tone) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, int_spec(tone))?;
    for sample in tone.samples_i16() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// 16-bit big-endian AIFF in memory
pub fn aiff_bytes(tone: &Tone) -> Vec<u8> {
    let samples = tone.samples_i16();
    let data_len = samples.len() * 2;

    let mut comm = Vec::with_capacity(18);
    comm.extend_from_slice(&(tone.channels as i16).to_be_bytes());
    comm.extend_from_slice(&(tone.frames as u32).to_be_bytes());
    comm.extend_from_slice(&16i16.to_be_bytes());
    comm.extend_from_slice(&extended_from_rate(tone.sample_rate));

    let mut ssnd = Vec::with_capacity(8 + data_len);
    ssnd.extend_from_slice(&0u32.to_be_bytes()); // offset
    ssnd.extend_from_slice(&0u32.to_be_bytes()); // block size
    for sample in samples {
        ssnd.extend_from_slice(&sample.to_be_bytes());
    }

    let form_len = 4 + (8 + comm.len()) + (8 + ssnd.len());
    let mut out = Vec::with_capacity(8 + form_len);
    out.extend_from_slice(b"FORM");
    out.extend_from_slice(&(form_len as u32).to_be_bytes());
    out.extend_from_slice(b"AIFF");
    out.extend_from_slice(b"COMM");
    out.extend_from_slice(&(comm.len() as u32).to_be_bytes());
    out.extend_from_slice(&comm);
    out.extend_from_slice(b"SSND");
    out.extend_from_slice(&(ssnd.len() as u32).to_be_bytes());
    out.extend_from_slice(&ssnd);
    out
}

/// 80-bit IEEE extended representation of an integer sample rate
pub fn extended_from_rate(rate: u32) -> [u8; 10] {
    let exponent = 31 - rate.leading_zeros();
    let biased = (16383 + exponent) as u16;
    let mantissa = (rate as u64) << (63 - exponent);

    let mut out = [0u8; 10];
    out[..2].copy_from_slice(&biased.to_be_bytes());
    out[2..].copy_from_slice(&mantissa.to_be_bytes());
    out
}

/// 8-bit mu-law WAV (format tag 7) with a fact chunk
pub fn mulaw_wav_bytes(tone: &Tone) -> Vec<u8> {
    let data: Vec<u8> = tone.samples_i16().into_iter().map(mulaw_encode).collect();

    let mut fmt = Vec::with_capacity(18);
    fmt.extend_from_slice(&7u16.to_le_bytes());
    fmt.extend_from_slice(&tone.channels.to_le_bytes());
    fmt.extend_from_slice(&tone.sample_rate.to_le_bytes());
    fmt.extend_from_slice(&(tone.sample_rate * tone.channels as u32).to_le_bytes());
    fmt.extend_from_slice(&tone.channels.to_le_bytes()); // block align
    fmt.extend_from_slice(&8u16.to_le_bytes());
    fmt.extend_from_slice(&0u16.to_le_bytes()); // no extension

    let fact = (tone.frames as u32).to_le_bytes();
    riff_wave(
        None,
        &[(b"fmt ", fmt.as_slice()), (b"fact", &fact[..]), (b"data", data.as_slice())],
    )
}

/// 16-bit WAV whose RIFF size is `u32::MAX` and whose data chunk claims
/// 256 MiB, as pipe-writing encoders emit. Only the tone's samples follow.
pub fn unbounded_wav_bytes(tone: &Tone) -> Vec<u8> {
    let block_align = tone.channels * 2;

    let mut fmt = Vec::with_capacity(16);
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&tone.channels.to_le_bytes());
    fmt.extend_from_slice(&tone.sample_rate.to_le_bytes());
    fmt.extend_from_slice(&(tone.sample_rate * block_align as u32).to_le_bytes());
    fmt.extend_from_slice(&block_align.to_le_bytes());
    fmt.extend_from_slice(&16u16.to_le_bytes());

    let data: Vec<u8> = tone
        .samples_i16()
        .into_iter()
        .flat_map(|sample| sample.to_le_bytes())
        .collect();

    let mut out = riff_wave(Some(u32::MAX), &[(b"fmt ", fmt.as_slice())]);
    out.extend_from_slice(b"data");
    out.extend_from_slice(&UNBOUNDED_DATA_LEN.to_le_bytes());
    out.extend_from_slice(&data);
    out
}

/// Data chunk length claimed by [`unbounded_wav_bytes`]
pub const UNBOUNDED_DATA_LEN: u32 = 0x1000_0000;

/// RIFF/WAVE container around `chunks`; `riff_len` overrides the computed size
fn riff_wave(riff_len: Option<u32>, chunks: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
    let body_len: usize = chunks.iter().map(|(_, body)| 8 + body.len() + body.len() % 2).sum();

    let mut out = Vec::with_capacity(12 + body_len);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_len.unwrap_or(4 + body_len as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    for (tag, body) in chunks {
        out.extend_from_slice(*tag);
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(0);
        }
    }
    out
}

/// G.711 mu-law companding of one 16-bit sample
pub fn mulaw_encode(sample: i16) -> u8 {
    const BIAS: i32 = 0x84;
    const CLIP: i32 = 32635;

    let mut magnitude = sample as i32;
    let sign = if magnitude < 0 {
        magnitude = -magnitude;
        0x80
    } else {
        0
    };
    let magnitude = magnitude.min(CLIP) + BIAS;

    let exponent = (0..8).rev().find(|e| magnitude & (0x80 << e) != 0).unwrap_or(0);
    let mantissa = (magnitude >> (exponent + 3)) & 0x0F;
    !((sign | (exponent << 4) | mantissa) as u8)
}
