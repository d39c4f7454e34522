//! Rate/channel normalization
//!
//! [`NormalizedStream`] owns a [`DecoderHandle`] and presents its output at
//! the canonical sample rate. Channel count passes through unchanged.

use crate::audio::decoder::{DecoderHandle, SampleEncoding};
use crate::audio::format::ContainerFormat;
use crate::audio::resampler::StreamingResampler;
use crate::error::{Error, Result};
use std::collections::VecDeque;
use tracing::debug;

/// Native frames decoded per resampler refill
const REFILL_FRAMES: usize = 4096;

/// Canonical-rate, frame-interleaved f32 view over one decoder.
pub struct NormalizedStream {
    decoder: DecoderHandle,
    output_rate: u32,
    resampler: Option<StreamingResampler>,
    pending: VecDeque<f32>,
    scratch: Vec<f32>,
    resampled: Vec<f32>,
    source_exhausted: bool,
}

impl std::fmt::Debug for NormalizedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizedStream")
            .field("decoder", &self.decoder)
            .field("output_rate", &self.output_rate)
            .field("resampled", &self.resampler.is_some())
            .finish()
    }
}

impl NormalizedStream {
    /// Wrap `decoder`, inserting a resampling stage when its native rate
    /// differs from `output_rate`.
    pub fn new(decoder: DecoderHandle, output_rate: u32) -> Result<Self> {
        let resampler = if decoder.sample_rate() != output_rate {
            Some(StreamingResampler::new(
                decoder.sample_rate(),
                output_rate,
                decoder.channels(),
            )?)
        } else {
            debug!("Sample rate already at {}Hz, skipping resample", output_rate);
            None
        };

        Ok(Self {
            decoder,
            output_rate,
            resampler,
            pending: VecDeque::new(),
            scratch: Vec::new(),
            resampled: Vec::new(),
            source_exhausted: false,
        })
    }

    /// Output sample rate (always the canonical rate)
    pub fn sample_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn native_sample_rate(&self) -> u32 {
        self.decoder.sample_rate()
    }

    pub fn channels(&self) -> u16 {
        self.decoder.channels()
    }

    pub fn encoding(&self) -> SampleEncoding {
        self.decoder.encoding()
    }

    pub fn format(&self) -> ContainerFormat {
        self.decoder.format()
    }

    pub fn is_resampled(&self) -> bool {
        self.resampler.is_some()
    }

    /// Expected total interleaved samples at the output rate.
    ///
    /// Exact for pass-through streams. For resampled streams this is the
    /// native frame count scaled by the rate ratio, an estimate only.
    pub fn total_samples(&self) -> Option<u64> {
        let frames = self.decoder.total_frames()?;
        let frames = match &self.resampler {
            Some(resampler) => (frames as f64 * resampler.ratio()).round() as u64,
            None => frames,
        };
        Some(frames * self.channels() as u64)
    }

    /// Read up to `out.len()` samples, rounded down to whole frames.
    ///
    /// Returns 0 only at end of stream.
    ///
    /// # Errors
    /// `BufferTooSmall` if `out` cannot hold one frame
    pub fn read(&mut self, out: &mut [f32]) -> Result<usize> {
        let channels = self.channels() as usize;
        let want = out.len() / channels * channels;
        if want == 0 {
            return Err(Error::BufferTooSmall {
                len: out.len(),
                channels,
            });
        }

        if self.resampler.is_none() {
            return self.decoder.read(&mut out[..want]);
        }

        while self.pending.len() < want && !self.source_exhausted {
            self.refill()?;
        }

        let count = want.min(self.pending.len());
        for (dst, src) in out.iter_mut().zip(self.pending.drain(..count)) {
            *dst = src;
        }
        Ok(count)
    }

    /// Restart from the first frame.
    ///
    /// The resampler is rebuilt so no filter state carries over.
    pub fn rewind(&mut self) -> Result<()> {
        self.decoder.rewind()?;
        if self.resampler.is_some() {
            self.resampler = Some(StreamingResampler::new(
                self.decoder.sample_rate(),
                self.output_rate,
                self.decoder.channels(),
            )?);
        }
        self.pending.clear();
        self.resampled.clear();
        self.source_exhausted = false;
        Ok(())
    }

    /// Decode one block of native audio through the resampler into `pending`.
    fn refill(&mut self) -> Result<()> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(());
        };

        self.scratch.resize(REFILL_FRAMES * self.decoder.channels() as usize, 0.0);
        let read = self.decoder.read(&mut self.scratch)?;

        self.resampled.clear();
        if read == 0 {
            resampler.flush(&mut self.resampled)?;
            self.source_exhausted = true;
        } else {
            resampler.process(&self.scratch[..read], &mut self.resampled)?;
        }
        self.pending.extend(self.resampled.drain(..));
        Ok(())
    }
}
