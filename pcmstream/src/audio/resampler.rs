//! Streaming sample rate conversion using rubato
//!
//! Converts decoder output to the canonical rate one block at a time, so a
//! stream never has to be held in memory to be resampled.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Frames fed to rubato per processing call
pub const RESAMPLER_CHUNK_FRAMES: usize = 1024;

/// Zero-fed calls allowed while draining the filter tail at end of stream
const MAX_FLUSH_ROUNDS: usize = 4;

/// Stateful resampler for interleaved f32 audio.
///
/// Input is accumulated per channel and processed in fixed chunks. The
/// filter's output delay is trimmed from the start, and [`flush`] caps the
/// total output at `round(input_frames * ratio)` frames.
///
/// [`flush`]: StreamingResampler::flush
pub struct StreamingResampler {
    inner: FastFixedIn<f32>,
    channels: usize,
    ratio: f64,
    input: Vec<Vec<f32>>,
    frames_in: u64,
    frames_out: u64,
    delay_remaining: usize,
    flushed: bool,
}

impl StreamingResampler {
    /// Create a resampler from `input_rate` to `output_rate`.
    pub fn new(input_rate: u32, output_rate: u32, channels: u16) -> Result<Self> {
        if input_rate == 0 || channels == 0 {
            return Err(Error::Resample(format!(
                "invalid stream: {}Hz, {} channels",
                input_rate, channels
            )));
        }

        let ratio = output_rate as f64 / input_rate as f64;
        let inner = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio
            PolynomialDegree::Septic,
            RESAMPLER_CHUNK_FRAMES,
            channels as usize,
        )
        .map_err(|e| Error::Resample(format!("Failed to create resampler: {}", e)))?;

        let delay_remaining = inner.output_delay();
        debug!(
            "Resampling {}Hz -> {}Hz ({} channels, delay {} frames)",
            input_rate, output_rate, channels, delay_remaining
        );

        Ok(Self {
            inner,
            channels: channels as usize,
            ratio,
            input: vec![Vec::with_capacity(RESAMPLER_CHUNK_FRAMES * 2); channels as usize],
            frames_in: 0,
            frames_out: 0,
            delay_remaining,
            flushed: false,
        })
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Feed interleaved samples; any completed output is appended to `out`.
    ///
    /// Trailing samples that do not form a whole frame are ignored.
    pub fn process(&mut self, interleaved: &[f32], out: &mut Vec<f32>) -> Result<()> {
        if self.flushed {
            return Err(Error::Resample("process after flush".to_string()));
        }

        let frames = interleaved.len() / self.channels;
        for frame in interleaved.chunks_exact(self.channels) {
            for (channel, sample) in self.input.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }
        self.frames_in += frames as u64;

        loop {
            let needed = self.inner.input_frames_next();
            if self.input[0].len() < needed {
                break;
            }

            let chunk: Vec<Vec<f32>> = self
                .input
                .iter_mut()
                .map(|channel| channel.drain(..needed).collect())
                .collect();

            let planar = self
                .inner
                .process(&chunk, None)
                .map_err(|e| Error::Resample(format!("Resampling failed: {}", e)))?;
            self.emit(planar, None, out);
        }

        Ok(())
    }

    /// Drain buffered input and the filter tail. Idempotent.
    pub fn flush(&mut self, out: &mut Vec<f32>) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;

        let target = (self.frames_in as f64 * self.ratio).round() as u64;

        if !self.input[0].is_empty() {
            let planar = self
                .inner
                .process_partial(Some(self.input.as_slice()), None)
                .map_err(|e| Error::Resample(format!("Resampling failed: {}", e)))?;
            self.input.iter_mut().for_each(Vec::clear);
            self.emit(planar, Some(target), out);
        }

        let mut rounds = 0;
        while self.frames_out < target && rounds < MAX_FLUSH_ROUNDS {
            let planar = self
                .inner
                .process_partial(None::<&[Vec<f32>]>, None)
                .map_err(|e| Error::Resample(format!("Resampling failed: {}", e)))?;
            self.emit(planar, Some(target), out);
            rounds += 1;
        }

        debug!("Resampler flushed: {} frames in, {} frames out", self.frames_in, self.frames_out);
        Ok(())
    }

    /// Interleave `planar` into `out`, skipping the remaining filter delay
    /// and stopping at `cap` total output frames.
    fn emit(&mut self, planar: Vec<Vec<f32>>, cap: Option<u64>, out: &mut Vec<f32>) {
        let available = planar.first().map_or(0, Vec::len);
        let skip = self.delay_remaining.min(available);
        self.delay_remaining -= skip;

        let mut end = available;
        if let Some(cap) = cap {
            let room = cap.saturating_sub(self.frames_out) as usize;
            end = end.min(skip + room);
        }

        out.reserve((end - skip) * self.channels);
        for frame in skip..end {
            for channel in &planar {
                out.push(channel[frame]);
            }
        }
        self.frames_out += (end - skip) as u64;
    }
}
