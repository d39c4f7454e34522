//! Decode session: per-sound lifecycle state machine
//!
//! A session carries one source through normalization into samples, either
//! eagerly (decode everything before returning) or by streaming chunks into
//! the shared buffer from a background producer.
//!
//! States: `Created → {Preloading | StreamingActive} → Completed`, with
//! `Superseded` for a streaming session that lost the shared buffer to a
//! newer one, and a terminal `Disposed` reachable from anywhere.
//!
//! Lock order: producer decoder → shared buffer guard → session progress.

use crate::audio::decoder::SampleEncoding;
use crate::audio::format::ContainerFormat;
use crate::audio::normalizer::NormalizedStream;
use crate::error::{Error, Result};
use crate::playback::budget::{kilobytes_for_samples, ContentBudget};
use crate::playback::shared_buffer::SharedDecodeBuffer;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How a session produces its samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    Eager,
    Streaming,
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Preloading,
    StreamingActive,
    Completed,
    /// A newer streaming session claimed the shared buffer
    Superseded,
    Disposed,
}

impl SessionState {
    /// True once no further samples will be produced
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Superseded | SessionState::Disposed
        )
    }
}

/// Outcome of one background decode step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkProgress {
    /// Samples appended to the shared buffer
    Advanced(usize),
    /// End of stream reached; the total is now exact
    Finished,
    /// Generation mismatch; the producer must stop without writing
    Superseded,
    /// Nothing to do (eager, finished, or disposed session)
    NoProgress,
}

/// Stream properties fixed when the session is opened
#[derive(Debug, Clone, Serialize)]
pub struct StreamInfo {
    pub name: String,
    pub format: ContainerFormat,
    /// Output (canonical) sample rate
    pub sample_rate: u32,
    pub native_sample_rate: u32,
    pub channels: u16,
    pub encoding: SampleEncoding,
    pub replaygain: f32,
}

impl StreamInfo {
    pub(crate) fn from_stream(name: String, stream: &NormalizedStream, replaygain: f32) -> Self {
        Self {
            name,
            format: stream.format(),
            sample_rate: stream.sample_rate(),
            native_sample_rate: stream.native_sample_rate(),
            channels: stream.channels(),
            encoding: stream.encoding(),
            replaygain,
        }
    }
}

#[derive(Debug)]
struct Progress {
    state: SessionState,
    decoded: u64,
    total: Option<u64>,
    closed: bool,
}

/// Decoder plus the scratch block it decodes into
struct Producer {
    stream: NormalizedStream,
    scratch: Vec<f32>,
}

struct StreamingStorage {
    generation: u64,
    buffer: Arc<SharedDecodeBuffer>,
    producer: Mutex<Option<Producer>>,
}

enum Storage {
    Eager(Mutex<Option<Arc<[f32]>>>),
    Streaming(StreamingStorage),
}

pub(crate) struct SessionInner {
    info: StreamInfo,
    mode: DecodeMode,
    storage: Storage,
    progress: Mutex<Progress>,
    task: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one decoded or decoding sound. Clones share the session.
#[derive(Clone)]
pub struct DecodeSession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for DecodeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let progress = lock(&self.inner.progress);
        f.debug_struct("DecodeSession")
            .field("name", &self.inner.info.name)
            .field("mode", &self.inner.mode)
            .field("state", &progress.state)
            .field("decoded", &progress.decoded)
            .field("total", &progress.total)
            .finish()
    }
}

impl DecodeSession {
    /// Decode `stream` to the end before returning.
    ///
    /// Mid-stream decode errors truncate the sound. The decoder is released
    /// and the budget charged once the buffer is complete. At most
    /// `max_preallocation` samples are reserved from the container's
    /// claimed length.
    pub(crate) fn preload(
        info: StreamInfo,
        mut stream: NormalizedStream,
        budget: &ContentBudget,
        block_samples: usize,
        max_preallocation: usize,
    ) -> Self {
        debug!("Session '{}' created (eager)", info.name);
        debug!("Session '{}': Created -> Preloading", info.name);

        let expected = stream
            .total_samples()
            .map(|total| usize::try_from(total).unwrap_or(usize::MAX))
            .unwrap_or(0);
        let mut samples = Vec::with_capacity(expected.min(max_preallocation));
        let mut block = vec![0.0f32; block_samples.max(stream.channels() as usize)];

        loop {
            match stream.read(&mut block) {
                Ok(0) => break,
                Ok(n) => samples.extend_from_slice(&block[..n]),
                Err(e) => {
                    warn!("Decode error in '{}', truncating at {} samples: {}", info.name, samples.len(), e);
                    break;
                }
            }
        }
        drop(stream);

        let total = samples.len() as u64;
        budget.add(kilobytes_for_samples(total), None);

        info!(
            "Preloaded '{}': {} samples, {}Hz, {} channels",
            info.name, total, info.sample_rate, info.channels
        );

        Self {
            inner: Arc::new(SessionInner {
                info,
                mode: DecodeMode::Eager,
                storage: Storage::Eager(Mutex::new(Some(samples.into()))),
                progress: Mutex::new(Progress {
                    state: SessionState::Completed,
                    decoded: total,
                    total: Some(total),
                    closed: false,
                }),
                task: Mutex::new(None),
            }),
        }
    }

    /// Streaming session owning `generation` of `buffer`.
    ///
    /// The caller has already claimed the buffer for `generation`.
    pub(crate) fn streaming(
        info: StreamInfo,
        stream: NormalizedStream,
        generation: u64,
        buffer: Arc<SharedDecodeBuffer>,
        chunk_samples: usize,
    ) -> Self {
        debug!("Session '{}' created (streaming, generation {})", info.name, generation);

        let total = stream.total_samples();
        let channels = stream.channels() as usize;
        let scratch = vec![0.0f32; chunk_samples.max(channels)];

        info!(
            "Streaming '{}' (generation {}): estimated {:?} samples, {}Hz, {} channels",
            info.name, generation, total, info.sample_rate, info.channels
        );

        Self {
            inner: Arc::new(SessionInner {
                info,
                mode: DecodeMode::Streaming,
                storage: Storage::Streaming(StreamingStorage {
                    generation,
                    buffer,
                    producer: Mutex::new(Some(Producer { stream, scratch })),
                }),
                progress: Mutex::new(Progress {
                    state: SessionState::StreamingActive,
                    decoded: 0,
                    total,
                    closed: false,
                }),
                task: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<SessionInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<SessionInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub(crate) fn set_task(&self, handle: JoinHandle<()>) {
        *lock(&self.inner.task) = Some(handle);
    }

    pub fn info(&self) -> &StreamInfo {
        &self.inner.info
    }

    pub fn name(&self) -> &str {
        &self.inner.info.name
    }

    pub fn format(&self) -> ContainerFormat {
        self.inner.info.format
    }

    pub fn mode(&self) -> DecodeMode {
        self.inner.mode
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.info.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.info.channels
    }

    pub fn encoding(&self) -> SampleEncoding {
        self.inner.info.encoding
    }

    /// Loudness scalar in `[0, 1]`
    pub fn replaygain(&self) -> f32 {
        self.inner.info.replaygain
    }

    /// Streaming generation, `None` for eager sessions
    pub fn generation(&self) -> Option<u64> {
        match &self.inner.storage {
            Storage::Streaming(streaming) => Some(streaming.generation),
            Storage::Eager(_) => None,
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.inner.progress).state
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner.progress).closed
    }

    /// Interleaved samples decoded so far
    pub fn decoded_samples(&self) -> u64 {
        lock(&self.inner.progress).decoded
    }

    /// Total interleaved samples: exact once completed, an estimate while
    /// streaming, `None` when the container does not report a length.
    pub fn total_samples(&self) -> Option<u64> {
        lock(&self.inner.progress).total
    }

    /// Whole preloaded buffer of an eager session
    pub fn samples(&self) -> Option<Arc<[f32]>> {
        match &self.inner.storage {
            Storage::Eager(samples) => lock(samples).clone(),
            Storage::Streaming(_) => None,
        }
    }

    /// Copy decoded samples starting at `position` into `out`.
    ///
    /// Returns the number copied, 0 at the decoded boundary or when a newer
    /// streaming session owns the shared buffer.
    ///
    /// # Errors
    /// `DisposedResourceUsed` once the session is disposed
    pub fn read_into(&self, position: usize, out: &mut [f32]) -> Result<usize> {
        if self.state() == SessionState::Disposed {
            return Err(Error::DisposedResourceUsed(format!("read from '{}'", self.name())));
        }

        match &self.inner.storage {
            Storage::Eager(samples) => {
                let samples = lock(samples)
                    .clone()
                    .ok_or_else(|| Error::DisposedResourceUsed(format!("read from '{}'", self.name())))?;
                if position >= samples.len() {
                    return Ok(0);
                }
                let count = out.len().min(samples.len() - position);
                out[..count].copy_from_slice(&samples[position..position + count]);
                Ok(count)
            }
            Storage::Streaming(streaming) => Ok(streaming.buffer.read(streaming.generation, position, out)),
        }
    }

    /// Decode one chunk into the shared buffer.
    ///
    /// Safe to poll on any session: eager, finished, superseded and disposed
    /// sessions report `NoProgress`.
    pub fn decode_chunk(&self) -> ChunkProgress {
        let Storage::Streaming(streaming) = &self.inner.storage else {
            return ChunkProgress::NoProgress;
        };

        {
            let progress = lock(&self.inner.progress);
            if progress.closed || progress.state != SessionState::StreamingActive {
                return ChunkProgress::NoProgress;
            }
        }

        let mut slot = lock(&streaming.producer);
        let Some(producer) = slot.as_mut() else {
            return ChunkProgress::NoProgress;
        };

        // Cheap early exit before spending time decoding
        if streaming.buffer.owner_generation() != streaming.generation {
            *slot = None;
            self.mark_superseded(streaming.generation);
            return ChunkProgress::Superseded;
        }

        let produced = match producer.stream.read(&mut producer.scratch) {
            Ok(n) => n,
            Err(e) => {
                warn!("Decode error in '{}', ending stream: {}", self.name(), e);
                0
            }
        };

        let mut guard = streaming.buffer.lock();
        if guard.owner_generation() != streaming.generation {
            drop(guard);
            *slot = None;
            self.mark_superseded(streaming.generation);
            return ChunkProgress::Superseded;
        }

        if produced == 0 {
            let mut progress = lock(&self.inner.progress);
            progress.total = Some(progress.decoded);
            progress.state = SessionState::Completed;
            drop(progress);
            drop(guard);
            *slot = None;

            info!(
                "Streaming complete for '{}': {} samples",
                self.name(),
                self.decoded_samples()
            );
            return ChunkProgress::Finished;
        }

        let decoded = guard.append(&producer.scratch[..produced]) as u64;
        let mut progress = lock(&self.inner.progress);
        progress.decoded = decoded;
        progress.total = progress.total.map(|total| total.max(decoded));
        drop(progress);
        drop(guard);

        debug!("'{}': +{} samples ({} decoded)", self.name(), produced, decoded);
        ChunkProgress::Advanced(produced)
    }

    /// Restart a streaming session from its first sample.
    ///
    /// The decoder seeks back to the start and the published prefix is
    /// cleared under the buffer guard, so reads return nothing until the
    /// producer publishes again.
    ///
    /// # Errors
    /// - `DisposedResourceUsed` when no live decoder exists (eager, completed,
    ///   superseded or disposed sessions)
    /// - `CorruptStream` if the container cannot seek to its start
    pub fn rewind(&self) -> Result<()> {
        let no_decoder = || Error::DisposedResourceUsed(format!("rewind of '{}'", self.name()));

        let Storage::Streaming(streaming) = &self.inner.storage else {
            return Err(no_decoder());
        };

        let mut slot = lock(&streaming.producer);
        let Some(producer) = slot.as_mut() else {
            return Err(no_decoder());
        };
        if self.state() != SessionState::StreamingActive {
            return Err(no_decoder());
        }

        let mut guard = streaming.buffer.lock();
        if guard.owner_generation() != streaming.generation {
            drop(guard);
            *slot = None;
            self.mark_superseded(streaming.generation);
            return Err(no_decoder());
        }

        producer.stream.rewind()?;
        guard.restart();

        let mut progress = lock(&self.inner.progress);
        let discarded = progress.decoded;
        progress.decoded = 0;
        progress.total = producer.stream.total_samples();
        drop(progress);
        drop(guard);

        info!(
            "Rewound '{}' (generation {}), discarded {} samples",
            self.name(),
            streaming.generation,
            discarded
        );
        Ok(())
    }

    fn mark_superseded(&self, generation: u64) {
        let mut progress = lock(&self.inner.progress);
        if progress.state == SessionState::StreamingActive {
            progress.state = SessionState::Superseded;
            info!(
                "'{}' superseded (generation {}), stopped at {} samples",
                self.inner.info.name, generation, progress.decoded
            );
        }
    }

    /// Release the decoder and mark the session closed. Idempotent.
    pub fn dispose(&self) {
        let released = match &self.inner.storage {
            Storage::Streaming(streaming) => {
                let producer = lock(&streaming.producer).take();
                let _guard = streaming.buffer.lock();
                if !self.close() {
                    return;
                }
                producer.is_some()
            }
            Storage::Eager(samples) => {
                let samples = lock(samples).take();
                if !self.close() {
                    return;
                }
                samples.is_some()
            }
        };

        info!("Disposed '{}' (released resources: {})", self.name(), released);
    }

    /// Returns false if already disposed.
    fn close(&self) -> bool {
        let mut progress = lock(&self.inner.progress);
        if progress.state == SessionState::Disposed {
            return false;
        }
        progress.closed = true;
        progress.state = SessionState::Disposed;
        true
    }

    /// Wait for the background producer to exit. Returns at once for eager
    /// sessions or if another caller is already waiting.
    pub async fn wait(&self) {
        let handle = lock(&self.inner.task).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Producer task for '{}' failed: {}", self.name(), e);
            }
        }
    }
}
