//! Streaming scheduler
//!
//! Owns the generation counter and the shared decode buffer, and runs one
//! background producer task per streaming session. Starting a session claims
//! the buffer for a fresh generation; any older producer sees the mismatch on
//! its next chunk and stops without writing.

use crate::audio::normalizer::NormalizedStream;
use crate::config::EngineConfig;
use crate::playback::session::{ChunkProgress, DecodeSession, SessionInner, StreamInfo};
use crate::playback::shared_buffer::SharedDecodeBuffer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

/// Background decode scheduler
pub struct StreamingScheduler {
    generation: AtomicU64,
    buffer: Arc<SharedDecodeBuffer>,
    runtime: Handle,
    chunk_size: usize,
    chunk_delay: Duration,
    initial_buffer_samples: usize,
}

impl StreamingScheduler {
    /// Producer tasks are spawned on `runtime`.
    pub fn new(config: &EngineConfig, runtime: Handle) -> Self {
        Self {
            generation: AtomicU64::new(0),
            buffer: Arc::new(SharedDecodeBuffer::new()),
            runtime,
            chunk_size: config.chunk_size_samples,
            chunk_delay: config.chunk_delay(),
            initial_buffer_samples: config.initial_buffer_samples,
        }
    }

    /// Most recently issued generation (0 before the first session)
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn shared_buffer(&self) -> &Arc<SharedDecodeBuffer> {
        &self.buffer
    }

    /// Claim the shared buffer for a new generation and start its producer.
    pub fn begin(&self, info: StreamInfo, stream: NormalizedStream) -> DecodeSession {
        let capacity = initial_claim(stream.total_samples(), self.initial_buffer_samples, self.chunk_size);

        // Issue and claim under one guard so owners change in generation order
        let generation = {
            let mut guard = self.buffer.lock();
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            guard.claim(generation, capacity);
            generation
        };

        let session = DecodeSession::streaming(
            info,
            stream,
            generation,
            Arc::clone(&self.buffer),
            self.chunk_size,
        );

        let handle = self
            .runtime
            .spawn(run_producer(session.downgrade(), self.chunk_delay));
        session.set_task(handle);

        session
    }
}

/// Capacity claimed before the first chunk.
///
/// Container lengths are untrusted (pipe writers emit `u32::MAX`), so the
/// estimate never exceeds `initial_buffer_samples`; `append` grows the rest.
fn initial_claim(estimate: Option<u64>, initial_buffer_samples: usize, chunk_size: usize) -> usize {
    estimate
        .map(|total| usize::try_from(total).unwrap_or(usize::MAX))
        .unwrap_or(initial_buffer_samples)
        .min(initial_buffer_samples)
        .max(chunk_size)
}

/// Decode chunks until the session finishes, is superseded or disposed, or
/// every handle to it is dropped.
async fn run_producer(session: Weak<SessionInner>, chunk_delay: Duration) {
    let mut chunks = 0u64;

    loop {
        let Some(live) = DecodeSession::upgrade(&session) else {
            debug!("Producer exiting: session dropped after {} chunks", chunks);
            return;
        };

        match live.decode_chunk() {
            ChunkProgress::Advanced(_) => chunks += 1,
            outcome => {
                debug!(
                    "Producer for '{}' exiting after {} chunks: {:?}",
                    live.name(),
                    chunks,
                    outcome
                );
                return;
            }
        }
        drop(live);

        tokio::time::sleep(chunk_delay).await;
    }
}
