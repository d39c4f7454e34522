//! Shared growable buffer for streaming decode
//!
//! One buffer is reused by successive streaming sessions. The session that
//! currently owns it is identified by its generation. A single guard
//! protects ownership, capacity growth and the decoded boundary. Sample data
//! lives in atomic cells behind an `Arc`, so readers snapshot the storage
//! and boundary under the guard and copy without holding it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Fixed-size sample cells (f32 bit patterns)
struct SampleStorage {
    cells: Box<[AtomicU32]>,
}

impl SampleStorage {
    fn with_capacity(capacity: usize) -> Self {
        let cells = (0..capacity).map(|_| AtomicU32::new(0)).collect();
        Self { cells }
    }

    fn len(&self) -> usize {
        self.cells.len()
    }

    fn store(&self, offset: usize, samples: &[f32]) {
        for (cell, sample) in self.cells[offset..offset + samples.len()].iter().zip(samples) {
            cell.store(sample.to_bits(), Ordering::Relaxed);
        }
    }

    fn load(&self, offset: usize, out: &mut [f32]) {
        let end = offset + out.len();
        for (sample, cell) in out.iter_mut().zip(&self.cells[offset..end]) {
            *sample = f32::from_bits(cell.load(Ordering::Relaxed));
        }
    }
}

struct BufferState {
    /// Generation of the session allowed to write; 0 before any claim
    owner_generation: u64,
    decoded: usize,
    storage: Arc<SampleStorage>,
}

/// Process-wide growable sample buffer for streaming sessions.
pub struct SharedDecodeBuffer {
    state: Mutex<BufferState>,
}

impl std::fmt::Debug for SharedDecodeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.lock();
        f.debug_struct("SharedDecodeBuffer")
            .field("owner_generation", &guard.owner_generation())
            .field("decoded", &guard.decoded())
            .field("capacity", &guard.capacity())
            .finish()
    }
}

impl Default for SharedDecodeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedDecodeBuffer {
    /// Empty buffer with no owner
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BufferState {
                owner_generation: 0,
                decoded: 0,
                storage: Arc::new(SampleStorage::with_capacity(0)),
            }),
        }
    }

    /// Acquire the buffer guard.
    pub fn lock(&self) -> BufferGuard<'_> {
        BufferGuard {
            state: self.state.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    pub fn owner_generation(&self) -> u64 {
        self.lock().owner_generation()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Copy published samples starting at `position` into `out`.
    ///
    /// Returns 0 when `generation` no longer owns the buffer or `position`
    /// is at or past the decoded boundary. The guard is held only for the
    /// ownership and boundary check.
    pub fn read(&self, generation: u64, position: usize, out: &mut [f32]) -> usize {
        let (storage, decoded) = {
            let guard = self.lock();
            if guard.state.owner_generation != generation {
                return 0;
            }
            (Arc::clone(&guard.state.storage), guard.state.decoded)
        };

        if position >= decoded {
            return 0;
        }
        let count = out.len().min(decoded - position);
        storage.load(position, &mut out[..count]);
        count
    }
}

/// Exclusive access to the buffer's ownership, boundary and capacity.
pub struct BufferGuard<'a> {
    state: MutexGuard<'a, BufferState>,
}

impl BufferGuard<'_> {
    pub fn owner_generation(&self) -> u64 {
        self.state.owner_generation
    }

    /// Samples published by the current owner
    pub fn decoded(&self) -> usize {
        self.state.decoded
    }

    pub fn capacity(&self) -> usize {
        self.state.storage.len()
    }

    /// Hand the buffer to `generation` with an empty decoded prefix.
    ///
    /// Capacity never shrinks. Storage still referenced by a reader of the
    /// previous owner is left to that reader and replaced.
    pub(crate) fn claim(&mut self, generation: u64, min_capacity: usize) {
        let capacity = self.capacity();
        let shared = Arc::strong_count(&self.state.storage) > 1;

        if shared || capacity < min_capacity {
            let new_capacity = capacity.max(min_capacity);
            debug!(
                "Shared buffer reallocated for generation {}: {} -> {} samples",
                generation, capacity, new_capacity
            );
            self.state.storage = Arc::new(SampleStorage::with_capacity(new_capacity));
        }

        self.state.owner_generation = generation;
        self.state.decoded = 0;
    }

    /// Drop the current owner's published prefix and keep ownership.
    pub(crate) fn restart(&mut self) {
        let generation = self.state.owner_generation;
        self.claim(generation, 0);
    }

    /// Append samples after the decoded boundary, doubling capacity as needed.
    ///
    /// Returns the new decoded count.
    pub(crate) fn append(&mut self, samples: &[f32]) -> usize {
        let decoded = self.state.decoded;
        let needed = decoded + samples.len();

        if needed > self.capacity() {
            let mut new_capacity = self.capacity().max(1);
            while new_capacity < needed {
                new_capacity *= 2;
            }
            debug!("Shared buffer grown: {} -> {} samples", self.capacity(), new_capacity);

            let grown = SampleStorage::with_capacity(new_capacity);
            let mut prefix = vec![0.0; decoded];
            self.state.storage.load(0, &mut prefix);
            grown.store(0, &prefix);
            self.state.storage = Arc::new(grown);
        }

        self.state.storage.store(decoded, samples);
        self.state.decoded = needed;
        needed
    }
}
