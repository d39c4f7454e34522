//! Memory budget tracking for preloaded sounds
//!
//! Counts kilobytes committed to fully decoded (eager) sample buffers, in
//! total and against an optional active content pack.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Bytes per decoded f32 sample
const BYTES_PER_SAMPLE: u64 = 4;

/// Kilobytes (integer-truncated, 1000-byte units) held by `samples` decoded samples
pub fn kilobytes_for_samples(samples: u64) -> u64 {
    samples * BYTES_PER_SAMPLE / 1000
}

/// Accumulator for one content pack
#[derive(Debug)]
pub struct PackBudget {
    name: String,
    kilobytes: AtomicU64,
}

impl PackBudget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kilobytes: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kilobytes(&self) -> u64 {
        self.kilobytes.load(Ordering::Relaxed)
    }

    fn add(&self, delta_kb: u64) {
        self.kilobytes.fetch_add(delta_kb, Ordering::Relaxed);
    }
}

/// Process-wide budget counters.
///
/// There is no subtraction path: disposing a session does not give its
/// kilobytes back.
#[derive(Debug, Default)]
pub struct ContentBudget {
    total_kb: AtomicU64,
    active_pack: Mutex<Option<Arc<PackBudget>>>,
}

impl ContentBudget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total kilobytes committed since creation
    pub fn total_kilobytes(&self) -> u64 {
        self.total_kb.load(Ordering::Relaxed)
    }

    /// Add `delta_kb` to the total and to a pack.
    ///
    /// With `pack == None` the active pack, if any, receives the delta.
    pub fn add(&self, delta_kb: u64, pack: Option<&PackBudget>) {
        self.total_kb.fetch_add(delta_kb, Ordering::Relaxed);

        match pack {
            Some(pack) => pack.add(delta_kb),
            None => {
                if let Some(active) = self.active_pack().as_deref() {
                    active.add(delta_kb);
                }
            }
        }

        debug!("Content budget +{} KB (total {} KB)", delta_kb, self.total_kilobytes());
    }

    /// Make a new pack the active one and return it.
    pub fn begin_pack(&self, name: impl Into<String>) -> Arc<PackBudget> {
        let pack = Arc::new(PackBudget::new(name));
        *self.active_pack.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&pack));
        pack
    }

    /// Clear the active pack, returning it.
    pub fn end_pack(&self) -> Option<Arc<PackBudget>> {
        self.active_pack.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub fn active_pack(&self) -> Option<Arc<PackBudget>> {
        self.active_pack.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
