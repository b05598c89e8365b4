// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame recompute and invalidation counters.

use core::sync::atomic::{AtomicU64, Ordering};

/// A snapshot of [`FrameCounters`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FrameStats {
    /// Cells recomputed and marked valid.
    pub validations: u64,
    /// Invalidations that transitioned a valid cell to invalid.
    pub invalidations: u64,
    /// Invalidations applied to cells that were already invalid.
    pub redundant_invalidations: u64,
}

impl FrameStats {
    /// Total invalidation calls, effective or not.
    #[must_use]
    pub const fn invalidation_calls(&self) -> u64 {
        self.invalidations + self.redundant_invalidations
    }
}

/// Thread-safe counters for cache activity.
///
/// Counters are updated with relaxed atomics by the thread that owns the
/// caches and may be sampled from any other thread, typically once per frame
/// with [`take`](Self::take). Individual counters are exact; a snapshot taken
/// while updates are in flight may mix values from before and after a single
/// update.
///
/// # Example
///
/// ```
/// use understory_cache::FrameCounters;
///
/// let counters = FrameCounters::new();
/// counters.record_validation();
/// counters.record_invalidation(true);
/// counters.record_invalidation(false);
///
/// let frame = counters.take();
/// assert_eq!(frame.validations, 1);
/// assert_eq!(frame.invalidations, 1);
/// assert_eq!(frame.redundant_invalidations, 1);
/// assert_eq!(counters.snapshot().validations, 0);
/// ```
#[derive(Debug, Default)]
pub struct FrameCounters {
    validations: AtomicU64,
    invalidations: AtomicU64,
    redundant_invalidations: AtomicU64,
}

impl FrameCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            validations: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            redundant_invalidations: AtomicU64::new(0),
        }
    }

    /// Records one recompute.
    #[inline]
    pub fn record_validation(&self) {
        self.validations.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one invalidation call.
    ///
    /// `effective` is the value returned by the cell's invalidate operation.
    #[inline]
    pub fn record_invalidation(&self, effective: bool) {
        let counter = if effective {
            &self.invalidations
        } else {
            &self.redundant_invalidations
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads the current values without resetting them.
    #[must_use]
    pub fn snapshot(&self) -> FrameStats {
        FrameStats {
            validations: self.validations.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            redundant_invalidations: self.redundant_invalidations.load(Ordering::Relaxed),
        }
    }

    /// Reads the current values and resets them to zero.
    ///
    /// Each counter is swapped individually, so no update is lost or counted
    /// twice across consecutive calls.
    pub fn take(&self) -> FrameStats {
        FrameStats {
            validations: self.validations.swap(0, Ordering::Relaxed),
            invalidations: self.invalidations.swap(0, Ordering::Relaxed),
            redundant_invalidations: self.redundant_invalidations.swap(0, Ordering::Relaxed),
        }
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        let _ = self.take();
    }
}
