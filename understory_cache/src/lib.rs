// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Cache: valid/invalid cache cells for incremental layout.
//!
//! A cache cell holds a derived value together with a validity flag. Owners
//! invalidate cells when an input changes and recompute them lazily when the
//! value is next needed, or eagerly during a validation pass.
//!
//! - [`Cached<T>`]: a typed value slot. Reads of an invalid cell fail with
//!   [`CacheError::InvalidRead`] instead of returning stale data.
//! - [`CachedBool`]: a packed cached condition, one byte per flag.
//! - [`CacheCell`] / [`ValueCell`]: the operations shared by both, so owners
//!   holding several differently typed cells can drive them uniformly.
//! - [`FrameCounters`]: atomic counters of recomputes and invalidations that
//!   a reporting thread can sample once per frame.
//!
//! ## Invalidate returns whether anything changed
//!
//! [`CacheCell::invalidate`] returns `true` only when the cell transitions
//! from valid to invalid. Propagation code uses this to stop as soon as it
//! reaches a cell that was already invalid, which keeps repeated invalidation
//! of the same input cheap.
//!
//! ```rust
//! use understory_cache::{CacheCell, Cached};
//!
//! let mut size = Cached::new();
//! size.validate((40.0, 20.0));
//! assert!(size.invalidate());
//! // Already invalid: nothing downstream needs to hear about it again.
//! assert!(!size.invalidate());
//! ```
//!
//! ## Re-entrancy guard
//!
//! Recomputing a cell may require reading other cells. If that chain leads
//! back to the cell being recomputed, the dependency is cyclic. Owners bracket
//! recomputes with [`CacheCell::begin_refresh`] and [`CacheCell::end_refresh`];
//! a nested `begin_refresh` on the same cell fails with [`CacheError::Cyclic`].
//!
//! ```rust
//! use understory_cache::{CacheCell, CacheError, Cached};
//!
//! let mut cell = Cached::<u32>::new();
//! cell.begin_refresh().unwrap();
//! assert_eq!(cell.begin_refresh(), Err(CacheError::Cyclic));
//! cell.end_refresh();
//! ```
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and does not allocate.

#![no_std]

#[cfg(test)]
extern crate alloc;

mod cell;
mod counters;
mod error;

pub use cell::{CacheCell, Cached, CachedBool, ValueCell};
pub use counters::{FrameCounters, FrameStats};
pub use error::CacheError;
