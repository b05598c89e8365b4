// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors raised by cache cells.

/// A misuse of a cache cell.
///
/// Both variants indicate a defect in the code that owns or reads the cell,
/// not a condition to retry. They are returned rather than panicking so that
/// owners can attach context (which node, which cache) before surfacing them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum CacheError {
    /// The cell was read while invalid.
    ///
    /// The reader skipped the owner's validation path.
    #[error("read of an invalid cache cell")]
    InvalidRead,
    /// The cell was asked to recompute while it was already recomputing.
    ///
    /// The recompute of this cell (transitively) depends on itself.
    #[error("cache cell re-entered while it was being recomputed")]
    Cyclic,
}
