// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cache cells: a value slot that is either valid or invalid.

use core::fmt;

use crate::error::CacheError;

/// Validity and re-entrancy operations shared by every cell type.
///
/// This trait is object safe so that an owner holding several differently
/// typed cells can invalidate or guard them through one code path, for
/// example by mapping a cache identifier to `&mut dyn CacheCell`.
///
/// # See Also
///
/// - [`ValueCell`]: typed read and validate on top of this trait.
pub trait CacheCell {
    /// Returns `true` if the cell currently holds a valid value.
    fn is_valid(&self) -> bool;

    /// Marks the cell invalid.
    ///
    /// Returns `true` if the cell transitioned from valid to invalid, and
    /// `false` if it was already invalid. Callers use the return value to stop
    /// propagating an invalidation that has already been applied.
    fn invalidate(&mut self) -> bool;

    /// Marks the start of a recompute of this cell.
    ///
    /// Fails with [`CacheError::Cyclic`] if a recompute is already in progress,
    /// which means the recompute depends on its own result.
    fn begin_refresh(&mut self) -> Result<(), CacheError>;

    /// Marks the end of a recompute started with [`begin_refresh`](Self::begin_refresh).
    ///
    /// Must be called on every exit path, including failures.
    fn end_refresh(&mut self);

    /// Returns `true` between [`begin_refresh`](Self::begin_refresh) and
    /// [`end_refresh`](Self::end_refresh).
    fn is_refreshing(&self) -> bool;
}

/// A [`CacheCell`] with a copyable value.
pub trait ValueCell: CacheCell {
    /// The cached value type.
    type Value: Copy;

    /// Reads the value, failing with [`CacheError::InvalidRead`] when invalid.
    fn read(&self) -> Result<Self::Value, CacheError>;

    /// Stores `value` and marks the cell valid.
    fn store(&mut self, value: Self::Value);
}

/// A cached value of type `T`.
///
/// A `Cached` starts out invalid. [`validate`](Self::validate) stores a value
/// and marks it valid; [`invalidate`](Self::invalidate) drops the value and
/// marks it invalid. Reading an invalid cell is an error, never a stale read.
///
/// # Example
///
/// ```
/// use understory_cache::{CacheError, Cached};
///
/// let mut width = Cached::<f64>::new();
/// assert_eq!(width.get(), Err(CacheError::InvalidRead));
///
/// width.validate(10.0);
/// assert_eq!(width.get(), Ok(&10.0));
///
/// assert!(width.invalidate());
/// assert!(!width.invalidate());
///
/// // Pull-style access recomputes only when invalid.
/// assert_eq!(*width.get_or_refresh(|| 20.0), 20.0);
/// assert_eq!(*width.get_or_refresh(|| unreachable!()), 20.0);
/// ```
#[derive(Clone)]
pub struct Cached<T> {
    value: Option<T>,
    refreshing: bool,
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Cached<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cached")
            .field("value", &self.value)
            .field("refreshing", &self.refreshing)
            .finish()
    }
}

impl<T> Cached<T> {
    /// Creates an invalid cell.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: None,
            refreshing: false,
        }
    }

    /// Returns `true` if the cell holds a valid value.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }

    /// Stores `value`, marks the cell valid and returns a reference to it.
    pub fn validate(&mut self, value: T) -> &T {
        self.value.insert(value)
    }

    /// Marks the cell invalid, dropping its value.
    ///
    /// Returns `true` if the cell was valid before the call.
    pub fn invalidate(&mut self) -> bool {
        self.value.take().is_some()
    }

    /// Returns the value, or [`CacheError::InvalidRead`] if the cell is invalid.
    #[inline]
    pub fn get(&self) -> Result<&T, CacheError> {
        self.value.as_ref().ok_or(CacheError::InvalidRead)
    }

    /// Returns the value.
    ///
    /// # Panics
    ///
    /// Panics if the cell is invalid. Use this where the surrounding code has
    /// already validated the cell and an invalid read would be a bug.
    #[track_caller]
    #[must_use]
    pub fn value(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => panic!("read of an invalid cache cell"),
        }
    }

    /// Returns the value, recomputing it with `f` first if the cell is invalid.
    pub fn get_or_refresh(&mut self, f: impl FnOnce() -> T) -> &T {
        self.value.get_or_insert_with(f)
    }

    /// Returns the value, recomputing it with the fallible `f` first if the
    /// cell is invalid.
    ///
    /// If `f` fails, the error is returned and the cell stays invalid, so the
    /// next call recomputes from scratch.
    pub fn try_get_or_refresh<E>(
        &mut self,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<&T, E> {
        let value = match self.value.take() {
            Some(value) => value,
            None => f()?,
        };
        Ok(self.value.insert(value))
    }
}

impl<T> CacheCell for Cached<T> {
    #[inline]
    fn is_valid(&self) -> bool {
        Self::is_valid(self)
    }

    fn invalidate(&mut self) -> bool {
        Self::invalidate(self)
    }

    fn begin_refresh(&mut self) -> Result<(), CacheError> {
        if self.refreshing {
            return Err(CacheError::Cyclic);
        }
        self.refreshing = true;
        Ok(())
    }

    fn end_refresh(&mut self) {
        self.refreshing = false;
    }

    fn is_refreshing(&self) -> bool {
        self.refreshing
    }
}

impl<T: Copy> ValueCell for Cached<T> {
    type Value = T;

    #[inline]
    fn read(&self) -> Result<T, CacheError> {
        self.get().copied()
    }

    fn store(&mut self, value: T) {
        self.validate(value);
    }
}

/// A cached boolean condition packed into a single byte.
///
/// This is the degenerate form of [`Cached<bool>`] for flags such as "is this
/// node visible" or "does this node type handle input", where the cached
/// payload is the boolean itself.
///
/// # Example
///
/// ```
/// use understory_cache::CachedBool;
///
/// let mut visible = CachedBool::new();
/// assert!(visible.get().is_err());
///
/// assert!(visible.get_or_refresh(|| true));
/// assert!(visible.invalidate());
/// assert!(!visible.is_valid());
/// ```
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct CachedBool(u8);

impl CachedBool {
    const VALID: u8 = 0b001;
    const VALUE: u8 = 0b010;
    const REFRESHING: u8 = 0b100;

    /// Creates an invalid flag.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Returns `true` if the flag holds a valid value.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 & Self::VALID != 0
    }

    /// Stores `value` and marks the flag valid.
    pub fn validate(&mut self, value: bool) -> bool {
        self.0 = (self.0 & Self::REFRESHING) | Self::VALID | if value { Self::VALUE } else { 0 };
        value
    }

    /// Marks the flag invalid.
    ///
    /// Returns `true` if the flag was valid before the call.
    pub fn invalidate(&mut self) -> bool {
        let was_valid = self.is_valid();
        self.0 &= Self::REFRESHING;
        was_valid
    }

    /// Returns the value, or [`CacheError::InvalidRead`] if the flag is invalid.
    #[inline]
    pub const fn get(self) -> Result<bool, CacheError> {
        if self.is_valid() {
            Ok(self.0 & Self::VALUE != 0)
        } else {
            Err(CacheError::InvalidRead)
        }
    }

    /// Returns the value.
    ///
    /// # Panics
    ///
    /// Panics if the flag is invalid.
    #[track_caller]
    #[must_use]
    pub fn value(self) -> bool {
        match self.get() {
            Ok(value) => value,
            Err(_) => panic!("read of an invalid cache cell"),
        }
    }

    /// Returns the value, recomputing it with `f` first if the flag is invalid.
    pub fn get_or_refresh(&mut self, f: impl FnOnce() -> bool) -> bool {
        match self.get() {
            Ok(value) => value,
            Err(_) => self.validate(f()),
        }
    }
}

impl fmt::Debug for CachedBool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Ok(value) => f.debug_tuple("CachedBool").field(&value).finish(),
            Err(_) => f.write_str("CachedBool(<invalid>)"),
        }
    }
}

impl CacheCell for CachedBool {
    #[inline]
    fn is_valid(&self) -> bool {
        Self::is_valid(*self)
    }

    fn invalidate(&mut self) -> bool {
        Self::invalidate(self)
    }

    fn begin_refresh(&mut self) -> Result<(), CacheError> {
        if self.0 & Self::REFRESHING != 0 {
            return Err(CacheError::Cyclic);
        }
        self.0 |= Self::REFRESHING;
        Ok(())
    }

    fn end_refresh(&mut self) {
        self.0 &= !Self::REFRESHING;
    }

    fn is_refreshing(&self) -> bool {
        self.0 & Self::REFRESHING != 0
    }
}

impl ValueCell for CachedBool {
    type Value = bool;

    #[inline]
    fn read(&self) -> Result<bool, CacheError> {
        self.get()
    }

    fn store(&mut self, value: bool) {
        self.validate(value);
    }
}
