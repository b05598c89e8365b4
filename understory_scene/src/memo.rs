// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Process-wide per-type memoization.

use core::any::TypeId;

use hashbrown::HashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// A concurrent map from a type to a boolean fact about it.
///
/// Facts are computed at most once per type (per memo) and never change
/// afterwards. Lookups of a known type take only a shared lock.
#[derive(Debug, Default)]
pub struct TypeMemo {
    facts: RwLock<HashMap<TypeId, bool>>,
}

impl TypeMemo {
    /// Creates an empty memo.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memoized fact for `ty`, if known.
    #[must_use]
    pub fn get(&self, ty: TypeId) -> Option<bool> {
        self.facts.read().get(&ty).copied()
    }

    /// Returns the fact for `ty`, computing it with `f` if this is the first
    /// time the type is seen.
    ///
    /// If two threads race on an unknown type, both may run `f`, but only
    /// the first result is stored and returned to both.
    pub fn get_or_insert_with(&self, ty: TypeId, f: impl FnOnce() -> bool) -> bool {
        if let Some(fact) = self.get(ty) {
            return fact;
        }
        let fact = f();
        *self.facts.write().entry(ty).or_insert(fact)
    }

    /// Number of types with a known fact.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.read().len()
    }

    /// Returns `true` if no type is known yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether each drawable type handles positional input.
///
/// Populated lazily by [`Scene::handles_input`](crate::Scene::handles_input).
pub static INPUT_HANDLERS: Lazy<TypeMemo> = Lazy::new(TypeMemo::new);
