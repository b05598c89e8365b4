// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene errors.

use understory_cache::CacheError;

use crate::types::{Axes, Caches, NodeId};

/// Error type returned by fallible [`Drawable`](crate::Drawable) hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a structural edit was rejected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum HierarchyError {
    /// A node cannot be its own parent.
    #[error("a node cannot be its own parent")]
    SelfParent,
    /// The child already has a parent; detach it or use `reparent`.
    #[error("child already has a parent")]
    AlreadyParented,
    /// The parent is a descendant of the child.
    #[error("parent is a descendant of the child")]
    WouldCycle,
    /// The scene root cannot be detached, removed or parented.
    #[error("the scene root cannot be moved or removed")]
    Root,
}

/// Errors returned by [`Scene`](crate::Scene) operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The id refers to a node that has been removed.
    #[error("node {0:?} is not in the scene")]
    StaleNode(NodeId),
    /// A cache cell was misused: an invalid read or a cyclic recompute.
    #[error("{source} (node {node:?}, cache {cache:?})")]
    Cache {
        /// Node owning the cell.
        node: NodeId,
        /// The cell.
        cache: Caches,
        /// What went wrong.
        source: CacheError,
    },
    /// A drawable failed to recompute a cached value. The cell stays invalid
    /// and the next read retries.
    #[error("recompute of {cache:?} failed on node {node:?}")]
    Recompute {
        /// Node owning the cell.
        node: NodeId,
        /// The cell.
        cache: Caches,
        /// Error returned by the drawable.
        source: BoxError,
    },
    /// A structural edit was rejected.
    #[error("cannot attach {child:?} to {parent:?}: {reason}")]
    Hierarchy {
        /// Intended parent, if any.
        parent: Option<NodeId>,
        /// Node being moved.
        child: NodeId,
        /// Why.
        reason: HierarchyError,
    },
    /// An explicit size was set on an axis that is auto-sized.
    #[error("node {node:?} is auto-sized on {axes:?}")]
    AutoSized {
        /// The node.
        node: NodeId,
        /// Axes that are auto-sized.
        axes: Axes,
    },
    /// The drawable is not of the requested type.
    #[error("drawable of node {node:?} is not a {expected}")]
    DrawableType {
        /// The node.
        node: NodeId,
        /// Name of the requested type.
        expected: &'static str,
    },
}

impl SceneError {
    pub(crate) fn cache(node: NodeId, cache: Caches) -> impl FnOnce(CacheError) -> Self {
        move |source| Self::Cache {
            node,
            cache,
            source,
        }
    }

    pub(crate) fn hierarchy(parent: Option<NodeId>, child: NodeId, reason: HierarchyError) -> Self {
        Self::Hierarchy {
            parent,
            child,
            reason,
        }
    }

    /// Returns the underlying cache error, if this is a cache misuse.
    #[must_use]
    pub fn cache_error(&self) -> Option<CacheError> {
        match self {
            Self::Cache { source, .. } => Some(*source),
            _ => None,
        }
    }
}
