// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types: node identifiers, invalidation vocabulary, and node properties.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kurbo::{Affine, Insets, Point, Size, Vec2};

/// Identifier for a node in a [`Scene`](crate::Scene).
///
/// A slot index plus a generation counter. Removing a node frees its slot;
/// reusing the slot bumps the generation, so a stale `NodeId` never aliases a
/// different live node. Operations on a stale id fail with
/// [`SceneError::StaleNode`](crate::SceneError::StaleNode).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    /// The generation of the slot this id refers to.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.1
    }
}

bitflags::bitflags! {
    /// A set of layout axes.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Axes: u8 {
        /// Horizontal axis.
        const X = 0b01;
        /// Vertical axis.
        const Y = 0b10;
        /// Both axes.
        const BOTH = Self::X.bits() | Self::Y.bits();
    }
}

impl Axes {
    /// Picks the component of `size` along a single axis.
    #[must_use]
    pub(crate) fn extent(self, size: Size) -> f64 {
        if self == Self::X { size.width } else { size.height }
    }
}

bitflags::bitflags! {
    /// Sources of invalidation: the kinds of input that can change on a node.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Invalidation: u8 {
        /// Position, scale or rotation changed.
        const TRANSFORM = 0b0001;
        /// The size inputs changed: explicit size, relative axes, or the
        /// node's own auto-size result.
        const SIZE      = 0b0010;
        /// Alpha or lifetime alive state changed.
        const PRESENCE  = 0b0100;
        /// The drawable signalled that its content changed.
        const CONTENT   = 0b1000;
        /// Everything.
        const ALL = Self::TRANSFORM.bits()
            | Self::SIZE.bits()
            | Self::PRESENCE.bits()
            | Self::CONTENT.bits();
    }
}

bitflags::bitflags! {
    /// The cache slots every node carries.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Caches: u8 {
        /// Final size of the node's own drawing area.
        const DRAW_SIZE       = 1 << 0;
        /// Extent of the node's children, for nodes that auto-size.
        const AUTO_SIZE       = 1 << 1;
        /// Space the node occupies in its parent, used by the parent's auto-size.
        const BOUNDING_SIZE   = 1 << 2;
        /// Accumulated transform from node space to scene space.
        const WORLD_TRANSFORM = 1 << 3;
        /// Scene-space bounding box of the drawing area.
        const WORLD_BOUNDS    = 1 << 4;
        /// Whether the node and all its ancestors are present.
        const VISIBILITY      = 1 << 5;
        /// Whether the node's type handles positional input.
        const HANDLES_INPUT   = 1 << 6;
    }
}

/// Which nodes an [`InvalidationEdge`] reaches.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Propagation {
    /// Only the node that changed.
    Local,
    /// The immediate parent, one hop. The parent decides for itself whether
    /// anything it derives changed as a result.
    Parent,
    /// Each direct child.
    Children,
    /// Each descendant, stopping below any child whose caches were already
    /// invalid.
    Subtree,
}

/// A declared dependency: when `trigger` fires on a node, the `affects` cache
/// slots of the nodes reached by `propagation` become invalid.
///
/// Edge tables are `'static` and belong to the drawable type; a node captures
/// its table once at creation.
///
/// Downward edges (`Children`, `Subtree`) only reach children that inherit
/// the trigger from their parent: every child inherits [`Invalidation::TRANSFORM`]
/// and [`Invalidation::PRESENCE`], and children with relative size axes
/// additionally inherit [`Invalidation::SIZE`] and [`Invalidation::CONTENT`].
///
/// A trigger whose local edges affect [`Caches::BOUNDING_SIZE`] must also list
/// [`Caches::AUTO_SIZE`] on a [`Propagation::Parent`] edge, otherwise an
/// auto-sizing parent would never hear about the change.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct InvalidationEdge {
    /// The inputs that fire this edge.
    pub trigger: Invalidation,
    /// The nodes the edge reaches.
    pub propagation: Propagation,
    /// The cache slots invalidated on every node reached.
    pub affects: Caches,
}

impl InvalidationEdge {
    /// Creates an edge.
    #[must_use]
    pub const fn new(trigger: Invalidation, propagation: Propagation, affects: Caches) -> Self {
        Self {
            trigger,
            propagation,
            affects,
        }
    }
}

/// The edge table used by the built-in drawables.
pub const DEFAULT_EDGES: &[InvalidationEdge] = &[
    InvalidationEdge::new(
        Invalidation::SIZE.union(Invalidation::CONTENT),
        Propagation::Local,
        Caches::DRAW_SIZE
            .union(Caches::BOUNDING_SIZE)
            .union(Caches::WORLD_BOUNDS),
    ),
    InvalidationEdge::new(
        Invalidation::TRANSFORM,
        Propagation::Local,
        Caches::WORLD_TRANSFORM
            .union(Caches::BOUNDING_SIZE)
            .union(Caches::WORLD_BOUNDS),
    ),
    InvalidationEdge::new(
        Invalidation::PRESENCE,
        Propagation::Local,
        Caches::VISIBILITY.union(Caches::BOUNDING_SIZE),
    ),
    InvalidationEdge::new(Invalidation::ALL, Propagation::Parent, Caches::AUTO_SIZE),
    InvalidationEdge::new(
        Invalidation::TRANSFORM,
        Propagation::Subtree,
        Caches::WORLD_TRANSFORM.union(Caches::WORLD_BOUNDS),
    ),
    InvalidationEdge::new(
        Invalidation::PRESENCE,
        Propagation::Subtree,
        Caches::VISIBILITY,
    ),
    InvalidationEdge::new(
        Invalidation::SIZE.union(Invalidation::CONTENT),
        Propagation::Subtree,
        Caches::DRAW_SIZE
            .union(Caches::BOUNDING_SIZE)
            .union(Caches::WORLD_BOUNDS),
    ),
];

/// Returns `true` if every trigger that locally affects the bounding size
/// also reaches the parent's auto-size.
pub(crate) fn edges_notify_parent(edges: &[InvalidationEdge]) -> bool {
    let mut bounding = Invalidation::empty();
    let mut notified = Invalidation::empty();
    for edge in edges {
        match edge.propagation {
            Propagation::Local if edge.affects.contains(Caches::BOUNDING_SIZE) => {
                bounding |= edge.trigger;
            }
            Propagation::Parent if edge.affects.contains(Caches::AUTO_SIZE) => {
                notified |= edge.trigger;
            }
            _ => {}
        }
    }
    notified.contains(bounding)
}

/// The time window during which a node is alive.
///
/// The window is half-open: alive for `start <= t < end`. Dead nodes are not
/// present: they are not drawn and do not contribute to their parent's
/// auto-size.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Lifetime {
    /// First instant the node is alive.
    pub start: f64,
    /// First instant the node is no longer alive.
    pub end: f64,
}

impl Lifetime {
    /// Alive at every time.
    pub const ALWAYS: Self = Self {
        start: f64::NEG_INFINITY,
        end: f64::INFINITY,
    };

    /// Creates a lifetime window.
    #[must_use]
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Returns `true` if `time` lies in the window.
    #[must_use]
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time < self.end
    }

    /// Returns `true` once `time` has reached the end of the window.
    #[must_use]
    pub fn has_ended(&self, time: f64) -> bool {
        time >= self.end
    }

    pub(crate) fn is_always(&self) -> bool {
        *self == Self::ALWAYS
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::ALWAYS
    }
}

/// The inputs of a node.
///
/// Positions are in the parent's child space, which starts at the parent's
/// top-left padding corner. For axes in `relative_size_axes`, the matching
/// component of `size` is a fraction of the parent's resolved extent rather
/// than an absolute length.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeProps {
    /// Offset of the node's origin in the parent's child space.
    pub position: Point,
    /// Explicit size (or fraction, on relative axes). Ignored on auto-sized axes.
    pub size: Size,
    /// Non-uniform scale about the node's origin.
    pub scale: Vec2,
    /// Rotation about the node's origin, in radians.
    pub rotation: f64,
    /// Opacity. A node with zero alpha is not present.
    pub alpha: f64,
    /// Space added around the children when auto-sizing; also offsets the children.
    pub padding: Insets,
    /// Axes on which the node takes its size from its children.
    pub auto_size_axes: Axes,
    /// Axes on which this node is ignored by an auto-sizing parent.
    pub bypass_auto_size_axes: Axes,
    /// Axes on which `size` is relative to the parent.
    pub relative_size_axes: Axes,
    /// When the node is alive.
    pub lifetime: Lifetime,
    /// Remove the node from the scene once its lifetime has ended.
    pub remove_when_expired: bool,
}

impl Default for NodeProps {
    fn default() -> Self {
        Self {
            position: Point::ZERO,
            size: Size::ZERO,
            scale: Vec2::new(1.0, 1.0),
            rotation: 0.0,
            alpha: 1.0,
            padding: Insets::ZERO,
            auto_size_axes: Axes::empty(),
            bypass_auto_size_axes: Axes::empty(),
            relative_size_axes: Axes::empty(),
            lifetime: Lifetime::ALWAYS,
            remove_when_expired: false,
        }
    }
}

impl NodeProps {
    /// Properties of a node with an explicit size.
    #[must_use]
    pub fn sized(size: Size) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Properties of a node that takes its size from its children on `axes`.
    #[must_use]
    pub fn auto_sized(axes: Axes) -> Self {
        Self {
            auto_size_axes: axes,
            ..Self::default()
        }
    }

    /// Sets the position.
    #[must_use]
    pub fn with_position(mut self, position: Point) -> Self {
        self.position = position;
        self
    }

    /// Sets the padding.
    #[must_use]
    pub fn with_padding(mut self, padding: Insets) -> Self {
        self.padding = padding;
        self
    }

    /// Sets relative size axes; `size` is then a fraction on those axes.
    #[must_use]
    pub fn with_relative_size(mut self, axes: Axes, fraction: Size) -> Self {
        self.relative_size_axes = axes;
        self.size = fraction;
        self
    }

    /// Sets the axes on which an auto-sizing parent ignores this node.
    #[must_use]
    pub fn with_bypass_auto_size(mut self, axes: Axes) -> Self {
        self.bypass_auto_size_axes = axes;
        self
    }

    /// Sets the lifetime and whether the node is removed when it ends.
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Lifetime, remove_when_expired: bool) -> Self {
        self.lifetime = lifetime;
        self.remove_when_expired = remove_when_expired;
        self
    }

    /// Transform from node space to the parent's child space.
    #[must_use]
    pub fn local_transform(&self) -> Affine {
        Affine::translate(self.position.to_vec2())
            * Affine::rotate(self.rotation)
            * Affine::scale_non_uniform(self.scale.x, self.scale.y)
    }

    pub(crate) fn inherits(&self) -> Invalidation {
        let mut inherited = Invalidation::TRANSFORM | Invalidation::PRESENCE;
        if !self.relative_size_axes.is_empty() {
            inherited |= Invalidation::SIZE | Invalidation::CONTENT;
        }
        inherited
    }
}

/// A thread-safe handle that reports whether a node is still in its scene.
///
/// Work deferred to another thread can hold a `Liveness` and check it before
/// handing results back to the scene's update thread. Once the node is
/// removed the handle reports dead forever, even if the slot is reused.
#[derive(Clone, Debug)]
pub struct Liveness(pub(crate) Arc<AtomicBool>);

impl Liveness {
    /// Returns `true` while the node has not been removed.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_edges_notify_parent() {
        assert!(edges_notify_parent(DEFAULT_EDGES));
        let bad = [InvalidationEdge::new(
            Invalidation::SIZE,
            Propagation::Local,
            Caches::BOUNDING_SIZE,
        )];
        assert!(!edges_notify_parent(&bad));
    }

    #[test]
    fn lifetime_is_half_open() {
        let l = Lifetime::new(1.0, 2.0);
        assert!(!l.contains(0.5));
        assert!(l.contains(1.0));
        assert!(l.contains(1.999));
        assert!(!l.contains(2.0));
        assert!(l.has_ended(2.0));
        assert!(Lifetime::ALWAYS.contains(-1e300));
    }

    #[test]
    fn local_transform_applies_scale_then_rotation_then_translation() {
        let props = NodeProps {
            position: Point::new(10.0, 5.0),
            scale: Vec2::new(2.0, 3.0),
            ..NodeProps::default()
        };
        let p = props.local_transform() * Point::new(1.0, 1.0);
        assert_eq!(p, Point::new(12.0, 8.0));
    }

    #[test]
    fn relative_nodes_inherit_size() {
        let plain = NodeProps::default();
        assert!(!plain.inherits().contains(Invalidation::SIZE));
        let relative = NodeProps::default().with_relative_size(Axes::X, Size::new(1.0, 10.0));
        assert!(relative.inherits().contains(Invalidation::SIZE | Invalidation::CONTENT));
    }
}
