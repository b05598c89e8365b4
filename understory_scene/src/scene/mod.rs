// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scene: node storage, hierarchy edits, and property setters.

mod input;
mod invalidate;
mod pull;
mod validate;

pub use validate::PassStats;

use core::any::{Any, type_name};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hashbrown::HashSet;
use kurbo::{Affine, Insets, Point, Rect, Size, Vec2};
use smallvec::SmallVec;
use understory_cache::{CacheCell, Cached, CachedBool, FrameCounters, FrameStats};

use crate::drawable::{Container, Drawable};
use crate::error::{HierarchyError, SceneError};
use crate::types::{
    Axes, Caches, Invalidation, InvalidationEdge, Lifetime, Liveness, NodeId, NodeProps,
    edges_notify_parent,
};

/// Knobs for the validation pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SceneOptions {
    /// How many times a node's children are revisited in one pass when the
    /// node's own layout invalidated them again (for example a container whose
    /// auto-size changed, resizing relatively sized children).
    pub max_layout_passes: usize,
    /// Validate subtrees of nodes that are not visible.
    ///
    /// Off by default: hidden subtrees keep their invalid caches until they
    /// become visible again.
    pub validate_hidden_subtrees: bool,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            max_layout_passes: 8,
            validate_hidden_subtrees: false,
        }
    }
}

/// The standard cache slots of a node.
#[derive(Debug, Default)]
pub(crate) struct NodeCaches {
    pub(crate) draw_size: Cached<Size>,
    pub(crate) auto_size: Cached<Size>,
    pub(crate) bounding_size: Cached<Size>,
    pub(crate) world_transform: Cached<Affine>,
    pub(crate) world_bounds: Cached<Rect>,
    pub(crate) visibility: CachedBool,
    pub(crate) handles_input: CachedBool,
}

impl NodeCaches {
    fn cell(&self, slot: Caches) -> Option<&dyn CacheCell> {
        let cell: &dyn CacheCell = if slot == Caches::DRAW_SIZE {
            &self.draw_size
        } else if slot == Caches::AUTO_SIZE {
            &self.auto_size
        } else if slot == Caches::BOUNDING_SIZE {
            &self.bounding_size
        } else if slot == Caches::WORLD_TRANSFORM {
            &self.world_transform
        } else if slot == Caches::WORLD_BOUNDS {
            &self.world_bounds
        } else if slot == Caches::VISIBILITY {
            &self.visibility
        } else if slot == Caches::HANDLES_INPUT {
            &self.handles_input
        } else {
            return None;
        };
        Some(cell)
    }

    fn cell_mut(&mut self, slot: Caches) -> Option<&mut dyn CacheCell> {
        let cell: &mut dyn CacheCell = if slot == Caches::DRAW_SIZE {
            &mut self.draw_size
        } else if slot == Caches::AUTO_SIZE {
            &mut self.auto_size
        } else if slot == Caches::BOUNDING_SIZE {
            &mut self.bounding_size
        } else if slot == Caches::WORLD_TRANSFORM {
            &mut self.world_transform
        } else if slot == Caches::WORLD_BOUNDS {
            &mut self.world_bounds
        } else if slot == Caches::VISIBILITY {
            &mut self.visibility
        } else if slot == Caches::HANDLES_INPUT {
            &mut self.handles_input
        } else {
            return None;
        };
        Some(cell)
    }

    /// Invalidates `slots`, returning those that were valid.
    pub(crate) fn invalidate(&mut self, slots: Caches) -> Caches {
        let mut changed = Caches::empty();
        for slot in slots.iter() {
            if self.cell_mut(slot).is_some_and(|cell| cell.invalidate()) {
                changed |= slot;
            }
        }
        changed
    }

    pub(crate) fn valid(&self) -> Caches {
        Caches::all()
            .iter()
            .filter(|slot| self.cell(*slot).is_some_and(|cell| cell.is_valid()))
            .collect()
    }
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: SmallVec<[NodeId; 4]>,
    pub(crate) props: NodeProps,
    pub(crate) drawable: Box<dyn Drawable>,
    pub(crate) edges: &'static [InvalidationEdge],
    pub(crate) caches: NodeCaches,
    /// Last computed auto-size, kept across invalidation to detect changes.
    pub(crate) auto_extent: Size,
    pub(crate) alive: bool,
    /// This node or a descendant has invalid caches.
    pub(crate) subtree_dirty: bool,
    /// This node or a descendant has an invalid auto-size.
    pub(crate) layout_dirty: bool,
    /// A relatively sized child resolved its size against this node since
    /// the node's size last changed.
    pub(crate) extent_read: bool,
    liveness: Option<Arc<AtomicBool>>,
}

impl Node {
    pub(crate) fn is_present(&self) -> bool {
        self.alive && self.props.alpha > 0.0
    }

    pub(crate) fn autosizes(&self) -> bool {
        !self.props.auto_size_axes.is_empty()
    }

    /// Cache slots that carry meaning for this node.
    pub(crate) fn in_use(&self) -> Caches {
        if self.autosizes() {
            Caches::all()
        } else {
            Caches::all() - Caches::AUTO_SIZE
        }
    }

    /// Whether `parent`'s auto-size depends on this node.
    pub(crate) fn contributes_to(&self, parent: &Self) -> bool {
        !(parent.props.auto_size_axes - self.props.bypass_auto_size_axes).is_empty()
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// A tree of drawables with cached derived state.
///
/// Every node carries the cache slots listed in [`Caches`]. Changing a node
/// input invalidates the slots that depend on it, following the node's
/// [`InvalidationEdge`]s; nothing is recomputed until a value is read.
///
/// Reads come in two flavours:
///
/// - Pull: [`draw_size`](Self::draw_size), [`world_bounds`](Self::world_bounds)
///   and friends recompute the requested value and whatever it depends on.
/// - Push: [`validate`](Self::validate) (or [`update`](Self::update) once per
///   frame) walks the tree and recomputes every invalid slot, skipping
///   subtrees with nothing invalid. [`frame`](Self::frame) then lends a
///   read-only [`FrameView`](crate::FrameView) for rendering.
///
/// # Example
///
/// ```
/// use kurbo::Size;
/// use understory_scene::{Axes, Container, NodeProps, Quad, Scene};
///
/// let mut scene = Scene::new(Size::new(800.0, 600.0));
/// let group = scene.create(Container, NodeProps::auto_sized(Axes::BOTH));
/// let child = scene.create(Quad, NodeProps::sized(Size::new(200.0, 200.0)));
/// scene.add_child(scene.root(), group).unwrap();
/// scene.add_child(group, child).unwrap();
///
/// assert_eq!(scene.draw_size(group).unwrap(), Size::new(200.0, 200.0));
///
/// scene.set_size(child, Size::new(50.0, 50.0)).unwrap();
/// assert_eq!(scene.draw_size(group).unwrap(), Size::new(50.0, 50.0));
///
/// scene.remove(child).unwrap();
/// assert_eq!(scene.draw_size(group).unwrap(), Size::ZERO);
/// ```
#[derive(Debug)]
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    root: NodeId,
    time: f64,
    timed: HashSet<NodeId>,
    options: SceneOptions,
    counters: Arc<FrameCounters>,
    last_frame: FrameStats,
    recomputes: u64,
    /// Bumped on every effective invalidation.
    epoch: u64,
}

impl Scene {
    /// Creates a scene whose root is a [`Container`] of the given size.
    #[must_use]
    pub fn new(root_size: Size) -> Self {
        Self::with_options(root_size, SceneOptions::default())
    }

    /// Creates a scene with custom [`SceneOptions`].
    #[must_use]
    pub fn with_options(root_size: Size, options: SceneOptions) -> Self {
        let mut scene = Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            root: NodeId::new(0, 1),
            time: 0.0,
            timed: HashSet::new(),
            options,
            counters: Arc::new(FrameCounters::new()),
            last_frame: FrameStats::default(),
            recomputes: 0,
            epoch: 0,
        };
        scene.root = scene.create(Container, NodeProps::sized(root_size));
        scene
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The validation options.
    #[must_use]
    pub fn options(&self) -> &SceneOptions {
        &self.options
    }

    /// The scene time set by the last [`update`](Self::update).
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of live nodes, attached or not, including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Always `false`: a scene has at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Returns `true` if `id` refers to a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Shared handle to this scene's counters, for a reporting thread.
    #[must_use]
    pub fn counters(&self) -> Arc<FrameCounters> {
        Arc::clone(&self.counters)
    }

    /// Counters of the frame that ended at the last [`update`](Self::update).
    #[must_use]
    pub fn last_frame_stats(&self) -> FrameStats {
        self.last_frame
    }

    /// Creates a detached node.
    ///
    /// All of its caches start invalid. Attach it with
    /// [`add_child`](Self::add_child).
    pub fn create(&mut self, drawable: impl Drawable, props: NodeProps) -> NodeId {
        let drawable: Box<dyn Drawable> = Box::new(drawable);
        let edges = drawable.edges();
        debug_assert!(
            edges_notify_parent(edges),
            "{drawable:?}: edges that affect BOUNDING_SIZE must also invalidate the parent's AUTO_SIZE",
        );
        let timed = !props.lifetime.is_always();
        let node = Node {
            parent: None,
            children: SmallVec::new(),
            alive: props.lifetime.contains(self.time),
            props,
            drawable,
            edges,
            caches: NodeCaches::default(),
            auto_extent: Size::ZERO,
            subtree_dirty: true,
            layout_dirty: true,
            extent_read: false,
            liveness: None,
        };
        let id = self.allocate(node);
        if timed {
            self.timed.insert(id);
        }
        log::debug!("created node {id:?}");
        id
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "more than u32::MAX slots is not supported"
    )]
    fn allocate(&mut self, node: Node) -> NodeId {
        self.live += 1;
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node = Some(node);
            NodeId::new(idx, slot.generation)
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 1,
                node: Some(node),
            });
            NodeId::new(idx, 1)
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.slots
            .get(id.idx())
            .filter(|slot| slot.generation == id.1)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(SceneError::StaleNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.slots
            .get_mut(id.idx())
            .filter(|slot| slot.generation == id.1)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(SceneError::StaleNode(id))
    }

    pub(crate) fn child_at(&self, id: NodeId, index: usize) -> Result<Option<NodeId>, SceneError> {
        Ok(self.node(id)?.children.get(index).copied())
    }

    /// The parent of `id`, or `None` if detached (or the root).
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, SceneError> {
        Ok(self.node(id)?.parent)
    }

    /// The children of `id`, in draw order.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId], SceneError> {
        Ok(self.node(id)?.children.as_slice())
    }

    /// The inputs of `id`.
    pub fn props(&self, id: NodeId) -> Result<&NodeProps, SceneError> {
        Ok(&self.node(id)?.props)
    }

    /// The cache slots of `id` that currently hold a valid value.
    pub fn valid_caches(&self, id: NodeId) -> Result<Caches, SceneError> {
        Ok(self.node(id)?.caches.valid())
    }

    /// Returns `true` if `id` or one of its descendants has invalid caches
    /// that the next [`validate`](Self::validate) will visit.
    pub fn needs_validation(&self, id: NodeId) -> Result<bool, SceneError> {
        Ok(self.node(id)?.subtree_dirty)
    }

    /// Borrows the drawable of `id` as a `T`.
    pub fn drawable<T: Drawable>(&self, id: NodeId) -> Result<&T, SceneError> {
        let any: &dyn Any = &*self.node(id)?.drawable;
        any.downcast_ref::<T>().ok_or(SceneError::DrawableType {
            node: id,
            expected: type_name::<T>(),
        })
    }

    /// Mutates the drawable of `id` as a `T` and fires
    /// [`Invalidation::CONTENT`] on the node.
    pub fn update_drawable<T: Drawable, R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, SceneError> {
        let any: &mut dyn Any = &mut *self.node_mut(id)?.drawable;
        let drawable = any.downcast_mut::<T>().ok_or(SceneError::DrawableType {
            node: id,
            expected: type_name::<T>(),
        })?;
        let result = f(drawable);
        self.invalidate(id, Invalidation::CONTENT)?;
        Ok(result)
    }

    /// A token that turns dead when `id` is removed.
    pub fn liveness(&mut self, id: NodeId) -> Result<Liveness, SceneError> {
        let node = self.node_mut(id)?;
        let flag = node
            .liveness
            .get_or_insert_with(|| Arc::new(AtomicBool::new(true)));
        Ok(Liveness(Arc::clone(flag)))
    }

    // --- hierarchy ---

    /// Appends `child` to `parent`'s children.
    ///
    /// The child must be detached. Caches of the child's subtree that depend
    /// on ancestors are invalidated, and so is `parent`'s auto-size.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.check_attach(parent, child)?;
        if self.node(child)?.parent.is_some() {
            return Err(SceneError::hierarchy(
                Some(parent),
                child,
                HierarchyError::AlreadyParented,
            ));
        }
        self.attach(parent, child)
    }

    /// Moves `child` (attached or not) under `new_parent`.
    pub fn reparent(&mut self, child: NodeId, new_parent: NodeId) -> Result<(), SceneError> {
        self.check_attach(new_parent, child)?;
        match self.node(child)?.parent {
            Some(old) if old == new_parent => return Ok(()),
            Some(old) => self.unlink(old, child)?,
            None => {}
        }
        self.attach(new_parent, child)
    }

    /// Detaches `child` from its parent, keeping the subtree alive.
    ///
    /// The parent's auto-size is invalidated. The subtree's caches that
    /// depend on ancestors are left invalid until it is attached again.
    pub fn detach(&mut self, child: NodeId) -> Result<(), SceneError> {
        if child == self.root {
            return Err(SceneError::hierarchy(None, child, HierarchyError::Root));
        }
        let Some(parent) = self.node(child)?.parent else {
            return Ok(());
        };
        self.unlink(parent, child)?;
        self.invalidate_inherited(child)?;
        log::debug!("detached {child:?} from {parent:?}");
        Ok(())
    }

    /// Removes `id` and its whole subtree from the scene.
    ///
    /// The parent's auto-size is invalidated. Ids of removed nodes become
    /// stale and their [`Liveness`] tokens turn dead.
    pub fn remove(&mut self, id: NodeId) -> Result<(), SceneError> {
        if id == self.root {
            return Err(SceneError::hierarchy(None, id, HierarchyError::Root));
        }
        if let Some(parent) = self.node(id)?.parent {
            self.unlink(parent, id)?;
        }
        let mut stack = vec![id];
        let mut removed = 0_usize;
        while let Some(next) = stack.pop() {
            let slot = &mut self.slots[next.idx()];
            let Some(node) = slot.node.take() else {
                continue;
            };
            if let Some(flag) = &node.liveness {
                flag.store(false, Ordering::Release);
            }
            stack.extend(node.children.iter().copied());
            self.timed.remove(&next);
            self.free.push(next.0);
            self.live -= 1;
            removed += 1;
        }
        log::debug!("removed {id:?} ({removed} nodes)");
        Ok(())
    }

    fn check_attach(&self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.node(parent)?;
        self.node(child)?;
        let reject = |reason| Err(SceneError::hierarchy(Some(parent), child, reason));
        if child == self.root {
            return reject(HierarchyError::Root);
        }
        if parent == child {
            return reject(HierarchyError::SelfParent);
        }
        let mut ancestor = self.node(parent)?.parent;
        while let Some(id) = ancestor {
            if id == child {
                return reject(HierarchyError::WouldCycle);
            }
            ancestor = self.node(id)?.parent;
        }
        Ok(())
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        // No input changed, so nothing fired: invalidate what the new
        // ancestors feed into directly.
        self.invalidate_inherited(child)?;
        self.invalidate_parent(child, Caches::AUTO_SIZE)?;
        if self.node(child)?.subtree_dirty {
            self.mark_dirty(parent);
        }
        log::debug!("attached {child:?} to {parent:?}");
        Ok(())
    }

    fn unlink(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.invalidate_parent(child, Caches::AUTO_SIZE)?;
        self.node_mut(parent)?.children.retain(|c| *c != child);
        self.node_mut(child)?.parent = None;
        Ok(())
    }

    // --- setters ---

    fn set_prop<T: PartialEq>(
        &mut self,
        id: NodeId,
        invalidation: Invalidation,
        field: impl FnOnce(&mut NodeProps) -> &mut T,
        value: T,
    ) -> Result<bool, SceneError> {
        let slot = field(&mut self.node_mut(id)?.props);
        if *slot == value {
            return Ok(false);
        }
        *slot = value;
        self.invalidate(id, invalidation)?;
        Ok(true)
    }

    /// Sets the position in the parent's child space.
    pub fn set_position(&mut self, id: NodeId, position: Point) -> Result<(), SceneError> {
        self.set_prop(id, Invalidation::TRANSFORM, |p| &mut p.position, position)?;
        Ok(())
    }

    /// Sets the scale.
    pub fn set_scale(&mut self, id: NodeId, scale: Vec2) -> Result<(), SceneError> {
        self.set_prop(id, Invalidation::TRANSFORM, |p| &mut p.scale, scale)?;
        Ok(())
    }

    /// Sets the rotation in radians.
    pub fn set_rotation(&mut self, id: NodeId, rotation: f64) -> Result<(), SceneError> {
        self.set_prop(id, Invalidation::TRANSFORM, |p| &mut p.rotation, rotation)?;
        Ok(())
    }

    /// Sets the explicit size (a fraction on relative axes).
    ///
    /// Fails with [`SceneError::AutoSized`] if the size would change on an
    /// auto-sized axis.
    pub fn set_size(&mut self, id: NodeId, size: Size) -> Result<(), SceneError> {
        let props = &self.node(id)?.props;
        let auto = props.auto_size_axes;
        let conflicts = (auto.contains(Axes::X) && size.width != props.size.width)
            || (auto.contains(Axes::Y) && size.height != props.size.height);
        if conflicts {
            return Err(SceneError::AutoSized {
                node: id,
                axes: auto,
            });
        }
        self.set_prop(id, Invalidation::SIZE, |p| &mut p.size, size)?;
        Ok(())
    }

    /// Sets the opacity. Only crossing zero changes presence.
    pub fn set_alpha(&mut self, id: NodeId, alpha: f64) -> Result<(), SceneError> {
        let props = &mut self.node_mut(id)?.props;
        let was_present = props.alpha > 0.0;
        props.alpha = alpha;
        if was_present != (alpha > 0.0) {
            self.invalidate(id, Invalidation::PRESENCE)?;
        }
        Ok(())
    }

    /// Sets the padding around the children.
    pub fn set_padding(&mut self, id: NodeId, padding: Insets) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        if node.props.padding == padding {
            return Ok(());
        }
        node.props.padding = padding;
        self.invalidate_slots(id, Caches::AUTO_SIZE)?;
        // The children's space moved and, for relative children, resized.
        let mut i = 0;
        while let Some(child) = self.child_at(id, i)? {
            i += 1;
            let mut invalidation = Invalidation::TRANSFORM;
            if !self.node(child)?.props.relative_size_axes.is_empty() {
                invalidation |= Invalidation::SIZE;
            }
            self.invalidate(child, invalidation)?;
        }
        Ok(())
    }

    /// Sets the axes on which the node takes its size from its children.
    pub fn set_auto_size_axes(&mut self, id: NodeId, axes: Axes) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        if node.props.auto_size_axes == axes {
            return Ok(());
        }
        node.props.auto_size_axes = axes;
        self.invalidate_slots(id, Caches::AUTO_SIZE)?;
        self.invalidate(id, Invalidation::SIZE)?;
        Ok(())
    }

    /// Sets the axes on which an auto-sizing parent ignores this node.
    pub fn set_bypass_auto_size_axes(&mut self, id: NodeId, axes: Axes) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        if node.props.bypass_auto_size_axes == axes {
            return Ok(());
        }
        let flipped = node.props.bypass_auto_size_axes ^ axes;
        node.props.bypass_auto_size_axes = axes;
        let parent = node.parent;
        if flipped.intersects(node.props.relative_size_axes) {
            // A relative axis now resolves differently against an
            // auto-sizing parent.
            self.invalidate(id, Invalidation::SIZE)?;
        }
        if let Some(parent) = parent {
            self.invalidate_slots(parent, Caches::AUTO_SIZE)?;
        }
        Ok(())
    }

    /// Sets the axes on which the size is a fraction of the parent's.
    pub fn set_relative_size_axes(&mut self, id: NodeId, axes: Axes) -> Result<(), SceneError> {
        self.set_prop(id, Invalidation::SIZE, |p| &mut p.relative_size_axes, axes)?;
        Ok(())
    }

    /// Sets the lifetime and whether the node is removed when it ends.
    pub fn set_lifetime(
        &mut self,
        id: NodeId,
        lifetime: Lifetime,
        remove_when_expired: bool,
    ) -> Result<(), SceneError> {
        let time = self.time;
        let node = self.node_mut(id)?;
        node.props.lifetime = lifetime;
        node.props.remove_when_expired = remove_when_expired;
        let alive = lifetime.contains(time);
        let changed = node.alive != alive;
        node.alive = alive;
        if lifetime.is_always() {
            self.timed.remove(&id);
        } else {
            self.timed.insert(id);
        }
        if changed {
            self.invalidate(id, Invalidation::PRESENCE)?;
        }
        Ok(())
    }

    pub(crate) fn record_validation(&mut self) {
        self.recomputes += 1;
        self.counters.record_validation();
    }
}
