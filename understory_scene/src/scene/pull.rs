// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! On-demand reads: each accessor recomputes what it needs, recursively.

use core::any::Any;

use kurbo::{Affine, Point, Rect, Size};
use understory_cache::{CacheCell, CacheError, ValueCell};

use super::{NodeCaches, Scene};
use crate::error::SceneError;
use crate::memo::INPUT_HANDLERS;
use crate::types::{Axes, Caches, Invalidation, NodeId};

impl Scene {
    /// The final size of `id`'s drawing area.
    pub fn draw_size(&mut self, id: NodeId) -> Result<Size, SceneError> {
        self.ensure_draw(id)
    }

    /// The space `id` occupies in its parent's child space, measured from the
    /// parent's child-space origin. Zero when the node is not present.
    pub fn bounding_size(&mut self, id: NodeId) -> Result<Size, SceneError> {
        self.ensure_bounding(id)
    }

    /// The extent of `id`'s children plus padding, or `None` if `id` does not
    /// auto-size.
    pub fn auto_size(&mut self, id: NodeId) -> Result<Option<Size>, SceneError> {
        if !self.node(id)?.autosizes() {
            return Ok(None);
        }
        self.ensure_auto(id).map(Some)
    }

    /// The transform from `id`'s space to scene space.
    pub fn world_transform(&mut self, id: NodeId) -> Result<Affine, SceneError> {
        self.ensure_world_transform(id)
    }

    /// The scene-space bounding box of `id`'s drawing area.
    pub fn world_bounds(&mut self, id: NodeId) -> Result<Rect, SceneError> {
        self.ensure_world_bounds(id)
    }

    /// Whether `id` and all its ancestors are present.
    pub fn is_visible(&mut self, id: NodeId) -> Result<bool, SceneError> {
        self.ensure_visibility(id)
    }

    /// Whether `id`'s drawable type handles positional input.
    pub fn handles_input(&mut self, id: NodeId) -> Result<bool, SceneError> {
        self.ensure_handles_input(id)
    }

    /// Returns the cell's value, recomputing it with `compute` if invalid.
    ///
    /// The recompute is bracketed by the cell's re-entrancy guard and the
    /// node is looked up again before storing, in case `compute` removed it.
    fn ensure<C: ValueCell>(
        &mut self,
        id: NodeId,
        cache: Caches,
        cell: fn(&mut NodeCaches) -> &mut C,
        compute: impl FnOnce(&mut Self, NodeId) -> Result<C::Value, SceneError>,
    ) -> Result<C::Value, SceneError> {
        {
            let slot = cell(&mut self.node_mut(id)?.caches);
            if let Ok(value) = slot.read() {
                return Ok(value);
            }
            slot.begin_refresh().map_err(SceneError::cache(id, cache))?;
        }
        let result = compute(self, id);
        let slot = cell(&mut self.node_mut(id)?.caches);
        slot.end_refresh();
        let value = result?;
        slot.store(value);
        self.record_validation();
        Ok(value)
    }

    /// Brings the auto-size of `id` up to date.
    ///
    /// Children whose layout may have changed are settled first; if that
    /// invalidates this node's auto-size, it is recomputed. A changed result
    /// fires [`Invalidation::SIZE`] on `id`, which in turn reaches the
    /// parent's auto-size, one hop.
    pub(crate) fn ensure_auto(&mut self, id: NodeId) -> Result<Size, SceneError> {
        let node = self.node_mut(id)?;
        let settled = node.caches.auto_size.read().ok().filter(|_| !node.layout_dirty);
        if let Some(size) = settled {
            return Ok(size);
        }
        node.caches
            .auto_size
            .begin_refresh()
            .map_err(SceneError::cache(id, Caches::AUTO_SIZE))?;
        let result = self.refresh_auto(id);
        if let Ok(node) = self.node_mut(id) {
            node.caches.auto_size.end_refresh();
        }
        result
    }

    fn refresh_auto(&mut self, id: NodeId) -> Result<Size, SceneError> {
        let mut i = 0;
        while let Some(child) = self.child_at(id, i)? {
            i += 1;
            let node = self.node(child)?;
            let pending = node.layout_dirty || !node.caches.bounding_size.is_valid();
            if pending && node.contributes_to(self.node(id)?) {
                self.ensure_bounding(child)?;
            }
        }

        let node = self.node(id)?;
        if let Ok(size) = node.caches.auto_size.read() {
            self.node_mut(id)?.layout_dirty = false;
            return Ok(size);
        }

        let mut extent = Size::ZERO;
        for &child in &node.children {
            let child_node = self.node(child)?;
            if !child_node.contributes_to(node) {
                continue;
            }
            let bounds = child_node
                .caches
                .bounding_size
                .read()
                .map_err(SceneError::cache(child, Caches::BOUNDING_SIZE))?;
            let bypass = child_node.props.bypass_auto_size_axes;
            if !bypass.contains(Axes::X) {
                extent.width = extent.width.max(bounds.width);
            }
            if !bypass.contains(Axes::Y) {
                extent.height = extent.height.max(bounds.height);
            }
        }
        let padding = node.props.padding;
        extent.width += padding.x_value();
        extent.height += padding.y_value();
        let changed = node.auto_extent != extent;

        let node = self.node_mut(id)?;
        node.auto_extent = extent;
        node.layout_dirty = false;
        node.caches.auto_size.validate(extent);
        self.record_validation();
        if changed {
            log::trace!("{id:?}: auto-size changed to {extent:?}");
            self.invalidate(id, Invalidation::SIZE)?;
        }
        Ok(extent)
    }

    /// The size of `id` along `axis` before the drawable measures it.
    ///
    /// A relative axis that the parent auto-sizes resolves against the
    /// parent's last auto-size, which [`settle_auto`](Self::settle_auto) brings
    /// up to date first. That is only sound when `id` bypasses the axis;
    /// otherwise the two sizes define each other and the read fails with
    /// [`CacheError::Cyclic`] on the parent's auto-size.
    fn resolved_extent(&mut self, id: NodeId, axis: Axes) -> Result<f64, SceneError> {
        let node = self.node(id)?;
        if node.props.auto_size_axes.contains(axis) {
            return Ok(axis.extent(self.ensure_auto(id)?));
        }
        let size = axis.extent(node.props.size);
        if !node.props.relative_size_axes.contains(axis) {
            return Ok(size);
        }
        let Some(parent) = node.parent else {
            return Ok(0.0);
        };
        let bypassed = node.props.bypass_auto_size_axes.contains(axis);
        let parent_node = self.node_mut(parent)?;
        parent_node.extent_read = true;
        let padding = parent_node.props.padding;
        let padding = if axis == Axes::X {
            padding.x_value()
        } else {
            padding.y_value()
        };
        let extent = if parent_node.props.auto_size_axes.contains(axis) {
            if !bypassed {
                return Err(SceneError::Cache {
                    node: parent,
                    cache: Caches::AUTO_SIZE,
                    source: CacheError::Cyclic,
                });
            }
            axis.extent(parent_node.auto_extent)
        } else {
            self.resolved_extent(parent, axis)?
        };
        Ok((extent - padding).max(0.0) * size)
    }

    /// Brings the auto-sizes `id`'s size is resolved from up to date: its
    /// own, and those of the ancestors its relative axes reach.
    ///
    /// Ancestors are settled here, before `id`'s own recompute starts, since
    /// settling them may measure `id`. An ancestor already recomputing its
    /// auto-size is left alone; it fires [`Invalidation::SIZE`] on itself if
    /// the result moves, which reaches `id` again.
    fn settle_auto(&mut self, id: NodeId) -> Result<(), SceneError> {
        let node = self.node(id)?;
        let autosizes = node.autosizes();
        let mut axes = node.props.relative_size_axes - node.props.auto_size_axes;
        let mut next = node.parent;
        while let Some(parent) = next.filter(|_| !axes.is_empty()) {
            let parent_node = self.node(parent)?;
            let auto = parent_node.props.auto_size_axes;
            let relative = parent_node.props.relative_size_axes;
            next = parent_node.parent;
            if auto.intersects(axes) && !parent_node.caches.auto_size.is_refreshing() {
                self.ensure_auto(parent)?;
            }
            axes = (axes - auto) & relative;
        }
        if autosizes {
            self.ensure_auto(id)?;
        }
        Ok(())
    }

    pub(crate) fn ensure_draw(&mut self, id: NodeId) -> Result<Size, SceneError> {
        self.settle_auto(id)?;
        self.ensure(
            id,
            Caches::DRAW_SIZE,
            |c| &mut c.draw_size,
            |scene, id| {
                let resolved = Size::new(
                    scene.resolved_extent(id, Axes::X)?,
                    scene.resolved_extent(id, Axes::Y)?,
                );
                scene
                    .node_mut(id)?
                    .drawable
                    .measure(resolved)
                    .map_err(|source| SceneError::Recompute {
                        node: id,
                        cache: Caches::DRAW_SIZE,
                        source,
                    })
            },
        )
    }

    pub(crate) fn ensure_bounding(&mut self, id: NodeId) -> Result<Size, SceneError> {
        if self.node(id)?.is_present() {
            self.ensure_draw(id)?;
        }
        self.ensure(
            id,
            Caches::BOUNDING_SIZE,
            |c| &mut c.bounding_size,
            |scene, id| {
                if !scene.node(id)?.is_present() {
                    return Ok(Size::ZERO);
                }
                let draw = scene.ensure_draw(id)?;
                let local = scene.node(id)?.props.local_transform();
                let bbox = local.transform_rect_bbox(Rect::from_origin_size(Point::ZERO, draw));
                Ok(Size::new(bbox.x1.max(0.0), bbox.y1.max(0.0)))
            },
        )
    }

    pub(crate) fn ensure_world_transform(&mut self, id: NodeId) -> Result<Affine, SceneError> {
        self.ensure(
            id,
            Caches::WORLD_TRANSFORM,
            |c| &mut c.world_transform,
            |scene, id| {
                let node = scene.node(id)?;
                let local = node.props.local_transform();
                let Some(parent) = node.parent else {
                    return Ok(local);
                };
                let padding = scene.node(parent)?.props.padding;
                let parent_world = scene.ensure_world_transform(parent)?;
                Ok(parent_world * Affine::translate((padding.x0, padding.y0)) * local)
            },
        )
    }

    pub(crate) fn ensure_world_bounds(&mut self, id: NodeId) -> Result<Rect, SceneError> {
        self.settle_auto(id)?;
        self.ensure(
            id,
            Caches::WORLD_BOUNDS,
            |c| &mut c.world_bounds,
            |scene, id| {
                let draw = scene.ensure_draw(id)?;
                let world = scene.ensure_world_transform(id)?;
                Ok(world.transform_rect_bbox(Rect::from_origin_size(Point::ZERO, draw)))
            },
        )
    }

    pub(crate) fn ensure_visibility(&mut self, id: NodeId) -> Result<bool, SceneError> {
        self.ensure(
            id,
            Caches::VISIBILITY,
            |c| &mut c.visibility,
            |scene, id| {
                let node = scene.node(id)?;
                if !node.is_present() {
                    return Ok(false);
                }
                match node.parent {
                    Some(parent) => scene.ensure_visibility(parent),
                    // Detached subtrees are never visible.
                    None => Ok(id == scene.root),
                }
            },
        )
    }

    pub(crate) fn ensure_handles_input(&mut self, id: NodeId) -> Result<bool, SceneError> {
        self.ensure(
            id,
            Caches::HANDLES_INPUT,
            |c| &mut c.handles_input,
            |scene, id| {
                let drawable = &*scene.node(id)?.drawable;
                let any: &dyn Any = drawable;
                Ok(INPUT_HANDLERS.get_or_insert_with(any.type_id(), || drawable.handles_input()))
            },
        )
    }
}
