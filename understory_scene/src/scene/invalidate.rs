// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Firing invalidation edges.

use smallvec::{SmallVec, smallvec};

use super::Scene;
use crate::error::SceneError;
use crate::types::{Caches, Invalidation, NodeId, Propagation};

impl Scene {
    /// Fires `invalidation` on `id`, invalidating every cache slot reached by
    /// the node's edges.
    ///
    /// Returns `false` if the node's own caches were already invalid for this
    /// input, in which case nothing is propagated: whatever the edges reach
    /// was invalidated when those caches became invalid.
    ///
    /// Setters call this for you; call it directly when a drawable's inputs
    /// change outside the scene's knowledge.
    pub fn invalidate(&mut self, id: NodeId, invalidation: Invalidation) -> Result<bool, SceneError> {
        let edges = self.node(id)?.edges;
        let local = edges
            .iter()
            .filter(|e| e.propagation == Propagation::Local && e.trigger.intersects(invalidation))
            .fold(Caches::empty(), |acc, e| acc | e.affects);

        let changed = self.invalidate_slots(id, local)?;
        let node = self.node_mut(id)?;
        let own = node.drawable.on_invalidate(invalidation);
        let readers = resizes(invalidation) && core::mem::take(&mut node.extent_read);
        if own {
            self.mark_dirty(id);
        }
        if changed.is_empty() && !own && !readers {
            log::trace!("{id:?}: {invalidation:?} already applied");
            return Ok(false);
        }
        log::trace!("{id:?}: {invalidation:?} invalidated {changed:?}");

        for edge in edges {
            let fired = edge.trigger & invalidation;
            if fired.is_empty() {
                continue;
            }
            match edge.propagation {
                Propagation::Local => {}
                Propagation::Parent => self.invalidate_parent(id, edge.affects)?,
                Propagation::Children => self.push_down(id, fired, edge.affects, false)?,
                Propagation::Subtree => self.push_down(id, fired, edge.affects, true)?,
            }
        }
        Ok(true)
    }

    /// Invalidates `slots` on `id` alone, returning the slots that were valid.
    pub(crate) fn invalidate_slots(&mut self, id: NodeId, slots: Caches) -> Result<Caches, SceneError> {
        let node = self.node_mut(id)?;
        let slots = slots & node.in_use();
        let changed = node.caches.invalidate(slots);
        for slot in slots.iter() {
            self.counters.record_invalidation(changed.contains(slot));
        }
        if !changed.is_empty() {
            self.epoch += 1;
            self.mark_dirty(id);
            if changed.contains(Caches::AUTO_SIZE) {
                self.mark_layout_dirty(id);
            }
        }
        Ok(changed)
    }

    /// Invalidates `slots` on the parent of `child`, one hop.
    ///
    /// The parent's auto-size is only touched if `child` contributes to it.
    pub(crate) fn invalidate_parent(&mut self, child: NodeId, mut slots: Caches) -> Result<(), SceneError> {
        let node = self.node(child)?;
        let Some(parent) = node.parent else {
            return Ok(());
        };
        if !node.contributes_to(self.node(parent)?) {
            slots.remove(Caches::AUTO_SIZE);
        }
        self.invalidate_slots(parent, slots)?;
        Ok(())
    }

    /// Invalidates `slots` on the children of `origin` that inherit `trigger`,
    /// and with `recursive`, on their descendants.
    ///
    /// Recursion stops below a child whose slots were all invalid already,
    /// unless a relatively sized grandchild read its size since.
    fn push_down(
        &mut self,
        origin: NodeId,
        trigger: Invalidation,
        slots: Caches,
        recursive: bool,
    ) -> Result<(), SceneError> {
        let mut stack: SmallVec<[NodeId; 8]> = smallvec![origin];
        while let Some(parent) = stack.pop() {
            let mut i = 0;
            while let Some(child) = self.child_at(parent, i)? {
                i += 1;
                let node = self.node(child)?;
                if !node.props.inherits().intersects(trigger) {
                    continue;
                }
                let contributes = node.contributes_to(self.node(parent)?);
                let changed = self.invalidate_slots(child, slots)?;
                let readers =
                    resizes(trigger) && core::mem::take(&mut self.node_mut(child)?.extent_read);
                // A relatively sized child resized: its parent's auto-size
                // hears about it here, since no edge of the child fired.
                if contributes && changed.contains(Caches::BOUNDING_SIZE) {
                    self.invalidate_slots(parent, Caches::AUTO_SIZE)?;
                }
                if recursive && (!changed.is_empty() || readers) {
                    stack.push(child);
                }
            }
        }
        Ok(())
    }

    /// Invalidates the caches of `top`'s subtree that derive from ancestors.
    ///
    /// Used when the subtree is attached or detached: no input of the
    /// subtree changed, but its ancestry did.
    pub(crate) fn invalidate_inherited(&mut self, top: NodeId) -> Result<(), SceneError> {
        let mut stack = vec![top];
        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            let relative = !node.props.relative_size_axes.is_empty();
            let mut slots = Caches::WORLD_TRANSFORM | Caches::WORLD_BOUNDS | Caches::VISIBILITY;
            if relative {
                slots |= Caches::DRAW_SIZE | Caches::BOUNDING_SIZE;
            }
            stack.extend(node.children.iter().copied());
            self.invalidate_slots(id, slots)?;
            if relative && id != top {
                self.invalidate_parent(id, Caches::AUTO_SIZE)?;
            }
        }
        Ok(())
    }

    /// Flags `id` and its ancestors as needing a validation visit.
    pub(crate) fn mark_dirty(&mut self, id: NodeId) {
        let mut next = Some(id);
        while let Some(id) = next {
            let Ok(node) = self.node_mut(id) else {
                break;
            };
            if node.subtree_dirty {
                break;
            }
            node.subtree_dirty = true;
            next = node.parent;
        }
    }

    /// Flags `id` and its ancestors as having a pending auto-size below.
    fn mark_layout_dirty(&mut self, id: NodeId) {
        let mut next = Some(id);
        while let Some(id) = next {
            let Ok(node) = self.node_mut(id) else {
                break;
            };
            if node.layout_dirty {
                break;
            }
            node.layout_dirty = true;
            next = node.parent;
        }
    }
}

/// Whether `invalidation` can change the extent relatively sized children
/// resolve against.
fn resizes(invalidation: Invalidation) -> bool {
    invalidation.intersects(Invalidation::SIZE | Invalidation::CONTENT)
}
