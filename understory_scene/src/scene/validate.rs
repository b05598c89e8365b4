// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-frame validation pass.

use super::Scene;
use crate::error::SceneError;
use crate::types::{Invalidation, NodeId};

/// What a validation pass did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Nodes visited because they or a descendant had invalid caches.
    pub visited: usize,
    /// Nodes skipped because nothing in their subtree was invalid.
    pub skipped: usize,
    /// Cache slots recomputed.
    pub recomputed: u64,
    /// Extra child passes caused by a node's layout invalidating its children.
    pub relayouts: usize,
    /// Nodes that hit [`SceneOptions::max_layout_passes`](crate::SceneOptions::max_layout_passes).
    pub pass_limit_hits: usize,
}

impl Scene {
    /// Recomputes every invalid cache of the visible tree.
    ///
    /// Caches that depend on ancestors (world transform, visibility) are
    /// computed on the way down, caches that depend on descendants
    /// (auto-size, draw size, bounding size, world bounds) on the way up.
    /// Subtrees with no invalid caches are skipped without being entered.
    pub fn validate(&mut self) -> Result<PassStats, SceneError> {
        let before = self.recomputes;
        let mut stats = PassStats::default();
        self.validate_node(self.root, &mut stats)?;
        stats.recomputed = self.recomputes - before;
        log::debug!("validation pass: {stats:?}");
        Ok(stats)
    }

    /// Advances the scene to `time` and validates it.
    ///
    /// This is the per-frame entry point. It closes the previous frame's
    /// counters (see [`last_frame_stats`](Self::last_frame_stats)), applies
    /// lifetimes (nodes entering or leaving their lifetime change presence;
    /// expired nodes marked `remove_when_expired` are removed) and then runs
    /// [`validate`](Self::validate).
    pub fn update(&mut self, time: f64) -> Result<PassStats, SceneError> {
        self.last_frame = self.counters.take();
        self.time = time;
        let root = self.root;

        let mut timed: Vec<NodeId> = self.timed.iter().copied().collect();
        timed.sort_unstable();
        for id in timed {
            let Ok(node) = self.node_mut(id) else {
                // Removed along with an expired ancestor.
                continue;
            };
            let lifetime = node.props.lifetime;
            if lifetime.has_ended(time) && node.props.remove_when_expired && id != root {
                log::debug!("{id:?} expired");
                self.remove(id)?;
                continue;
            }
            let alive = lifetime.contains(time);
            if node.alive != alive {
                node.alive = alive;
                self.invalidate(id, Invalidation::PRESENCE)?;
            }
        }

        self.validate()
    }

    fn validate_node(&mut self, id: NodeId, stats: &mut PassStats) -> Result<(), SceneError> {
        if !self.node(id)?.subtree_dirty {
            stats.skipped += 1;
            return Ok(());
        }
        stats.visited += 1;

        self.ensure_world_transform(id)?;
        let visible = self.ensure_visibility(id)?;
        if visible || self.options.validate_hidden_subtrees {
            let mut pass = 1;
            loop {
                let mut i = 0;
                while let Some(child) = self.child_at(id, i)? {
                    i += 1;
                    self.validate_node(child, stats)?;
                }
                let epoch = self.epoch;
                self.validate_layout(id)?;
                if self.epoch == epoch || !self.any_child_dirty(id)? {
                    break;
                }
                if pass >= self.options.max_layout_passes {
                    log::warn!(
                        "{id:?}: layout did not settle after {pass} passes; continuing next frame"
                    );
                    stats.pass_limit_hits += 1;
                    break;
                }
                pass += 1;
                stats.relayouts += 1;
            }
        } else {
            // Not present: its bounding size is zero and nothing below is drawn.
            self.ensure_bounding(id)?;
        }
        self.ensure_handles_input(id)?;

        let settled = {
            let node = self.node(id)?;
            let in_use = node.in_use();
            node.caches.valid().contains(in_use)
        };
        if settled && !self.any_child_dirty(id)? {
            self.node_mut(id)?.subtree_dirty = false;
        }
        Ok(())
    }

    fn validate_layout(&mut self, id: NodeId) -> Result<(), SceneError> {
        if self.node(id)?.autosizes() {
            self.ensure_auto(id)?;
        }
        self.ensure_draw(id)?;
        self.ensure_bounding(id)?;
        self.ensure_world_bounds(id)?;
        Ok(())
    }

    fn any_child_dirty(&self, id: NodeId) -> Result<bool, SceneError> {
        let node = self.node(id)?;
        for &child in &node.children {
            if self.node(child)?.subtree_dirty {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
