// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Read-only access to a validated scene, for renderers.

use kurbo::{Affine, Rect, Size};

use crate::error::SceneError;
use crate::scene::{PassStats, Scene};
use crate::types::{Caches, NodeId};

/// One visible node, as a renderer sees it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawItem {
    /// The node.
    pub node: NodeId,
    /// Node space to scene space.
    pub world_transform: Affine,
    /// Size of the drawing area in node space.
    pub draw_size: Size,
    /// Scene-space bounding box of the drawing area.
    pub world_bounds: Rect,
    /// The node's own opacity.
    pub alpha: f64,
}

/// A validated scene, borrowed for rendering.
///
/// Obtained from [`Scene::frame`]. While a `FrameView` exists the scene
/// cannot be mutated, so every cache it reads stays valid. It never
/// invalidates or recomputes anything.
#[derive(Debug)]
pub struct FrameView<'a> {
    scene: &'a Scene,
    stats: PassStats,
}

impl Scene {
    /// Validates the scene and lends it out for rendering.
    pub fn frame(&mut self) -> Result<FrameView<'_>, SceneError> {
        let stats = self.validate()?;
        Ok(FrameView { scene: self, stats })
    }
}

impl<'a> FrameView<'a> {
    /// The scene.
    #[must_use]
    pub fn scene(&self) -> &'a Scene {
        self.scene
    }

    /// What the validation pass before this frame did.
    #[must_use]
    pub fn stats(&self) -> PassStats {
        self.stats
    }

    /// Visible nodes in draw order (pre-order, children after their parent).
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::Cache`] if a visible node has an invalid cache,
    /// which indicates a bug in validation rather than a recoverable state.
    pub fn draw_list(&self) -> Result<Vec<DrawItem>, SceneError> {
        let mut items = Vec::new();
        let mut stack = vec![self.scene.root()];
        while let Some(id) = stack.pop() {
            let node = self.scene.node(id)?;
            let caches = &node.caches;
            let visible = caches
                .visibility
                .get()
                .map_err(SceneError::cache(id, Caches::VISIBILITY))?;
            if !visible {
                continue;
            }
            items.push(DrawItem {
                node: id,
                world_transform: *caches
                    .world_transform
                    .get()
                    .map_err(SceneError::cache(id, Caches::WORLD_TRANSFORM))?,
                draw_size: *caches
                    .draw_size
                    .get()
                    .map_err(SceneError::cache(id, Caches::DRAW_SIZE))?,
                world_bounds: *caches
                    .world_bounds
                    .get()
                    .map_err(SceneError::cache(id, Caches::WORLD_BOUNDS))?,
                alpha: node.props.alpha,
            });
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(items)
    }
}
