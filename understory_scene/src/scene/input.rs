// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Positional input queries.

use kurbo::Point;

use super::Scene;
use crate::error::SceneError;
use crate::types::NodeId;

impl Scene {
    /// Nodes that should receive positional input at `point`, topmost first.
    ///
    /// A node qualifies when it is visible, its drawable type handles input,
    /// and its world bounds contain the point. Hidden subtrees are not
    /// entered. Values are pulled, so the scene does not need to be validated
    /// first.
    pub fn positional_input_queue(&mut self, point: Point) -> Result<Vec<NodeId>, SceneError> {
        let mut queue = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if !self.ensure_visibility(id)? {
                continue;
            }
            if self.ensure_handles_input(id)? && self.ensure_world_bounds(id)?.contains(point) {
                queue.push(id);
            }
            stack.extend(self.node(id)?.children.iter().rev().copied());
        }
        // Pre-order is draw order; the last drawn is on top.
        queue.reverse();
        Ok(queue)
    }
}
