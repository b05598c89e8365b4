// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-type drawable capability and the built-in drawables.

use core::any::Any;
use core::fmt;

use kurbo::Size;
use understory_cache::Cached;

use crate::error::BoxError;
use crate::types::{DEFAULT_EDGES, Invalidation, InvalidationEdge};

/// The type-specific part of a scene node.
///
/// The scene owns geometry, hierarchy, and the standard caches. A drawable
/// contributes what varies by type: which inputs invalidate which caches
/// ([`edges`](Self::edges)), how the final draw size is measured
/// ([`measure`](Self::measure)), and any caches of its own
/// ([`on_invalidate`](Self::on_invalidate)).
///
/// # Example
///
/// ```
/// use kurbo::Size;
/// use understory_scene::{BoxError, Drawable, NodeProps, Scene};
///
/// /// A box that never gets smaller than 16x16.
/// #[derive(Debug)]
/// struct MinBox;
///
/// impl Drawable for MinBox {
///     fn measure(&mut self, resolved: Size) -> Result<Size, BoxError> {
///         Ok(Size::new(resolved.width.max(16.0), resolved.height.max(16.0)))
///     }
/// }
///
/// let mut scene = Scene::new(Size::new(100.0, 100.0));
/// let node = scene.create(MinBox, NodeProps::sized(Size::new(4.0, 40.0)));
/// scene.add_child(scene.root(), node).unwrap();
/// assert_eq!(scene.draw_size(node).unwrap(), Size::new(16.0, 40.0));
/// ```
pub trait Drawable: Any + fmt::Debug + Send {
    /// The invalidation edges of this type.
    ///
    /// Read once when the node is created.
    fn edges(&self) -> &'static [InvalidationEdge] {
        DEFAULT_EDGES
    }

    /// Computes the final draw size from the size resolved from explicit,
    /// relative, and auto-sized axes.
    ///
    /// Called only when the node's draw size is invalid. An error leaves the
    /// draw size invalid; the next read calls `measure` again.
    fn measure(&mut self, resolved: Size) -> Result<Size, BoxError> {
        Ok(resolved)
    }

    /// Invalidates caches owned by the drawable itself.
    ///
    /// Returns `true` if any of them transitioned from valid to invalid.
    fn on_invalidate(&mut self, invalidation: Invalidation) -> bool {
        let _ = invalidation;
        false
    }

    /// Whether nodes of this type handle positional input.
    ///
    /// This is a fact about the type: the scene asks the first instance it
    /// sees and memoizes the answer per type for the whole process.
    fn handles_input(&self) -> bool {
        false
    }
}

/// A drawable that only groups children.
#[derive(Copy, Clone, Debug, Default)]
pub struct Container;

impl Drawable for Container {}

/// A plain filled box.
#[derive(Copy, Clone, Debug, Default)]
pub struct Quad;

impl Drawable for Quad {}

/// A box that receives positional input.
#[derive(Copy, Clone, Debug, Default)]
pub struct Clickable;

impl Drawable for Clickable {
    fn handles_input(&self) -> bool {
        true
    }
}

/// Monospaced single-style text.
///
/// The label's draw size is the size of its text, independent of the
/// explicit size. Text layout is cached separately and only redone when the
/// text or metrics change; change them through
/// [`Scene::update_drawable`](crate::Scene::update_drawable) so the scene
/// hears about it.
#[derive(Clone, Debug)]
pub struct Label {
    text: String,
    advance: f64,
    line_height: f64,
    layout: Cached<Size>,
    layouts: u64,
}

impl Label {
    /// Creates a label with the given glyph advance and line height.
    #[must_use]
    pub fn new(text: impl Into<String>, advance: f64, line_height: f64) -> Self {
        Self {
            text: text.into(),
            advance,
            line_height,
            layout: Cached::new(),
            layouts: 0,
        }
    }

    /// The text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Replaces the glyph advance and line height.
    pub fn set_metrics(&mut self, advance: f64, line_height: f64) {
        self.advance = advance;
        self.line_height = line_height;
    }

    /// Number of times the text has been laid out.
    #[must_use]
    pub fn layouts(&self) -> u64 {
        self.layouts
    }

    fn layout_text(&self) -> Result<Size, BoxError> {
        if !(self.advance.is_finite() && self.line_height.is_finite())
            || self.advance < 0.0
            || self.line_height < 0.0
        {
            return Err(format!(
                "invalid font metrics: advance {}, line height {}",
                self.advance, self.line_height
            )
            .into());
        }
        let mut columns = 0_usize;
        let mut lines = 0_usize;
        for line in self.text.lines() {
            columns = columns.max(line.chars().count());
            lines += 1;
        }
        Ok(Size::new(
            columns as f64 * self.advance,
            lines as f64 * self.line_height,
        ))
    }
}

impl Drawable for Label {
    fn measure(&mut self, _resolved: Size) -> Result<Size, BoxError> {
        if let Ok(size) = self.layout.get() {
            return Ok(*size);
        }
        let size = self.layout_text()?;
        self.layouts += 1;
        Ok(*self.layout.validate(size))
    }

    fn on_invalidate(&mut self, invalidation: Invalidation) -> bool {
        invalidation.contains(Invalidation::CONTENT) && self.layout.invalidate()
    }
}
