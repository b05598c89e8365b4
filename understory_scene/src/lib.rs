// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Scene: a drawable scene graph with declarative invalidation.
//!
//! Every node of a [`Scene`] derives state from its inputs and from its
//! relatives: a draw size, the size it occupies in its parent, an auto-size
//! computed from its children, a world transform, world bounds, visibility,
//! and whether it handles input. Each of these lives in a cache cell from
//! [`understory_cache`]. Changing an input invalidates exactly the cells that
//! depend on it; nothing is recomputed until it is read.
//!
//! ## Invalidation edges
//!
//! Which cells an input reaches is declared per drawable type as a table of
//! [`InvalidationEdge`]s: an input kind ([`Invalidation`]), a direction
//! ([`Propagation`]), and the cache slots it affects ([`Caches`]).
//!
//! - `Local` edges invalidate the node's own cells.
//! - `Parent` edges invalidate cells of the immediate parent, one hop only.
//!   This is how a child's size change reaches an auto-sizing container. The
//!   container recomputes its auto-size when next read and, only if the result
//!   changed, fires a size change of its own, which reaches *its* parent. A
//!   change bubbles up exactly as far as it has an effect.
//! - `Children` and `Subtree` edges invalidate cells below the node, for state
//!   derived from ancestors such as world transforms.
//!
//! Propagation stops at cells that were already invalid: if the cells an
//! input affects were invalid before, everything downstream of them already
//! is too. Repeated changes to the same input between two reads cost O(1).
//!
//! ## Pull and push
//!
//! Accessors such as [`Scene::draw_size`] and [`Scene::world_bounds`] pull:
//! they recompute the requested cell and, recursively, whatever it reads.
//! [`Scene::validate`] pushes: it walks the tree computing ancestor-derived
//! cells on the way down and descendant-derived cells on the way up, and
//! skips every subtree that has nothing invalid. [`Scene::update`] is the
//! per-frame driver that also applies lifetimes, and [`Scene::frame`] lends a
//! read-only [`FrameView`] to a renderer.
//!
//! ## Errors
//!
//! A cyclic dependency between cells is reported as [`SceneError::Cache`]
//! with [`CacheError::Cyclic`]. A child sized relative to a parent that
//! auto-sizes on the same axis is one, unless the child bypasses that axis;
//! other cycles are caught by the cells' re-entrancy guards. A failing
//! [`Drawable::measure`] leaves the cell invalid and is reported as
//! [`SceneError::Recompute`]; the next read retries.
//!
//! ## Diagnostics
//!
//! Each scene counts recomputes and invalidations in a
//! [`FrameCounters`] shared through
//! [`Scene::counters`], so a reporting thread can sample it while the update
//! thread runs. Events are logged through the [`log`] facade at `trace` and
//! `debug` level.
//!
//! ## Example
//!
//! ```rust
//! use kurbo::{Point, Size};
//! use understory_scene::{Axes, Clickable, Container, NodeProps, Scene};
//!
//! let mut scene = Scene::new(Size::new(640.0, 480.0));
//! let panel = scene.create(Container, NodeProps::auto_sized(Axes::BOTH));
//! let button = scene.create(
//!     Clickable,
//!     NodeProps::sized(Size::new(80.0, 24.0)).with_position(Point::new(10.0, 10.0)),
//! );
//! scene.add_child(scene.root(), panel).unwrap();
//! scene.add_child(panel, button).unwrap();
//!
//! let frame = scene.frame().unwrap();
//! assert_eq!(frame.draw_list().unwrap().len(), 3);
//!
//! assert_eq!(scene.draw_size(panel).unwrap(), Size::new(90.0, 34.0));
//! assert_eq!(scene.positional_input_queue(Point::new(20.0, 20.0)).unwrap(), vec![button]);
//! ```

mod drawable;
mod error;
mod frame;
mod memo;
mod scene;
mod types;

pub use drawable::{Clickable, Container, Drawable, Label, Quad};
pub use error::{BoxError, HierarchyError, SceneError};
pub use frame::{DrawItem, FrameView};
pub use memo::{INPUT_HANDLERS, TypeMemo};
pub use scene::{PassStats, Scene, SceneOptions};
pub use types::{
    Axes, Caches, DEFAULT_EDGES, Invalidation, InvalidationEdge, Lifetime, Liveness, NodeId,
    NodeProps, Propagation,
};

pub use understory_cache::{CacheError, FrameCounters, FrameStats};
