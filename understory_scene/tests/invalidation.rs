// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Invalidation edges, hierarchy edits, and drawable hooks.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use understory_scene::{
    Axes, BoxError, Caches, Container, Drawable, HierarchyError, Invalidation, InvalidationEdge,
    Label, NodeProps, Propagation, Quad, Scene, SceneError,
};

fn rejection(result: Result<(), SceneError>) -> HierarchyError {
    match result {
        Err(SceneError::Hierarchy { reason, .. }) => reason,
        other => panic!("expected a hierarchy error, got {other:?}"),
    }
}

#[test]
fn repeated_invalidation_is_a_no_op() {
    let mut scene = Scene::new(Size::new(100.0, 100.0));
    let quad = scene.create(Quad, NodeProps::sized(Size::new(10.0, 10.0)));
    scene.add_child(scene.root(), quad).unwrap();
    scene.validate().unwrap();

    let counters = scene.counters();
    let _ = counters.take();

    assert!(scene.invalidate(quad, Invalidation::TRANSFORM).unwrap());
    assert!(!scene.invalidate(quad, Invalidation::TRANSFORM).unwrap());

    let stats = counters.snapshot();
    // World transform, bounding size and world bounds; the root does not
    // auto-size, so nothing reached it.
    assert_eq!(stats.invalidations, 3);
    assert_eq!(stats.redundant_invalidations, 3);

    // Setting a property to its current value fires nothing.
    scene.set_position(quad, Point::ZERO).unwrap();
    assert_eq!(counters.snapshot().invalidation_calls(), 6);
}

#[test]
fn transform_reaches_the_whole_subtree() {
    let mut scene = Scene::new(Size::new(100.0, 100.0));
    let a = scene.create(Container, NodeProps::default().with_position(Point::new(10.0, 0.0)));
    let b = scene.create(
        Quad,
        NodeProps::sized(Size::new(10.0, 10.0)).with_position(Point::new(5.0, 5.0)),
    );
    let c = scene.create(
        Quad,
        NodeProps::sized(Size::new(1.0, 1.0)).with_position(Point::new(1.0, 1.0)),
    );
    scene.add_child(scene.root(), a).unwrap();
    scene.add_child(a, b).unwrap();
    scene.add_child(b, c).unwrap();
    scene.validate().unwrap();
    assert_eq!(scene.world_bounds(c).unwrap(), Rect::new(16.0, 6.0, 17.0, 7.0));

    scene.set_position(a, Point::new(20.0, 0.0)).unwrap();
    for id in [b, c] {
        let valid = scene.valid_caches(id).unwrap();
        assert!(!valid.contains(Caches::WORLD_TRANSFORM));
        assert!(!valid.contains(Caches::WORLD_BOUNDS));
        assert!(valid.contains(Caches::DRAW_SIZE), "sizes do not depend on ancestors' transforms");
    }
    assert!(scene.needs_validation(scene.root()).unwrap());

    assert_eq!(scene.world_bounds(c).unwrap(), Rect::new(26.0, 6.0, 27.0, 7.0));
    assert_eq!(
        scene.world_transform(b).unwrap(),
        Affine::translate((25.0, 5.0))
    );
}

#[test]
fn scale_and_rotation_feed_world_bounds() {
    let mut scene = Scene::new(Size::new(100.0, 100.0));
    let quad = scene.create(Quad, NodeProps::sized(Size::new(10.0, 20.0)));
    scene.add_child(scene.root(), quad).unwrap();

    scene.set_scale(quad, Vec2::new(2.0, 0.5)).unwrap();
    assert_eq!(scene.world_bounds(quad).unwrap(), Rect::new(0.0, 0.0, 20.0, 10.0));
    assert_eq!(scene.draw_size(quad).unwrap(), Size::new(10.0, 20.0));

    scene.set_scale(quad, Vec2::new(1.0, 1.0)).unwrap();
    scene.set_rotation(quad, core::f64::consts::FRAC_PI_2).unwrap();
    let bounds = scene.world_bounds(quad).unwrap();
    assert!((bounds.width() - 20.0).abs() < 1e-9);
    assert!((bounds.height() - 10.0).abs() < 1e-9);
}

#[test]
fn hierarchy_edits_are_validated() {
    let mut scene = Scene::new(Size::new(100.0, 100.0));
    let root = scene.root();
    let a = scene.create(Container, NodeProps::default());
    let b = scene.create(Container, NodeProps::default());
    scene.add_child(root, a).unwrap();
    scene.add_child(a, b).unwrap();

    assert_eq!(rejection(scene.add_child(a, a)), HierarchyError::SelfParent);
    assert_eq!(rejection(scene.add_child(root, a)), HierarchyError::AlreadyParented);
    assert_eq!(rejection(scene.add_child(b, a)), HierarchyError::WouldCycle);
    assert_eq!(rejection(scene.reparent(a, b)), HierarchyError::WouldCycle);
    assert_eq!(rejection(scene.add_child(a, root)), HierarchyError::Root);
    assert_eq!(rejection(scene.remove(root)), HierarchyError::Root);
    assert_eq!(rejection(scene.detach(root)), HierarchyError::Root);

    // Nothing moved.
    assert_eq!(scene.children(root).unwrap(), &[a]);
    assert_eq!(scene.parent(b).unwrap(), Some(a));
}

#[test]
fn detached_subtrees_are_not_visible() {
    let mut scene = Scene::new(Size::new(100.0, 100.0));
    let quad = scene.create(
        Quad,
        NodeProps::sized(Size::new(10.0, 10.0)).with_position(Point::new(5.0, 5.0)),
    );
    let inner = scene.create(Quad, NodeProps::sized(Size::new(1.0, 1.0)));
    scene.add_child(scene.root(), quad).unwrap();
    scene.add_child(quad, inner).unwrap();
    assert!(scene.is_visible(inner).unwrap());

    scene.detach(quad).unwrap();
    assert_eq!(scene.parent(quad).unwrap(), None);
    assert!(scene.contains(quad));
    assert!(scene.children(scene.root()).unwrap().is_empty());
    assert!(!scene.is_visible(quad).unwrap());
    assert!(!scene.is_visible(inner).unwrap());

    let group = scene.create(
        Container,
        NodeProps::default().with_position(Point::new(100.0, 0.0)),
    );
    scene.add_child(scene.root(), group).unwrap();
    scene.add_child(group, quad).unwrap();
    assert!(scene.is_visible(inner).unwrap());
    assert_eq!(
        scene.world_bounds(quad).unwrap(),
        Rect::new(105.0, 5.0, 115.0, 15.0)
    );
}

#[test]
fn reparent_moves_the_contribution() {
    let mut scene = Scene::new(Size::new(500.0, 500.0));
    let from = scene.create(Container, NodeProps::auto_sized(Axes::BOTH));
    let to = scene.create(
        Container,
        NodeProps::auto_sized(Axes::BOTH).with_position(Point::new(50.0, 0.0)),
    );
    let quad = scene.create(Quad, NodeProps::sized(Size::new(100.0, 100.0)));
    scene.add_child(scene.root(), from).unwrap();
    scene.add_child(scene.root(), to).unwrap();
    scene.add_child(from, quad).unwrap();
    scene.validate().unwrap();
    assert_eq!(scene.draw_size(from).unwrap(), Size::new(100.0, 100.0));
    assert_eq!(scene.draw_size(to).unwrap(), Size::ZERO);

    scene.reparent(quad, to).unwrap();
    scene.validate().unwrap();
    assert_eq!(scene.draw_size(from).unwrap(), Size::ZERO);
    assert_eq!(scene.draw_size(to).unwrap(), Size::new(100.0, 100.0));
    assert_eq!(
        scene.world_bounds(quad).unwrap(),
        Rect::new(50.0, 0.0, 150.0, 100.0)
    );

    // Moving under the current parent changes nothing.
    scene.reparent(quad, to).unwrap();
    assert_eq!(scene.children(to).unwrap(), &[quad]);
    assert!(!scene.needs_validation(scene.root()).unwrap());
}

#[test]
fn label_content_changes_relayout_once() {
    let mut scene = Scene::new(Size::new(500.0, 500.0));
    let group = scene.create(Container, NodeProps::auto_sized(Axes::BOTH));
    let label = scene.create(Label::new("abc", 10.0, 20.0), NodeProps::default());
    scene.add_child(scene.root(), group).unwrap();
    scene.add_child(group, label).unwrap();
    assert_eq!(scene.draw_size(group).unwrap(), Size::new(30.0, 20.0));

    let old = scene
        .update_drawable::<Label, _>(label, |l| {
            let old = l.text().to_owned();
            l.set_text("abcdef\nxy");
            old
        })
        .unwrap();
    assert_eq!(old, "abc");
    assert_eq!(scene.draw_size(group).unwrap(), Size::new(60.0, 40.0));
    scene.validate().unwrap();
    assert_eq!(scene.draw_size(label).unwrap(), Size::new(60.0, 40.0));
    assert_eq!(scene.drawable::<Label>(label).unwrap().layouts(), 2);

    // Position changes do not touch the text layout.
    scene.set_position(label, Point::new(3.0, 3.0)).unwrap();
    assert_eq!(scene.draw_size(group).unwrap(), Size::new(63.0, 43.0));
    assert_eq!(scene.drawable::<Label>(label).unwrap().layouts(), 2);
}

#[test]
fn drawable_access_is_type_checked() {
    let mut scene = Scene::new(Size::new(10.0, 10.0));
    let label = scene.create(Label::new("x", 1.0, 1.0), NodeProps::default());
    assert!(matches!(
        scene.drawable::<Quad>(label),
        Err(SceneError::DrawableType { .. })
    ));
    assert!(matches!(
        scene.update_drawable::<Quad, _>(label, |_| ()),
        Err(SceneError::DrawableType { .. })
    ));
    assert_eq!(scene.drawable::<Label>(label).unwrap().text(), "x");
}

#[derive(Debug)]
struct Flaky {
    ready: bool,
}

impl Drawable for Flaky {
    fn measure(&mut self, resolved: Size) -> Result<Size, BoxError> {
        if !self.ready {
            return Err("not ready".into());
        }
        Ok(resolved)
    }
}

#[test]
fn failed_measure_is_retried() {
    let mut scene = Scene::new(Size::new(100.0, 100.0));
    let node = scene.create(Flaky { ready: false }, NodeProps::sized(Size::new(10.0, 10.0)));
    scene.add_child(scene.root(), node).unwrap();

    for _ in 0..2 {
        let err = scene.draw_size(node).unwrap_err();
        assert!(
            matches!(err, SceneError::Recompute { cache, .. } if cache == Caches::DRAW_SIZE),
            "unexpected error: {err}"
        );
    }
    assert!(!scene.valid_caches(node).unwrap().contains(Caches::DRAW_SIZE));
    assert!(scene.validate().is_err());

    scene
        .update_drawable::<Flaky, _>(node, |f| f.ready = true)
        .unwrap();
    assert_eq!(scene.draw_size(node).unwrap(), Size::new(10.0, 10.0));
    scene.validate().unwrap();
    assert!(!scene.needs_validation(scene.root()).unwrap());
}

/// A stamp whose content never changes its geometry.
#[derive(Debug, Default)]
struct Stamp {
    inked: u32,
}

const STAMP_EDGES: &[InvalidationEdge] = &[
    InvalidationEdge::new(
        Invalidation::SIZE,
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
    InvalidationEdge::new(
        Invalidation::SIZE
            .union(Invalidation::TRANSFORM)
            .union(Invalidation::PRESENCE),
        Propagation::Parent,
        Caches::AUTO_SIZE,
    ),
    InvalidationEdge::new(
        Invalidation::TRANSFORM,
        Propagation::Subtree,
        Caches::WORLD_TRANSFORM.union(Caches::WORLD_BOUNDS),
    ),
    // Children resize with the stamp's frame.
    InvalidationEdge::new(
        Invalidation::TRANSFORM,
        Propagation::Children,
        Caches::DRAW_SIZE,
    ),
    InvalidationEdge::new(
        Invalidation::PRESENCE,
        Propagation::Subtree,
        Caches::VISIBILITY,
    ),
];

impl Drawable for Stamp {
    fn edges(&self) -> &'static [InvalidationEdge] {
        STAMP_EDGES
    }
}

#[test]
fn custom_edges_decide_what_is_invalidated() {
    let mut scene = Scene::new(Size::new(100.0, 100.0));
    let stamp = scene.create(Stamp::default(), NodeProps::sized(Size::new(10.0, 10.0)));
    let child = scene.create(Quad, NodeProps::sized(Size::new(5.0, 5.0)));
    let grandchild = scene.create(Quad, NodeProps::sized(Size::new(1.0, 1.0)));
    scene.add_child(scene.root(), stamp).unwrap();
    scene.add_child(stamp, child).unwrap();
    scene.add_child(child, grandchild).unwrap();
    scene.validate().unwrap();

    // Content is not an input of any stamp cache.
    scene.update_drawable::<Stamp, _>(stamp, |s| s.inked += 1).unwrap();
    assert!(!scene.needs_validation(scene.root()).unwrap());
    assert_eq!(scene.drawable::<Stamp>(stamp).unwrap().inked, 1);

    // Transform reaches direct children's draw size only.
    scene.set_position(stamp, Point::new(1.0, 1.0)).unwrap();
    assert!(!scene.valid_caches(child).unwrap().contains(Caches::DRAW_SIZE));
    let valid = scene.valid_caches(grandchild).unwrap();
    assert!(valid.contains(Caches::DRAW_SIZE));
    assert!(!valid.contains(Caches::WORLD_TRANSFORM));
}

#[test]
fn removed_nodes_go_stale() {
    let mut scene = Scene::new(Size::new(100.0, 100.0));
    let a = scene.create(Container, NodeProps::default());
    let c = scene.create(Quad, NodeProps::sized(Size::new(1.0, 1.0)));
    scene.add_child(scene.root(), a).unwrap();
    scene.add_child(a, c).unwrap();
    let token_a = scene.liveness(a).unwrap();
    let token_c = scene.liveness(c).unwrap();
    assert_eq!(scene.len(), 3);
    assert!(token_a.is_alive());

    scene.remove(a).unwrap();
    assert!(!token_a.is_alive());
    assert!(!token_c.is_alive());
    assert!(!scene.contains(a));
    assert!(!scene.contains(c));
    assert_eq!(scene.len(), 1);
    assert!(scene.children(scene.root()).unwrap().is_empty());
    assert!(matches!(
        scene.draw_size(a),
        Err(SceneError::StaleNode(id)) if id == a
    ));
    assert!(scene.liveness(c).is_err());

    // Slots are reused under a new generation.
    let b = scene.create(Quad, NodeProps::default());
    let d = scene.create(Quad, NodeProps::default());
    assert_ne!(b, a);
    assert_ne!(d, a);
    assert_ne!(b, c);
    assert_ne!(d, c);
    assert!(!scene.contains(a));
    assert!(!token_a.is_alive());
    assert!(scene.liveness(b).unwrap().is_alive());
}

#[test]
fn sizes_cannot_be_set_on_auto_axes() {
    let mut scene = Scene::new(Size::new(100.0, 100.0));
    let group = scene.create(
        Container,
        NodeProps {
            size: Size::new(40.0, 0.0),
            auto_size_axes: Axes::Y,
            ..NodeProps::default()
        },
    );
    assert!(matches!(
        scene.set_size(group, Size::new(40.0, 10.0)),
        Err(SceneError::AutoSized { node, axes }) if node == group && axes == Axes::Y
    ));
    scene.set_size(group, Size::new(60.0, 0.0)).unwrap();
    assert_eq!(scene.props(group).unwrap().size, Size::new(60.0, 0.0));
}
