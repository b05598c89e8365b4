// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for scene invalidation and validation.
//!
//! Trees are synthetic: "wide" is a root with many auto-sized rows of quads,
//! "deep" is a single chain of nested auto-sized containers.

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use kurbo::{Point, Size};
use understory_scene::{Axes, Container, NodeId, NodeProps, Quad, Scene};

#[derive(Clone)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u32(&mut self) -> u32 {
        // Numerical Recipes LCG parameters.
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 32) as u32
    }

    fn gen_range_usize(&mut self, upper_exclusive: usize) -> usize {
        if upper_exclusive == 0 {
            return 0;
        }
        (self.next_u32() as usize) % upper_exclusive
    }
}

/// A validated scene with `rows` auto-sized rows of `per_row` quads each.
/// Returns the scene and its leaves.
fn build_wide(rows: usize, per_row: usize, seed: u64) -> (Scene, Vec<NodeId>) {
    let mut scene = Scene::new(Size::new(4096.0, 4096.0));
    let mut rng = Lcg::new(seed);
    let mut leaves = Vec::with_capacity(rows * per_row);
    for r in 0..rows {
        let row = scene.create(
            Container,
            NodeProps::auto_sized(Axes::BOTH).with_position(Point::new(0.0, r as f64 * 24.0)),
        );
        scene.add_child(scene.root(), row).unwrap();
        for c in 0..per_row {
            let w = 8.0 + rng.gen_range_usize(32) as f64;
            let quad = scene.create(
                Quad,
                NodeProps::sized(Size::new(w, 20.0)).with_position(Point::new(c as f64 * 40.0, 0.0)),
            );
            scene.add_child(row, quad).unwrap();
            leaves.push(quad);
        }
    }
    scene.validate().unwrap();
    (scene, leaves)
}

/// A validated chain of `depth` auto-sized containers ending in one quad.
fn build_deep(depth: usize) -> (Scene, NodeId) {
    let mut scene = Scene::new(Size::new(4096.0, 4096.0));
    let mut parent = scene.root();
    for _ in 0..depth {
        let group = scene.create(Container, NodeProps::auto_sized(Axes::BOTH));
        scene.add_child(parent, group).unwrap();
        parent = group;
    }
    let leaf = scene.create(Quad, NodeProps::sized(Size::new(10.0, 10.0)));
    scene.add_child(parent, leaf).unwrap();
    scene.validate().unwrap();
    (scene, leaf)
}

fn bench_scene(c: &mut Criterion) {
    let mut group = c.benchmark_group("understory_scene");
    group.sample_size(50);

    for &(rows, per_row) in &[(16_usize, 16_usize), (64, 64)] {
        let n = rows * per_row;

        group.bench_function(format!("build_and_validate(n={n})"), |b| {
            b.iter(|| black_box(build_wide(rows, per_row, 0x5CE4_0000_0000_0001)));
        });

        group.bench_function(format!("validate_clean(n={n})"), |b| {
            let (mut scene, _) = build_wide(rows, per_row, 0x5CE4_0000_0000_0002);
            b.iter(|| black_box(scene.validate().unwrap()));
        });

        group.bench_function(format!("resize_one_and_validate(n={n})"), |b| {
            b.iter_batched(
                || build_wide(rows, per_row, 0x5CE4_0000_0000_0003),
                |(mut scene, leaves)| {
                    scene
                        .set_size(leaves[leaves.len() / 2], Size::new(100.0, 30.0))
                        .unwrap();
                    black_box(scene.validate().unwrap());
                },
                BatchSize::LargeInput,
            );
        });

        group.bench_function(format!("move_random_10pct_and_validate(n={n})"), |b| {
            b.iter_batched(
                || {
                    let (scene, leaves) = build_wide(rows, per_row, 0x5CE4_0000_0000_0004);
                    (scene, leaves, Lcg::new(0x5CE4_0000_0000_0005))
                },
                |(mut scene, leaves, mut rng)| {
                    for _ in 0..n / 10 {
                        let leaf = leaves[rng.gen_range_usize(leaves.len())];
                        let x = rng.gen_range_usize(64) as f64;
                        scene.set_position(leaf, Point::new(x, 0.0)).unwrap();
                    }
                    black_box(scene.validate().unwrap());
                },
                BatchSize::LargeInput,
            );
        });

        // Repeated edits of one input between reads should cost one edit.
        group.bench_function(format!("repeated_invalidation_x100(n={n})"), |b| {
            b.iter_batched(
                || build_wide(rows, per_row, 0x5CE4_0000_0000_0006),
                |(mut scene, leaves)| {
                    let leaf = leaves[0];
                    for i in 0..100 {
                        let w = if i % 2 == 0 { 50.0 } else { 60.0 };
                        scene.set_size(leaf, Size::new(w, 20.0)).unwrap();
                    }
                    black_box(scene.draw_size(leaf).unwrap());
                },
                BatchSize::LargeInput,
            );
        });
    }

    for &depth in &[16_usize, 256] {
        group.bench_function(format!("deep_leaf_resize_pull(depth={depth})"), |b| {
            b.iter_batched(
                || build_deep(depth),
                |(mut scene, leaf)| {
                    scene.set_size(leaf, Size::new(20.0, 20.0)).unwrap();
                    let root = scene.root();
                    let top = scene.children(root).unwrap()[0];
                    black_box(scene.draw_size(top).unwrap());
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scene);
criterion_main!(benches);
