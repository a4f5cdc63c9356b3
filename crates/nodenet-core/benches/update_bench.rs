//! Criterion benchmarks for the node graph update loop.
//!
//! Three benchmark groups:
//! - `floodfill`: 2000 fresh linker-driven nodes settling from scratch
//! - `split_merge`: cutting and re-joining a long pipeline each iteration
//! - `edge_churn`: re-checking every automatic edge of a settled grid

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use nodenet_core::engine::Engine;
use nodenet_core::flags::EdgeFlags;
use nodenet_core::id::EntityId;
use nodenet_core::spatial::NoSpatial;
use nodenet_core::test_utils::*;

// ===========================================================================
// Network builders
// ===========================================================================

/// `rows` parallel pipelines of `length` table-linked nodes, with every
/// tenth column cross-linked to the next row.
fn build_lattice(rows: usize, length: usize) -> (Engine, Vec<Vec<EntityId>>) {
    let mut engine = engine_with_table("pipe");
    let mut lattice = Vec::with_capacity(rows);
    for _ in 0..rows {
        let row: Vec<EntityId> = (0..length)
            .map(|_| engine.spawn_node("pipe_segment", "pipe"))
            .collect();
        chain(&mut engine, &row);
        lattice.push(row);
    }
    let t = table(&mut engine);
    for pair in lattice.windows(2) {
        for col in (0..length).step_by(10) {
            t.link(pair[0][col], pair[1][col]);
        }
    }
    (engine, lattice)
}

/// One manually pinned pipeline of `length` nodes, already settled.
fn build_pipeline(length: usize) -> (Engine, Vec<EntityId>) {
    let mut engine = Engine::new();
    let nodes: Vec<EntityId> = (0..length)
        .map(|_| engine.spawn_node("pipe_segment", "pipe"))
        .collect();
    for pair in nodes.windows(2) {
        engine.try_add_edge(pair[0], pair[1], EdgeFlags::empty());
    }
    engine.update(&NoSpatial);
    (engine, nodes)
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_floodfill(c: &mut Criterion) {
    let mut group = c.benchmark_group("floodfill");
    group.sample_size(20);

    group.bench_function("settle_2000_nodes", |b| {
        b.iter_batched(
            || build_lattice(20, 100).0,
            |mut engine| {
                engine.update(&NoSpatial);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_split_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_merge");
    let (mut engine, nodes) = build_pipeline(1000);
    let (left, right) = (nodes[499], nodes[500]);

    // The cut alternates between splitting and re-merging two 500-node halves.
    group.bench_function("cut_and_rejoin_1000_nodes", |b| {
        b.iter(|| {
            engine.try_remove_edge(left, right);
            engine.update(&NoSpatial);
            engine.try_add_edge(left, right, EdgeFlags::empty());
            engine.update(&NoSpatial);
        });
    });

    group.finish();
}

fn bench_edge_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("edge_churn");
    let (mut engine, lattice) = build_lattice(20, 100);
    engine.update(&NoSpatial);

    group.bench_function("recheck_2000_nodes", |b| {
        b.iter(|| {
            for row in &lattice {
                for &node in row {
                    engine.queue_edge_update(node);
                }
            }
            engine.update(&NoSpatial);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_floodfill, bench_split_merge, bench_edge_churn);
criterion_main!(benches);
