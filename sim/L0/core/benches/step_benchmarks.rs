//! Benchmarks for world stepping and the broad phase.
//!
//! Run with: cargo bench -p clatter-core

#![allow(
    missing_docs,
    clippy::wildcard_imports,
    clippy::cast_precision_loss,
    clippy::unwrap_used
)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use clatter_contact::{ContactMaterial, MaterialRegistry};
use clatter_core::broad_phase::{BroadPhase, BruteForce, SweepAndPrune};
use clatter_core::{CollisionShape, Pose, World};

/// Ground plus `n` boxes scattered over a 4 m square, stacked in height.
fn box_pile(n: usize) -> World {
    let mut rng = StdRng::seed_from_u64(1);
    let mut registry = MaterialRegistry::new();
    let ground = registry.register("ground");
    let block = registry.register("box");

    let mut world = World::default();
    world
        .contact_materials_mut()
        .insert_all_pairs(&[ground, block], |_, _| ContactMaterial::new(0.5, 0.2))
        .unwrap();
    world.add_static_body(CollisionShape::ground_plane(), ground);
    for i in 0..n {
        let x = rng.gen_range(-2.0..=2.0);
        let z = rng.gen_range(-2.0..=2.0);
        world.add_dynamic_body(
            CollisionShape::cuboid(Vector3::new(0.5, 0.5, 0.5)),
            1.0,
            Pose::from_position(Point3::new(x, (i as f64 + 2.0) * 2.0, z)),
            block,
        );
    }
    world
}

fn bench_world_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");

    for n in [1, 10, 50, 100] {
        // Let the pile settle so the benchmark measures resting contacts
        let mut settled = box_pile(n);
        settled.run_steps(300).unwrap();

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("settled", n), &settled, |b, world| {
            b.iter_batched(
                || world.clone(),
                |mut w| {
                    w.step().unwrap();
                    black_box(w.drain_events().count())
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_broad_phase(c: &mut Criterion) {
    let mut group = c.benchmark_group("broad_phase");

    for n in [10, 100, 500] {
        let mut world = box_pile(n);
        world.run_steps(120).unwrap();
        let bodies: Vec<_> = world.bodies().cloned().collect();

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("brute_force", n), &bodies, |b, bodies| {
            let mut brute = BruteForce::new();
            b.iter(|| black_box(brute.find_potential_pairs(bodies)));
        });
        group.bench_with_input(BenchmarkId::new("sweep_and_prune", n), &bodies, |b, bodies| {
            let mut sap = SweepAndPrune::new();
            b.iter(|| black_box(sap.find_potential_pairs(bodies)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_world_step, bench_broad_phase);
criterion_main!(benches);
