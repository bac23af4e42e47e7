//! Physics engine benchmarks (criterion - wall-clock time).
//!
//! Run all:    cargo bench --manifest-path benchmarks/Cargo.toml --bench physics
//! Filter:     cargo bench --manifest-path benchmarks/Cargo.toml --bench physics -- resolver

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use glam::Vec3;
use rein_physics::physics::{
    BroadPhase, CollisionPrimitive, ContactBuffer, PrimitiveProxy, detect_collision,
};
use rein_physics::{ContactResolver, ResolverConfig, RigidBodyDesc};
use rein_physics_bench::*;

// ---------------------------------------------------------------------------
// Collision detection
// ---------------------------------------------------------------------------

fn proxies_of(physics: &rein_physics::PhysicsWorld) -> Vec<PrimitiveProxy> {
    physics
        .collision_primitives()
        .filter_map(|(id, p)| PrimitiveProxy::new(id, p, physics.bodies()))
        .collect()
}

fn bench_collision(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("broadphase/spheres");
        for &n in &[100, 500, 1000] {
            let proxies = proxies_of(&setup_sphere_world(n));
            let broadphase = BroadPhase::new();
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
                b.iter(|| broadphase.find_pairs(&proxies));
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("narrowphase/dispatch");
        let mut physics = rein_physics::PhysicsWorld::default();
        let (Ok(a), Ok(b)) = (
            physics.add_rigid_body(RigidBodyDesc::sphere(1.0, 1.0)),
            physics.add_rigid_body(
                RigidBodyDesc::cuboid(1.0, Vec3::ONE).with_position(Vec3::new(1.5, 0.0, 0.0)),
            ),
        ) else {
            return;
        };
        physics.add_collision_primitive(CollisionPrimitive::sphere(a, 1.0));
        physics.add_collision_primitive(CollisionPrimitive::cuboid(b, Vec3::ONE));
        physics.add_collision_primitive(CollisionPrimitive::half_space(Vec3::Y, -0.5));
        let proxies = proxies_of(&physics);
        let mut buffer = ContactBuffer::new(16);

        for (name, i, j) in [
            ("sphere_cuboid", 0, 1),
            ("sphere_half_space", 0, 2),
            ("cuboid_half_space", 1, 2),
        ] {
            group.bench_function(name, |bench| {
                bench.iter(|| {
                    buffer.clear();
                    detect_collision(&proxies[i], &proxies[j], &mut buffer)
                });
            });
        }
        group.finish();
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

fn bench_resolver(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("resolver/stack_height");
        for &n in &[10, 50, 100] {
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
                b.iter_batched(
                    || setup_stack_contacts(n),
                    |(mut bodies, mut contacts)| {
                        let mut resolver = ContactResolver::new(ResolverConfig::default());
                        resolver.resolve_contacts(&mut contacts, &mut bodies, 1.0 / 60.0);
                    },
                    criterion::BatchSize::SmallInput,
                );
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("resolver/iterations");
        for &iters in &[1, 4, 16, 64] {
            group.bench_with_input(BenchmarkId::from_parameter(iters), &iters, |b, &iters| {
                b.iter_batched(
                    || setup_stack_contacts(50),
                    |(mut bodies, mut contacts)| {
                        let mut resolver = ContactResolver::default();
                        resolver.set_iterations(iters, iters);
                        resolver.resolve_contacts(&mut contacts, &mut bodies, 1.0 / 60.0);
                    },
                    criterion::BatchSize::SmallInput,
                );
            });
        }
        group.finish();
    }
}

// ---------------------------------------------------------------------------
// Full step
// ---------------------------------------------------------------------------

fn bench_step(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("step/spheres");
        group.sample_size(30);
        for &n in &[50, 100, 500] {
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
                b.iter_batched(
                    || setup_sphere_world(n),
                    |mut physics| physics.step(1.0 / 60.0),
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("step/sustained_10steps");
        group.sample_size(20);
        for &n in &[100, 500] {
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
                b.iter_batched(
                    || setup_mixed_world(n),
                    |mut physics| {
                        for _ in 0..10 {
                            physics.step(1.0 / 60.0);
                        }
                    },
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_collision, bench_resolver, bench_step);
criterion_main!(benches);
