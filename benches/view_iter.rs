use std::time::Duration;

use criterion::*;
use kiln::config::RegistryConfig;
use kiln::test_util::{Health, Position, Velocity};
use kiln::view::{Exclude, Optional, Require};
use kiln::Registry;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fills a registry where every entity has a position and a random subset has other components.
fn populate(num_entities: usize) -> Registry {
    let registry = Registry::new(RegistryConfig { max_entities: num_entities, view_capacity_hint: num_entities });
    let mut rng = StdRng::seed_from_u64(num_entities as u64);

    for _ in 0..num_entities {
        let entity = registry.create_entity();
        registry.emplace_component(entity, Position(rng.gen(), rng.gen()));
        if rng.gen_bool(0.75) {
            registry.emplace_component(entity, Velocity(rng.gen(), rng.gen()));
        }
        if rng.gen_bool(0.25) {
            registry.emplace_component(entity, Health(rng.gen_range(0..100)));
        }
    }

    registry
}

fn view_iter(c: &mut Criterion) {
    let mut group = c.benchmark_group("view iter (sum of a + b)");
    group.measurement_time(Duration::from_secs(10));

    for log_entities in (4..=16).step_by(4) {
        let num_entities = 1 << log_entities;
        group.throughput(Throughput::Elements(num_entities as u64));

        let registry = populate(num_entities);
        let view = registry.view::<Require<(Position,)>, Optional<(Velocity,)>, Exclude<(Health,)>>();
        view.ensure_updated();

        group.bench_function(BenchmarkId::new("warm", num_entities), |b| {
            b.iter(|| {
                let mut sum = 0.0_f32;
                view.for_each(|item| {
                    let position = item.get::<Position>();
                    sum += position.0;
                    if let Some(velocity) = item.try_get::<Velocity>() {
                        sum += velocity.0;
                    }
                });
                black_box(sum)
            })
        });

        group.bench_function(BenchmarkId::new("refresh", num_entities), |b| {
            b.iter(|| {
                view.clear_and_refresh();
                black_box(view.len())
            })
        });
    }
}

criterion_group!(benches, view_iter);
criterion_main!(benches);
