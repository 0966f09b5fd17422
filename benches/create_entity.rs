use criterion::*;
use kiln::config::RegistryConfig;
use kiln::{test_util, Registry};

fn create_entity(c: &mut Criterion) {
    let mut group = c.benchmark_group("create entity");

    macro_rules! create_entity_batch {
        ($num_comps:literal; $($comp:expr),* $(,)?) => {
            for log_entities in (0..=12).step_by(4) {
                let entities = 1 << log_entities;
                group.throughput(Throughput::Elements(entities));
                group.bench_with_input(BenchmarkId::new(format!("{} components", $num_comps), format!("{entities} entities")), &entities, |b, &entities| {
                    b.iter_batched(
                        || Registry::new(RegistryConfig { max_entities: 1 << 12, view_capacity_hint: 256 }),
                        |registry| {
                            for _ in 0..entities {
                                let entity = registry.create_entity();
                                $(registry.emplace_component(entity, $comp);)*
                            }
                            registry
                        },
                        BatchSize::SmallInput,
                    );
                });
            }
        }
    }

    create_entity_batch!(0; );
    create_entity_batch!(1; test_util::Position(1.0, 2.0));
    create_entity_batch!(2; test_util::Position(1.0, 2.0), test_util::Velocity(0.5, 0.5));
    create_entity_batch!(4; test_util::Position(1.0, 2.0), test_util::Velocity(0.5, 0.5), test_util::Health(100), test_util::Tag);
}

criterion_group!(benches, create_entity);
criterion_main!(benches);
