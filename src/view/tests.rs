use std::collections::BTreeSet;
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{Exclude, Optional, Require};
use crate::config::RegistryConfig;
use crate::test_util::{self, AntiSemaphore, Health, Position, Tag, Velocity};
use crate::{tracer, Entity, Registry};

// Repeat concurrent tests to increase the chance of catching random bugs.
// However, do not rely on test repetitions to assert for behavior;
// use more synchronization where practical.
lazy_static::lazy_static! {
    static ref CONCURRENT_TEST_REPETITIONS: usize = (|| {
        if let Ok(count) = env::var("CONCURRENT_TEST_REPETITIONS") {
            if let Ok(count) = count.parse::<usize>() {
                return count;
            }
        }

        if env::var("RUST_LOG").is_ok() { 1 } else { 100 }
    })();
}

fn registry(max_entities: usize) -> Registry {
    Registry::new(RegistryConfig { max_entities, view_capacity_hint: 8 })
}

fn sorted(entities: Vec<Entity>) -> Vec<Entity> {
    let mut entities = entities;
    entities.sort();
    entities
}

#[test]
fn test_signature_filters() {
    test_util::init();

    let registry = registry(8);
    let plain = registry.create_entity();
    let tagged = registry.create_entity();
    let hurt = registry.create_entity();
    let bare = registry.create_entity();

    for entity in [plain, tagged, hurt] {
        registry.emplace_component(entity, Position(0.0, 0.0));
    }
    registry.emplace_component(tagged, Tag);
    registry.emplace_component(hurt, Health(1));

    let view = registry.view::<Require<(Position,)>, Optional<(Tag,)>, Exclude<(Health,)>>();
    assert_eq!(view.entities(), vec![plain, tagged]);

    let all = registry.view::<Require<()>, Optional<()>, Exclude<()>>();
    assert_eq!(all.entities(), vec![plain, tagged, hurt, bare]);

    // same signature shares the cached view
    let again = registry.view::<Require<(Position,)>, Optional<(Tag,)>, Exclude<(Health,)>>();
    assert!(Arc::ptr_eq(view.view(), again.view()));
    assert_eq!(registry.view_count(), 2);

    registry.remove_component::<Health>(hurt);
    registry.emplace_component(plain, Health(2));
    let created = registry.create_entity();
    assert_eq!(view.entities(), vec![tagged, hurt]);
    assert_eq!(all.entities(), vec![plain, tagged, hurt, bare, created]);
}

#[test]
fn test_optional_mask_refresh() {
    let registry = registry(4);
    let entity = registry.create_entity();
    registry.emplace_component(entity, Position(0.0, 0.0));

    let view = registry.view::<Require<(Position,)>, Optional<(Velocity,)>, Exclude<()>>();
    let velocity = registry.component_id::<Velocity>();

    let mut masks = Vec::new();
    view.for_each(|item| masks.push(item.optional_mask()));
    assert!(masks[0].is_empty());

    registry.emplace_component(entity, Velocity(1.0, 1.0));
    masks.clear();
    view.for_each(|item| {
        masks.push(item.optional_mask());
        assert_eq!(item.try_get::<Velocity>(), Some(&Velocity(1.0, 1.0)));
        assert!(item.try_get::<Health>().is_none());
    });
    assert!(masks[0].contains(velocity));
    assert_eq!(view.len(), 1);
}

#[test]
fn test_queue_order_independence() {
    test_util::init();

    let mut rng = StdRng::seed_from_u64(0x0bde);

    for _ in 0..50 {
        let registry = registry(16);
        let entities: Vec<Entity> = (0..16).map(|_| registry.create_entity()).collect();
        for &entity in &entities {
            if rng.gen_bool(0.5) {
                registry.emplace_component(entity, Position(0.0, 0.0));
            }
        }

        let view = registry.view::<Require<(Position,)>, Optional<()>, Exclude<(Health,)>>();

        // mutate the world, then enqueue redundant and stale requests in random order
        for &entity in &entities {
            match rng.gen_range(0..4) {
                0 => drop(registry.emplace_component(entity, Position(1.0, 1.0))),
                1 => drop(registry.remove_component::<Position>(entity)),
                2 => drop(registry.emplace_component(entity, Health(0))),
                _ => drop(registry.remove_component::<Health>(entity)),
            }
        }

        let mut requests: Vec<(bool, Entity)> =
            entities.iter().flat_map(|&entity| [(true, entity), (false, entity)]).collect();
        requests.shuffle(&mut rng);
        for (add, entity) in requests {
            if add {
                view.try_add_entity(entity);
            } else {
                view.remove_entity(entity);
            }
        }

        let expected: Vec<Entity> = entities
            .iter()
            .copied()
            .filter(|&entity| {
                registry.has_component::<Position>(entity) && !registry.has_component::<Health>(entity)
            })
            .collect();
        assert_eq!(sorted(view.entities()), expected);

        let visited = Arc::new(AtomicUsize::new(0));
        view.for_each(|_| {
            visited.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(visited.load(Ordering::SeqCst), expected.len());
    }
}

#[test]
fn test_clear_and_refresh() {
    let registry = registry(8);
    let entities: Vec<Entity> = (0..4).map(|_| registry.create_entity()).collect();
    for &entity in &entities {
        registry.emplace_component(entity, Tag);
    }

    let view = registry.view::<Require<(Tag,)>, Optional<()>, Exclude<()>>();
    view.remove_entity(entities[0]);
    view.try_add_entity(Entity::from_index(7));
    view.clear_and_refresh();
    assert!(!view.view().has_pending());
    assert_eq!(view.entities(), entities);
}

#[test]
fn test_drain_is_traced() {
    struct Drains(parking_lot::Mutex<Vec<(usize, usize)>>);

    impl tracer::Tracer for Drains {
        fn drain_view(&self, added: usize, removed: usize) { self.0.lock().push((added, removed)); }
    }

    let registry = registry(8);
    let view = registry.view::<Require<(Tag,)>, Optional<()>, Exclude<()>>();
    let a = registry.create_entity();
    let b = registry.create_entity();
    registry.emplace_component(a, Tag);
    registry.emplace_component(b, Tag);

    let drains = Drains(parking_lot::Mutex::new(Vec::new()));
    let aggregate = tracer::Aggregate((tracer::Log(log::Level::Trace), &drains));
    assert_eq!(view.ensure_updated_with(&aggregate), (2, 0));

    registry.remove_component::<Tag>(a);
    registry.destroy_entity(b);
    assert_eq!(view.ensure_updated_with(&aggregate), (0, 2));
    assert_eq!(view.ensure_updated_with(&aggregate), (0, 0));

    assert_eq!(*drains.0.lock(), vec![(2, 0), (0, 2)]);
}

/// Modifies the view from another thread while `for_each` is suspended in the middle.
///
/// The two threads rendezvous twice inside the first callback:
/// the first rendezvous starts the mutations,
/// the second one waits for them to complete before iteration continues.
#[test]
fn test_for_each_isolation() {
    test_util::init();

    for _ in 0..*CONCURRENT_TEST_REPETITIONS {
        let registry = registry(64);
        let initial: Vec<Entity> = (0..32).map(|_| registry.create_entity()).collect();
        for &entity in &initial {
            registry.emplace_component(entity, Position(0.0, 0.0));
        }
        let extra: Vec<Entity> = (0..8).map(|_| registry.create_entity()).collect();

        let view = registry.view::<Require<(Position,)>, Optional<()>, Exclude<(Health,)>>();
        assert_eq!(view.len(), initial.len());

        let semaphore = AntiSemaphore::new(2);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                semaphore.wait();

                // the excluded pool is not locked by the iteration
                for &entity in &initial[..16] {
                    registry.emplace_component(entity, Health(0));
                }
                for &entity in &extra {
                    view.try_add_entity(entity);
                }

                semaphore.wait();
            });

            let mut visited = BTreeSet::new();
            view.for_each(|item| {
                if visited.is_empty() {
                    semaphore.wait();
                    semaphore.wait();
                }
                visited.insert(item.entity());
            });

            assert_eq!(visited, initial.iter().copied().collect());
        });

        // the queued changes apply on the next read
        // extra entities do not have `Position`, so they are rejected
        assert_eq!(view.entities(), initial[16..].to_vec());
    }
}
