#![allow(missing_docs)]

use parking_lot::Once;

mod anti_semaphore;
pub use anti_semaphore::AntiSemaphore;

mod descriptor;
pub use descriptor::{mock_layout, mock_pipeline, MockDescriptor, MockState};

mod event_tracer;
pub use event_tracer::EventTracer;

pub fn init() {
    static SET_LOGGER_ONCE: Once = Once::new();
    SET_LOGGER_ONCE.call_once(env_logger::init);
}

/// A dense test component.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position(pub f32, pub f32);

/// A dense test component usually paired with [`Position`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity(pub f32, pub f32);

/// A test component used as an optional or excluded filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health(pub u32);

/// A marker component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag;
