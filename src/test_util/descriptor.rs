use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::render::{
    DescriptorHandle, DescriptorSetFactory, DescriptorSetInstance, LayoutId, Pipeline, PipelineId,
    PipelineLayout, SceneObjectId, UpdateSpeed,
};
use crate::Entity;

/// State shared by every instance of a [`MockDescriptor`].
#[derive(Debug, Default)]
pub struct MockState {
    /// Objects currently allocated, per instance.
    pub allocated: Vec<BTreeSet<SceneObjectId>>,
    /// Number of allocation attempts so far, across instances.
    pub attempts:  usize,
    /// The attempt (0-based) that fails, if any.
    pub fail_at:   Option<usize>,
    /// Whether every attempt fails.
    pub fail_all:  bool,
    /// Objects synced, in order.
    pub synced:    Vec<SceneObjectId>,
}

impl MockState {
    /// Total number of live allocations across instances.
    pub fn live(&self) -> usize { self.allocated.iter().map(BTreeSet::len).sum() }
}

/// A descriptor factory whose instances record their allocations in a shared [`MockState`].
pub struct MockDescriptor {
    name:  String,
    state: Arc<Mutex<MockState>>,
}

impl MockDescriptor {
    pub fn new(name: &str) -> (Arc<Self>, Arc<Mutex<MockState>>) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (Arc::new(Self { name: name.to_string(), state: Arc::clone(&state) }), state)
    }
}

impl DescriptorSetFactory for MockDescriptor {
    fn name(&self) -> &str { &self.name }

    fn create_instance(&self) -> Box<dyn DescriptorSetInstance> {
        let mut state = self.state.lock();
        let slot = state.allocated.len();
        state.allocated.push(BTreeSet::new());
        Box::new(MockInstance { state: Arc::clone(&self.state), slot })
    }
}

struct MockInstance {
    state: Arc<Mutex<MockState>>,
    slot:  usize,
}

impl DescriptorSetInstance for MockInstance {
    fn allocate_object(&mut self, object: SceneObjectId, _: Entity, _: UpdateSpeed) -> bool {
        let mut state = self.state.lock();
        let attempt = state.attempts;
        state.attempts += 1;
        if state.fail_all || state.fail_at == Some(attempt) {
            return false;
        }
        let new = state.allocated[self.slot].insert(object);
        assert!(new, "{object:?} allocated twice in instance {}", self.slot);
        true
    }

    fn release_object(&mut self, object: SceneObjectId) {
        let mut state = self.state.lock();
        let removed = state.allocated[self.slot].remove(&object);
        assert!(removed, "{object:?} released without allocation in instance {}", self.slot);
    }

    fn sync_object(&mut self, object: SceneObjectId) { self.state.lock().synced.push(object); }

    fn handle(&self) -> DescriptorHandle {
        DescriptorHandle(self.slot as u64)
    }
}

/// Creates a layout with `descriptors` mock descriptors sharing one state.
pub fn mock_layout(
    id: u32,
    descriptors: usize,
    state: &Arc<Mutex<MockState>>,
) -> Arc<PipelineLayout> {
    let factories: Vec<Arc<dyn DescriptorSetFactory>> = (0..descriptors)
        .map(|index| {
            Arc::new(MockDescriptor { name: format!("mock{index}"), state: Arc::clone(state) })
                as Arc<dyn DescriptorSetFactory>
        })
        .collect();
    Arc::new(PipelineLayout::new(LayoutId(id), factories))
}

/// Creates a pipeline using `layout`.
pub fn mock_pipeline(id: u32, layout: &Arc<PipelineLayout>) -> Arc<Pipeline> {
    Arc::new(Pipeline::new(PipelineId(id), Arc::clone(layout)))
}
