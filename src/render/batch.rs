//! Grouping of scene objects by descriptor layout and pipeline.
//!
//! A [`LayoutBatch`] owns one descriptor set instance per descriptor of its layout,
//! shared by all objects drawn with any pipeline of that layout.
//! Within it, a [`PipelineBatch`] lists the objects drawn with one exact pipeline.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;

use super::{CommandBuffer, SceneObject, SceneObjectId, UpdateSpeed};
use crate::Entity;


/// Identifies a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PipelineId(pub u32);

/// Identifies a pipeline layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayoutId(pub u32);

/// An opaque descriptor set handle passed to the command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorHandle(pub u64);

/// The per-layout-batch state of one descriptor.
///
/// Allocation is single-threaded per scene.
pub trait DescriptorSetInstance: Send + Sync {
    /// Reserves the per-object slot of a descriptor.
    ///
    /// Returns `false` if the descriptor cannot hold another object.
    fn allocate_object(&mut self, object: SceneObjectId, entity: Entity, speed: UpdateSpeed)
        -> bool;

    /// Frees the slot reserved by [`allocate_object`](Self::allocate_object).
    fn release_object(&mut self, object: SceneObjectId);

    /// Refreshes the descriptor data of a dirty object before it is drawn.
    fn sync_object(&mut self, object: SceneObjectId);

    /// The descriptor set to bind.
    fn handle(&self) -> DescriptorHandle;
}

/// Creates a [`DescriptorSetInstance`] for each layout batch using the descriptor.
pub trait DescriptorSetFactory: Send + Sync {
    /// The name of the descriptor, for diagnostics.
    fn name(&self) -> &str;

    /// Creates the state of this descriptor for a new layout batch.
    fn create_instance(&self) -> Box<dyn DescriptorSetInstance>;
}

/// An ordered list of descriptors shared by compatible pipelines.
pub struct PipelineLayout {
    id:          LayoutId,
    descriptors: Vec<Arc<dyn DescriptorSetFactory>>,
}

impl PipelineLayout {
    /// Creates a layout. Descriptors are bound at their index in `descriptors`.
    pub fn new(id: LayoutId, descriptors: Vec<Arc<dyn DescriptorSetFactory>>) -> Self {
        Self { id, descriptors }
    }

    /// The layout ID.
    pub fn id(&self) -> LayoutId { self.id }

    /// The descriptors in binding order.
    pub fn descriptors(&self) -> &[Arc<dyn DescriptorSetFactory>] { &self.descriptors }
}

impl fmt::Debug for PipelineLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipelineLayout({:?}: [{}])",
            self.id,
            self.descriptors.iter().map(|descriptor| descriptor.name()).join(", ")
        )
    }
}

/// A GPU pipeline.
#[derive(Debug)]
pub struct Pipeline {
    id:     PipelineId,
    layout: Arc<PipelineLayout>,
}

impl Pipeline {
    /// Creates a pipeline using a layout.
    pub fn new(id: PipelineId, layout: Arc<PipelineLayout>) -> Self { Self { id, layout } }

    /// The pipeline ID.
    pub fn id(&self) -> PipelineId { self.id }

    /// The layout of this pipeline.
    pub fn layout(&self) -> &Arc<PipelineLayout> { &self.layout }
}

/// The objects drawn with one pipeline, in insertion order.
#[derive(Debug)]
pub struct PipelineBatch {
    pipeline: Arc<Pipeline>,
    objects:  IndexSet<SceneObjectId>,
}

impl PipelineBatch {
    fn new(pipeline: Arc<Pipeline>) -> Self { Self { pipeline, objects: IndexSet::new() } }

    /// The pipeline of this batch.
    pub fn pipeline(&self) -> &Arc<Pipeline> { &self.pipeline }

    /// The objects in this batch.
    pub fn objects(&self) -> impl Iterator<Item = SceneObjectId> + '_ { self.objects.iter().copied() }

    /// Whether the object is in this batch.
    pub fn contains(&self, object: SceneObjectId) -> bool { self.objects.contains(&object) }

    /// Number of objects.
    pub fn len(&self) -> usize { self.objects.len() }

    /// Whether the batch has no objects.
    pub fn is_empty(&self) -> bool { self.objects.is_empty() }

    fn record(
        &self,
        objects: &mut [Option<SceneObject>],
        descriptors: &mut [Box<dyn DescriptorSetInstance>],
        synced: &mut HashMap<SceneObjectId, u64>,
        cmd: &mut dyn CommandBuffer,
    ) {
        cmd.bind_pipeline(&self.pipeline);

        for &id in &self.objects {
            let object = objects
                .get_mut(id.index())
                .and_then(Option::as_mut)
                .expect("batched objects are owned by the scene");

            object.sync();
            let generation = object.generation();
            if synced.insert(id, generation) != Some(generation) {
                for descriptor in descriptors.iter_mut() {
                    descriptor.sync_object(id);
                }
            }

            if !object.push_constants().is_empty() {
                cmd.push_constants(object.push_constants());
            }
            cmd.draw(object.draw_params());
        }
    }
}

/// The objects drawn with pipelines of one layout in one render stage.
pub struct LayoutBatch {
    layout:      Arc<PipelineLayout>,
    descriptors: Vec<Box<dyn DescriptorSetInstance>>,
    batches:     IndexMap<PipelineId, PipelineBatch>,
    /// The object generation last synced to the descriptors of this batch.
    synced:      HashMap<SceneObjectId, u64>,
}

impl LayoutBatch {
    /// Creates an empty batch with fresh descriptor set instances.
    pub fn new(layout: Arc<PipelineLayout>) -> Self {
        let descriptors =
            layout.descriptors().iter().map(|factory| factory.create_instance()).collect();
        Self { layout, descriptors, batches: IndexMap::new(), synced: HashMap::new() }
    }

    /// The layout of this batch.
    pub fn layout(&self) -> &Arc<PipelineLayout> { &self.layout }

    /// Allocates the object in every descriptor and adds it to the batch of `pipeline`.
    ///
    /// If any allocation fails, the allocations already made for this object are released
    /// and the batch is unchanged.
    ///
    /// # Panics
    /// Panics if `pipeline` does not use the layout of this batch.
    pub fn add_object(
        &mut self,
        object: SceneObjectId,
        entity: Entity,
        pipeline: &Arc<Pipeline>,
        speed: UpdateSpeed,
    ) -> bool {
        assert_eq!(
            pipeline.layout().id(),
            self.layout.id(),
            "{:?} cannot be batched in {:?}",
            pipeline.id(),
            self.layout
        );

        for index in 0..self.descriptors.len() {
            if !self.descriptors[index].allocate_object(object, entity, speed) {
                log::warn!(
                    "Descriptor {} of {:?} cannot allocate {object:?}",
                    self.layout.descriptors()[index].name(),
                    self.layout.id(),
                );
                for allocated in &mut self.descriptors[..index] {
                    allocated.release_object(object);
                }
                return false;
            }
        }

        self.batches
            .entry(pipeline.id())
            .or_insert_with(|| PipelineBatch::new(Arc::clone(pipeline)))
            .objects
            .insert(object);
        true
    }

    /// Releases the object from every descriptor and removes it from its pipeline batch.
    ///
    /// Returns `false` if the object is not in the batch of `pipeline`.
    pub fn remove_object(&mut self, object: SceneObjectId, pipeline: PipelineId) -> bool {
        let Some(batch) = self.batches.get_mut(&pipeline) else { return false };
        if !batch.objects.shift_remove(&object) {
            return false;
        }
        if batch.is_empty() {
            self.batches.shift_remove(&pipeline);
        }
        self.synced.remove(&object);

        for descriptor in &mut self.descriptors {
            descriptor.release_object(object);
        }
        true
    }

    /// Records the draw commands of every object in this batch.
    ///
    /// Each descriptor set is bound once,
    /// then each pipeline batch binds its pipeline and draws its objects.
    /// An object changed since this batch last drew it is synchronized
    /// with the descriptors of this batch right before it is drawn.
    pub fn record_render_commands(
        &mut self,
        objects: &mut [Option<SceneObject>],
        cmd: &mut dyn CommandBuffer,
    ) {
        if self.batches.is_empty() {
            return;
        }

        for (index, descriptor) in self.descriptors.iter().enumerate() {
            cmd.bind_descriptor_set(self.layout.id(), descriptor.handle(), index);
        }

        for batch in self.batches.values() {
            batch.record(objects, &mut self.descriptors, &mut self.synced, cmd);
        }
    }

    /// The pipeline batches in creation order.
    pub fn pipeline_batches(&self) -> impl Iterator<Item = &PipelineBatch> + '_ {
        self.batches.values()
    }

    /// The batch of a pipeline.
    pub fn pipeline_batch(&self, pipeline: PipelineId) -> Option<&PipelineBatch> {
        self.batches.get(&pipeline)
    }

    /// Total number of objects across all pipeline batches.
    pub fn object_count(&self) -> usize { self.batches.values().map(PipelineBatch::len).sum() }

    /// Whether the batch has no objects.
    pub fn is_empty(&self) -> bool { self.batches.is_empty() }
}
