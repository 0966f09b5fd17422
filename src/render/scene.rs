//! Scene objects and their placement in render stage batches.

use std::ops;
use std::sync::Arc;

use indexmap::IndexMap;
use xias::Xias;

use super::{CommandBuffer, LayoutBatch, LayoutId, Pipeline, PipelineId};
use crate::config::SceneConfig;
use crate::Entity;


/// How often an object is expected to change.
///
/// Static and dynamic objects are allocated from separate ID ranges,
/// so descriptors can use different memory strategies for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateSpeed {
    /// Rarely or never changes after creation.
    Static,
    /// Changes most frames.
    Dynamic,
}

/// Identifies a render stage, e.g. the shadow pass or the opaque pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StageId(pub u32);

/// Identifies an object within a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SceneObjectId(pub u32);

impl SceneObjectId {
    /// The index of the object in the scene's object table.
    pub fn index(self) -> usize { self.0.small_int() }
}

/// Parameters of a draw call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawParams {
    /// Handle of the vertex buffer.
    pub vertex_buffer:  u64,
    /// Handle of the index buffer, if the draw is indexed.
    pub index_buffer:   Option<u64>,
    /// Number of vertices for non-indexed draws.
    pub vertex_count:   u32,
    /// Number of indices for indexed draws.
    pub index_count:    u32,
    /// Offset of the first vertex.
    pub first_vertex:   u32,
    /// Offset of the first index.
    pub first_index:    u32,
    /// Number of instances.
    pub instance_count: u32,
}

/// Dirty state of a [`SceneObject`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectFlags(u8);

impl ObjectFlags {
    /// No pending changes.
    pub const EMPTY: Self = Self(0);
    /// Push constants changed since the last draw.
    pub const PUSH_CONSTANTS_DIRTY: Self = Self(1);
    /// Stage pipelines changed and the object must be moved between batches.
    pub const RENDER_STAGES_DIRTY: Self = Self(2);
    /// Draw parameters changed since the last draw.
    pub const DRAW_PARAMS_DIRTY: Self = Self(4);

    /// Whether all flags in `other` are set.
    pub fn contains(self, other: Self) -> bool { self.0 & other.0 == other.0 }

    /// Whether any flag in `other` is set.
    pub fn intersects(self, other: Self) -> bool { self.0 & other.0 != 0 }

    /// Sets the flags in `other`.
    pub fn insert(&mut self, other: Self) { self.0 |= other.0; }

    /// Clears the flags in `other`.
    pub fn remove(&mut self, other: Self) { self.0 &= !other.0; }

    /// Whether no flag is set.
    pub fn is_empty(self) -> bool { self.0 == 0 }
}

impl ops::BitOr for ObjectFlags {
    type Output = Self;

    fn bitor(self, other: Self) -> Self { Self(self.0 | other.0) }
}

/// The bookkeeping of one renderable entity in a scene.
#[derive(Debug)]
pub struct SceneObject {
    id:                     SceneObjectId,
    entity:                 Entity,
    speed:                  UpdateSpeed,
    flags:                  ObjectFlags,
    pending_draw_params:    DrawParams,
    draw_params:            DrawParams,
    pending_push_constants: Vec<u8>,
    push_constants:         Vec<u8>,
    /// The pipeline the object is batched under in each stage.
    stages:                 IndexMap<StageId, Arc<Pipeline>>,
    /// Replaces `stages` when `RENDER_STAGES_DIRTY` is applied.
    pending_stages:         Option<IndexMap<StageId, Arc<Pipeline>>>,
    /// Bumped on every change of draw parameters or push constants.
    generation:             u64,
}

impl SceneObject {
    /// The scene-local ID.
    pub fn id(&self) -> SceneObjectId { self.id }

    /// The entity this object renders.
    pub fn entity(&self) -> Entity { self.entity }

    /// The update speed the object was created with.
    pub fn speed(&self) -> UpdateSpeed { self.speed }

    /// Pending changes.
    pub fn flags(&self) -> ObjectFlags { self.flags }

    /// The draw parameters as of the last draw.
    pub fn draw_params(&self) -> &DrawParams { &self.draw_params }

    /// The push constants as of the last draw.
    pub fn push_constants(&self) -> &[u8] { &self.push_constants }

    /// The pipeline of each stage the object is batched in.
    pub fn stages(&self) -> impl Iterator<Item = (StageId, &Arc<Pipeline>)> + '_ {
        self.stages.iter().map(|(&stage, pipeline)| (stage, pipeline))
    }

    /// Counts changes to the draw parameters and push constants.
    ///
    /// Each layout batch resynchronizes its descriptors when this differs
    /// from the generation it last drew.
    pub fn generation(&self) -> u64 { self.generation }

    /// Applies pending draw parameters and push constants.
    pub(crate) fn sync(&mut self) {
        let dirty = ObjectFlags::PUSH_CONSTANTS_DIRTY | ObjectFlags::DRAW_PARAMS_DIRTY;
        if !self.flags.intersects(dirty) {
            return;
        }

        if self.flags.contains(ObjectFlags::DRAW_PARAMS_DIRTY) {
            self.draw_params.clone_from(&self.pending_draw_params);
        }
        if self.flags.contains(ObjectFlags::PUSH_CONSTANTS_DIRTY) {
            self.push_constants.clone_from(&self.pending_push_constants);
        }
        self.flags.remove(dirty);
    }
}

/// Errors from adding objects to a [`Scene`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// All object IDs of the update speed are in use.
    #[error("no free {0:?} object slots")]
    OutOfObjectSlots(UpdateSpeed),
    /// A descriptor of the layout could not allocate the object.
    #[error("descriptor allocation failed in {layout:?} for {stage:?}")]
    DescriptorAllocation {
        /// The stage being added to.
        stage:  StageId,
        /// The layout of the pipeline in that stage.
        layout: LayoutId,
    },
    /// The same stage was assigned more than one pipeline.
    #[error("{0:?} is assigned more than one pipeline")]
    DuplicateStage(StageId),
    /// The object ID is not in use.
    #[error("{0:?} does not exist")]
    NoSuchObject(SceneObjectId),
}

/// The objects of a scene, batched per render stage.
pub struct Scene {
    config:       SceneConfig,
    /// Indexed by object ID.
    objects:      Vec<Option<SceneObject>>,
    /// `entity_map[id]` is the entity of object `id`, or [`Entity::INVALID`].
    entity_map:   Vec<Entity>,
    free_static:  Vec<u32>,
    free_dynamic: Vec<u32>,
    stages:       IndexMap<StageId, IndexMap<LayoutId, LayoutBatch>>,
    /// Objects with `RENDER_STAGES_DIRTY`, in the order they were changed.
    stage_dirty:  Vec<SceneObjectId>,
}

impl Scene {
    /// Creates an empty scene.
    pub fn new(config: SceneConfig) -> Self {
        let total = config.max_static_objects + config.max_dynamic_objects;
        let mut objects = Vec::with_capacity(total);
        objects.resize_with(total, || None);

        Self {
            config,
            objects,
            entity_map: vec![Entity::INVALID; total],
            free_static: (0..config.max_static_objects).rev().map(|id| id.small_int()).collect(),
            free_dynamic: (config.max_static_objects..total).rev().map(|id| id.small_int()).collect(),
            stages: IndexMap::new(),
            stage_dirty: Vec::new(),
        }
    }

    /// The configuration of this scene.
    pub fn config(&self) -> &SceneConfig { &self.config }

    /// Creates an object and adds it to the batch of each stage.
    ///
    /// On failure, nothing is left allocated for the object.
    pub fn create_and_add_object(
        &mut self,
        entity: Entity,
        draw_params: DrawParams,
        speed: UpdateSpeed,
        pipelines: &[(StageId, Arc<Pipeline>)],
    ) -> Result<SceneObjectId, SceneError> {
        let stages = collect_stages(pipelines)?;

        let free = match speed {
            UpdateSpeed::Static => &mut self.free_static,
            UpdateSpeed::Dynamic => &mut self.free_dynamic,
        };
        let id = SceneObjectId(free.pop().ok_or(SceneError::OutOfObjectSlots(speed))?);

        let attached: Vec<(StageId, Arc<Pipeline>)> =
            stages.iter().map(|(&stage, pipeline)| (stage, Arc::clone(pipeline))).collect();
        if let Err(err) = self.attach_all(id, entity, speed, &attached) {
            self.free_id(id, speed);
            return Err(err);
        }

        self.entity_map[id.index()] = entity;
        self.objects[id.index()] = Some(SceneObject {
            id,
            entity,
            speed,
            flags: ObjectFlags::DRAW_PARAMS_DIRTY,
            pending_draw_params: draw_params,
            draw_params: DrawParams::default(),
            pending_push_constants: Vec::new(),
            push_constants: Vec::new(),
            stages,
            pending_stages: None,
            generation: 1,
        });

        log::trace!("Added {entity:?} to the scene as {id:?}");
        Ok(id)
    }

    /// Removes an object from every stage and frees its ID.
    ///
    /// Returns `false` if the object does not exist.
    pub fn remove_object(&mut self, id: SceneObjectId) -> bool {
        let Some(object) = self.objects.get_mut(id.index()).and_then(Option::take) else {
            return false;
        };

        for (&stage, pipeline) in &object.stages {
            self.detach(id, stage, pipeline);
        }
        self.stage_dirty.retain(|&dirty| dirty != id);
        self.entity_map[id.index()] = Entity::INVALID;
        self.free_id(id, object.speed);
        true
    }

    fn free_id(&mut self, id: SceneObjectId, speed: UpdateSpeed) {
        match speed {
            UpdateSpeed::Static => self.free_static.push(id.0),
            UpdateSpeed::Dynamic => self.free_dynamic.push(id.0),
        }
    }

    /// Adds an object to one batch per stage, rolling back on failure.
    fn attach_all(
        &mut self,
        id: SceneObjectId,
        entity: Entity,
        speed: UpdateSpeed,
        stages: &[(StageId, Arc<Pipeline>)],
    ) -> Result<(), SceneError> {
        for (index, (stage, pipeline)) in stages.iter().enumerate() {
            if !self.attach(id, entity, speed, *stage, pipeline) {
                for (stage, pipeline) in &stages[..index] {
                    self.detach(id, *stage, pipeline);
                }
                return Err(SceneError::DescriptorAllocation {
                    stage:  *stage,
                    layout: pipeline.layout().id(),
                });
            }
        }
        Ok(())
    }

    fn attach(
        &mut self,
        id: SceneObjectId,
        entity: Entity,
        speed: UpdateSpeed,
        stage: StageId,
        pipeline: &Arc<Pipeline>,
    ) -> bool {
        let layouts = self.stages.entry(stage).or_default();
        let layout = pipeline.layout();
        let batch =
            layouts.entry(layout.id()).or_insert_with(|| LayoutBatch::new(Arc::clone(layout)));
        let added = batch.add_object(id, entity, pipeline, speed);

        if batch.is_empty() {
            layouts.shift_remove(&layout.id());
            if layouts.is_empty() {
                self.stages.shift_remove(&stage);
            }
        }
        added
    }

    fn detach(&mut self, id: SceneObjectId, stage: StageId, pipeline: &Pipeline) {
        let layout = pipeline.layout().id();
        let Some(layouts) = self.stages.get_mut(&stage) else { return };
        let Some(batch) = layouts.get_mut(&layout) else { return };

        let removed = batch.remove_object(id, pipeline.id());
        debug_assert!(removed, "{id:?} is not batched under {:?} in {stage:?}", pipeline.id());
        if batch.is_empty() {
            layouts.shift_remove(&layout);
            if layouts.is_empty() {
                self.stages.shift_remove(&stage);
            }
        }
    }

    fn object_mut(&mut self, id: SceneObjectId) -> Result<&mut SceneObject, SceneError> {
        self.objects
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(SceneError::NoSuchObject(id))
    }

    /// Replaces the draw parameters, applied before the next draw.
    pub fn set_draw_params(&mut self, id: SceneObjectId, params: DrawParams) -> Result<(), SceneError> {
        let object = self.object_mut(id)?;
        object.pending_draw_params = params;
        object.flags.insert(ObjectFlags::DRAW_PARAMS_DIRTY);
        object.generation += 1;
        Ok(())
    }

    /// Replaces the push constants, applied before the next draw.
    pub fn set_push_constants(&mut self, id: SceneObjectId, bytes: Vec<u8>) -> Result<(), SceneError> {
        let object = self.object_mut(id)?;
        object.pending_push_constants = bytes;
        object.flags.insert(ObjectFlags::PUSH_CONSTANTS_DIRTY);
        object.generation += 1;
        Ok(())
    }

    /// Replaces the stage pipelines, applied when the next stage is recorded.
    pub fn set_pipelines(
        &mut self,
        id: SceneObjectId,
        pipelines: &[(StageId, Arc<Pipeline>)],
    ) -> Result<(), SceneError> {
        let stages = collect_stages(pipelines)?;
        let object = self.object_mut(id)?;
        object.pending_stages = Some(stages);
        if !object.flags.contains(ObjectFlags::RENDER_STAGES_DIRTY) {
            object.flags.insert(ObjectFlags::RENDER_STAGES_DIRTY);
            self.stage_dirty.push(id);
        }
        Ok(())
    }

    /// Moves objects with changed stage pipelines between batches.
    ///
    /// An object that cannot be allocated in its new batches keeps its old stages.
    fn apply_stage_changes(&mut self) {
        for id in std::mem::take(&mut self.stage_dirty) {
            let Some(object) = self.objects.get_mut(id.index()).and_then(Option::as_mut) else {
                continue;
            };
            object.flags.remove(ObjectFlags::RENDER_STAGES_DIRTY);
            let Some(new_stages) = object.pending_stages.take() else { continue };
            let old_stages = object.stages.clone();
            let (entity, speed) = (object.entity, object.speed);

            let detached: Vec<(StageId, Arc<Pipeline>)> = old_stages
                .iter()
                .filter(|(stage, pipeline)| {
                    new_stages.get(*stage).map_or(true, |new| new.id() != pipeline.id())
                })
                .map(|(&stage, pipeline)| (stage, Arc::clone(pipeline)))
                .collect();
            let attached: Vec<(StageId, Arc<Pipeline>)> = new_stages
                .iter()
                .filter(|(stage, pipeline)| {
                    old_stages.get(*stage).map_or(true, |old| old.id() != pipeline.id())
                })
                .map(|(&stage, pipeline)| (stage, Arc::clone(pipeline)))
                .collect();

            for (stage, pipeline) in &detached {
                self.detach(id, *stage, pipeline);
            }

            let stages = match self.attach_all(id, entity, speed, &attached) {
                Ok(()) => new_stages,
                Err(err) => {
                    log::warn!("Cannot move {id:?} to its new stages: {err}");
                    if let Err(err) = self.attach_all(id, entity, speed, &detached) {
                        log::error!("Cannot restore {id:?} to its old stages: {err}");
                        old_stages
                            .into_iter()
                            .filter(|(stage, _)| !detached.iter().any(|(other, _)| other == stage))
                            .collect()
                    } else {
                        old_stages
                    }
                }
            };

            if let Some(object) = self.objects[id.index()].as_mut() {
                object.stages = stages;
            }
        }
    }

    /// Records the draw commands of one stage.
    ///
    /// Pending stage changes of all objects are applied first.
    pub fn record_stage(&mut self, stage: StageId, cmd: &mut dyn CommandBuffer) {
        self.apply_stage_changes();

        if let Some(layouts) = self.stages.get_mut(&stage) {
            for batch in layouts.values_mut() {
                batch.record_render_commands(&mut self.objects, cmd);
            }
        }
    }

    /// Gets an object.
    pub fn object(&self, id: SceneObjectId) -> Option<&SceneObject> {
        self.objects.get(id.index()).and_then(Option::as_ref)
    }

    /// The entity of an object, or [`Entity::INVALID`].
    pub fn entity_of(&self, id: SceneObjectId) -> Entity {
        self.entity_map.get(id.index()).copied().unwrap_or(Entity::INVALID)
    }

    /// Number of live objects.
    pub fn len(&self) -> usize { self.objects.iter().filter(|object| object.is_some()).count() }

    /// Whether the scene has no objects.
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// The stages that currently have batches.
    pub fn stages(&self) -> impl Iterator<Item = StageId> + '_ { self.stages.keys().copied() }

    /// The layout batches of a stage.
    pub fn layout_batches(&self, stage: StageId) -> impl Iterator<Item = &LayoutBatch> + '_ {
        self.stages.get(&stage).into_iter().flat_map(|layouts| layouts.values())
    }

    /// Number of pipeline batches containing the object in a stage.
    pub fn batch_count_of(&self, id: SceneObjectId, stage: StageId) -> usize {
        self.layout_batches(stage)
            .flat_map(|batch| batch.pipeline_batches())
            .filter(|batch| batch.contains(id))
            .count()
    }
}

fn collect_stages(
    pipelines: &[(StageId, Arc<Pipeline>)],
) -> Result<IndexMap<StageId, Arc<Pipeline>>, SceneError> {
    let mut stages = IndexMap::with_capacity(pipelines.len());
    for (stage, pipeline) in pipelines {
        if stages.insert(*stage, Arc::clone(pipeline)).is_some() {
            return Err(SceneError::DuplicateStage(*stage));
        }
    }
    Ok(stages)
}

/// A component that can place itself in a scene.
pub trait Drawable {
    /// Adds the drawable to a scene.
    fn add_to_scene(
        &mut self,
        scene: &mut Scene,
        entity: Entity,
        speed: UpdateSpeed,
    ) -> Result<SceneObjectId, SceneError>;

    /// Removes the drawable from the scene it was added to.
    ///
    /// Returns `false` if it was not in a scene.
    fn remove_from_scene(&mut self, scene: &mut Scene) -> bool;
}

/// A drawable mesh with a pipeline per stage.
#[derive(Debug, Clone)]
pub struct Mesh {
    /// The draw call of the mesh.
    pub draw_params: DrawParams,
    /// The pipeline used in each stage the mesh is drawn in.
    pub pipelines:   Vec<(StageId, Arc<Pipeline>)>,
    object:          Option<SceneObjectId>,
}

impl Mesh {
    /// Creates a mesh that is not in any scene.
    pub fn new(draw_params: DrawParams, pipelines: Vec<(StageId, Arc<Pipeline>)>) -> Self {
        Self { draw_params, pipelines, object: None }
    }

    /// The scene object of this mesh, if it was added to a scene.
    pub fn object(&self) -> Option<SceneObjectId> { self.object }

    /// The pipeline of a stage.
    pub fn pipeline(&self, stage: StageId) -> Option<PipelineId> {
        self.pipelines.iter().find(|(other, _)| *other == stage).map(|(_, pipeline)| pipeline.id())
    }
}

impl Drawable for Mesh {
    fn add_to_scene(
        &mut self,
        scene: &mut Scene,
        entity: Entity,
        speed: UpdateSpeed,
    ) -> Result<SceneObjectId, SceneError> {
        if let Some(id) = self.object {
            return Ok(id);
        }

        let id = scene.create_and_add_object(entity, self.draw_params.clone(), speed, &self.pipelines)?;
        self.object = Some(id);
        Ok(id)
    }

    fn remove_from_scene(&mut self, scene: &mut Scene) -> bool {
        match self.object.take() {
            Some(id) => scene.remove_object(id),
            None => false,
        }
    }
}

static_assertions::assert_impl_all!(Scene: Send, Sync);
