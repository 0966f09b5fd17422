//! Scheduling of render tasks connected through named assets.
//!
//! Each [`Task`] declares the assets it reads and writes as [`AssetTags`].
//! [`RenderGraph::build`] resolves every input against the tasks producing it
//! and layers the tasks into a timeline of [`Stage`]s,
//! where every task runs after all of its dependencies.
//!
//! Assets are stored per observer (e.g. per camera or per window),
//! so the same graph can render several views with separate targets.

use std::any::{self, Any};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;

use super::CommandBuffer;
use crate::tracer::{self, Tracer};

mod topology;
use topology::Topology;

#[cfg(test)]
mod tests;

/// The name of an asset in a render graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetTag(String);

impl AssetTag {
    /// Creates a tag.
    pub fn new(name: impl Into<String>) -> Self { Self(name.into()) }

    /// The tag name.
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for AssetTag {
    fn from(name: &str) -> Self { Self::new(name) }
}

impl Borrow<str> for AssetTag {
    fn borrow(&self) -> &str { &self.0 }
}

impl fmt::Display for AssetTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Who creates the asset behind an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Creation {
    /// The producing task creates the asset in [`Task::create_assets`].
    CreatedByTask,
    /// The asset is provided through [`RenderGraph::set_external_asset`].
    CreatedExternally,
}

/// Whether other tasks may write to the same asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sharing {
    /// No other task writes to the asset.
    Exclusive,
    /// Other shared writers are allowed; they run in insertion order.
    Shared,
}

/// An asset written by a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTag {
    /// The asset name.
    pub tag:      AssetTag,
    /// Who creates the asset.
    pub creation: Creation,
    /// Whether other tasks may write to it.
    pub sharing:  Sharing,
}

impl OutputTag {
    /// An exclusive output created by the producing task.
    pub fn created(tag: impl Into<AssetTag>) -> Self {
        Self { tag: tag.into(), creation: Creation::CreatedByTask, sharing: Sharing::Exclusive }
    }

    /// A shared output on an external asset.
    pub fn external(tag: impl Into<AssetTag>) -> Self {
        Self { tag: tag.into(), creation: Creation::CreatedExternally, sharing: Sharing::Shared }
    }

    /// Changes the sharing mode.
    pub fn with_sharing(mut self, sharing: Sharing) -> Self {
        self.sharing = sharing;
        self
    }
}

/// The assets a task reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetTags {
    /// Assets that must be produced by another task or be external.
    pub required: Vec<AssetTag>,
    /// Assets read if some task produces them.
    pub optional: Vec<AssetTag>,
    /// Assets written by the task.
    pub outputs:  Vec<OutputTag>,
}

impl AssetTags {
    /// Creates an empty declaration.
    pub fn new() -> Self { Self::default() }

    /// Adds a required input.
    pub fn require(mut self, tag: impl Into<AssetTag>) -> Self {
        self.required.push(tag.into());
        self
    }

    /// Adds an optional input.
    pub fn optional(mut self, tag: impl Into<AssetTag>) -> Self {
        self.optional.push(tag.into());
        self
    }

    /// Adds an output.
    pub fn output(mut self, output: OutputTag) -> Self {
        self.outputs.push(output);
        self
    }
}

/// Identifies the viewer a frame is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(pub u32);

/// The assets of one observer.
#[derive(Default)]
pub struct AssetTable {
    assets: HashMap<AssetTag, Arc<dyn Any + Send + Sync>>,
}

impl AssetTable {
    /// Gets an asset by tag.
    pub fn get<T: Any>(&self, tag: &str) -> Result<&T, RenderGraphError> {
        let asset = self.assets.get(tag).ok_or_else(|| RenderGraphError::MissingAsset(tag.into()))?;
        (**asset).downcast_ref::<T>().ok_or_else(|| RenderGraphError::AssetTypeMismatch {
            tag:      tag.into(),
            expected: any::type_name::<T>(),
        })
    }

    /// Gets an asset by tag as a shared pointer.
    pub fn get_arc(&self, tag: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.assets.get(tag).cloned()
    }

    /// Inserts an asset, returning the previous one.
    pub fn insert(
        &mut self,
        tag: impl Into<AssetTag>,
        asset: impl Any + Send + Sync,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        self.assets.insert(tag.into(), Arc::new(asset))
    }

    /// Whether an asset with the tag exists.
    pub fn contains(&self, tag: &str) -> bool { self.assets.contains_key(tag) }

    /// Number of assets.
    pub fn len(&self) -> usize { self.assets.len() }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool { self.assets.is_empty() }
}

impl fmt::Debug for AssetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.assets.keys().collect();
        tags.sort();
        f.debug_set().entries(tags).finish()
    }
}

/// Errors from building or executing a [`RenderGraph`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderGraphError {
    /// A required input has no producer and is not external.
    #[error("task `{task}` requires `{tag}`, which is neither produced by a task nor external")]
    UnresolvedInput {
        /// The reading task.
        task: String,
        /// The missing asset.
        tag:  AssetTag,
    },
    /// An exclusive output has another writer.
    #[error("`{tag}` is written by both `{first}` and `{second}` but one of them is exclusive")]
    DuplicateExclusiveOutput {
        /// The asset.
        tag:    AssetTag,
        /// The earlier writer.
        first:  String,
        /// The later writer.
        second: String,
    },
    /// An externally created output was not declared external.
    #[error("task `{task}` writes to `{tag}`, which is not declared external")]
    MissingExternal {
        /// The writing task.
        task: String,
        /// The asset.
        tag:  AssetTag,
    },
    /// The dependencies form a cycle.
    #[error("render tasks have a cyclic dependency: {0}")]
    Cycle(String),
    /// An asset is not of the requested type.
    #[error("asset `{tag}` is not a `{expected}`")]
    AssetTypeMismatch {
        /// The asset.
        tag:      AssetTag,
        /// The requested type.
        expected: &'static str,
    },
    /// An asset does not exist for the observer.
    #[error("asset `{0}` does not exist")]
    MissingAsset(AssetTag),
}

/// What a task has access to while executing.
pub struct TaskContext<'a> {
    /// The command buffer of the frame.
    pub cmd:      &'a mut dyn CommandBuffer,
    /// The observer the frame is rendered for.
    pub observer: ObserverId,
    /// The assets of the observer.
    pub assets:   &'a AssetTable,
    /// The index of the current stage.
    pub stage:    usize,
}

/// A unit of render work.
pub trait Task: Send {
    /// The name of the task, for diagnostics.
    fn name(&self) -> &str;

    /// The assets the task reads and writes.
    ///
    /// This is queried once when the task is added.
    fn asset_tags(&self) -> AssetTags;

    /// Creates the [`Creation::CreatedByTask`] outputs of the task for an observer.
    ///
    /// Called once per observer after each rebuild, before the first execution.
    fn create_assets(
        &mut self,
        observer: ObserverId,
        assets: &mut AssetTable,
    ) -> Result<(), RenderGraphError> {
        let _ = (observer, assets);
        Ok(())
    }

    /// Records the work of the task.
    fn execute(&mut self, ctx: &mut TaskContext<'_>) -> Result<(), RenderGraphError>;
}

/// A set of tasks that have no dependencies among each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stage {
    tasks: Vec<usize>,
}

impl Stage {
    /// The indices of the tasks in this stage, in insertion order.
    pub fn tasks(&self) -> &[usize] { &self.tasks }
}

struct TaskEntry {
    task: Box<dyn Task>,
    tags: AssetTags,
}

#[derive(Default)]
struct ObserverState {
    assets:  AssetTable,
    created: bool,
}

/// An ordered collection of render tasks.
#[derive(Default)]
pub struct RenderGraph {
    tasks:         Vec<TaskEntry>,
    externals:     IndexSet<AssetTag>,
    observers:     HashMap<ObserverId, ObserverState>,
    topology:      Topology,
    needs_rebuild: bool,
}

impl RenderGraph {
    /// Creates an empty graph.
    pub fn new() -> Self { Self::default() }

    /// Adds a task, returning its index.
    pub fn add_task(&mut self, task: Box<dyn Task>) -> usize {
        let tags = task.asset_tags();
        log::debug!("Adding render task `{}` with {tags:?}", task.name());

        self.tasks.push(TaskEntry { task, tags });
        self.needs_rebuild = true;
        self.tasks.len() - 1
    }

    /// Declares that an asset is provided externally.
    pub fn declare_external(&mut self, tag: impl Into<AssetTag>) {
        if self.externals.insert(tag.into()) {
            self.needs_rebuild = true;
        }
    }

    /// Provides an external asset for an observer, declaring it external if needed.
    pub fn set_external_asset(
        &mut self,
        observer: ObserverId,
        tag: impl Into<AssetTag>,
        asset: impl Any + Send + Sync,
    ) {
        let tag = tag.into();
        self.declare_external(tag.clone());
        self.observers.entry(observer).or_default().assets.insert(tag, asset);
    }

    /// The assets of an observer.
    pub fn assets(&self, observer: ObserverId) -> Option<&AssetTable> {
        self.observers.get(&observer).map(|state| &state.assets)
    }

    /// Rebuilds the timeline.
    pub fn build(&mut self) -> Result<(), RenderGraphError> { self.build_traced(&tracer::Noop) }

    /// Rebuilds the timeline, reporting to a tracer.
    ///
    /// On failure the previous timeline is kept and the graph still needs a rebuild.
    pub fn build_traced(&mut self, tracer: &impl Tracer) -> Result<(), RenderGraphError> {
        tracer.start_build();

        let tasks: Vec<(&str, &AssetTags)> =
            self.tasks.iter().map(|entry| (entry.task.name(), &entry.tags)).collect();
        let topology = Topology::init(&tasks, &self.externals)?;

        log::debug!(
            "Built render graph with {} tasks in {} stages",
            self.tasks.len(),
            topology.stages.len()
        );
        tracer.end_build(topology.stages.len());

        self.topology = topology;
        self.needs_rebuild = false;
        for state in self.observers.values_mut() {
            state.created = false;
        }
        Ok(())
    }

    /// Executes every task for an observer in timeline order.
    ///
    /// The graph is rebuilt first if tasks or externals changed,
    /// and task-created assets are created on the first frame of the observer.
    pub fn execute(
        &mut self,
        cmd: &mut dyn CommandBuffer,
        observer: ObserverId,
        tracer: &impl Tracer,
    ) -> Result<(), RenderGraphError> {
        if self.needs_rebuild {
            self.build_traced(tracer)?;
        }

        let Self { tasks, observers, topology, .. } = self;
        let state = observers.entry(observer).or_default();

        if !state.created {
            for stage in &topology.stages {
                for &index in stage.tasks() {
                    let entry = &mut tasks[index];
                    entry.task.create_assets(observer, &mut state.assets)?;

                    for output in &entry.tags.outputs {
                        if output.creation == Creation::CreatedByTask
                            && !state.assets.contains(output.tag.as_str())
                        {
                            log::error!(
                                "Render task `{}` did not create its output `{}`",
                                entry.task.name(),
                                output.tag
                            );
                            return Err(RenderGraphError::MissingAsset(output.tag.clone()));
                        }
                    }
                }
            }
            state.created = true;
        }

        tracer.start_frame(observer);
        for (stage_index, stage) in topology.stages.iter().enumerate() {
            tracer.start_stage(stage_index);

            for &index in stage.tasks() {
                let task = &mut tasks[index].task;
                tracer.start_task(stage_index, task.name());

                let mut ctx =
                    TaskContext { cmd: &mut *cmd, observer, assets: &state.assets, stage: stage_index };
                task.execute(&mut ctx)?;

                tracer.end_task(stage_index, task.name());
            }
        }
        tracer.end_frame(observer);

        Ok(())
    }

    /// The stages of the last successful build.
    pub fn timeline(&self) -> &[Stage] { &self.topology.stages }

    /// The tasks a task depends on, as of the last successful build.
    pub fn dependencies_of(&self, task: usize) -> &[usize] {
        self.topology.dependencies.get(task).map_or(&[][..], Vec::as_slice)
    }

    /// The name of a task.
    pub fn task_name(&self, task: usize) -> Option<&str> {
        self.tasks.get(task).map(|entry| entry.task.name())
    }

    /// Whether tasks or externals changed since the last successful build.
    pub fn needs_rebuild(&self) -> bool { self.needs_rebuild }

    /// Number of tasks.
    pub fn task_count(&self) -> usize { self.tasks.len() }
}
