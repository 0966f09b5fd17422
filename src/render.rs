//! Scene batching and render graph scheduling.
//!
//! GPU work is expressed against the [`CommandBuffer`] trait.
//! [`CommandList`] records commands in memory for headless rendering and tests.

pub mod asset;
pub use asset::{Framebuffer, ShadowMap};

pub mod batch;
pub use batch::{
    DescriptorHandle, DescriptorSetFactory, DescriptorSetInstance, LayoutBatch, LayoutId,
    Pipeline, PipelineBatch, PipelineId, PipelineLayout,
};

pub mod command;
pub use command::{Command, CommandBuffer, CommandList};

pub mod graph;
pub use graph::{
    AssetTable, AssetTag, AssetTags, Creation, ObserverId, OutputTag, RenderGraph,
    RenderGraphError, Sharing, Stage, Task, TaskContext,
};

pub mod pass;
pub use pass::ScenePassTask;

pub mod scene;
pub use scene::{
    DrawParams, Drawable, Mesh, ObjectFlags, Scene, SceneError, SceneObject, SceneObjectId,
    StageId, UpdateSpeed,
};
