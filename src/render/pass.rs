//! A render task that draws one stage of a scene.

use std::sync::Arc;

use parking_lot::RwLock;

use super::{
    AssetTable, AssetTag, AssetTags, Framebuffer, ObserverId, OutputTag, RenderGraphError, Scene,
    StageId, Task, TaskContext,
};

/// Records one render stage of a shared [`Scene`] into a [`Framebuffer`] asset.
pub struct ScenePassTask {
    name:    String,
    scene:   Arc<RwLock<Scene>>,
    stage:   StageId,
    target:  AssetTag,
    /// Created by the task for each observer instead of being external.
    created: Option<Framebuffer>,
    reads:   Vec<AssetTag>,
    clear:   Option<[f32; 4]>,
}

impl ScenePassTask {
    /// Creates a pass that draws `stage` into the external framebuffer `target`.
    pub fn new(
        name: impl Into<String>,
        scene: Arc<RwLock<Scene>>,
        stage: StageId,
        target: impl Into<AssetTag>,
    ) -> Self {
        Self {
            name: name.into(),
            scene,
            stage,
            target: target.into(),
            created: None,
            reads: Vec::new(),
            clear: None,
        }
    }

    /// Creates the target per observer instead of expecting it to be external.
    pub fn create_target(mut self, framebuffer: Framebuffer) -> Self {
        self.created = Some(framebuffer);
        self
    }

    /// Requires another asset to be produced before this pass runs.
    pub fn read(mut self, tag: impl Into<AssetTag>) -> Self {
        self.reads.push(tag.into());
        self
    }

    /// Clears the target before drawing.
    pub fn clear(mut self, color: [f32; 4]) -> Self {
        self.clear = Some(color);
        self
    }
}

impl Task for ScenePassTask {
    fn name(&self) -> &str { &self.name }

    fn asset_tags(&self) -> AssetTags {
        let output = match self.created {
            Some(_) => OutputTag::created(self.target.clone()),
            None => OutputTag::external(self.target.clone()),
        };

        let mut tags = AssetTags::new().output(output);
        tags.required.extend(self.reads.iter().cloned());
        tags
    }

    fn create_assets(
        &mut self,
        _observer: ObserverId,
        assets: &mut AssetTable,
    ) -> Result<(), RenderGraphError> {
        if let Some(framebuffer) = self.created {
            assets.insert(self.target.clone(), framebuffer);
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut TaskContext<'_>) -> Result<(), RenderGraphError> {
        let target = ctx.assets.get::<Framebuffer>(self.target.as_str())?;

        ctx.cmd.bind_framebuffer(target);
        if let Some(color) = self.clear {
            ctx.cmd.clear(color);
        }
        self.scene.write().record_stage(self.stage, &mut *ctx.cmd);
        Ok(())
    }
}

static_assertions::assert_impl_all!(ScenePassTask: Send);
