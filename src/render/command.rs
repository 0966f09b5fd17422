//! Command recording.

use super::{DescriptorHandle, DrawParams, Framebuffer, LayoutId, Pipeline, PipelineId};

/// A sink for GPU commands.
pub trait CommandBuffer {
    /// Binds a pipeline for subsequent draws.
    fn bind_pipeline(&mut self, pipeline: &Pipeline);

    /// Binds a descriptor set at `index` of the layout.
    fn bind_descriptor_set(&mut self, layout: LayoutId, set: DescriptorHandle, index: usize);

    /// Uploads push constants for the next draw.
    fn push_constants(&mut self, bytes: &[u8]);

    /// Issues a draw call.
    fn draw(&mut self, params: &DrawParams);

    /// Directs subsequent draws to a framebuffer.
    fn bind_framebuffer(&mut self, framebuffer: &Framebuffer);

    /// Clears the bound framebuffer.
    fn clear(&mut self, color: [f32; 4]);
}

/// A recorded command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// See [`CommandBuffer::bind_pipeline`].
    BindPipeline(PipelineId),
    /// See [`CommandBuffer::bind_descriptor_set`].
    BindDescriptorSet {
        /// The layout the set belongs to.
        layout: LayoutId,
        /// The bound set.
        set:    DescriptorHandle,
        /// The set index in the layout.
        index:  usize,
    },
    /// See [`CommandBuffer::push_constants`].
    PushConstants(Vec<u8>),
    /// See [`CommandBuffer::draw`].
    Draw(DrawParams),
    /// See [`CommandBuffer::bind_framebuffer`].
    BindFramebuffer(u32),
    /// See [`CommandBuffer::clear`].
    Clear([f32; 4]),
}

/// A [`CommandBuffer`] that stores commands in a list.
#[derive(Debug, Default)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    /// Creates an empty list.
    pub fn new() -> Self { Self::default() }

    /// The recorded commands.
    pub fn commands(&self) -> &[Command] { &self.commands }

    /// Removes and returns the recorded commands.
    pub fn take(&mut self) -> Vec<Command> { std::mem::take(&mut self.commands) }

    /// Number of recorded commands.
    pub fn len(&self) -> usize { self.commands.len() }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool { self.commands.is_empty() }

    /// Number of recorded draw calls.
    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|command| matches!(command, Command::Draw(_))).count()
    }
}

impl CommandBuffer for CommandList {
    fn bind_pipeline(&mut self, pipeline: &Pipeline) {
        self.commands.push(Command::BindPipeline(pipeline.id()));
    }

    fn bind_descriptor_set(&mut self, layout: LayoutId, set: DescriptorHandle, index: usize) {
        self.commands.push(Command::BindDescriptorSet { layout, set, index });
    }

    fn push_constants(&mut self, bytes: &[u8]) {
        self.commands.push(Command::PushConstants(bytes.to_vec()));
    }

    fn draw(&mut self, params: &DrawParams) { self.commands.push(Command::Draw(params.clone())); }

    fn bind_framebuffer(&mut self, framebuffer: &Framebuffer) {
        self.commands.push(Command::BindFramebuffer(framebuffer.id));
    }

    fn clear(&mut self, color: [f32; 4]) { self.commands.push(Command::Clear(color)); }
}
