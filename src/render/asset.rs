//! Built-in render graph assets.

/// A render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framebuffer {
    /// Identifies the target in recorded commands.
    pub id:     u32,
    /// Width in pixels.
    pub width:  u32,
    /// Height in pixels.
    pub height: u32,
}

/// A depth target rendered from a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShadowMap {
    /// Identifies the map in recorded commands.
    pub id:         u32,
    /// Edge length in texels.
    pub resolution: u32,
}

impl ShadowMap {
    /// The framebuffer that the shadow pass renders into.
    pub fn as_framebuffer(&self) -> Framebuffer {
        Framebuffer { id: self.id, width: self.resolution, height: self.resolution }
    }
}
