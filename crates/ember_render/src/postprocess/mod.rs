//! Post-process antialiasing
//!
//! A technique is a fixed chain of subpasses, each declaring which
//! render targets it samples and which single target it writes. The
//! pipeline executes the chain generically; swapping techniques never
//! touches pipeline code as long as the input/output typing holds.

pub mod smaa;

use serde::{Deserialize, Serialize};

use crate::backend::{GpuBackend, TextureHandle};
use crate::error::RenderError;
use crate::resource::{ResourceId, TextureFormat};

pub use smaa::{SmaaConfig, SmaaLookups, SmaaTechnique};

/// Selectable antialiasing technique
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AaMode {
    /// No antialiasing; the main color target passes through
    None,
    /// Enhanced subpixel morphological antialiasing (3 subpasses)
    #[default]
    Smaa,
}

/// One stage of a technique: consumes N targets, produces one
#[derive(Clone, Debug)]
pub struct Subpass {
    /// Stage name, used for pass labels and stats
    pub name: &'static str,
    /// Sampled inputs, bound in slot order
    pub inputs: Vec<ResourceId>,
    /// Written output
    pub output: ResourceId,
}

/// A multi-subpass antialiasing technique
///
/// The pipeline lends its primary targets read-only for the duration of
/// the post-process phase; every other resource in the chain belongs to
/// the technique itself.
pub trait AntialiasingTechnique {
    /// Technique name for logs
    fn name(&self) -> &str;

    /// Create the technique's targets and lookup textures.
    /// `source` is the pipeline's main color target.
    fn setup(
        &mut self,
        backend: &mut dyn GpuBackend,
        size: (u32, u32),
        format: TextureFormat,
        source: ResourceId,
    ) -> Result<(), RenderError>;

    /// The fixed subpass chain, in execution order
    fn subpasses(&self) -> &[Subpass];

    /// The final color output of the chain
    fn output(&self) -> ResourceId;

    /// Resolve a technique-owned resource to its texture
    fn texture(&self, id: ResourceId) -> Option<TextureHandle>;

    /// Recreate size-dependent resources
    fn resize(&mut self, backend: &mut dyn GpuBackend, size: (u32, u32))
        -> Result<(), RenderError>;

    /// Release all technique resources
    fn cleanup(&mut self, backend: &mut dyn GpuBackend);
}

/// Technique that renders nothing and passes the main color through
pub struct PassthroughAa {
    source: ResourceId,
}

impl PassthroughAa {
    pub fn new() -> Self {
        Self {
            source: ResourceId::from_name("main_color"),
        }
    }
}

impl Default for PassthroughAa {
    fn default() -> Self {
        Self::new()
    }
}

impl AntialiasingTechnique for PassthroughAa {
    fn name(&self) -> &str {
        "none"
    }

    fn setup(
        &mut self,
        _backend: &mut dyn GpuBackend,
        _size: (u32, u32),
        _format: TextureFormat,
        source: ResourceId,
    ) -> Result<(), RenderError> {
        self.source = source;
        Ok(())
    }

    fn subpasses(&self) -> &[Subpass] {
        &[]
    }

    fn output(&self) -> ResourceId {
        self.source
    }

    fn texture(&self, _id: ResourceId) -> Option<TextureHandle> {
        None
    }

    fn resize(
        &mut self,
        _backend: &mut dyn GpuBackend,
        _size: (u32, u32),
    ) -> Result<(), RenderError> {
        Ok(())
    }

    fn cleanup(&mut self, _backend: &mut dyn GpuBackend) {}
}

/// Instantiate the technique for a mode
pub fn create_technique(mode: AaMode) -> Box<dyn AntialiasingTechnique> {
    match mode {
        AaMode::None => Box::new(PassthroughAa::new()),
        AaMode::Smaa => Box::new(SmaaTechnique::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    #[test]
    fn test_passthrough_has_no_subpasses() {
        let mut backend = HeadlessBackend::new();
        let source = ResourceId::from_name("main_color");
        let mut technique = PassthroughAa::new();
        technique
            .setup(&mut backend, (800, 600), TextureFormat::Rgba8Unorm, source)
            .unwrap();

        assert!(technique.subpasses().is_empty());
        assert_eq!(technique.output(), source);
        assert_eq!(backend.texture_count(), 0);
    }

    #[test]
    fn test_mode_roundtrip() {
        for mode in [AaMode::None, AaMode::Smaa] {
            let json = serde_json::to_string(&mode).unwrap();
            let restored: AaMode = serde_json::from_str(&json).unwrap();
            assert_eq!(restored, mode);
        }
    }
}
