//! Render targets
//!
//! A render target is one typed framebuffer attachment: a role, a
//! format, dimensions, and the backing texture. Backing storage is only
//! ever reallocated by explicit `create`/`resize`, never implicitly
//! mid-pass, so a pass can rely on stable dimensions for its duration.

use serde::{Deserialize, Serialize};

use crate::backend::{GpuBackend, TextureBinding, TextureHandle};
use crate::error::RenderError;
use crate::resource::{ResourceId, TextureDesc, TextureFormat};

/// Attachment role of a target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetRole {
    /// Primary color output
    Color,
    /// Depth output
    Depth,
    /// Auxiliary output (post-process intermediates, g-buffer channels)
    Aux(u8),
}

/// A typed framebuffer attachment with backend-backed storage
#[derive(Debug)]
pub struct RenderTarget {
    id: ResourceId,
    label: String,
    role: TargetRole,
    format: TextureFormat,
    size: (u32, u32),
    texture: TextureHandle,
}

impl RenderTarget {
    /// Create a target and its backing texture
    pub fn create(
        backend: &mut dyn GpuBackend,
        label: &str,
        role: TargetRole,
        format: TextureFormat,
        size: (u32, u32),
    ) -> Result<Self, RenderError> {
        if matches!(role, TargetRole::Depth) != format.is_depth() {
            return Err(RenderError::ResourceCreationFailed(format!(
                "target '{}': role {:?} does not match format {:?}",
                label, role, format
            )));
        }

        let texture = backend.create_texture(&TextureDesc::attachment(label, size, format))?;
        Ok(Self {
            id: ResourceId::from_name(label),
            label: label.into(),
            role,
            format,
            size,
            texture,
        })
    }

    /// Reallocate the backing storage at a new size
    pub fn resize(
        &mut self,
        backend: &mut dyn GpuBackend,
        size: (u32, u32),
    ) -> Result<(), RenderError> {
        if size == self.size {
            return Ok(());
        }
        let texture =
            backend.create_texture(&TextureDesc::attachment(&self.label, size, self.format))?;
        backend.destroy_texture(self.texture);
        self.texture = texture;
        self.size = size;
        Ok(())
    }

    /// Release the backing texture
    pub fn destroy(self, backend: &mut dyn GpuBackend) {
        backend.destroy_texture(self.texture);
    }

    /// Attachment handle for a draw submission
    pub fn bind_as_render_target(&self) -> TextureHandle {
        self.texture
    }

    /// Sampled binding at a shader slot
    pub fn bind_as_texture(&self, slot: u32) -> TextureBinding {
        TextureBinding {
            slot,
            texture: self.texture,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn role(&self) -> TargetRole {
        self.role
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}
