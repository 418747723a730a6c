//! Render resources - GPU resource descriptions
//!
//! Abstract descriptions of GPU resources that can be realized by any
//! graphics backend (Vulkan, WGPU, DirectX, etc.). The pipeline only ever
//! talks about formats, usages and descriptors; backends turn them into
//! API objects.

use ember_core::Id;
use serde::{Deserialize, Serialize};

/// Unique identifier for a render resource
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub Id);

impl ResourceId {
    /// Create from a name
    pub fn from_name(name: &str) -> Self {
        Self(Id::from_name(name))
    }

    /// Get the raw ID
    pub fn id(&self) -> Id {
        self.0
    }
}

/// Texture format
///
/// Subset the pipeline actually allocates: color targets, the depth-only
/// shadow atlas, and the small single/dual-channel formats the
/// antialiasing lookups and intermediate targets use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    /// Single channel, 8-bit unorm
    R8Unorm,
    /// Two channels, 8-bit unorm
    Rg8Unorm,
    /// Four channels, 8-bit unorm
    Rgba8Unorm,
    /// Four channels, 8-bit unorm, sRGB
    Rgba8UnormSrgb,
    /// Four channels, 8-bit unorm, BGRA order (swapchain)
    Bgra8Unorm,
    /// Four channels, 16-bit float (HDR color)
    Rgba16Float,
    /// 16-bit depth
    Depth16Unorm,
    /// 24-bit depth
    Depth24Plus,
    /// 32-bit float depth
    Depth32Float,
}

impl TextureFormat {
    /// Check if this is a depth format
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm | Self::Depth24Plus | Self::Depth32Float
        )
    }

    /// Check if this is sRGB
    pub fn is_srgb(&self) -> bool {
        matches!(self, Self::Rgba8UnormSrgb)
    }

    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::R8Unorm => 1,
            Self::Rg8Unorm | Self::Depth16Unorm => 2,
            Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Depth24Plus
            | Self::Depth32Float => 4,
            Self::Rgba16Float => 8,
        }
    }
}

/// Texture usage flags
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureUsage(pub u32);

impl TextureUsage {
    pub const COPY_SRC: Self = Self(1 << 0);
    pub const COPY_DST: Self = Self(1 << 1);
    pub const TEXTURE_BINDING: Self = Self(1 << 2);
    pub const RENDER_ATTACHMENT: Self = Self(1 << 3);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl core::ops::BitOr for TextureUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Texture descriptor
#[derive(Clone, Debug)]
pub struct TextureDesc {
    /// Debug label
    pub label: String,
    /// Size in pixels (width, height)
    pub size: (u32, u32),
    /// Format
    pub format: TextureFormat,
    /// Usage flags
    pub usage: TextureUsage,
}

impl TextureDesc {
    /// Descriptor for a sampled render attachment
    pub fn attachment(label: &str, size: (u32, u32), format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            size,
            format,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        }
    }

    /// Descriptor for a sampled lookup texture filled by an upload
    pub fn lookup(label: &str, size: (u32, u32), format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            size,
            format,
            usage: TextureUsage::COPY_DST | TextureUsage::TEXTURE_BINDING,
        }
    }

    /// Total byte size of level 0
    pub fn byte_size(&self) -> usize {
        self.size.0 as usize * self.size.1 as usize * self.format.bytes_per_pixel()
    }
}
