//! Shadow configuration
//!
//! Global shadow settings with serde support. `validate` clamps values
//! into their legal ranges instead of failing, matching how the rest of
//! the pipeline treats quality settings; structural errors (which the
//! pipeline cannot clamp away) are reported by `PipelineConfig`.

use serde::{Deserialize, Serialize};

/// What happens when a tile allocation fails even after eviction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Reclaim least-recently-used tiles of sources not required this
    /// frame, and fail the request if none can be reclaimed
    Evict,
    /// Double the atlas (up to `atlas_max_size`) and re-pack
    Grow,
}

/// How a shadow source is judged "required this frame"
///
/// Tiles of sources that are not required are the eviction candidates
/// when the atlas runs out of space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum RequiredPolicy {
    /// Every attached shadow source is always required (never evicted)
    Always,
    /// Required if the owning light's bounds intersect the view frustum
    FrustumTest,
    /// Required if the owning light is within this distance of the camera
    MaxDistance(f32),
}

/// Global shadow configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShadowConfig {
    /// Enable shadow rendering globally
    pub enabled: bool,

    /// Initial atlas edge length in texels (power of two)
    pub atlas_size: u32,

    /// Upper bound for atlas growth (power of two)
    pub atlas_max_size: u32,

    /// Atlas allocation granularity in texels (power of two)
    pub tile_size: u32,

    /// Default per-source shadow map resolution
    pub default_resolution: u32,

    /// Largest resolution a single source may request
    pub max_resolution: u32,

    /// Budget of shadow tile re-renders per frame
    pub max_updates_per_frame: usize,

    /// Allocation-failure policy
    pub overflow: OverflowPolicy,

    /// Required-this-frame policy driving eviction candidacy
    pub required: RequiredPolicy,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            atlas_size: 2048,
            atlas_max_size: 8192,
            tile_size: 64,
            default_resolution: 512,
            max_resolution: 2048,
            max_updates_per_frame: 8,
            overflow: OverflowPolicy::Grow,
            required: RequiredPolicy::FrustumTest,
        }
    }
}

impl ShadowConfig {
    /// High quality preset
    pub fn high_quality() -> Self {
        Self {
            atlas_size: 4096,
            atlas_max_size: 16384,
            default_resolution: 1024,
            max_resolution: 4096,
            max_updates_per_frame: 16,
            ..Default::default()
        }
    }

    /// Performance preset
    pub fn low_quality() -> Self {
        Self {
            atlas_size: 1024,
            atlas_max_size: 2048,
            default_resolution: 256,
            max_resolution: 512,
            max_updates_per_frame: 4,
            ..Default::default()
        }
    }

    /// Preset with shadows disabled
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Clamp all values into their valid ranges
    pub fn validate(&mut self) {
        self.atlas_size = self.atlas_size.clamp(256, 16384).next_power_of_two();
        self.atlas_max_size = self
            .atlas_max_size
            .clamp(self.atlas_size, 16384)
            .next_power_of_two();
        self.tile_size = self.tile_size.clamp(16, self.atlas_size).next_power_of_two();
        self.max_resolution = self
            .max_resolution
            .clamp(self.tile_size, self.atlas_size)
            .next_power_of_two();
        self.default_resolution = self
            .default_resolution
            .clamp(self.tile_size, self.max_resolution)
            .next_power_of_two();
        self.max_updates_per_frame = self.max_updates_per_frame.clamp(1, 64);
    }

    /// Clamp a requested source resolution to a legal atlas request:
    /// a power-of-two multiple of the tile size, no larger than the
    /// configured maximum
    pub fn clamp_resolution(&self, requested: u32) -> u32 {
        requested
            .next_power_of_two()
            .clamp(self.tile_size, self.max_resolution)
    }
}
