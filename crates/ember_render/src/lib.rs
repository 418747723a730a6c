//! # ember_render - Lights, Shadows and Frame Pipeline
//!
//! Backend-agnostic rendering infrastructure with:
//! - Packed, fixed-schema structured buffers for GPU light data
//! - A shadow atlas packing variable-resolution tiles into one texture
//! - Dirty-tracked light and shadow source management
//! - A frame orchestrator with pluggable post-process antialiasing
//!
//! ## Architecture
//!
//! The per-frame flow is strictly producer-before-consumer:
//!
//! 1. **LightManager** updates light records, derives shadow cameras
//!    and assigns atlas tiles to dirty sources.
//! 2. **RenderingPipeline** renders the scheduled shadow tiles
//!    (scissored into the atlas), then the main pass consuming the
//!    packed buffers, then the antialiasing subpass chain.
//!
//! All GPU work flows through the [`backend::GpuBackend`] trait; the
//! bundled [`backend::HeadlessBackend`] records submissions for tests.
//!
//! ## Example
//!
//! ```
//! use ember_render::prelude::*;
//! use glam::{Mat4, Vec3};
//!
//! let config = PipelineConfig::default();
//! let mut pipeline = RenderingPipeline::new(config, HeadlessBackend::new()).unwrap();
//!
//! pipeline
//!     .add_light(Light::point(1, Vec3::new(0.0, 4.0, 0.0), 10.0).with_shadows(512))
//!     .unwrap();
//!
//! let ctx = FrameContext::new(
//!     1,
//!     Mat4::look_at_rh(Vec3::new(0.0, 2.0, 8.0), Vec3::ZERO, Vec3::Y),
//!     Mat4::perspective_rh(60.0f32.to_radians(), 16.0 / 9.0, 0.1, 500.0),
//!     Vec3::new(0.0, 2.0, 8.0),
//!     (1280, 720),
//! );
//! let outcome = pipeline.render_frame(&ctx);
//! assert!(matches!(outcome, FrameOutcome::Rendered { .. }));
//! ```

pub mod backend;
pub mod error;
pub mod frame;
pub mod light;
pub mod light_manager;
pub mod pipeline;
pub mod postprocess;
pub mod resource;
pub mod shadow;
pub mod stats;
pub mod structured;
pub mod target;

pub use backend::{
    DrawSubmission, GpuBackend, HeadlessBackend, ScissorRect, TextureBinding, TextureHandle,
};
pub use error::RenderError;
pub use frame::{FrameContext, Frustum};
pub use light::{
    light_schema, shadow_source_schema, Light, LightId, LightKind, MAX_LIGHTS, MAX_SHADOW_SOURCES,
};
pub use light_manager::{LightManager, LightManagerStats, ShadowWork};
pub use pipeline::{
    light_buffer_id, shadow_source_buffer_id, FrameOutcome, FramePhase, PipelineConfig,
    RenderingPipeline,
};
pub use postprocess::{
    create_technique, AaMode, AntialiasingTechnique, PassthroughAa, SmaaConfig, SmaaLookups,
    SmaaTechnique, Subpass,
};
pub use resource::{ResourceId, TextureDesc, TextureFormat, TextureUsage};
pub use shadow::{
    AtlasStats, AtlasTile, OverflowPolicy, RequiredPolicy, ShadowAtlas, ShadowConfig,
    ShadowSource, TileHandle,
};
pub use stats::{RenderStats, StatsCollector};
pub use structured::{
    FieldKind, FieldValue, RecordHandle, RecordSchema, RecordWriter, StructuredBuffer,
    StructuredRecord,
};
pub use target::{RenderTarget, TargetRole};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::backend::{GpuBackend, HeadlessBackend};
    pub use crate::error::RenderError;
    pub use crate::frame::FrameContext;
    pub use crate::light::{Light, LightId, LightKind};
    pub use crate::light_manager::LightManager;
    pub use crate::pipeline::{FrameOutcome, FramePhase, PipelineConfig, RenderingPipeline};
    pub use crate::postprocess::AaMode;
    pub use crate::resource::{ResourceId, TextureFormat};
    pub use crate::shadow::{ShadowAtlas, ShadowConfig, ShadowSource};
    pub use crate::structured::{RecordSchema, StructuredBuffer, StructuredRecord};
    pub use crate::target::{RenderTarget, TargetRole};
}
