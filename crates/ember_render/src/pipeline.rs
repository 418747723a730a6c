//! The rendering pipeline orchestrator
//!
//! Sequences the frame phases in fixed order:
//!
//! `Idle -> ShadowPass -> MainPass -> PostProcess -> Present -> Idle`
//!
//! The shadow pass renders only the tiles the light manager scheduled
//! (clean sources cost nothing); the main pass consumes the packed
//! light buffers and the atlas texture; post-process runs the active
//! antialiasing chain. A frame either completes every phase or the
//! whole frame is dropped on an unrecoverable backend failure.
//!
//! Failure posture: a technique that cannot create its targets is
//! replaced by the pass-through technique with a logged event - the
//! pipeline keeps rendering, unantialiased. Malformed configuration
//! refuses to construct a pipeline at all.

use serde::{Deserialize, Serialize};

use crate::backend::{DrawSubmission, GpuBackend, TextureBinding, TextureHandle};
use crate::error::RenderError;
use crate::frame::FrameContext;
use crate::light::{Light, LightId};
use crate::light_manager::LightManager;
use crate::postprocess::{create_technique, AaMode, AntialiasingTechnique, PassthroughAa};
use crate::resource::{ResourceId, TextureDesc, TextureFormat, TextureUsage};
use crate::shadow::ShadowConfig;
use crate::stats::{RenderStats, StatsCollector};
use crate::target::{RenderTarget, TargetRole};

/// Shader-visible name of the packed light buffer
pub fn light_buffer_id() -> ResourceId {
    ResourceId::from_name("light_buffer")
}

/// Shader-visible name of the packed shadow source buffer
pub fn shadow_source_buffer_id() -> ResourceId {
    ResourceId::from_name("shadow_sources")
}

/// Frame phase state machine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FramePhase {
    #[default]
    Idle,
    ShadowPass,
    MainPass,
    PostProcess,
    Present,
}

/// Result of one `render_frame`
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// All phases ran; the named target holds the final color
    Rendered { final_target: ResourceId },
    /// Unrecoverable resource failure; the frame was skipped whole
    Dropped,
}

/// Pipeline configuration, read at construction and on explicit
/// `reconfigure`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Primary target resolution
    pub target_size: (u32, u32),
    /// Primary color format
    pub color_format: TextureFormat,
    /// Active antialiasing technique
    pub antialiasing: AaMode,
    /// Shadow and atlas settings
    pub shadow: ShadowConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_size: (1280, 720),
            color_format: TextureFormat::Rgba8Unorm,
            antialiasing: AaMode::Smaa,
            shadow: ShadowConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject configurations the pipeline cannot clamp into shape
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.target_size.0 == 0 || self.target_size.1 == 0 {
            return Err(RenderError::ConfigurationInvalid(
                "target size must be non-zero".into(),
            ));
        }
        if self.color_format.is_depth() {
            return Err(RenderError::ConfigurationInvalid(format!(
                "{:?} is not a color format",
                self.color_format
            )));
        }
        if self.shadow.atlas_max_size < self.shadow.atlas_size {
            return Err(RenderError::ConfigurationInvalid(format!(
                "atlas max size {} is below the initial size {}",
                self.shadow.atlas_max_size, self.shadow.atlas_size
            )));
        }
        if self.shadow.tile_size > self.shadow.atlas_size {
            return Err(RenderError::ConfigurationInvalid(format!(
                "tile size {} exceeds the atlas size {}",
                self.shadow.tile_size, self.shadow.atlas_size
            )));
        }
        Ok(())
    }
}

/// Orchestrates lights, shadows, the main pass and post-processing
/// over an abstract graphics backend
pub struct RenderingPipeline<B: GpuBackend> {
    config: PipelineConfig,
    backend: B,
    lights: LightManager,
    color: RenderTarget,
    depth: RenderTarget,
    technique: Box<dyn AntialiasingTechnique>,
    phase: FramePhase,
    stats: StatsCollector,
    /// Edge length of the current atlas texture, 0 before creation
    atlas_texture_size: u32,
}

impl<B: GpuBackend> RenderingPipeline<B> {
    /// Build a pipeline. Configuration errors are fatal; a failing
    /// antialiasing setup degrades to pass-through with a logged event.
    pub fn new(config: PipelineConfig, mut backend: B) -> Result<Self, RenderError> {
        config.validate()?;

        let color = RenderTarget::create(
            &mut backend,
            "main_color",
            TargetRole::Color,
            config.color_format,
            config.target_size,
        )?;
        let depth = match RenderTarget::create(
            &mut backend,
            "main_depth",
            TargetRole::Depth,
            TextureFormat::Depth32Float,
            config.target_size,
        ) {
            Ok(target) => target,
            Err(err) => {
                color.destroy(&mut backend);
                return Err(err);
            }
        };

        let lights = LightManager::new(config.shadow.clone());
        let technique = Self::build_technique(
            &mut backend,
            config.antialiasing,
            config.target_size,
            config.color_format,
            color.id(),
        );

        Ok(Self {
            config,
            backend,
            lights,
            color,
            depth,
            technique,
            phase: FramePhase::Idle,
            stats: StatsCollector::new(),
            atlas_texture_size: 0,
        })
    }

    fn build_technique(
        backend: &mut B,
        mode: AaMode,
        size: (u32, u32),
        format: TextureFormat,
        source: ResourceId,
    ) -> Box<dyn AntialiasingTechnique> {
        let mut technique = create_technique(mode);
        match technique.setup(backend, size, format, source) {
            Ok(()) => technique,
            Err(err) => {
                log::warn!(
                    "Antialiasing '{}' setup failed ({}); falling back to pass-through",
                    technique.name(),
                    err
                );
                technique.cleanup(backend);
                let mut fallback = Box::new(PassthroughAa::new());
                // Pass-through setup cannot fail: it creates nothing
                let _ = fallback.setup(backend, size, format, source);
                fallback
            }
        }
    }

    /// Render one frame. The light manager update always runs first;
    /// the pipeline only ever reads what it produced for this frame.
    pub fn render_frame(&mut self, ctx: &FrameContext) -> FrameOutcome {
        self.stats.begin_frame(ctx.frame);

        self.phase = FramePhase::ShadowPass;
        self.lights.update(ctx);
        if self.shadow_pass().is_err() {
            return self.drop_frame();
        }

        self.phase = FramePhase::MainPass;
        if self.main_pass().is_err() {
            return self.drop_frame();
        }

        self.phase = FramePhase::PostProcess;
        if self.post_process().is_err() {
            return self.drop_frame();
        }

        self.phase = FramePhase::Present;
        let final_target = self.technique.output();

        let manager_stats = self.lights.stats();
        self.stats
            .set_light_counts(manager_stats.lights_total, manager_stats.lights_visible);
        self.stats
            .set_atlas_utilization(self.lights.atlas().utilization());
        self.stats.end_frame();

        self.phase = FramePhase::Idle;
        FrameOutcome::Rendered { final_target }
    }

    fn drop_frame(&mut self) -> FrameOutcome {
        log::error!("Frame dropped in phase {:?}", self.phase);
        self.phase = FramePhase::Idle;
        self.stats.end_frame();
        FrameOutcome::Dropped
    }

    /// Render every scheduled shadow tile, scissored to its region
    fn shadow_pass(&mut self) -> Result<(), RenderError> {
        let atlas_texture = self.ensure_atlas_texture()?;

        // Upload only when records actually changed
        if !self.lights.light_buffer().dirty_ranges().is_empty() {
            self.backend
                .upload_buffer(light_buffer_id(), self.lights.light_buffer().bytes())?;
        }
        if !self.lights.source_buffer().dirty_ranges().is_empty() {
            self.backend
                .upload_buffer(shadow_source_buffer_id(), self.lights.source_buffer().bytes())?;
        }
        self.lights.clear_upload_state();

        let Some(atlas_texture) = atlas_texture else {
            return Ok(());
        };
        for work in self.lights.shadow_work() {
            let mut draw = DrawSubmission::new("shadow_pass");
            draw.depth_target = Some(atlas_texture);
            draw.scissor = Some(crate::backend::ScissorRect {
                x: work.rect.0,
                y: work.rect.1,
                width: work.rect.2,
                height: work.rect.2,
            });
            draw.clear_depth = Some(1.0);
            self.backend.submit(&draw)?;
            self.stats.record_draw("shadow_pass");
            self.stats.record_shadow_tile();
        }
        Ok(())
    }

    /// Render scene color and depth, consuming the light data
    fn main_pass(&mut self) -> Result<(), RenderError> {
        let mut draw = DrawSubmission::new("main_pass");
        draw.color_target = Some(self.color.bind_as_render_target());
        draw.depth_target = Some(self.depth.bind_as_render_target());
        draw.clear_color = Some([0.0, 0.0, 0.0, 1.0]);
        draw.clear_depth = Some(1.0);
        if let Some(atlas_texture) = self.lights.atlas().texture() {
            draw.inputs.push(TextureBinding {
                slot: 0,
                texture: atlas_texture,
            });
        }
        draw.buffers = vec![light_buffer_id(), shadow_source_buffer_id()];
        self.backend.submit(&draw)?;
        self.stats.record_draw("main_pass");
        Ok(())
    }

    /// Run the antialiasing subpass chain over the primary targets
    fn post_process(&mut self) -> Result<(), RenderError> {
        // The chain is fixed; collect first so the technique stays
        // borrowed only for the lookup
        let subpasses: Vec<(String, Vec<Option<TextureHandle>>, Option<TextureHandle>)> = self
            .technique
            .subpasses()
            .iter()
            .map(|subpass| {
                (
                    subpass.name.to_string(),
                    subpass
                        .inputs
                        .iter()
                        .map(|id| self.resolve_texture(*id))
                        .collect(),
                    self.resolve_texture(subpass.output),
                )
            })
            .collect();

        for (name, inputs, output) in subpasses {
            let Some(output) = output else {
                log::warn!("Subpass '{}' has no output target; skipped", name);
                continue;
            };
            if inputs.iter().any(Option::is_none) {
                log::warn!("Subpass '{}' misses an input target; skipped", name);
                continue;
            }
            let mut draw = DrawSubmission::new(&name);
            draw.color_target = Some(output);
            draw.clear_color = Some([0.0, 0.0, 0.0, 0.0]);
            for (slot, input) in inputs.into_iter().flatten().enumerate() {
                draw.inputs.push(TextureBinding {
                    slot: slot as u32,
                    texture: input,
                });
            }
            self.backend.submit(&draw)?;
            self.stats.record_draw(&name);
            self.stats.record_aa_subpass();
        }
        Ok(())
    }

    /// Map a resource id to a texture: technique resources first, then
    /// the pipeline's primary targets
    fn resolve_texture(&self, id: ResourceId) -> Option<TextureHandle> {
        self.technique
            .texture(id)
            .or_else(|| (id == self.color.id()).then(|| self.color.bind_as_render_target()))
            .or_else(|| (id == self.depth.id()).then(|| self.depth.bind_as_render_target()))
            .or_else(|| {
                (id == ResourceId::from_name("shadow_atlas"))
                    .then(|| self.lights.atlas().texture())
                    .flatten()
            })
    }

    /// Keep the atlas texture in sync with the allocator size.
    /// Recreation happens between frames only, never mid-pass.
    fn ensure_atlas_texture(&mut self) -> Result<Option<TextureHandle>, RenderError> {
        if !self.lights.config().enabled {
            return Ok(None);
        }
        let size = self.lights.atlas().size();
        if self.atlas_texture_size != size {
            if let Some(old) = self.lights.atlas_mut().take_texture() {
                self.backend.destroy_texture(old);
            }
            let desc = TextureDesc {
                label: "shadow_atlas".into(),
                size: (size, size),
                format: TextureFormat::Depth32Float,
                usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            };
            let texture = self.backend.create_texture(&desc)?;
            self.lights.atlas_mut().attach_texture(texture);
            self.atlas_texture_size = size;
        }
        Ok(self.lights.atlas().texture())
    }

    /// Apply a new configuration: primary targets, technique and shadow
    /// settings are rebuilt as needed. Lights stay attached.
    pub fn reconfigure(&mut self, config: PipelineConfig) -> Result<(), RenderError> {
        config.validate()?;

        let size_changed = config.target_size != self.config.target_size;
        let format_changed = config.color_format != self.config.color_format;
        let mode_changed = config.antialiasing != self.config.antialiasing;

        if format_changed {
            let color = RenderTarget::create(
                &mut self.backend,
                "main_color",
                TargetRole::Color,
                config.color_format,
                config.target_size,
            )?;
            let old = core::mem::replace(&mut self.color, color);
            old.destroy(&mut self.backend);
        } else if size_changed {
            self.color.resize(&mut self.backend, config.target_size)?;
        }
        if size_changed {
            self.depth.resize(&mut self.backend, config.target_size)?;
        }

        if mode_changed || size_changed || format_changed {
            self.technique.cleanup(&mut self.backend);
            self.technique = Self::build_technique(
                &mut self.backend,
                config.antialiasing,
                config.target_size,
                config.color_format,
                self.color.id(),
            );
        }

        self.lights.reconfigure(config.shadow.clone());
        self.config = config;
        Ok(())
    }

    /// Attach a light
    pub fn add_light(&mut self, light: Light) -> Result<(), RenderError> {
        self.lights.add_light(light)
    }

    /// Detach a light and release its shadow tile
    pub fn remove_light(&mut self, id: LightId) -> bool {
        self.lights.remove_light(id)
    }

    /// Mutable access to a light for per-frame host mutation
    pub fn light_mut(&mut self, id: LightId) -> Option<&mut Light> {
        self.lights.light_mut(id)
    }

    /// The light manager
    pub fn lights(&self) -> &LightManager {
        &self.lights
    }

    /// Current frame phase (`Idle` outside `render_frame`)
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Stats of the last completed frame
    pub fn stats(&self) -> &RenderStats {
        self.stats.last()
    }

    /// The active antialiasing technique
    pub fn technique(&self) -> &dyn AntialiasingTechnique {
        self.technique.as_ref()
    }

    /// The active configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The graphics backend
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::shadow::OverflowPolicy;
    use glam::{Mat4, Vec3};

    fn frame(n: u64) -> FrameContext {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 2.0, 10.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(60.0f32.to_radians(), 4.0 / 3.0, 0.1, 500.0);
        FrameContext::new(n, view, projection, Vec3::new(0.0, 2.0, 10.0), (800, 600))
    }

    fn pipeline(config: PipelineConfig) -> RenderingPipeline<HeadlessBackend> {
        RenderingPipeline::new(config, HeadlessBackend::new()).unwrap()
    }

    #[test]
    fn test_invalid_config_refuses_to_start() {
        let config = PipelineConfig {
            target_size: (0, 600),
            ..Default::default()
        };
        let result = RenderingPipeline::new(config, HeadlessBackend::new());
        assert!(matches!(
            result,
            Err(RenderError::ConfigurationInvalid(_))
        ));

        let config = PipelineConfig {
            color_format: TextureFormat::Depth32Float,
            ..Default::default()
        };
        assert!(RenderingPipeline::new(config, HeadlessBackend::new()).is_err());
    }

    #[test]
    fn test_smaa_frame_writes_each_subpass_target_once() {
        let config = PipelineConfig {
            target_size: (800, 600),
            antialiasing: AaMode::Smaa,
            ..Default::default()
        };
        let mut pipeline = pipeline(config);
        pipeline
            .add_light(Light::point(1, Vec3::ZERO, 5.0))
            .unwrap();

        let outcome = pipeline.render_frame(&frame(1));
        let final_target = match outcome {
            FrameOutcome::Rendered { final_target } => final_target,
            FrameOutcome::Dropped => panic!("frame dropped"),
        };
        assert_eq!(final_target, ResourceId::from_name("smaa_output"));

        // Each of the three subpass targets was written exactly once
        for name in ["smaa_edges", "smaa_weights", "smaa_output"] {
            let id = ResourceId::from_name(name);
            let texture = pipeline.technique().texture(id).unwrap();
            assert_eq!(pipeline.backend().write_count(texture), 1, "{}", name);
            let desc = pipeline.backend().texture_desc(texture).unwrap();
            assert_eq!(desc.size, (800, 600));
        }
        assert_eq!(pipeline.stats().aa_subpasses, 3);
    }

    #[test]
    fn test_failed_technique_falls_back_to_passthrough() {
        let mut backend = HeadlessBackend::new();
        // SMAA needs Rg8Unorm for its edges target
        backend.reject_format(TextureFormat::Rg8Unorm);

        let config = PipelineConfig {
            antialiasing: AaMode::Smaa,
            ..Default::default()
        };
        let mut pipeline = RenderingPipeline::new(config, backend).unwrap();
        assert_eq!(pipeline.technique().name(), "none");

        // The degraded pipeline still renders full frames
        let outcome = pipeline.render_frame(&frame(1));
        assert_eq!(
            outcome,
            FrameOutcome::Rendered {
                final_target: ResourceId::from_name("main_color")
            }
        );
        assert_eq!(pipeline.stats().aa_subpasses, 0);
    }

    #[test]
    fn test_clean_shadow_sources_are_skipped() {
        let config = PipelineConfig {
            antialiasing: AaMode::None,
            ..Default::default()
        };
        let mut pipeline = pipeline(config);
        pipeline
            .add_light(Light::point(1, Vec3::ZERO, 5.0).with_shadows(256))
            .unwrap();

        pipeline.render_frame(&frame(1));
        assert_eq!(pipeline.stats().shadow_tiles_rendered, 1);

        // Nothing moved: the second frame renders no shadow tile
        pipeline.render_frame(&frame(2));
        assert_eq!(pipeline.stats().shadow_tiles_rendered, 0);
        assert_eq!(pipeline.stats().draws_in_pass("shadow_pass"), 0);

        // Moving the light re-renders exactly its tile
        pipeline
            .light_mut(1)
            .unwrap()
            .set_position(Vec3::new(3.0, 0.0, 0.0));
        pipeline.render_frame(&frame(3));
        assert_eq!(pipeline.stats().shadow_tiles_rendered, 1);
    }

    #[test]
    fn test_shadow_draws_are_scissored_to_tiles() {
        let config = PipelineConfig {
            antialiasing: AaMode::None,
            ..Default::default()
        };
        let mut pipeline = pipeline(config);
        pipeline
            .add_light(Light::point(1, Vec3::ZERO, 5.0).with_shadows(256))
            .unwrap();
        pipeline.render_frame(&frame(1));

        let shadow_draws: Vec<_> = pipeline
            .backend()
            .submissions()
            .iter()
            .filter(|draw| draw.label == "shadow_pass")
            .collect();
        assert_eq!(shadow_draws.len(), 1);
        let scissor = shadow_draws[0].scissor.unwrap();
        assert_eq!((scissor.width, scissor.height), (256, 256));
        assert!(shadow_draws[0].color_target.is_none());
    }

    #[test]
    fn test_atlas_growth_scenario() {
        // Twenty 256x256 shadow sources against a 1024 atlas: 16 fit,
        // the 17th triggers the configured Grow policy and the atlas
        // doubles to 2048 holding all 20 tiles without overlap.
        let config = PipelineConfig {
            antialiasing: AaMode::None,
            shadow: ShadowConfig {
                atlas_size: 1024,
                atlas_max_size: 4096,
                tile_size: 64,
                default_resolution: 256,
                max_resolution: 1024,
                max_updates_per_frame: 32,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(config.shadow.overflow, OverflowPolicy::Grow);
        let mut pipeline = pipeline(config);

        for i in 0..20u64 {
            pipeline
                .add_light(Light::point(i, Vec3::ZERO, 5.0).with_shadows(256))
                .unwrap();
        }
        for n in 1..6 {
            pipeline.render_frame(&frame(n));
        }

        let atlas = pipeline.lights().atlas();
        assert_eq!(atlas.size(), 2048);
        assert_eq!(atlas.allocated_count(), 20);
        assert!(atlas.debug_validate());

        // The atlas texture followed the resize
        let texture = atlas.texture().unwrap();
        let desc = pipeline.backend().texture_desc(texture).unwrap();
        assert_eq!(desc.size, (2048, 2048));
    }

    #[test]
    fn test_main_pass_binds_light_data() {
        let config = PipelineConfig {
            antialiasing: AaMode::None,
            ..Default::default()
        };
        let mut pipeline = pipeline(config);
        pipeline
            .add_light(Light::point(1, Vec3::ZERO, 5.0))
            .unwrap();
        pipeline.render_frame(&frame(1));

        let main: Vec<_> = pipeline
            .backend()
            .submissions()
            .iter()
            .filter(|draw| draw.label == "main_pass")
            .collect();
        assert_eq!(main.len(), 1);
        assert!(main[0].buffers.contains(&light_buffer_id()));

        // The packed light buffer reached the backend
        let bytes = pipeline.backend().buffer_contents(light_buffer_id()).unwrap();
        assert_eq!(
            bytes.len(),
            pipeline.lights().light_buffer().schema().stride()
        );
    }

    #[test]
    fn test_reconfigure_switches_technique_and_size() {
        let mut pipeline = pipeline(PipelineConfig {
            target_size: (800, 600),
            antialiasing: AaMode::None,
            ..Default::default()
        });
        assert_eq!(pipeline.technique().name(), "none");

        pipeline
            .reconfigure(PipelineConfig {
                target_size: (1920, 1080),
                antialiasing: AaMode::Smaa,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(pipeline.technique().name(), "smaa");

        pipeline.render_frame(&frame(1));
        let id = ResourceId::from_name("smaa_output");
        let texture = pipeline.technique().texture(id).unwrap();
        let desc = pipeline.backend().texture_desc(texture).unwrap();
        assert_eq!(desc.size, (1920, 1080));
    }

    #[test]
    fn test_phase_returns_to_idle() {
        let mut pipeline = pipeline(PipelineConfig::default());
        assert_eq!(pipeline.phase(), FramePhase::Idle);
        pipeline.render_frame(&frame(1));
        assert_eq!(pipeline.phase(), FramePhase::Idle);
    }
}
