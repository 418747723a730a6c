//! SMAA antialiasing (http://www.iryoku.com/smaa/)
//!
//! Fixed three-subpass chain:
//!
//! 1. Edge detection: reads the main color, writes the edges target.
//! 2. Blend weight calculation: reads the edges target plus the
//!    precomputed area and search lookup textures, writes the weights
//!    target.
//! 3. Neighborhood blending: reads the main color and the weights
//!    target, writes the final color target.
//!
//! The edges and weights targets must be cleared every frame (the
//! pipeline clears them through the subpass clear color).

use serde::{Deserialize, Serialize};

use crate::backend::{GpuBackend, TextureHandle};
use crate::error::RenderError;
use crate::postprocess::{AntialiasingTechnique, Subpass};
use crate::resource::{ResourceId, TextureDesc, TextureFormat};
use crate::target::{RenderTarget, TargetRole};

/// Dimensions of the precomputed area lookup texture
pub const AREA_TEX_SIZE: (u32, u32) = (160, 560);
/// Dimensions of the precomputed search lookup texture
pub const SEARCH_TEX_SIZE: (u32, u32) = (64, 16);

/// SMAA tuning parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SmaaConfig {
    /// Edge detection luma threshold (0.05 - 0.5)
    pub edge_threshold: f32,
    /// Maximum search steps in the blend weight pass
    pub max_search_steps: u32,
}

impl Default for SmaaConfig {
    fn default() -> Self {
        Self {
            edge_threshold: 0.1,
            max_search_steps: 16,
        }
    }
}

/// The area and search lookup tables the blend weight pass samples
#[derive(Clone)]
pub struct SmaaLookups {
    /// Rg8 texels, `AREA_TEX_SIZE`
    pub area: Vec<u8>,
    /// R8 texels, `SEARCH_TEX_SIZE`
    pub search: Vec<u8>,
}

impl SmaaLookups {
    /// Uniform stand-in data. Hosts supply the reference SMAA tables
    /// through `SmaaTechnique::with_lookups` for real blending weights.
    pub fn flat() -> Self {
        Self {
            area: vec![0; (AREA_TEX_SIZE.0 * AREA_TEX_SIZE.1) as usize * 2],
            search: vec![0; (SEARCH_TEX_SIZE.0 * SEARCH_TEX_SIZE.1) as usize],
        }
    }
}

impl Default for SmaaLookups {
    fn default() -> Self {
        Self::flat()
    }
}

struct SmaaResources {
    edges: RenderTarget,
    weights: RenderTarget,
    output: RenderTarget,
    area: TextureHandle,
    search: TextureHandle,
    subpasses: Vec<Subpass>,
}

/// The SMAA technique with its owned targets and lookups
pub struct SmaaTechnique {
    config: SmaaConfig,
    lookups: SmaaLookups,
    resources: Option<SmaaResources>,
}

impl SmaaTechnique {
    pub fn new() -> Self {
        Self::with_config(SmaaConfig::default())
    }

    pub fn with_config(config: SmaaConfig) -> Self {
        Self {
            config,
            lookups: SmaaLookups::flat(),
            resources: None,
        }
    }

    /// Replace the lookup tables before `setup`
    pub fn with_lookups(mut self, lookups: SmaaLookups) -> Self {
        self.lookups = lookups;
        self
    }

    /// Current tuning parameters
    pub fn config(&self) -> &SmaaConfig {
        &self.config
    }

    fn area_id() -> ResourceId {
        ResourceId::from_name("smaa_area_lut")
    }

    fn search_id() -> ResourceId {
        ResourceId::from_name("smaa_search_lut")
    }
}

impl Default for SmaaTechnique {
    fn default() -> Self {
        Self::new()
    }
}

impl AntialiasingTechnique for SmaaTechnique {
    fn name(&self) -> &str {
        "smaa"
    }

    fn setup(
        &mut self,
        backend: &mut dyn GpuBackend,
        size: (u32, u32),
        format: TextureFormat,
        source: ResourceId,
    ) -> Result<(), RenderError> {
        self.cleanup(backend);

        let edges = RenderTarget::create(
            backend,
            "smaa_edges",
            TargetRole::Aux(0),
            TextureFormat::Rg8Unorm,
            size,
        )?;
        let weights = match RenderTarget::create(
            backend,
            "smaa_weights",
            TargetRole::Aux(1),
            TextureFormat::Rgba8Unorm,
            size,
        ) {
            Ok(target) => target,
            Err(err) => {
                edges.destroy(backend);
                return Err(err);
            }
        };
        let output =
            match RenderTarget::create(backend, "smaa_output", TargetRole::Color, format, size) {
                Ok(target) => target,
                Err(err) => {
                    edges.destroy(backend);
                    weights.destroy(backend);
                    return Err(err);
                }
            };

        let lookups = (|| {
            let area_desc =
                TextureDesc::lookup("smaa_area_lut", AREA_TEX_SIZE, TextureFormat::Rg8Unorm);
            let search_desc =
                TextureDesc::lookup("smaa_search_lut", SEARCH_TEX_SIZE, TextureFormat::R8Unorm);
            let area = backend.create_texture(&area_desc)?;
            if let Err(err) = backend.upload_texture(area, &self.lookups.area) {
                backend.destroy_texture(area);
                return Err(err);
            }
            let search = match backend.create_texture(&search_desc) {
                Ok(handle) => handle,
                Err(err) => {
                    backend.destroy_texture(area);
                    return Err(err);
                }
            };
            if let Err(err) = backend.upload_texture(search, &self.lookups.search) {
                backend.destroy_texture(area);
                backend.destroy_texture(search);
                return Err(err);
            }
            Ok((area, search))
        })();
        let (area, search) = match lookups {
            Ok(pair) => pair,
            Err(err) => {
                edges.destroy(backend);
                weights.destroy(backend);
                output.destroy(backend);
                return Err(err);
            }
        };

        // Shader-side tuning parameters for the weight pass
        let params = [
            self.config.edge_threshold.to_bits(),
            self.config.max_search_steps,
        ];
        backend.upload_buffer(
            ResourceId::from_name("smaa_params"),
            bytemuck::cast_slice(&params),
        )?;

        let subpasses = vec![
            Subpass {
                name: "smaa_edge_detect",
                inputs: vec![source],
                output: edges.id(),
            },
            Subpass {
                name: "smaa_blend_weights",
                inputs: vec![edges.id(), Self::area_id(), Self::search_id()],
                output: weights.id(),
            },
            Subpass {
                name: "smaa_neighborhood_blend",
                inputs: vec![source, weights.id()],
                output: output.id(),
            },
        ];

        self.resources = Some(SmaaResources {
            edges,
            weights,
            output,
            area,
            search,
            subpasses,
        });
        Ok(())
    }

    fn subpasses(&self) -> &[Subpass] {
        self.resources
            .as_ref()
            .map(|r| r.subpasses.as_slice())
            .unwrap_or(&[])
    }

    fn output(&self) -> ResourceId {
        self.resources
            .as_ref()
            .map(|r| r.output.id())
            .unwrap_or_else(|| ResourceId::from_name("main_color"))
    }

    fn texture(&self, id: ResourceId) -> Option<TextureHandle> {
        let resources = self.resources.as_ref()?;
        if id == resources.edges.id() {
            Some(resources.edges.bind_as_render_target())
        } else if id == resources.weights.id() {
            Some(resources.weights.bind_as_render_target())
        } else if id == resources.output.id() {
            Some(resources.output.bind_as_render_target())
        } else if id == Self::area_id() {
            Some(resources.area)
        } else if id == Self::search_id() {
            Some(resources.search)
        } else {
            None
        }
    }

    fn resize(
        &mut self,
        backend: &mut dyn GpuBackend,
        size: (u32, u32),
    ) -> Result<(), RenderError> {
        let Some(resources) = &mut self.resources else {
            return Ok(());
        };
        resources.edges.resize(backend, size)?;
        resources.weights.resize(backend, size)?;
        resources.output.resize(backend, size)?;
        Ok(())
    }

    fn cleanup(&mut self, backend: &mut dyn GpuBackend) {
        if let Some(resources) = self.resources.take() {
            resources.edges.destroy(backend);
            resources.weights.destroy(backend);
            resources.output.destroy(backend);
            backend.destroy_texture(resources.area);
            backend.destroy_texture(resources.search);
        }
    }
}
