//! Light and shadow management
//!
//! The manager owns every attached light, the packed light and shadow
//! source buffers, and the shadow atlas. Each frame `update` runs two
//! sweeps, in the order the original pipeline phases require:
//!
//! 1. Lights: changed lights re-serialize only their own record, derive
//!    fresh shadow matrices, and queue their source for a tile
//!    re-render. Visible lights stamp their tiles as required so the
//!    atlas never evicts them.
//! 2. Shadows: queued sources get a tile (allocating, evicting or
//!    growing the atlas per policy) up to the per-frame update budget.
//!    Everything scheduled here lands in `shadow_work` for the
//!    pipeline's shadow pass; clean sources are never touched.

use std::collections::BTreeMap;

use glam::{Mat4, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::frame::FrameContext;
use crate::light::{
    light_schema, shadow_source_schema, Light, LightId, MAX_LIGHTS, MAX_SHADOW_SOURCES,
};
use crate::shadow::{OverflowPolicy, RequiredPolicy, ShadowAtlas, ShadowConfig, TileHandle};
use crate::structured::{RecordHandle, RecordWriter, StructuredBuffer, StructuredRecord};

/// One shadow tile re-render scheduled for the current frame
#[derive(Clone, Debug)]
pub struct ShadowWork {
    /// Owning light
    pub light: LightId,
    /// Assigned atlas tile
    pub tile: TileHandle,
    /// Tile region in atlas texels (x, y, size)
    pub rect: (u32, u32, u32),
    /// Depth camera matrix for the scissored render
    pub view_proj: Mat4,
}

/// Per-frame manager statistics
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LightManagerStats {
    /// Attached lights
    pub lights_total: u32,
    /// Lights surviving the required-this-frame test
    pub lights_visible: u32,
    /// Shadow updates still queued after the budget cut
    pub shadows_queued: u32,
    /// Shadow tiles scheduled this frame
    pub shadows_scheduled: u32,
    /// Lights downgraded to unshadowed (atlas or buffer pressure)
    pub shadows_downgraded: u32,
}

/// The GPU-facing slice of one shadow source
struct SourceRecord {
    atlas_rect: Vec4,
    view_proj: Mat4,
    near: f32,
    far: f32,
    resolution: i32,
}

impl StructuredRecord for SourceRecord {
    fn write(&self, writer: &mut RecordWriter) -> Result<(), RenderError> {
        writer.write_vec4(self.atlas_rect)?;
        writer.write_mat4(&self.view_proj)?;
        writer.write_float(self.near)?;
        writer.write_float(self.far)?;
        writer.write_int(self.resolution)
    }
}

struct LightEntry {
    light: Light,
    record: RecordHandle,
    source_record: Option<RecordHandle>,
    /// Survived the required-this-frame test in the last update
    required: bool,
}

/// Owns the lights, their packed buffers, and the shadow atlas
pub struct LightManager {
    config: ShadowConfig,
    lights: BTreeMap<LightId, LightEntry>,
    light_buffer: StructuredBuffer,
    source_buffer: StructuredBuffer,
    atlas: ShadowAtlas,
    /// Lights whose shadow source waits for a tile re-render
    queued: Vec<LightId>,
    work: Vec<ShadowWork>,
    frame: u64,
    stats: LightManagerStats,
}

impl LightManager {
    /// Create a manager from a validated shadow configuration
    pub fn new(mut config: ShadowConfig) -> Self {
        config.validate();
        let atlas = ShadowAtlas::new(config.atlas_size, config.tile_size);
        Self {
            config,
            lights: BTreeMap::new(),
            light_buffer: StructuredBuffer::capped(light_schema(), MAX_LIGHTS),
            source_buffer: StructuredBuffer::capped(shadow_source_schema(), MAX_SHADOW_SOURCES),
            atlas,
            queued: Vec::new(),
            work: Vec::new(),
            frame: 0,
            stats: LightManagerStats::default(),
        }
    }

    /// Attach a light.
    ///
    /// Shadow resolutions are clamped to a legal atlas request with a
    /// logged warning. Fails with `CapacityExceeded` when the packed
    /// light buffer is at its shader-side limit.
    pub fn add_light(&mut self, mut light: Light) -> Result<(), RenderError> {
        let id = light.id();
        if self.lights.contains_key(&id) {
            log::warn!("Light {} is already attached", id);
            return Ok(());
        }

        if light.casts_shadows() && !self.config.enabled {
            log::warn!(
                "Light {} casts shadows but shadow rendering is disabled",
                id
            );
            light.disable_shadows();
        }

        if let Some(source) = light.shadow_source_mut() {
            if source.resolution() == 0 {
                source.set_resolution(self.config.default_resolution);
            }
            let clamped = self.config.clamp_resolution(source.resolution());
            if clamped != source.resolution() {
                log::warn!(
                    "Shadow resolution {} of light {} adjusted to {}",
                    source.resolution(),
                    id,
                    clamped
                );
                source.set_resolution(clamped);
            }
        }

        let record = self.light_buffer.insert(&light).map_err(|err| {
            log::warn!("Cannot attach light {}: {}", id, err);
            err
        })?;

        let mut source_record = None;
        if light.casts_shadows() {
            let placeholder = SourceRecord {
                atlas_rect: Vec4::ZERO,
                view_proj: Mat4::IDENTITY,
                near: 0.0,
                far: 0.0,
                resolution: 0,
            };
            match self.source_buffer.insert(&placeholder) {
                Ok(handle) => {
                    source_record = Some(handle);
                    let index = self.source_buffer.offset_of(handle).unwrap_or(0)
                        / self.source_buffer.schema().stride();
                    light.set_source_index(index as i32);
                    self.queued.push(id);
                }
                Err(err) => {
                    log::warn!("Light {} downgraded to unshadowed: {}", id, err);
                    light.disable_shadows();
                    self.stats.shadows_downgraded += 1;
                }
            }
        }

        self.lights.insert(
            id,
            LightEntry {
                light,
                record,
                source_record,
                required: true,
            },
        );
        Ok(())
    }

    /// Detach a light, releasing its atlas tile and compacting both
    /// packed buffers
    pub fn remove_light(&mut self, id: LightId) -> bool {
        let Some(entry) = self.lights.remove(&id) else {
            return false;
        };

        if let Some(tile) = entry.light.shadow_source().and_then(|s| s.tile()) {
            self.atlas.release(tile);
        }
        self.light_buffer.remove(entry.record);
        if let Some(handle) = entry.source_record {
            self.source_buffer.remove(handle);
            self.refresh_source_indices();
        }
        self.queued.retain(|queued| *queued != id);
        true
    }

    /// Mutable access for per-frame host mutation
    pub fn light_mut(&mut self, id: LightId) -> Option<&mut Light> {
        self.lights.get_mut(&id).map(|entry| &mut entry.light)
    }

    /// Immutable access to one light
    pub fn light(&self, id: LightId) -> Option<&Light> {
        self.lights.get(&id).map(|entry| &entry.light)
    }

    /// Number of attached lights
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    /// Check if no lights are attached
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Run the per-frame update: dirty tracking, culling, tile
    /// assignment and shadow scheduling. Must complete before the
    /// pipeline consumes `shadow_work` and the packed buffers.
    pub fn update(&mut self, ctx: &FrameContext) {
        self.frame = ctx.frame;
        self.atlas.begin_frame(ctx.frame);
        self.work.clear();
        self.stats = LightManagerStats {
            lights_total: self.lights.len() as u32,
            ..Default::default()
        };

        self.update_lights(ctx);
        self.update_shadows();

        self.stats.shadows_queued = self.queued.len() as u32;
        self.stats.shadows_scheduled = self.work.len() as u32;
    }

    fn update_lights(&mut self, ctx: &FrameContext) {
        let mut newly_queued = Vec::new();

        for (id, entry) in self.lights.iter_mut() {
            let light = &mut entry.light;

            if light.take_data_dirty() {
                // Only this record is re-serialized; unchanged lights
                // cost nothing
                if let Err(err) = self.light_buffer.update(entry.record, light) {
                    log::warn!("Light {} record update failed: {}", id, err);
                }
            }

            let required = match self.config.required {
                RequiredPolicy::Always => true,
                RequiredPolicy::FrustumTest => light
                    .cull_sphere()
                    .map(|(center, radius)| ctx.frustum().contains_sphere(center, radius))
                    .unwrap_or(true),
                RequiredPolicy::MaxDistance(max) => light
                    .cull_sphere()
                    .map(|(center, _)| center.distance(ctx.camera_position) <= max)
                    .unwrap_or(true),
            };
            entry.required = required;
            if !required {
                continue;
            }
            self.stats.lights_visible += 1;

            if !light.casts_shadows() {
                continue;
            }

            let source_dirty = light.shadow_source().is_some_and(|s| s.is_dirty());
            if source_dirty {
                light.rebuild_shadow_camera();
                newly_queued.push(*id);
            }

            // A required light protects its tile from eviction; a stale
            // tile reference (evicted earlier) is dropped and re-queued
            if let Some(source) = light.shadow_source_mut() {
                if let Some(tile) = source.tile() {
                    if self.atlas.resolve(tile).is_some() {
                        self.atlas.mark_required(tile);
                    } else {
                        source.clear_tile();
                        source.mark_dirty();
                        newly_queued.push(*id);
                    }
                }
            }
        }

        for id in newly_queued {
            if !self.queued.contains(&id) {
                self.queued.push(id);
            }
        }
    }

    fn update_shadows(&mut self) {
        if !self.config.enabled {
            return;
        }

        let budget = self.config.max_updates_per_frame;
        let batch: Vec<LightId> = {
            let take = budget.min(self.queued.len());
            self.queued.drain(..take).collect()
        };

        let mut repacked = false;
        for id in batch {
            let Some(entry) = self.lights.get_mut(&id) else {
                continue;
            };
            if !entry.required {
                // Not needed this frame; stays queued until it is
                self.queued.push(id);
                continue;
            }
            let Some(source) = entry.light.shadow_source_mut() else {
                continue;
            };
            let resolution = source.resolution();

            // Reuse the assigned tile unless it is stale or the wrong size
            let mut tile = source.tile().filter(|t| {
                self.atlas
                    .resolve(*t)
                    .map(|live| live.size == resolution)
                    .unwrap_or(false)
            });
            if tile.is_none() {
                if let Some(stale) = source.tile() {
                    self.atlas.release(stale);
                    source.clear_tile();
                }
                match self.atlas.allocate(id, resolution) {
                    Ok(handle) => tile = Some(handle),
                    Err(RenderError::AtlasFull { .. })
                        if self.config.overflow == OverflowPolicy::Grow
                            && self.atlas.size() < self.config.atlas_max_size =>
                    {
                        self.atlas
                            .resize((self.atlas.size() * 2).min(self.config.atlas_max_size));
                        repacked = true;
                        tile = self.atlas.allocate(id, resolution).ok();
                    }
                    Err(_) => {}
                }
            }

            let Some(tile) = tile else {
                // Unshadowed for this frame; retried once pressure drops
                log::warn!("Light {} renders unshadowed this frame (atlas full)", id);
                self.stats.shadows_downgraded += 1;
                self.queued.push(id);
                continue;
            };

            source.assign_tile(tile);
            self.atlas.mark_required(tile);

            let (x, y, size) = {
                let live = self.atlas.resolve(tile).expect("tile just allocated");
                (live.x, live.y, live.size)
            };
            let view_proj = source.view_projection();
            let record = SourceRecord {
                atlas_rect: self.atlas.uv_rect(tile).map(Vec4::from_array).unwrap_or(Vec4::ZERO),
                view_proj,
                near: source.near_plane(),
                far: source.far_plane(),
                resolution: size as i32,
            };
            source.mark_clean();

            if let Some(handle) = entry.source_record {
                if let Err(err) = self.source_buffer.update(handle, &record) {
                    log::warn!("Shadow source record of light {} failed: {}", id, err);
                }
            }

            self.work.push(ShadowWork {
                light: id,
                tile,
                rect: (x, y, size),
                view_proj,
            });
        }

        if repacked {
            self.after_repack();
        }
    }

    /// A re-pack moved every tile and invalidated the whole atlas
    /// texture: fix up already-scheduled work, then mark all remaining
    /// sources stale so they re-render over the next frames.
    fn after_repack(&mut self) {
        for work in &mut self.work {
            if let Some(live) = self.atlas.resolve(work.tile) {
                work.rect = (live.x, live.y, live.size);
            }
        }
        let scheduled: Vec<LightId> = self.work.iter().map(|w| w.light).collect();

        for (id, entry) in self.lights.iter_mut() {
            let Some(source) = entry.light.shadow_source_mut() else {
                continue;
            };
            if scheduled.contains(id) {
                // Re-read the moved rect into the packed record
                if let (Some(tile), Some(handle)) = (source.tile(), entry.source_record) {
                    if let Some(rect) = self.atlas.uv_rect(tile) {
                        let record = SourceRecord {
                            atlas_rect: Vec4::from_array(rect),
                            view_proj: source.view_projection(),
                            near: source.near_plane(),
                            far: source.far_plane(),
                            resolution: source.resolution() as i32,
                        };
                        let _ = self.source_buffer.update(handle, &record);
                    }
                }
                continue;
            }
            source.mark_dirty();
            if !self.queued.contains(id) {
                self.queued.push(*id);
            }
        }
    }

    /// Recompute each light's index into the compacted source buffer
    fn refresh_source_indices(&mut self) {
        let stride = self.source_buffer.schema().stride();
        for entry in self.lights.values_mut() {
            if let Some(handle) = entry.source_record {
                if let Some(offset) = self.source_buffer.offset_of(handle) {
                    entry.light.set_source_index((offset / stride) as i32);
                }
            }
        }
    }

    /// Shadow tile renders scheduled by the last `update`
    pub fn shadow_work(&self) -> &[ShadowWork] {
        &self.work
    }

    /// The packed light buffer
    pub fn light_buffer(&self) -> &StructuredBuffer {
        &self.light_buffer
    }

    /// The packed shadow source buffer
    pub fn source_buffer(&self) -> &StructuredBuffer {
        &self.source_buffer
    }

    /// Reset dirty tracking after the pipeline uploaded both buffers
    pub fn clear_upload_state(&mut self) {
        self.light_buffer.clear_dirty();
        self.source_buffer.clear_dirty();
    }

    /// The shadow atlas
    pub fn atlas(&self) -> &ShadowAtlas {
        &self.atlas
    }

    /// Mutable atlas access (texture attachment by the pipeline)
    pub fn atlas_mut(&mut self) -> &mut ShadowAtlas {
        &mut self.atlas
    }

    /// The active shadow configuration
    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Apply a new shadow configuration without losing attached lights.
    /// An atlas size change re-packs and invalidates every shadow map.
    pub fn reconfigure(&mut self, mut config: ShadowConfig) {
        config.validate();
        if config.tile_size != self.atlas.tile_size() {
            // New granularity needs a fresh grid; drop every tile
            self.atlas = ShadowAtlas::new(config.atlas_size, config.tile_size);
            self.config = config;
            for (id, entry) in self.lights.iter_mut() {
                if let Some(source) = entry.light.shadow_source_mut() {
                    source.clear_tile();
                    source.mark_dirty();
                    if !self.queued.contains(id) {
                        self.queued.push(*id);
                    }
                }
            }
            return;
        }

        let resize = config.atlas_size != self.atlas.size();
        self.config = config;
        if resize {
            self.atlas.resize(self.config.atlas_size);
            self.after_repack();
        }
    }

    /// Stats of the last `update`
    pub fn stats(&self) -> &LightManagerStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    fn frame(n: u64) -> FrameContext {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 2.0, 10.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(60.0f32.to_radians(), 1.0, 0.1, 500.0);
        FrameContext::new(n, view, projection, Vec3::new(0.0, 2.0, 10.0), (800, 600))
    }

    fn manager() -> LightManager {
        LightManager::new(ShadowConfig {
            atlas_size: 1024,
            atlas_max_size: 2048,
            tile_size: 64,
            default_resolution: 256,
            max_resolution: 1024,
            max_updates_per_frame: 32,
            ..Default::default()
        })
    }

    #[test]
    fn test_add_and_remove() {
        let mut mgr = manager();
        mgr.add_light(Light::point(1, Vec3::ZERO, 5.0)).unwrap();
        mgr.add_light(Light::point(2, Vec3::ONE, 5.0).with_shadows(256))
            .unwrap();
        assert_eq!(mgr.len(), 2);
        assert_eq!(mgr.light_buffer().len(), 2);
        assert_eq!(mgr.source_buffer().len(), 1);

        mgr.update(&frame(1));
        assert_eq!(mgr.shadow_work().len(), 1);

        assert!(mgr.remove_light(2));
        assert_eq!(mgr.light_buffer().len(), 1);
        assert_eq!(mgr.source_buffer().len(), 0);
        assert_eq!(mgr.atlas().allocated_count(), 0);
        assert!(!mgr.remove_light(2));
    }

    #[test]
    fn test_unchanged_light_not_rerendered() {
        let mut mgr = manager();
        mgr.add_light(Light::point(1, Vec3::ZERO, 5.0).with_shadows(256))
            .unwrap();

        mgr.update(&frame(1));
        assert_eq!(mgr.shadow_work().len(), 1);

        // Nothing changed: the second frame schedules no re-render
        mgr.update(&frame(2));
        assert_eq!(mgr.shadow_work().len(), 0);
        assert_eq!(mgr.stats().shadows_scheduled, 0);
    }

    #[test]
    fn test_moved_light_rerenders_only_itself() {
        let mut mgr = manager();
        mgr.add_light(Light::point(1, Vec3::new(-2.0, 0.0, 0.0), 5.0).with_shadows(256))
            .unwrap();
        mgr.add_light(Light::point(2, Vec3::new(2.0, 0.0, 0.0), 5.0).with_shadows(256))
            .unwrap();
        mgr.update(&frame(1));
        assert_eq!(mgr.shadow_work().len(), 2);

        mgr.light_mut(1).unwrap().set_position(Vec3::new(-3.0, 0.0, 0.0));
        mgr.update(&frame(2));
        assert_eq!(mgr.shadow_work().len(), 1);
        assert_eq!(mgr.shadow_work()[0].light, 1);
    }

    #[test]
    fn test_color_change_does_not_rerender_shadow() {
        let mut mgr = manager();
        mgr.add_light(Light::point(1, Vec3::ZERO, 5.0).with_shadows(256))
            .unwrap();
        mgr.update(&frame(1));

        mgr.light_mut(1).unwrap().set_color(Vec3::new(1.0, 0.0, 0.0));
        mgr.update(&frame(2));
        assert_eq!(mgr.shadow_work().len(), 0);
    }

    #[test]
    fn test_resolution_clamped_on_add() {
        let mut mgr = manager();
        // 3000 is not a legal request; it clamps to max_resolution
        mgr.add_light(Light::point(1, Vec3::ZERO, 5.0).with_shadows(3000))
            .unwrap();
        let light = mgr.light(1).unwrap();
        assert_eq!(light.shadow_source().unwrap().resolution(), 1024);
    }

    #[test]
    fn test_default_resolution_applied_on_add() {
        let mut mgr = manager();
        mgr.add_light(Light::point(1, Vec3::ZERO, 5.0).with_default_shadows())
            .unwrap();
        let light = mgr.light(1).unwrap();
        assert_eq!(light.shadow_source().unwrap().resolution(), 256);
    }

    #[test]
    fn test_light_buffer_cap() {
        let mut mgr = manager();
        for i in 0..MAX_LIGHTS as u64 {
            mgr.add_light(Light::point(i, Vec3::ZERO, 1.0)).unwrap();
        }
        let overflow = mgr.add_light(Light::point(9999, Vec3::ZERO, 1.0));
        assert_eq!(
            overflow,
            Err(RenderError::CapacityExceeded { limit: MAX_LIGHTS })
        );
    }

    #[test]
    fn test_update_budget_limits_per_frame() {
        let mut mgr = LightManager::new(ShadowConfig {
            atlas_size: 2048,
            max_updates_per_frame: 4,
            ..Default::default()
        });
        for i in 0..10u64 {
            mgr.add_light(Light::point(i, Vec3::ZERO, 5.0).with_shadows(128))
                .unwrap();
        }

        mgr.update(&frame(1));
        assert_eq!(mgr.shadow_work().len(), 4);
        assert_eq!(mgr.stats().shadows_queued, 6);

        mgr.update(&frame(2));
        assert_eq!(mgr.shadow_work().len(), 4);

        mgr.update(&frame(3));
        assert_eq!(mgr.shadow_work().len(), 2);
        assert_eq!(mgr.stats().shadows_queued, 0);
    }

    #[test]
    fn test_atlas_grows_under_pressure() {
        // Twenty 256x256 sources exceed a 1024 atlas (16 fit); with the
        // Grow policy the atlas doubles and every source keeps a tile.
        let mut mgr = manager();
        assert_eq!(mgr.config().overflow, OverflowPolicy::Grow);

        for i in 0..20u64 {
            mgr.add_light(Light::point(i, Vec3::ZERO, 5.0).with_shadows(256))
                .unwrap();
        }
        mgr.update(&frame(1));
        // The re-pack marks late sources dirty; run a few more frames
        // to drain the queue
        for n in 2..6 {
            mgr.update(&frame(n));
        }

        assert_eq!(mgr.atlas().size(), 2048);
        assert_eq!(mgr.atlas().allocated_count(), 20);
        assert!(mgr.atlas().debug_validate());
        assert_eq!(mgr.stats().shadows_queued, 0);
    }

    #[test]
    fn test_source_indices_compact_after_removal() {
        let mut mgr = manager();
        for i in 0..3u64 {
            mgr.add_light(Light::point(i, Vec3::ZERO, 5.0).with_shadows(128))
                .unwrap();
        }
        assert_eq!(mgr.light(2).unwrap().source_index(), 2);

        mgr.remove_light(1);
        assert_eq!(mgr.light(0).unwrap().source_index(), 0);
        assert_eq!(mgr.light(2).unwrap().source_index(), 1);
    }

    #[test]
    fn test_evicted_tile_requeues_on_demand() {
        let mut mgr = LightManager::new(ShadowConfig {
            atlas_size: 256,
            atlas_max_size: 256,
            tile_size: 64,
            overflow: OverflowPolicy::Evict,
            required: RequiredPolicy::MaxDistance(20.0),
            max_updates_per_frame: 8,
            ..Default::default()
        });

        // Light 1 near the camera, light 2 far away
        mgr.add_light(Light::point(1, Vec3::new(0.0, 0.0, 8.0), 2.0).with_shadows(256))
            .unwrap();
        mgr.update(&frame(1));
        assert_eq!(mgr.shadow_work().len(), 1);

        mgr.add_light(Light::point(2, Vec3::new(0.0, 0.0, 500.0), 2.0).with_shadows(256))
            .unwrap();
        // Light 2 is outside the distance cutoff: not required, not
        // scheduled, and light 1 keeps its tile
        mgr.update(&frame(2));
        assert_eq!(mgr.shadow_work().len(), 0);
        assert!(mgr
            .light(1)
            .unwrap()
            .shadow_source()
            .unwrap()
            .tile()
            .is_some());

        // Move light 2 into range: the full atlas evicts nothing
        // required, so light 1's tile (required) survives and light 2
        // steals nothing until light 1 goes out of range.
        mgr.light_mut(2)
            .unwrap()
            .set_position(Vec3::new(0.0, 0.0, 12.0));
        mgr.light_mut(1)
            .unwrap()
            .set_position(Vec3::new(0.0, 0.0, 400.0));
        mgr.update(&frame(3));

        // Light 1 left the required set; its tile was evictable and
        // light 2 now owns the atlas
        let light2_tile = mgr.light(2).unwrap().shadow_source().unwrap().tile();
        assert!(light2_tile.is_some());
        assert_eq!(mgr.shadow_work().len(), 1);
        assert_eq!(mgr.shadow_work()[0].light, 2);
    }

    #[test]
    fn test_shadow_disabled_config_strips_sources() {
        let mut mgr = LightManager::new(ShadowConfig::disabled());
        mgr.add_light(Light::point(1, Vec3::ZERO, 5.0).with_shadows(256))
            .unwrap();
        assert!(!mgr.light(1).unwrap().casts_shadows());

        mgr.update(&frame(1));
        assert!(mgr.shadow_work().is_empty());
    }
}
