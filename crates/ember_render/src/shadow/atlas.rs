//! Shadow atlas allocation
//!
//! Packs every shadow source's depth map into one shared texture. The
//! atlas is a square tile grid: a request of resolution R occupies an
//! R/tile_size square of grid cells, found by a deterministic row-major
//! first-fit scan. Tiles are addressed through generational handles, so
//! a holder of an evicted tile finds out by generation mismatch instead
//! of needing a notification callback.
//!
//! When no region fits, least-recently-used tiles whose owner was not
//! marked required this frame are reclaimed one by one until the request
//! fits or no candidates remain. `resize` re-packs all live tiles into
//! the larger grid in allocation order, keeping their handles valid.

use ember_core::SlotAllocator;
use serde::{Deserialize, Serialize};

use crate::backend::TextureHandle;
use crate::error::RenderError;
use crate::light::LightId;

/// Marker type for atlas tile handles
pub struct TileSlot;

/// Generational handle to an atlas tile
pub type TileHandle = ember_core::Handle<TileSlot>;

/// One allocated rectangular region of the atlas
#[derive(Clone, Debug)]
pub struct AtlasTile {
    handle: TileHandle,
    /// Position in texels
    pub x: u32,
    pub y: u32,
    /// Edge length in texels
    pub size: u32,
    /// Light whose shadow source occupies this tile
    pub owner: LightId,
    /// Allocation sequence, the deterministic re-pack order
    sequence: u64,
    /// Frame the tile was last used
    last_used: u64,
    /// Frame the tile was last marked required
    required: u64,
}

impl AtlasTile {
    /// The tile's own handle
    pub fn handle(&self) -> TileHandle {
        self.handle
    }

    /// Check if the tile was marked required in `frame`
    pub fn required_in(&self, frame: u64) -> bool {
        self.required == frame
    }
}

/// Atlas statistics
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AtlasStats {
    /// Allocations made this frame
    pub allocations_this_frame: u32,
    /// Evictions made this frame
    pub evictions_this_frame: u32,
    /// Total allocations ever made
    pub total_allocations: u64,
    /// Total evictions ever made
    pub total_evictions: u64,
    /// Total resizes ever made
    pub total_resizes: u64,
    /// Allocation requests that failed even after eviction
    pub failed_allocations: u64,
}

/// Tile-grid allocator over one shared shadow texture
pub struct ShadowAtlas {
    /// Atlas edge length in texels
    size: u32,
    /// Grid cell edge length in texels
    tile_size: u32,
    /// Cell occupancy, row-major `num_tiles` x `num_tiles`
    grid: Vec<bool>,
    slots: SlotAllocator<TileSlot>,
    /// Tile storage indexed by slot
    tiles: Vec<Option<AtlasTile>>,
    frame: u64,
    next_sequence: u64,
    stats: AtlasStats,
    /// Backing texture, owned by the atlas once attached
    texture: Option<TextureHandle>,
}

impl ShadowAtlas {
    /// Create an atlas of `size` texels with the given tile granularity.
    /// Both must be powers of two with `tile_size <= size`.
    pub fn new(size: u32, tile_size: u32) -> Self {
        debug_assert!(size.is_power_of_two() && tile_size.is_power_of_two());
        debug_assert!(tile_size <= size);
        let num_tiles = (size / tile_size) as usize;
        Self {
            size,
            tile_size,
            grid: vec![false; num_tiles * num_tiles],
            slots: SlotAllocator::new(),
            tiles: Vec::new(),
            frame: 0,
            next_sequence: 0,
            stats: AtlasStats::default(),
            texture: None,
        }
    }

    /// Begin a new frame
    pub fn begin_frame(&mut self, frame: u64) {
        self.frame = frame;
        self.stats.allocations_this_frame = 0;
        self.stats.evictions_this_frame = 0;
    }

    /// Allocate a region of `resolution` texels for `owner`.
    ///
    /// Tries eviction of LRU non-required tiles before failing with
    /// `AtlasFull`.
    pub fn allocate(&mut self, owner: LightId, resolution: u32) -> Result<TileHandle, RenderError> {
        let resolution = resolution.clamp(self.tile_size, self.size);
        // Round odd requests up to the grid granularity
        let span = resolution.div_ceil(self.tile_size);
        let resolution = span * self.tile_size;

        loop {
            if let Some((cx, cy)) = self.find_region(span) {
                self.reserve_region(cx, cy, span);
                let handle = self.slots.allocate();
                let slot = handle.index() as usize;
                if slot >= self.tiles.len() {
                    self.tiles.resize_with(slot + 1, || None);
                }
                self.tiles[slot] = Some(AtlasTile {
                    handle,
                    x: cx * self.tile_size,
                    y: cy * self.tile_size,
                    size: resolution,
                    owner,
                    sequence: self.next_sequence,
                    last_used: self.frame,
                    required: self.frame,
                });
                self.next_sequence += 1;
                self.stats.allocations_this_frame += 1;
                self.stats.total_allocations += 1;
                return Ok(handle);
            }

            let Some(victim) = self.eviction_candidate() else {
                self.stats.failed_allocations += 1;
                log::warn!(
                    "Shadow atlas full: no {0}x{0} region and no evictable tile",
                    resolution
                );
                return Err(RenderError::AtlasFull {
                    requested: resolution,
                });
            };

            let tile = self.tiles[victim.index() as usize]
                .as_ref()
                .map(|t| (t.owner, t.size));
            if let Some((owner, size)) = tile {
                log::info!("Shadow atlas evicting {0}x{0} tile of light {1}", size, owner);
            }
            self.release(victim);
            self.stats.evictions_this_frame += 1;
            self.stats.total_evictions += 1;
        }
    }

    /// Free a tile. Its handle and all copies of it become stale.
    pub fn release(&mut self, handle: TileHandle) -> bool {
        if !self.slots.is_valid(handle) {
            return false;
        }
        let slot = handle.index() as usize;
        let Some(tile) = self.tiles[slot].take() else {
            return false;
        };
        let span = (tile.size / self.tile_size).max(1);
        self.free_region(tile.x / self.tile_size, tile.y / self.tile_size, span);
        let _ = self.slots.free(handle);
        true
    }

    /// Resolve a handle to its tile, if still live
    pub fn resolve(&self, handle: TileHandle) -> Option<&AtlasTile> {
        if !self.slots.is_valid(handle) {
            return None;
        }
        self.tiles.get(handle.index() as usize)?.as_ref()
    }

    /// Stamp a tile as used this frame
    pub fn touch(&mut self, handle: TileHandle) {
        let frame = self.frame;
        if let Some(tile) = self.tile_mut(handle) {
            tile.last_used = frame;
        }
    }

    /// Stamp a tile as required this frame; required tiles are never
    /// eviction candidates
    pub fn mark_required(&mut self, handle: TileHandle) {
        let frame = self.frame;
        if let Some(tile) = self.tile_mut(handle) {
            tile.required = frame;
            tile.last_used = frame;
        }
    }

    /// Grow the atlas and re-pack every live tile in allocation order.
    ///
    /// Handles stay valid; positions change and all tile contents are
    /// stale afterwards, so callers must re-render every source. A tile
    /// that no longer fits (never the case when growing) is released.
    pub fn resize(&mut self, new_size: u32) {
        let new_size = new_size.next_power_of_two();
        if new_size == self.size {
            return;
        }
        log::info!("Shadow atlas resize {} -> {}", self.size, new_size);

        self.size = new_size;
        let num_tiles = (new_size / self.tile_size) as usize;
        self.grid = vec![false; num_tiles * num_tiles];
        self.stats.total_resizes += 1;

        let mut order: Vec<TileHandle> = self
            .tiles
            .iter()
            .flatten()
            .map(|tile| tile.handle)
            .collect();
        order.sort_by_key(|h| {
            self.tiles[h.index() as usize]
                .as_ref()
                .map(|t| t.sequence)
                .unwrap_or(u64::MAX)
        });

        for handle in order {
            let slot = handle.index() as usize;
            let (size, span) = {
                let tile = self.tiles[slot].as_ref().expect("live tile in re-pack");
                (tile.size, (tile.size / self.tile_size).max(1))
            };
            match self.find_region(span) {
                Some((cx, cy)) => {
                    self.reserve_region(cx, cy, span);
                    let tile = self.tiles[slot].as_mut().expect("live tile in re-pack");
                    tile.x = cx * self.tile_size;
                    tile.y = cy * self.tile_size;
                }
                None => {
                    log::warn!("Shadow atlas re-pack dropped a {0}x{0} tile", size);
                    self.release(handle);
                    self.stats.total_evictions += 1;
                }
            }
        }
    }

    /// Normalized [x, y, w, h] of a tile for shader lookups
    pub fn uv_rect(&self, handle: TileHandle) -> Option<[f32; 4]> {
        let tile = self.resolve(handle)?;
        let scale = 1.0 / self.size as f32;
        Some([
            tile.x as f32 * scale,
            tile.y as f32 * scale,
            tile.size as f32 * scale,
            tile.size as f32 * scale,
        ])
    }

    /// Atlas edge length in texels
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Grid cell edge length in texels
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Number of live tiles
    pub fn allocated_count(&self) -> usize {
        self.tiles.iter().flatten().count()
    }

    /// Fraction of grid cells occupied (0-1)
    pub fn utilization(&self) -> f32 {
        let used = self.grid.iter().filter(|c| **c).count();
        used as f32 / self.grid.len() as f32
    }

    /// Atlas statistics
    pub fn stats(&self) -> &AtlasStats {
        &self.stats
    }

    /// Iterate all live tiles
    pub fn tiles(&self) -> impl Iterator<Item = &AtlasTile> {
        self.tiles.iter().flatten()
    }

    /// The backing texture, if one is attached
    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    /// Hand ownership of the backing texture to the atlas
    pub fn attach_texture(&mut self, texture: TextureHandle) {
        self.texture = Some(texture);
    }

    /// Detach the backing texture (before recreation on resize)
    pub fn take_texture(&mut self) -> Option<TextureHandle> {
        self.texture.take()
    }

    /// Verify the packing invariants: every tile inside bounds, no two
    /// tiles overlapping, grid consistent with the tile set
    pub fn debug_validate(&self) -> bool {
        let live: Vec<&AtlasTile> = self.tiles.iter().flatten().collect();
        for tile in &live {
            if tile.x + tile.size > self.size || tile.y + tile.size > self.size {
                return false;
            }
        }
        for (i, a) in live.iter().enumerate() {
            for b in live.iter().skip(i + 1) {
                let disjoint = a.x + a.size <= b.x
                    || b.x + b.size <= a.x
                    || a.y + a.size <= b.y
                    || b.y + b.size <= a.y;
                if !disjoint {
                    return false;
                }
            }
        }
        let occupied: usize = live
            .iter()
            .map(|t| {
                let span = (t.size / self.tile_size) as usize;
                span * span
            })
            .sum();
        occupied == self.grid.iter().filter(|c| **c).count()
    }

    fn tile_mut(&mut self, handle: TileHandle) -> Option<&mut AtlasTile> {
        if !self.slots.is_valid(handle) {
            return None;
        }
        self.tiles.get_mut(handle.index() as usize)?.as_mut()
    }

    /// LRU tile not required this frame
    fn eviction_candidate(&self) -> Option<TileHandle> {
        self.tiles
            .iter()
            .flatten()
            .filter(|tile| tile.required < self.frame)
            .min_by_key(|tile| (tile.last_used, tile.sequence))
            .map(|tile| tile.handle)
    }

    fn num_tiles(&self) -> u32 {
        self.size / self.tile_size
    }

    /// Row-major first-fit scan for a free span x span cell region
    fn find_region(&self, span: u32) -> Option<(u32, u32)> {
        let num = self.num_tiles();
        if span > num {
            return None;
        }
        for cy in 0..=(num - span) {
            for cx in 0..=(num - span) {
                if self.region_is_free(cx, cy, span) {
                    return Some((cx, cy));
                }
            }
        }
        None
    }

    fn region_is_free(&self, cx: u32, cy: u32, span: u32) -> bool {
        let num = self.num_tiles() as usize;
        for y in cy..cy + span {
            for x in cx..cx + span {
                if self.grid[y as usize * num + x as usize] {
                    return false;
                }
            }
        }
        true
    }

    fn reserve_region(&mut self, cx: u32, cy: u32, span: u32) {
        self.set_region(cx, cy, span, true);
    }

    fn free_region(&mut self, cx: u32, cy: u32, span: u32) {
        self.set_region(cx, cy, span, false);
    }

    fn set_region(&mut self, cx: u32, cy: u32, span: u32, value: bool) {
        let num = self.num_tiles() as usize;
        for y in cy..cy + span {
            for x in cx..cx + span {
                self.grid[y as usize * num + x as usize] = value;
            }
        }
    }
}
