//! Shadow sources
//!
//! A shadow source is the camera of one shadow map: it stores the
//! matrices used to render scene depth from the light's point of view,
//! the requested atlas resolution, and the dirty flag that decides
//! whether the map must be re-rendered this frame. Sources are owned
//! exclusively by their light and never outlive it.

use glam::{Mat4, Vec3};

use crate::shadow::atlas::TileHandle;

/// A shadow-casting viewpoint request
#[derive(Clone, Debug)]
pub struct ShadowSource {
    resolution: u32,
    near: f32,
    far: f32,
    view: Mat4,
    projection: Mat4,
    dirty: bool,
    tile: Option<TileHandle>,
}

impl ShadowSource {
    /// Create a source with a requested resolution. The matrices stay
    /// identity until the owning light derives them.
    pub fn new(resolution: u32) -> Self {
        Self {
            resolution,
            near: 0.1,
            far: 1000.0,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            dirty: true,
            tile: None,
        }
    }

    /// Requested shadow map resolution in texels
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Change the requested resolution. The current map becomes stale.
    pub fn set_resolution(&mut self, resolution: u32) {
        if self.resolution != resolution {
            self.resolution = resolution;
            self.dirty = true;
        }
    }

    /// Derive a perspective shadow camera (point lights)
    pub fn set_perspective(
        &mut self,
        position: Vec3,
        direction: Vec3,
        fov: f32,
        near: f32,
        far: f32,
    ) {
        self.view = Mat4::look_at_rh(position, position + direction, up_for(direction));
        self.projection = Mat4::perspective_rh(fov, 1.0, near, far);
        self.near = near;
        self.far = far;
        self.dirty = true;
    }

    /// Derive an orthographic shadow camera (directional lights)
    pub fn set_orthographic(
        &mut self,
        position: Vec3,
        direction: Vec3,
        extent: f32,
        near: f32,
        far: f32,
    ) {
        self.view = Mat4::look_at_rh(position, position + direction, up_for(direction));
        self.projection = Mat4::orthographic_rh(-extent, extent, -extent, extent, near, far);
        self.near = near;
        self.far = far;
        self.dirty = true;
    }

    /// View matrix of the shadow camera
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// Projection matrix of the shadow camera
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Combined view-projection used by the depth pass and the
    /// receiver-side lookup
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Near plane distance
    pub fn near_plane(&self) -> f32 {
        self.near
    }

    /// Far plane distance
    pub fn far_plane(&self) -> f32 {
        self.far
    }

    /// Whether the stored shadow map is stale
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the map stale; it will be re-rendered when scheduled
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Called after the map was scheduled for re-render this frame
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// The assigned atlas tile, if any
    pub fn tile(&self) -> Option<TileHandle> {
        self.tile
    }

    /// Assign an atlas tile. The source stays dirty until rendered.
    pub fn assign_tile(&mut self, tile: TileHandle) {
        self.tile = Some(tile);
        self.dirty = true;
    }

    /// Drop the tile reference (released or evicted)
    pub fn clear_tile(&mut self) {
        self.tile = None;
    }
}

/// Pick an up vector that is not collinear with the look direction
fn up_for(direction: Vec3) -> Vec3 {
    if direction.normalize_or_zero().dot(Vec3::Y).abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_source_is_dirty() {
        let source = ShadowSource::new(512);
        assert!(source.is_dirty());
        assert_eq!(source.resolution(), 512);
        assert!(source.tile().is_none());
    }

    #[test]
    fn test_resolution_change_dirties() {
        let mut source = ShadowSource::new(512);
        source.mark_clean();

        source.set_resolution(512);
        assert!(!source.is_dirty());

        source.set_resolution(1024);
        assert!(source.is_dirty());
    }

    #[test]
    fn test_perspective_matrices() {
        let mut source = ShadowSource::new(256);
        source.set_perspective(
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            90.0f32.to_radians(),
            0.1,
            50.0,
        );
        assert_eq!(source.near_plane(), 0.1);
        assert_eq!(source.far_plane(), 50.0);

        // A point below the light projects inside the clip volume
        let projected = source.view_projection() * Vec3::new(0.0, 0.0, 0.0).extend(1.0);
        let ndc = projected / projected.w;
        assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0);
    }

    #[test]
    fn test_straight_down_has_valid_view() {
        let mut source = ShadowSource::new(256);
        source.set_perspective(
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            90.0f32.to_radians(),
            0.1,
            100.0,
        );
        // The view matrix must be finite even when looking along Y
        assert!(source.view().is_finite());
    }
}
