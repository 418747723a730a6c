//! Per-frame context handed in by the host application
//!
//! The host owns the camera; the pipeline only consumes its matrices.
//! The frustum is extracted once per frame and reused for every light
//! visibility test.

use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

/// Camera state and frame bookkeeping for one rendered frame
#[derive(Clone, Debug)]
pub struct FrameContext {
    /// Monotonic frame number
    pub frame: u64,
    /// View matrix (world to camera)
    pub view: Mat4,
    /// Projection matrix
    pub projection: Mat4,
    /// Camera world position
    pub camera_position: Vec3,
    /// Viewport size in pixels
    pub viewport: (u32, u32),
    /// View frustum derived from the view-projection matrix
    frustum: Frustum,
}

impl FrameContext {
    /// Build a frame context from the host camera
    pub fn new(
        frame: u64,
        view: Mat4,
        projection: Mat4,
        camera_position: Vec3,
        viewport: (u32, u32),
    ) -> Self {
        let frustum = Frustum::from_view_projection(projection * view);
        Self {
            frame,
            view,
            projection,
            camera_position,
            viewport,
            frustum,
        }
    }

    /// Combined view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// The extracted view frustum
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }
}

/// View frustum as six inward-facing planes
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    /// Planes as (normal, distance): left, right, bottom, top, near, far
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix
    /// (Gribb/Hartmann row combinations)
    pub fn from_view_projection(vp: Mat4) -> Self {
        let r0 = vp.row(0);
        let r1 = vp.row(1);
        let r2 = vp.row(2);
        let r3 = vp.row(3);

        let mut planes = [
            r3 + r0, // left
            r3 - r0, // right
            r3 + r1, // bottom
            r3 - r1, // top
            r3 + r2, // near
            r3 - r2, // far
        ];

        for plane in &mut planes {
            let len = plane.xyz().length();
            if len > f32::EPSILON {
                *plane /= len;
            }
        }

        Self { planes }
    }

    /// Check whether a sphere intersects the frustum
    pub fn contains_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.xyz().dot(center) + plane.w >= -radius)
    }
}
