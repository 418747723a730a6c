//! Light types
//!
//! A light is plain data plus an optional owned shadow source. Setters
//! track dirtiness so the manager re-serializes only lights that
//! actually changed; position and direction use an epsilon check to
//! avoid re-rendering shadow maps for sub-millimeter host jitter.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::shadow::ShadowSource;
use crate::structured::{FieldKind, RecordSchema, RecordWriter, StructuredRecord};

/// Stable light identity, assigned by the host scene graph
pub type LightId = u64;

/// Maximum lights in the packed light buffer.
/// Must match the array size compiled into the lighting shader.
pub const MAX_LIGHTS: usize = 64;

/// Maximum shadow sources in the packed source buffer.
/// Must match the array size compiled into the lighting shader.
pub const MAX_SHADOW_SOURCES: usize = 24;

/// Movement threshold below which a transform change is ignored
const MOVE_EPSILON: f32 = 0.001;

/// Light kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightKind {
    Directional,
    Point,
}

impl LightKind {
    /// Integer tag stored in the light record for the shader
    pub fn shader_index(&self) -> i32 {
        match self {
            Self::Directional => 0,
            Self::Point => 1,
        }
    }
}

/// Schema of the packed light buffer
pub fn light_schema() -> RecordSchema {
    RecordSchema::new(&[
        ("position", FieldKind::Vec3),
        ("intensity", FieldKind::Float),
        ("color", FieldKind::Vec3),
        ("radius", FieldKind::Float),
        ("direction", FieldKind::Vec3),
        ("kind", FieldKind::Int),
        ("source_index", FieldKind::Int),
    ])
}

/// Schema of the packed shadow source buffer
pub fn shadow_source_schema() -> RecordSchema {
    RecordSchema::new(&[
        ("atlas_rect", FieldKind::Vec4),
        ("view_proj", FieldKind::Mat4),
        ("near_plane", FieldKind::Float),
        ("far_plane", FieldKind::Float),
        ("resolution", FieldKind::Int),
    ])
}

/// A scene light with optional shadow casting
#[derive(Debug)]
pub struct Light {
    id: LightId,
    kind: LightKind,
    position: Vec3,
    direction: Vec3,
    color: Vec3,
    intensity: f32,
    radius: f32,
    shadow_source: Option<ShadowSource>,
    /// Record re-serialization needed
    data_dirty: bool,
    /// Index into the shadow source buffer, -1 when unshadowed
    source_index: i32,
}

impl Light {
    /// Create a point light
    pub fn point(id: LightId, position: Vec3, radius: f32) -> Self {
        Self {
            id,
            kind: LightKind::Point,
            position,
            direction: Vec3::NEG_Y,
            color: Vec3::ONE,
            intensity: 1.0,
            radius: radius.max(0.01),
            shadow_source: None,
            data_dirty: true,
            source_index: -1,
        }
    }

    /// Create a directional light. `direction` points from the light
    /// into the scene and gets normalized.
    pub fn directional(id: LightId, direction: Vec3) -> Self {
        Self {
            id,
            kind: LightKind::Directional,
            position: Vec3::ZERO,
            direction: direction.normalize_or_zero(),
            color: Vec3::ONE,
            intensity: 1.0,
            // Half-extent of the orthographic shadow volume
            radius: 50.0,
            shadow_source: None,
            data_dirty: true,
            source_index: -1,
        }
    }

    /// Set the color, builder style
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    /// Set the intensity, builder style
    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    /// Give this light a shadow source, builder style
    pub fn with_shadows(mut self, resolution: u32) -> Self {
        self.shadow_source = Some(ShadowSource::new(resolution));
        self
    }

    /// Shadow source at the manager's configured default resolution
    pub fn with_default_shadows(mut self) -> Self {
        self.shadow_source = Some(ShadowSource::new(0));
        self
    }

    pub fn id(&self) -> LightId {
        self.id
    }

    pub fn kind(&self) -> LightKind {
        self.kind
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Move the light. No-op below the movement epsilon.
    pub fn set_position(&mut self, position: Vec3) {
        if (position - self.position).length() <= MOVE_EPSILON {
            return;
        }
        self.position = position;
        self.data_dirty = true;
        if let Some(source) = &mut self.shadow_source {
            source.mark_dirty();
        }
    }

    /// Re-aim the light. The vector is normalized; no-op below epsilon.
    pub fn set_direction(&mut self, direction: Vec3) {
        let direction = direction.normalize_or_zero();
        if (direction - self.direction).length() <= MOVE_EPSILON {
            return;
        }
        self.direction = direction;
        self.data_dirty = true;
        if let Some(source) = &mut self.shadow_source {
            source.mark_dirty();
        }
    }

    /// Set the light color (linear RGB). Does not touch the shadow map.
    pub fn set_color(&mut self, color: Vec3) {
        if color != self.color {
            self.color = color;
            self.data_dirty = true;
        }
    }

    /// Set the intensity. Does not touch the shadow map.
    pub fn set_intensity(&mut self, intensity: f32) {
        if intensity != self.intensity {
            self.intensity = intensity;
            self.data_dirty = true;
        }
    }

    /// Set the range (point) or shadow volume half-extent (directional)
    pub fn set_radius(&mut self, radius: f32) {
        let radius = radius.max(0.01);
        if (radius - self.radius).abs() > MOVE_EPSILON {
            self.radius = radius;
            self.data_dirty = true;
            if let Some(source) = &mut self.shadow_source {
                source.mark_dirty();
            }
        }
    }

    /// Whether this light owns a shadow source
    pub fn casts_shadows(&self) -> bool {
        self.shadow_source.is_some()
    }

    pub fn shadow_source(&self) -> Option<&ShadowSource> {
        self.shadow_source.as_ref()
    }

    pub fn shadow_source_mut(&mut self) -> Option<&mut ShadowSource> {
        self.shadow_source.as_mut()
    }

    /// Drop the shadow source. The manager releases its tile.
    pub fn disable_shadows(&mut self) -> Option<ShadowSource> {
        self.data_dirty = true;
        self.source_index = -1;
        self.shadow_source.take()
    }

    /// Culling sphere, `None` for lights that are always visible
    pub fn cull_sphere(&self) -> Option<(Vec3, f32)> {
        match self.kind {
            LightKind::Directional => None,
            LightKind::Point => Some((self.position, self.radius)),
        }
    }

    /// Re-derive the shadow camera from the current transform
    pub fn rebuild_shadow_camera(&mut self) {
        let (kind, position, direction, radius) =
            (self.kind, self.position, self.direction, self.radius);
        let Some(source) = &mut self.shadow_source else {
            return;
        };
        match kind {
            LightKind::Point => {
                source.set_perspective(
                    position,
                    direction,
                    core::f32::consts::FRAC_PI_2,
                    0.1,
                    radius.max(0.2),
                );
            }
            LightKind::Directional => {
                source.set_orthographic(position, direction, radius, 0.1, radius * 4.0);
            }
        }
    }

    /// Consume the record-dirty flag
    pub fn take_data_dirty(&mut self) -> bool {
        core::mem::take(&mut self.data_dirty)
    }

    /// Force a record re-serialization next update
    pub fn mark_data_dirty(&mut self) {
        self.data_dirty = true;
    }

    /// Shadow source buffer index, assigned by the manager
    pub fn source_index(&self) -> i32 {
        self.source_index
    }

    /// Called by the manager when the source buffer slot changes
    pub fn set_source_index(&mut self, index: i32) {
        if self.source_index != index {
            self.source_index = index;
            self.data_dirty = true;
        }
    }
}

impl StructuredRecord for Light {
    fn write(&self, writer: &mut RecordWriter) -> Result<(), RenderError> {
        writer.write_vec3(self.position)?;
        writer.write_float(self.intensity)?;
        writer.write_vec3(self.color)?;
        writer.write_float(self.radius)?;
        writer.write_vec3(self.direction)?;
        writer.write_int(self.kind.shader_index())?;
        writer.write_int(self.source_index)
    }
}
