//! Structured GPU buffers
//!
//! Packs a dynamic collection of fixed-schema records into one contiguous
//! byte block for shader consumption. The schema (field order and byte
//! size) is fixed when the buffer is created, independent of which
//! concrete type writes the records - that is how heterogeneous light
//! types share a single shader-side array.
//!
//! Record offsets are unique, monotonic in insertion order, and
//! recomputed when a preceding record is removed. Byte storage doubles
//! when exceeded and never shrinks automatically; a buffer backing a
//! shader-side constant can be capped with `max_records`, in which case
//! inserting past the cap fails with `CapacityExceeded` instead of
//! silently outgrowing the compiled shader assumption.

use ember_core::{Handle, SlotAllocator};
use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Marker type for structured record handles
pub struct RecordSlot;

/// Handle to one record in a `StructuredBuffer`
pub type RecordHandle = Handle<RecordSlot>;

/// Field type vocabulary for record schemas
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    /// Fixed-length array of ints
    IntArray(u8),
}

impl FieldKind {
    /// Packed byte size of one field
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Int | Self::Float => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Vec4 => 16,
            Self::Mat4 => 64,
            Self::IntArray(n) => 4 * *n as usize,
        }
    }
}

/// One named field of a record schema
#[derive(Clone, Debug)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// Ordered field layout shared by every record in a buffer
#[derive(Clone, Debug)]
pub struct RecordSchema {
    fields: Vec<Field>,
    stride: usize,
}

impl RecordSchema {
    /// Record strides are padded to this boundary (storage buffer array
    /// stride alignment)
    pub const STRIDE_ALIGN: usize = 16;

    /// Build a schema from an ordered field list
    pub fn new(fields: &[(&'static str, FieldKind)]) -> Self {
        let fields: Vec<Field> = fields
            .iter()
            .map(|(name, kind)| Field { name, kind: *kind })
            .collect();
        let packed: usize = fields.iter().map(|f| f.kind.byte_size()).sum();
        let stride = packed.div_ceil(Self::STRIDE_ALIGN) * Self::STRIDE_ALIGN;
        Self { fields, stride }
    }

    /// Byte stride of one record, including trailing padding
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Declared fields in order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Byte offset of a field within a record
    pub fn field_offset(&self, name: &str) -> Option<(usize, FieldKind)> {
        let mut offset = 0;
        for field in &self.fields {
            if field.name == name {
                return Some((offset, field.kind));
            }
            offset += field.kind.byte_size();
        }
        None
    }
}

/// Writes one record's fields in schema order
///
/// Every write checks the declared kind at the cursor; a mismatch or a
/// missing field surfaces as `SchemaMismatch`.
pub struct RecordWriter<'a> {
    schema: &'a RecordSchema,
    out: &'a mut [u8],
    field: usize,
    offset: usize,
}

impl<'a> RecordWriter<'a> {
    fn new(schema: &'a RecordSchema, out: &'a mut [u8]) -> Self {
        Self {
            schema,
            out,
            field: 0,
            offset: 0,
        }
    }

    fn put(&mut self, kind: FieldKind, bytes: &[u8]) -> Result<(), RenderError> {
        let field = self.schema.fields.get(self.field).ok_or_else(|| {
            RenderError::SchemaMismatch(format!(
                "record writes more than {} declared fields",
                self.schema.fields.len()
            ))
        })?;
        if field.kind != kind {
            return Err(RenderError::SchemaMismatch(format!(
                "field '{}' expects {:?}, record wrote {:?}",
                field.name, field.kind, kind
            )));
        }
        self.out[self.offset..self.offset + bytes.len()].copy_from_slice(bytes);
        self.offset += field.kind.byte_size();
        self.field += 1;
        Ok(())
    }

    pub fn write_int(&mut self, value: i32) -> Result<(), RenderError> {
        self.put(FieldKind::Int, bytemuck::bytes_of(&value))
    }

    pub fn write_float(&mut self, value: f32) -> Result<(), RenderError> {
        self.put(FieldKind::Float, bytemuck::bytes_of(&value))
    }

    pub fn write_vec2(&mut self, value: Vec2) -> Result<(), RenderError> {
        self.put(FieldKind::Vec2, bytemuck::cast_slice(&value.to_array()))
    }

    pub fn write_vec3(&mut self, value: Vec3) -> Result<(), RenderError> {
        self.put(FieldKind::Vec3, bytemuck::cast_slice(&value.to_array()))
    }

    pub fn write_vec4(&mut self, value: Vec4) -> Result<(), RenderError> {
        self.put(FieldKind::Vec4, bytemuck::cast_slice(&value.to_array()))
    }

    pub fn write_mat4(&mut self, value: &Mat4) -> Result<(), RenderError> {
        self.put(FieldKind::Mat4, bytemuck::cast_slice(&value.to_cols_array()))
    }

    pub fn write_int_array(&mut self, values: &[i32]) -> Result<(), RenderError> {
        self.put(
            FieldKind::IntArray(values.len() as u8),
            bytemuck::cast_slice(values),
        )
    }

    fn finish(self) -> Result<(), RenderError> {
        if self.field != self.schema.fields.len() {
            return Err(RenderError::SchemaMismatch(format!(
                "record wrote {} of {} declared fields",
                self.field,
                self.schema.fields.len()
            )));
        }
        Ok(())
    }
}

/// A value read back from a record, for verification and tooling
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    IntArray(Vec<i32>),
}

/// Anything that serializes itself into a structured record
pub trait StructuredRecord {
    /// Write all fields in schema order
    fn write(&self, writer: &mut RecordWriter) -> Result<(), RenderError>;
}

/// Dynamic collection of fixed-schema records packed for GPU upload
pub struct StructuredBuffer {
    schema: RecordSchema,
    max_records: Option<usize>,
    slots: SlotAllocator<RecordSlot>,
    /// Live records in insertion order
    order: Vec<RecordHandle>,
    /// Slot index -> position in `order` (usize::MAX while free)
    positions: Vec<usize>,
    bytes: Vec<u8>,
    scratch: Vec<u8>,
    /// Coalesced dirty byte ranges since the last upload
    dirty: Vec<(usize, usize)>,
}

impl StructuredBuffer {
    /// Create an uncapped buffer
    pub fn new(schema: RecordSchema) -> Self {
        Self::with_limit(schema, None)
    }

    /// Create a buffer capped at `max_records` entries
    pub fn capped(schema: RecordSchema, max_records: usize) -> Self {
        Self::with_limit(schema, Some(max_records))
    }

    fn with_limit(schema: RecordSchema, max_records: Option<usize>) -> Self {
        let stride = schema.stride();
        Self {
            schema,
            max_records,
            slots: SlotAllocator::new(),
            order: Vec::new(),
            positions: Vec::new(),
            bytes: Vec::new(),
            scratch: vec![0; stride],
            dirty: Vec::new(),
        }
    }

    /// Insert a record, returning its handle
    pub fn insert(&mut self, record: &dyn StructuredRecord) -> Result<RecordHandle, RenderError> {
        if let Some(max) = self.max_records {
            if self.order.len() >= max {
                return Err(RenderError::CapacityExceeded { limit: max });
            }
        }

        self.write_scratch(record)?;

        let stride = self.schema.stride();
        let position = self.order.len();
        let offset = position * stride;
        self.ensure_capacity(offset + stride);
        self.bytes.extend_from_slice(&self.scratch);

        let handle = self.slots.allocate();
        let slot = handle.index() as usize;
        if slot >= self.positions.len() {
            self.positions.resize(slot + 1, usize::MAX);
        }
        self.positions[slot] = position;
        self.order.push(handle);
        self.mark_dirty(offset, offset + stride);
        Ok(handle)
    }

    /// Rewrite an existing record in place
    pub fn update(
        &mut self,
        handle: RecordHandle,
        record: &dyn StructuredRecord,
    ) -> Result<(), RenderError> {
        let offset = self.offset_of(handle).ok_or_else(|| {
            RenderError::SchemaMismatch("update with a stale record handle".into())
        })?;
        self.write_scratch(record)?;
        let stride = self.schema.stride();
        self.bytes[offset..offset + stride].copy_from_slice(&self.scratch);
        self.mark_dirty(offset, offset + stride);
        Ok(())
    }

    /// Remove a record, compacting the offsets of every later record
    pub fn remove(&mut self, handle: RecordHandle) -> bool {
        let Some(position) = self.position_of(handle) else {
            return false;
        };
        let stride = self.schema.stride();

        // Slide the tail down over the removed record
        self.order.remove(position);
        let start = position * stride;
        self.bytes.copy_within(start + stride.., start);
        self.bytes.truncate(self.order.len() * stride);

        for (pos, later) in self.order.iter().enumerate().skip(position) {
            self.positions[later.index() as usize] = pos;
        }
        self.positions[handle.index() as usize] = usize::MAX;
        let _ = self.slots.free(handle);

        // An empty range still flags the shrink so uploaders see a change
        self.mark_dirty(start, self.bytes.len().max(start));
        true
    }

    /// Byte offset of a record, if its handle is still live
    pub fn offset_of(&self, handle: RecordHandle) -> Option<usize> {
        self.position_of(handle).map(|p| p * self.schema.stride())
    }

    fn position_of(&self, handle: RecordHandle) -> Option<usize> {
        if !self.slots.is_valid(handle) {
            return None;
        }
        let position = self.positions[handle.index() as usize];
        (position != usize::MAX).then_some(position)
    }

    /// Read one field of a record back, decoded through the schema
    pub fn read_field(&self, handle: RecordHandle, name: &str) -> Option<FieldValue> {
        let base = self.offset_of(handle)?;
        let (offset, kind) = self.schema.field_offset(name)?;
        let at = base + offset;
        let bytes = &self.bytes[at..at + kind.byte_size()];

        // The byte block has no alignment guarantee at field offsets
        fn floats(bytes: &[u8]) -> Vec<f32> {
            bytes
                .chunks_exact(4)
                .map(bytemuck::pod_read_unaligned)
                .collect()
        }

        Some(match kind {
            FieldKind::Int => FieldValue::Int(bytemuck::pod_read_unaligned(bytes)),
            FieldKind::Float => FieldValue::Float(bytemuck::pod_read_unaligned(bytes)),
            FieldKind::Vec2 => FieldValue::Vec2(Vec2::from_slice(&floats(bytes))),
            FieldKind::Vec3 => FieldValue::Vec3(Vec3::from_slice(&floats(bytes))),
            FieldKind::Vec4 => FieldValue::Vec4(Vec4::from_slice(&floats(bytes))),
            FieldKind::Mat4 => FieldValue::Mat4(Mat4::from_cols_slice(&floats(bytes))),
            FieldKind::IntArray(_) => FieldValue::IntArray(
                bytes
                    .chunks_exact(4)
                    .map(bytemuck::pod_read_unaligned)
                    .collect(),
            ),
        })
    }

    /// The packed byte block, ready for GPU upload
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if the buffer holds no records
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The declared schema
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Configured record cap, if any
    pub fn max_records(&self) -> Option<usize> {
        self.max_records
    }

    /// Byte ranges modified since the last `clear_dirty`, coalesced
    pub fn dirty_ranges(&self) -> &[(usize, usize)] {
        &self.dirty
    }

    /// Reset dirty tracking after an upload
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    fn write_scratch(&mut self, record: &dyn StructuredRecord) -> Result<(), RenderError> {
        self.scratch.fill(0);
        let mut writer = RecordWriter::new(&self.schema, &mut self.scratch);
        record.write(&mut writer)?;
        writer.finish()
    }

    fn ensure_capacity(&mut self, needed: usize) {
        if self.bytes.capacity() < needed {
            let mut capacity = self.bytes.capacity().max(self.schema.stride() * 4);
            while capacity < needed {
                capacity *= 2;
            }
            self.bytes.reserve_exact(capacity - self.bytes.len());
        }
    }

    fn mark_dirty(&mut self, start: usize, end: usize) {
        if let Some(last) = self.dirty.last_mut() {
            if start <= last.1 {
                last.1 = last.1.max(end);
                last.0 = last.0.min(start);
                return;
            }
        }
        self.dirty.push((start, end));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        position: Vec3,
        intensity: f32,
        kind: i32,
    }

    impl StructuredRecord for Probe {
        fn write(&self, writer: &mut RecordWriter) -> Result<(), RenderError> {
            writer.write_vec3(self.position)?;
            writer.write_float(self.intensity)?;
            writer.write_int(self.kind)
        }
    }

    fn probe_schema() -> RecordSchema {
        RecordSchema::new(&[
            ("position", FieldKind::Vec3),
            ("intensity", FieldKind::Float),
            ("kind", FieldKind::Int),
        ])
    }

    #[test]
    fn test_stride_alignment() {
        // 12 + 4 + 4 = 20 bytes packed, padded to 32
        assert_eq!(probe_schema().stride(), 32);
    }

    #[test]
    fn test_roundtrip_empty() {
        let buffer = StructuredBuffer::new(probe_schema());
        assert!(buffer.is_empty());
        assert!(buffer.bytes().is_empty());
    }

    #[test]
    fn test_roundtrip_single() {
        let mut buffer = StructuredBuffer::new(probe_schema());
        let handle = buffer
            .insert(&Probe {
                position: Vec3::new(1.0, 2.0, 3.0),
                intensity: 10.0,
                kind: 1,
            })
            .unwrap();

        assert_eq!(
            buffer.read_field(handle, "position"),
            Some(FieldValue::Vec3(Vec3::new(1.0, 2.0, 3.0)))
        );
        assert_eq!(
            buffer.read_field(handle, "intensity"),
            Some(FieldValue::Float(10.0))
        );
        assert_eq!(buffer.read_field(handle, "kind"), Some(FieldValue::Int(1)));
    }

    #[test]
    fn test_roundtrip_at_capacity() {
        let cap = 8;
        let mut buffer = StructuredBuffer::capped(probe_schema(), cap);
        let mut handles = Vec::new();
        for i in 0..cap {
            handles.push(
                buffer
                    .insert(&Probe {
                        position: Vec3::splat(i as f32),
                        intensity: i as f32 * 2.0,
                        kind: i as i32,
                    })
                    .unwrap(),
            );
        }

        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(
                buffer.read_field(*handle, "kind"),
                Some(FieldValue::Int(i as i32))
            );
        }

        // One past the cap must fail, not grow
        let result = buffer.insert(&Probe {
            position: Vec3::ZERO,
            intensity: 0.0,
            kind: 99,
        });
        assert_eq!(result, Err(RenderError::CapacityExceeded { limit: cap }));
        assert_eq!(buffer.len(), cap);
    }

    #[test]
    fn test_offsets_monotonic() {
        let mut buffer = StructuredBuffer::new(probe_schema());
        let stride = buffer.schema().stride();
        let mut handles = Vec::new();
        for i in 0..5 {
            handles.push(
                buffer
                    .insert(&Probe {
                        position: Vec3::ZERO,
                        intensity: 0.0,
                        kind: i,
                    })
                    .unwrap(),
            );
        }
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(buffer.offset_of(*handle), Some(i * stride));
        }
    }

    #[test]
    fn test_remove_compacts_offsets() {
        let mut buffer = StructuredBuffer::new(probe_schema());
        let stride = buffer.schema().stride();
        let a = buffer
            .insert(&Probe { position: Vec3::ZERO, intensity: 0.0, kind: 0 })
            .unwrap();
        let b = buffer
            .insert(&Probe { position: Vec3::ZERO, intensity: 0.0, kind: 1 })
            .unwrap();
        let c = buffer
            .insert(&Probe { position: Vec3::ZERO, intensity: 0.0, kind: 2 })
            .unwrap();

        assert!(buffer.remove(a));
        assert_eq!(buffer.offset_of(b), Some(0));
        assert_eq!(buffer.offset_of(c), Some(stride));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.bytes().len(), 2 * stride);

        // The stale handle no longer resolves
        assert_eq!(buffer.offset_of(a), None);
        assert!(!buffer.remove(a));

        // Remaining records kept their values
        assert_eq!(buffer.read_field(b, "kind"), Some(FieldValue::Int(1)));
        assert_eq!(buffer.read_field(c, "kind"), Some(FieldValue::Int(2)));
    }

    #[test]
    fn test_update_marks_only_affected_range() {
        let mut buffer = StructuredBuffer::new(probe_schema());
        let stride = buffer.schema().stride();
        let _a = buffer
            .insert(&Probe { position: Vec3::ZERO, intensity: 0.0, kind: 0 })
            .unwrap();
        let b = buffer
            .insert(&Probe { position: Vec3::ZERO, intensity: 0.0, kind: 1 })
            .unwrap();
        buffer.clear_dirty();

        buffer
            .update(b, &Probe { position: Vec3::ONE, intensity: 5.0, kind: 1 })
            .unwrap();
        assert_eq!(buffer.dirty_ranges(), &[(stride, 2 * stride)]);

        buffer.clear_dirty();
        assert!(buffer.dirty_ranges().is_empty());
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        struct Wrong;
        impl StructuredRecord for Wrong {
            fn write(&self, writer: &mut RecordWriter) -> Result<(), RenderError> {
                writer.write_int(1)
            }
        }

        let mut buffer = StructuredBuffer::new(probe_schema());
        assert!(matches!(
            buffer.insert(&Wrong),
            Err(RenderError::SchemaMismatch(_))
        ));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_heterogeneous_records_share_schema() {
        // A different concrete type writing the same schema lands in the
        // same buffer - the layout belongs to the buffer, not the type.
        struct Other(f32);
        impl StructuredRecord for Other {
            fn write(&self, writer: &mut RecordWriter) -> Result<(), RenderError> {
                writer.write_vec3(Vec3::ZERO)?;
                writer.write_float(self.0)?;
                writer.write_int(7)
            }
        }

        let mut buffer = StructuredBuffer::new(probe_schema());
        buffer
            .insert(&Probe { position: Vec3::ZERO, intensity: 1.0, kind: 0 })
            .unwrap();
        let h = buffer.insert(&Other(3.5)).unwrap();
        assert_eq!(
            buffer.read_field(h, "intensity"),
            Some(FieldValue::Float(3.5))
        );
    }
}
