//! Graphics backend abstraction
//!
//! The pipeline submits work through `GpuBackend`, a narrow surface over
//! any graphics API that exposes textures, framebuffer draws with scissor
//! rects, and buffer uploads. `HeadlessBackend` implements the trait
//! without a GPU, recording every call; tests use it to observe which
//! targets were written and how often.

use std::collections::BTreeMap;

use crate::error::RenderError;
use crate::resource::{ResourceId, TextureDesc, TextureFormat};

/// Opaque handle to a backend texture
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureHandle(pub u64);

/// A texture bound as a sampled input for one draw
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureBinding {
    /// Shader binding slot
    pub slot: u32,
    /// Bound texture
    pub texture: TextureHandle,
}

/// Scissor rectangle in texels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One draw submission against a render target
#[derive(Clone, Debug)]
pub struct DrawSubmission {
    /// Pass label for debugging and stats
    pub label: String,
    /// Color attachment, if any
    pub color_target: Option<TextureHandle>,
    /// Depth attachment, if any
    pub depth_target: Option<TextureHandle>,
    /// Restrict the draw to a sub-region of the attachments
    pub scissor: Option<ScissorRect>,
    /// Sampled texture inputs
    pub inputs: Vec<TextureBinding>,
    /// Shader-visible buffers bound for this draw
    pub buffers: Vec<ResourceId>,
    /// Clear the color attachment before drawing
    pub clear_color: Option<[f32; 4]>,
    /// Clear the depth attachment before drawing
    pub clear_depth: Option<f32>,
}

impl DrawSubmission {
    /// Create a submission with just a label; attachments are filled in
    /// by the pass that builds it
    pub fn new(label: &str) -> Self {
        Self {
            label: label.into(),
            color_target: None,
            depth_target: None,
            scissor: None,
            inputs: Vec::new(),
            buffers: Vec::new(),
            clear_color: None,
            clear_depth: None,
        }
    }
}

/// Abstract graphics backend
///
/// Implementations are expected to keep handles valid until
/// `destroy_texture` and to sequence submissions in call order.
pub trait GpuBackend {
    /// Create a texture. Fails if the format/size combination is not
    /// supported by the device.
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle, RenderError>;

    /// Destroy a texture. Destroying an unknown handle is a no-op.
    fn destroy_texture(&mut self, handle: TextureHandle);

    /// Upload raw texel data to a texture (lookup tables)
    fn upload_texture(&mut self, handle: TextureHandle, bytes: &[u8]) -> Result<(), RenderError>;

    /// Upload a shader-visible buffer identified by name
    fn upload_buffer(&mut self, id: ResourceId, bytes: &[u8]) -> Result<(), RenderError>;

    /// Submit one draw
    fn submit(&mut self, draw: &DrawSubmission) -> Result<(), RenderError>;
}

/// Recording backend without a GPU
///
/// Counts writes per target and keeps all submissions of the current
/// frame, so tests can assert exactly what the pipeline did.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_handle: u64,
    textures: BTreeMap<TextureHandle, TextureDesc>,
    /// Formats that fail creation, for exercising fallback paths
    rejected_formats: Vec<TextureFormat>,
    /// All submissions since the last `clear_recording`
    submissions: Vec<DrawSubmission>,
    /// Draw count per color/depth attachment
    write_counts: BTreeMap<TextureHandle, u32>,
    /// Last uploaded bytes per buffer
    buffer_uploads: BTreeMap<ResourceId, Vec<u8>>,
    /// Byte length of the last upload per texture
    texture_uploads: BTreeMap<TextureHandle, usize>,
}

impl HeadlessBackend {
    /// Create an empty recording backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create_texture` fail for a format, to test degraded modes
    pub fn reject_format(&mut self, format: TextureFormat) {
        self.rejected_formats.push(format);
    }

    /// Number of live textures
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Descriptor of a live texture
    pub fn texture_desc(&self, handle: TextureHandle) -> Option<&TextureDesc> {
        self.textures.get(&handle)
    }

    /// Recorded submissions since the last clear
    pub fn submissions(&self) -> &[DrawSubmission] {
        &self.submissions
    }

    /// How many draws wrote to this target
    pub fn write_count(&self, handle: TextureHandle) -> u32 {
        self.write_counts.get(&handle).copied().unwrap_or(0)
    }

    /// Last uploaded contents of a named buffer
    pub fn buffer_contents(&self, id: ResourceId) -> Option<&[u8]> {
        self.buffer_uploads.get(&id).map(|b| b.as_slice())
    }

    /// Byte length of the last upload to a texture
    pub fn texture_upload_len(&self, handle: TextureHandle) -> Option<usize> {
        self.texture_uploads.get(&handle).copied()
    }

    /// Forget recorded submissions and write counts (not resources)
    pub fn clear_recording(&mut self) {
        self.submissions.clear();
        self.write_counts.clear();
    }
}

impl GpuBackend for HeadlessBackend {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle, RenderError> {
        if desc.size.0 == 0 || desc.size.1 == 0 {
            return Err(RenderError::ResourceCreationFailed(format!(
                "zero-sized texture '{}'",
                desc.label
            )));
        }
        if self.rejected_formats.contains(&desc.format) {
            return Err(RenderError::ResourceCreationFailed(format!(
                "format {:?} not supported ('{}')",
                desc.format, desc.label
            )));
        }

        self.next_handle += 1;
        let handle = TextureHandle(self.next_handle);
        self.textures.insert(handle, desc.clone());
        Ok(handle)
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        self.textures.remove(&handle);
    }

    fn upload_texture(&mut self, handle: TextureHandle, bytes: &[u8]) -> Result<(), RenderError> {
        let desc = self.textures.get(&handle).ok_or_else(|| {
            RenderError::ResourceCreationFailed("upload to unknown texture".into())
        })?;
        if bytes.len() != desc.byte_size() {
            return Err(RenderError::ResourceCreationFailed(format!(
                "upload size {} does not match texture '{}' ({} bytes)",
                bytes.len(),
                desc.label,
                desc.byte_size()
            )));
        }
        self.texture_uploads.insert(handle, bytes.len());
        Ok(())
    }

    fn upload_buffer(&mut self, id: ResourceId, bytes: &[u8]) -> Result<(), RenderError> {
        self.buffer_uploads.insert(id, bytes.to_vec());
        Ok(())
    }

    fn submit(&mut self, draw: &DrawSubmission) -> Result<(), RenderError> {
        for target in [draw.color_target, draw.depth_target].into_iter().flatten() {
            if !self.textures.contains_key(&target) {
                return Err(RenderError::ResourceCreationFailed(format!(
                    "draw '{}' targets a destroyed texture",
                    draw.label
                )));
            }
            *self.write_counts.entry(target).or_insert(0) += 1;
        }
        self.submissions.push(draw.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_destroy() {
        let mut backend = HeadlessBackend::new();
        let desc = TextureDesc::attachment("color", (64, 64), TextureFormat::Rgba8Unorm);
        let handle = backend.create_texture(&desc).unwrap();
        assert_eq!(backend.texture_count(), 1);

        backend.destroy_texture(handle);
        assert_eq!(backend.texture_count(), 0);
    }

    #[test]
    fn test_rejected_format() {
        let mut backend = HeadlessBackend::new();
        backend.reject_format(TextureFormat::Rgba16Float);

        let desc = TextureDesc::attachment("hdr", (64, 64), TextureFormat::Rgba16Float);
        assert!(matches!(
            backend.create_texture(&desc),
            Err(RenderError::ResourceCreationFailed(_))
        ));
    }

    #[test]
    fn test_write_counting() {
        let mut backend = HeadlessBackend::new();
        let desc = TextureDesc::attachment("color", (64, 64), TextureFormat::Rgba8Unorm);
        let handle = backend.create_texture(&desc).unwrap();

        let mut draw = DrawSubmission::new("main");
        draw.color_target = Some(handle);
        backend.submit(&draw).unwrap();
        backend.submit(&draw).unwrap();

        assert_eq!(backend.write_count(handle), 2);
        assert_eq!(backend.submissions().len(), 2);
    }

    #[test]
    fn test_draw_to_destroyed_target_fails() {
        let mut backend = HeadlessBackend::new();
        let desc = TextureDesc::attachment("color", (64, 64), TextureFormat::Rgba8Unorm);
        let handle = backend.create_texture(&desc).unwrap();
        backend.destroy_texture(handle);

        let mut draw = DrawSubmission::new("main");
        draw.color_target = Some(handle);
        assert!(backend.submit(&draw).is_err());
    }

    #[test]
    fn test_upload_size_validation() {
        let mut backend = HeadlessBackend::new();
        let desc = TextureDesc::lookup("search", (64, 16), TextureFormat::R8Unorm);
        let handle = backend.create_texture(&desc).unwrap();

        assert!(backend.upload_texture(handle, &[0u8; 64 * 16]).is_ok());
        assert!(backend.upload_texture(handle, &[0u8; 10]).is_err());
    }
}
