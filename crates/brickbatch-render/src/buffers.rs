use brickbatch_core::{GeometryVariant, RenderError};
use wgpu::util::DeviceExt;

use crate::staging::StagedBuffers;

/// Destination of a materialization pass.
///
/// `upload` either replaces the previous contents completely or fails and
/// leaves them untouched.
pub trait BufferSink {
    fn upload(&mut self, staged: &StagedBuffers) -> Result<(), RenderError>;
}

/// The three shared device buffers. A zero-sized buffer is never allocated
/// and reads as `None`.
#[derive(Default)]
pub struct SceneBuffers {
    vertex: Option<wgpu::Buffer>,
    index: Option<wgpu::Buffer>,
    /// Per-triangle material ids. Kept resident with the geometry it
    /// describes but not bound: draws shade with the instance color.
    material: Option<wgpu::Buffer>,
    variant: GeometryVariant,
}

impl SceneBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex(&self) -> Option<&wgpu::Buffer> {
        self.vertex.as_ref()
    }

    pub fn index(&self) -> Option<&wgpu::Buffer> {
        self.index.as_ref()
    }

    /// Geometry variant the current contents were packed for.
    pub fn variant(&self) -> GeometryVariant {
        self.variant
    }

    /// Allocate a new buffer set sized to `staged`, fill it, then release
    /// the previous set. On failure the previous set stays in place.
    pub fn replace(
        &mut self,
        device: &wgpu::Device,
        staged: &StagedBuffers,
    ) -> Result<(), RenderError> {
        let limit = device.limits().max_buffer_size;
        for (label, bytes) in [
            ("vertex", &staged.vertex),
            ("index", &staged.index),
            ("material", &staged.material),
        ] {
            let size = bytes.len() as u64;
            if size > limit {
                return Err(RenderError::BufferTooLarge { label, size, limit });
            }
        }

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let vertex = create(device, "scene-vertex", &staged.vertex, wgpu::BufferUsages::VERTEX);
        let index = create(device, "scene-index", &staged.index, wgpu::BufferUsages::INDEX);
        let material = create(
            device,
            "scene-material",
            &staged.material,
            wgpu::BufferUsages::STORAGE,
        );
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            log::warn!("Scene buffer allocation failed: {error}");
            for buffer in [&vertex, &index, &material].into_iter().flatten() {
                buffer.destroy();
            }
            return Err(RenderError::OutOfMemory {
                label: "scene",
                size: staged.total_bytes(),
            });
        }

        for old in [self.vertex.take(), self.index.take(), self.material.take()]
            .into_iter()
            .flatten()
        {
            old.destroy();
        }
        self.vertex = vertex;
        self.index = index;
        self.material = material;
        self.variant = staged.variant;
        Ok(())
    }
}

fn create(
    device: &wgpu::Device,
    label: &str,
    contents: &[u8],
    usage: wgpu::BufferUsages,
) -> Option<wgpu::Buffer> {
    if contents.is_empty() {
        return None;
    }
    Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents,
        usage: usage | wgpu::BufferUsages::COPY_DST,
    }))
}

/// Uploads into [`SceneBuffers`] on a live device.
pub struct GpuSink<'a> {
    pub device: &'a wgpu::Device,
    pub buffers: &'a mut SceneBuffers,
}

impl BufferSink for GpuSink<'_> {
    fn upload(&mut self, staged: &StagedBuffers) -> Result<(), RenderError> {
        self.buffers.replace(self.device, staged)
    }
}
