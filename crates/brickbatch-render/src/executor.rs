use std::collections::HashMap;
use std::num::NonZeroU64;

use brickbatch_core::constants::{RENDER_VERTEX_STRIDE, SOURCE_VERTEX_STRIDE};
use brickbatch_core::{GeometryVariant, RenderError};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::batch::{
    BlendMode, DrawList, DrawOp, DrawPass, FillMode, ObjectUniforms, Primitive, Winding,
};
use crate::buffers::SceneBuffers;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Byte stride of one pass style slot (dynamic offsets must be 256-aligned).
const STYLE_SLOT: u64 = 256;

/// Initial number of per-instance uniform slots.
const INITIAL_OBJECT_SLOTS: u64 = 256;

/// GPU-uploadable view uniforms. Must match ViewUniforms in scene.wgsl.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ViewUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub inv_view: [[f32; 4]; 4],
    pub view_it: [[f32; 4]; 4],
    pub light_pos: [f32; 4],
    pub viewport: [f32; 4],
    pub time: f32,
    pub opacity: f32,
    pub _pad: [f32; 2],
}

impl ViewUniforms {
    pub fn new(
        view: Mat4,
        proj: Mat4,
        light_dir: Vec3,
        viewport: [f32; 2],
        time: f32,
        transparency: f32,
    ) -> Self {
        let view_proj = proj * view;
        let inv_view = view.inverse();
        // The light sits far out along its direction, relative to the eye.
        let eye = inv_view.w_axis.truncate();
        let light = eye + light_dir.normalize_or_zero() * 1.0e4;
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            inv_view: inv_view.to_cols_array_2d(),
            view_it: inv_view.transpose().to_cols_array_2d(),
            light_pos: light.extend(1.0).to_array(),
            viewport: [0.0, 0.0, viewport[0], viewport[1]],
            time,
            opacity: (1.0 - transparency).clamp(0.0, 1.0),
            _pad: [0.0; 2],
        }
    }
}

/// Shading parameters of one draw pass. Must match PassStyle in scene.wgsl.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct PassStyle {
    intensity: f32,
    lit: f32,
    _pad: [f32; 2],
}

/// Everything that selects a distinct render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub variant: GeometryVariant,
    pub primitive: Primitive,
    pub cull: bool,
    pub front_face: Winding,
    pub fill: FillMode,
    pub blend: BlendMode,
}

/// Replays [`DrawList`]s against [`SceneBuffers`].
///
/// Fixed-function state the batcher tracks maps onto a cache of render
/// pipelines. wgpu has no line width or stipple, so those ops are accepted
/// and ignored.
pub struct SceneRenderer {
    color_format: wgpu::TextureFormat,
    shader: wgpu::ShaderModule,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    view_buffer: wgpu::Buffer,
    view_bind_group: wgpu::BindGroup,
    object_bgl: wgpu::BindGroupLayout,
    object_buffer: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
    object_slots: u64,
    object_stride: u64,
    style_bind_group: wgpu::BindGroup,
    polygon_line: bool,
    warned_wireframe: bool,
}

fn uniform_entry(dynamic: bool, size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: NonZeroU64::new(size),
        },
        count: None,
    }
}

fn sized_binding(buffer: &wgpu::Buffer, size: u64) -> wgpu::BindingResource<'_> {
    wgpu::BindingResource::Buffer(wgpu::BufferBinding {
        buffer,
        offset: 0,
        size: NonZeroU64::new(size),
    })
}

const OBJECT_SIZE: u64 = std::mem::size_of::<ObjectUniforms>() as u64;
const STYLE_SIZE: u64 = std::mem::size_of::<PassStyle>() as u64;

impl SceneRenderer {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/scene.wgsl").into()),
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::RenderPipelineError(error.to_string()));
        }

        let view_size = std::mem::size_of::<ViewUniforms>() as u64;
        let view_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("view-bgl"),
            entries: &[uniform_entry(false, view_size)],
        });
        let object_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object-bgl"),
            entries: &[uniform_entry(true, OBJECT_SIZE)],
        });
        let style_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("style-bgl"),
            entries: &[uniform_entry(true, STYLE_SIZE)],
        });

        let view_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("view-uniforms"),
            size: view_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let view_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("view-bg"),
            layout: &view_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: view_buffer.as_entire_binding(),
            }],
        });

        let align = device.limits().min_uniform_buffer_offset_alignment as u64;
        let object_stride = OBJECT_SIZE.div_ceil(align) * align;
        let (object_buffer, object_bind_group) =
            Self::create_object_slots(device, &object_bgl, INITIAL_OBJECT_SLOTS, object_stride);

        let mut styles = vec![0u8; DrawPass::ALL.len() * STYLE_SLOT as usize];
        for pass in DrawPass::ALL {
            let style = PassStyle {
                intensity: pass.intensity(),
                lit: if pass.lit() { 1.0 } else { 0.0 },
                _pad: [0.0; 2],
            };
            let start = pass.index() * STYLE_SLOT as usize;
            styles[start..start + STYLE_SIZE as usize]
                .copy_from_slice(bytemuck::bytes_of(&style));
        }
        let style_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pass-styles"),
            contents: &styles,
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let style_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("style-bg"),
            layout: &style_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: sized_binding(&style_buffer, STYLE_SIZE),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene-pipeline-layout"),
            bind_group_layouts: &[&view_bgl, &object_bgl, &style_bgl],
            push_constant_ranges: &[],
        });

        let polygon_line = device.features().contains(wgpu::Features::POLYGON_MODE_LINE);
        if !polygon_line {
            log::warn!("POLYGON_MODE_LINE unsupported: wireframe overlays are disabled");
        }

        Ok(Self {
            color_format,
            shader,
            pipeline_layout,
            pipelines: HashMap::new(),
            view_buffer,
            view_bind_group,
            object_bgl,
            object_buffer,
            object_bind_group,
            object_slots: INITIAL_OBJECT_SLOTS,
            object_stride,
            style_bind_group,
            polygon_line,
            warned_wireframe: false,
        })
    }

    fn create_object_slots(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        slots: u64,
        stride: u64,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("object-uniforms"),
            size: slots * stride,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("object-bg"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: sized_binding(&buffer, OBJECT_SIZE),
            }],
        });
        (buffer, bind_group)
    }

    /// Upload view uniforms each frame.
    pub fn update_view(&self, queue: &wgpu::Queue, uniforms: &ViewUniforms) {
        queue.write_buffer(&self.view_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    fn upload_objects(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        objects: &[ObjectUniforms],
    ) {
        let needed = objects.len() as u64;
        if needed > self.object_slots {
            let slots = needed.next_power_of_two();
            let (buffer, bind_group) =
                Self::create_object_slots(device, &self.object_bgl, slots, self.object_stride);
            self.object_buffer.destroy();
            self.object_buffer = buffer;
            self.object_bind_group = bind_group;
            self.object_slots = slots;
            log::debug!("Grew object uniform slots to {}", slots);
        }
        if objects.is_empty() {
            return;
        }
        let stride = self.object_stride as usize;
        let mut bytes = vec![0u8; objects.len() * stride];
        for (slot, object) in objects.iter().enumerate() {
            bytes[slot * stride..slot * stride + OBJECT_SIZE as usize]
                .copy_from_slice(bytemuck::bytes_of(object));
        }
        queue.write_buffer(&self.object_buffer, 0, &bytes);
    }

    fn skips(&self, key: &PipelineKey) -> bool {
        key.fill == FillMode::Line && key.primitive == Primitive::Triangles && !self.polygon_line
    }

    /// Keys of every draw in `list`, in order.
    fn draw_keys(list: &DrawList, variant: GeometryVariant) -> Vec<PipelineKey> {
        let mut key = PipelineKey {
            variant,
            primitive: Primitive::Triangles,
            cull: true,
            front_face: Winding::Ccw,
            fill: FillMode::Fill,
            blend: BlendMode::Opaque,
        };
        let mut keys = Vec::new();
        for op in &list.ops {
            match op {
                DrawOp::SetCull(cull) => key.cull = *cull,
                DrawOp::SetFrontFace(winding) => key.front_face = *winding,
                DrawOp::SetFill(fill) => key.fill = *fill,
                DrawOp::SetBlend(blend) => key.blend = *blend,
                DrawOp::SetLineWidth(_) | DrawOp::SetStipple(_) => {}
                DrawOp::Draw(call) => {
                    key.primitive = call.primitive;
                    keys.push(key);
                }
            }
        }
        keys
    }

    fn ensure_pipelines(
        &mut self,
        device: &wgpu::Device,
        keys: &[PipelineKey],
    ) -> Result<(), RenderError> {
        let missing: Vec<PipelineKey> = keys
            .iter()
            .filter(|k| !self.pipelines.contains_key(*k) && !self.skips(k))
            .copied()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        for key in missing {
            if self.pipelines.contains_key(&key) {
                continue;
            }
            let pipeline = self.create_pipeline(device, &key);
            self.pipelines.insert(key, pipeline);
        }
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::RenderPipelineError(error.to_string()));
        }
        log::debug!("Pipeline cache holds {} pipelines", self.pipelines.len());
        Ok(())
    }

    fn create_pipeline(&self, device: &wgpu::Device, key: &PipelineKey) -> wgpu::RenderPipeline {
        const SOURCE_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
            wgpu::vertex_attr_array![0 => Float32x3];
        const RENDER_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

        let (entry_point, stride, attributes) = match key.variant {
            GeometryVariant::Source => ("vs_source", SOURCE_VERTEX_STRIDE, &SOURCE_ATTRIBUTES[..]),
            GeometryVariant::Render => ("vs_render", RENDER_VERTEX_STRIDE, &RENDER_ATTRIBUTES[..]),
        };

        let topology = match key.primitive {
            Primitive::Triangles => wgpu::PrimitiveTopology::TriangleList,
            Primitive::Lines => wgpu::PrimitiveTopology::LineList,
            Primitive::Points => wgpu::PrimitiveTopology::PointList,
        };
        let (blend, depth_write_enabled, depth_compare) = match key.blend {
            BlendMode::Opaque => (None, true, wgpu::CompareFunction::LessEqual),
            BlendMode::Additive => (
                Some(wgpu::BlendState {
                    color: wgpu::BlendComponent {
                        src_factor: wgpu::BlendFactor::SrcAlpha,
                        dst_factor: wgpu::BlendFactor::One,
                        operation: wgpu::BlendOperation::Add,
                    },
                    alpha: wgpu::BlendComponent::OVER,
                }),
                false,
                wgpu::CompareFunction::Always,
            ),
        };

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene-pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some(entry_point),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: stride,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes,
                }],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology,
                front_face: match key.front_face {
                    Winding::Ccw => wgpu::FrontFace::Ccw,
                    Winding::Cw => wgpu::FrontFace::Cw,
                },
                cull_mode: (key.cull && topology == wgpu::PrimitiveTopology::TriangleList)
                    .then_some(wgpu::Face::Back),
                polygon_mode: match key.fill {
                    FillMode::Fill => wgpu::PolygonMode::Fill,
                    FillMode::Line => wgpu::PolygonMode::Line,
                },
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled,
                depth_compare,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.color_format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        })
    }

    /// Encode one render pass that clears the targets and replays `list`.
    /// Returns the number of draws actually issued.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        buffers: &SceneBuffers,
        list: &DrawList,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
    ) -> Result<u32, RenderError> {
        let keys = Self::draw_keys(list, buffers.variant());
        self.ensure_pipelines(device, &keys)?;
        self.upload_objects(device, queue, &list.objects);

        if keys.iter().any(|k| self.skips(k)) && !self.warned_wireframe {
            log::warn!("Skipping line-fill triangle draws on this device");
            self.warned_wireframe = true;
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.05,
                        g: 0.05,
                        b: 0.08,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let Some(vertex) = buffers.vertex() else {
            return Ok(0);
        };
        pass.set_vertex_buffer(0, vertex.slice(..));
        if let Some(index) = buffers.index() {
            pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
        }
        pass.set_bind_group(0, &self.view_bind_group, &[]);

        let mut issued = 0;
        let mut bound: Option<PipelineKey> = None;
        for (call, key) in list.draws().zip(&keys) {
            if self.skips(key) || (call.indexed && buffers.index().is_none()) {
                continue;
            }
            if bound != Some(*key) {
                let Some(pipeline) = self.pipelines.get(key) else {
                    continue;
                };
                pass.set_pipeline(pipeline);
                bound = Some(*key);
            }
            let object_offset = call.object as u64 * self.object_stride;
            let style_offset = call.pass.index() as u64 * STYLE_SLOT;
            pass.set_bind_group(1, &self.object_bind_group, &[object_offset as u32]);
            pass.set_bind_group(2, &self.style_bind_group, &[style_offset as u32]);
            if call.indexed {
                pass.draw_indexed(call.range.clone(), call.base_vertex, 0..1);
            } else {
                pass.draw(call.range.clone(), 0..1);
            }
            issued += 1;
        }
        Ok(issued)
    }
}
