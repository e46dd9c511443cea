use std::{collections::HashMap, ops::Range};

use glam::{DMat4, Mat4};
use wgpu::{util::DeviceExt, MultisampleState, PipelineCompilationOptions, ShaderSource};

use crate::{
    error::{RenderError, RenderResult},
    rendering::{
        backend::{
            BufferHandle, BufferUsage, CacheKey, GraphicsBackend, ProgramHandle, ProgramKind,
        },
        config::RenderConfig,
        draw_state::{DrawState, VertexAttribute},
    },
};

const LINE_SHADER: &str = include_str!("../../../assets/shaders/line.wgsl");

/// Bytes per assembled vertex row: x, y, z, side.
const POSITION_STRIDE: wgpu::BufferAddress = 16;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct LineUniforms {
    mvp: [[f32; 4]; 4],
    color: [f32; 4],
    viewport: [f32; 2],
    line_width: f32,
    opacity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    depth_test: bool,
    depth_write: bool,
    pick_mode: bool,
}

struct CachedBuffer {
    buffer: wgpu::Buffer,
    last_used: u64,
}

struct EncodedDraw {
    pipeline: PipelineKey,
    vertex_buffers: Vec<(u32, wgpu::Buffer, wgpu::BufferAddress)>,
    index_buffer: wgpu::Buffer,
    primitives: Vec<(wgpu::BindGroup, Range<u32>)>,
}

const fn vertex_slot(attribute: VertexAttribute) -> u32 {
    match attribute {
        VertexAttribute::PreviousPoint => 0,
        VertexAttribute::Point => 1,
        VertexAttribute::NextPoint => 2,
        VertexAttribute::Color => 3,
        VertexAttribute::Width => 4,
    }
}

const fn position_attribute(shader_location: u32) -> wgpu::VertexAttribute {
    wgpu::VertexAttribute {
        offset: 0,
        shader_location,
        format: wgpu::VertexFormat::Float32x4,
    }
}

const PREVIOUS_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [position_attribute(0)];
const CURRENT_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [position_attribute(1)];
const NEXT_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [position_attribute(2)];

const LINE_VBL: [wgpu::VertexBufferLayout<'static>; 5] = [
    wgpu::VertexBufferLayout {
        array_stride: POSITION_STRIDE,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &PREVIOUS_ATTRIBUTES,
    },
    wgpu::VertexBufferLayout {
        array_stride: POSITION_STRIDE,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &CURRENT_ATTRIBUTES,
    },
    wgpu::VertexBufferLayout {
        array_stride: POSITION_STRIDE,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &NEXT_ATTRIBUTES,
    },
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<u32>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 3,
            format: wgpu::VertexFormat::Unorm8x4,
        }],
    },
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<f32>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 4,
            format: wgpu::VertexFormat::Float32,
        }],
    },
];

/// wgpu implementation of the batching backend.
///
/// Draws are recorded while the layers render and replayed into a render pass
/// by [`WgpuBackend::encode`]. Buffers are created with `create_buffer_init` on
/// a cache miss and dropped once unused for `buffer_eviction_age` frames.
pub struct WgpuBackend {
    device: wgpu::Device,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
    shader: Option<wgpu::ShaderModule>,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    buffers: HashMap<CacheKey, CachedBuffer>,
    recorded: Vec<EncodedDraw>,
    view_projection: DMat4,
    viewport: [f32; 2],
    frame: u64,
    eviction_age: u64,
}

impl WgpuBackend {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
        config: &RenderConfig,
    ) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Line uniform bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Line Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Self {
            device: device.clone(),
            color_format,
            depth_format,
            shader: None,
            bind_group_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            buffers: HashMap::new(),
            recorded: Vec::new(),
            view_projection: DMat4::IDENTITY,
            viewport: [1.0, 1.0],
            frame: 0,
            eviction_age: config.buffer_eviction_age,
        }
    }

    pub fn begin_frame(&mut self, view_projection: DMat4, viewport: (u32, u32)) {
        self.view_projection = view_projection;
        self.viewport = [viewport.0.max(1) as f32, viewport.1.max(1) as f32];
        self.frame += 1;
    }

    pub fn cached_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Replays every draw recorded since the last call.
    pub fn encode(&mut self, render_pass: &mut wgpu::RenderPass<'_>) {
        for draw in self.recorded.drain(..) {
            let Some(pipeline) = self.pipelines.get(&draw.pipeline) else {
                log::warn!("No pipeline for {:?}, dropping draw", draw.pipeline);
                continue;
            };

            render_pass.set_pipeline(pipeline);
            for (slot, buffer, offset) in &draw.vertex_buffers {
                render_pass.set_vertex_buffer(*slot, buffer.slice(*offset..));
            }
            render_pass.set_index_buffer(draw.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

            for (bind_group, index_range) in &draw.primitives {
                render_pass.set_bind_group(0, bind_group, &[]);
                render_pass.draw_indexed(index_range.clone(), 0, 0..1);
            }
        }
    }

    fn resident_buffer(
        &mut self,
        resource: &'static str,
        handle: BufferHandle,
    ) -> RenderResult<wgpu::Buffer> {
        let frame = self.frame;
        let cached = self
            .buffers
            .get_mut(&CacheKey(handle.0))
            .ok_or_else(|| {
                RenderError::binding(resource, format!("buffer {} is not resident", handle.0))
            })?;

        cached.last_used = frame;
        Ok(cached.buffer.clone())
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> RenderResult<()> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }

        let shader = self
            .shader
            .as_ref()
            .ok_or_else(|| RenderError::MissingProgram("line shader not loaded".to_string()))?;

        let depth_stencil = self.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: key.depth_write,
            depth_compare: if key.depth_test {
                wgpu::CompareFunction::LessEqual
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let blend = if key.pick_mode {
            wgpu::BlendState::REPLACE
        } else {
            wgpu::BlendState::ALPHA_BLENDING
        };

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Line Pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &LINE_VBL,
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.color_format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        self.pipelines.insert(key, pipeline);
        Ok(())
    }
}

impl GraphicsBackend for WgpuBackend {
    fn get_buffer_object(
        &mut self,
        key: CacheKey,
        usage: BufferUsage,
        contents: &[u8],
    ) -> RenderResult<BufferHandle> {
        let frame = self.frame;

        if let Some(cached) = self.buffers.get_mut(&key) {
            cached.last_used = frame;
            return Ok(BufferHandle(key.value()));
        }

        if contents.is_empty() {
            return Err(RenderError::buffer(format!(
                "refusing to create empty buffer for cache key {}",
                key.value()
            )));
        }

        let usage = match usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
        };

        let label = format!("Batch buffer {}", key.value());
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&label),
                contents,
                usage,
            });

        self.buffers.insert(
            key,
            CachedBuffer {
                buffer,
                last_used: frame,
            },
        );

        Ok(BufferHandle(key.value()))
    }

    fn shader_program(&mut self, kind: ProgramKind) -> RenderResult<ProgramHandle> {
        match kind {
            ProgramKind::ScreenSpaceLine => {
                if self.shader.is_none() {
                    let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some("Screen-space line"),
                        source: ShaderSource::Wgsl(LINE_SHADER.into()),
                    });
                    self.shader = Some(shader);
                }
            }
        }

        Ok(ProgramHandle(kind as u64))
    }

    fn draw(&mut self, state: &DrawState) -> RenderResult<()> {
        if state.program.is_none() {
            return Err(RenderError::MissingProgram("no program bound".to_string()));
        }

        let pipeline = PipelineKey {
            depth_test: state.depth_test,
            depth_write: state.depth_write,
            pick_mode: state.pick_mode,
        };
        self.ensure_pipeline(pipeline)?;

        let mut vertex_buffers = Vec::with_capacity(state.vertex_bindings.len());
        for binding in &state.vertex_bindings {
            let buffer = self.resident_buffer("vertex buffer", binding.buffer)?;
            vertex_buffers.push((vertex_slot(binding.attribute), buffer, binding.offset));
        }

        if vertex_buffers.len() != LINE_VBL.len() {
            return Err(RenderError::binding(
                "vertex buffer",
                format!("expected {} bindings, got {}", LINE_VBL.len(), vertex_buffers.len()),
            ));
        }

        let element_handle = state
            .element_buffer
            .ok_or_else(|| RenderError::binding("element buffer", "not bound"))?;
        let index_buffer = self.resident_buffer("element buffer", element_handle)?;

        // Relative-to-centre: the translation is folded into the matrix in f64
        let mvp: Mat4 =
            (self.view_projection * DMat4::from_translation(state.local_origin)).as_mat4();

        let primitives = state
            .primitives
            .iter()
            .map(|primitive| {
                let uniforms = LineUniforms {
                    mvp: mvp.to_cols_array_2d(),
                    color: primitive.color.to_array(),
                    viewport: self.viewport,
                    line_width: primitive.line_width,
                    opacity: primitive.opacity,
                };

                let uniform_buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("Line uniforms"),
                        contents: bytemuck::cast_slice(&[uniforms]),
                        usage: wgpu::BufferUsages::UNIFORM,
                    });

                let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Line uniform bind group"),
                    layout: &self.bind_group_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    }],
                });

                (bind_group, primitive.index_range.clone())
            })
            .collect();

        self.recorded.push(EncodedDraw {
            pipeline,
            vertex_buffers,
            index_buffer,
            primitives,
        });

        Ok(())
    }

    fn end_frame(&mut self) {
        let frame = self.frame;
        let eviction_age = self.eviction_age;
        let before = self.buffers.len();

        self.buffers
            .retain(|_, cached| frame.saturating_sub(cached.last_used) <= eviction_age);

        let evicted = before - self.buffers.len();
        if evicted > 0 {
            log::debug!("Evicted {} stale batch buffers", evicted);
        }
    }
}
