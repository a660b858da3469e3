use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use super::gpu::{
    BufferHandle, BufferKind, GpuContext, GpuError, HandleTable, ProgramHandle, ShaderSource,
    VertexArrayHandle, VertexAttribute, CAMERA_UNIFORM,
};
use crate::mesh::{DrawMode, Rgba, UniformValue};

/// Bytes per custom uniform slot. Every value starts on a 16-byte boundary.
const UNIFORM_SLOT: u64 = 16;
/// Custom uniform slots available after the camera matrix.
const UNIFORM_SLOTS: u64 = 16;
const CAMERA_MATRIX_SIZE: u64 = 64;
const UNIFORM_BLOCK_SIZE: u64 = CAMERA_MATRIX_SIZE + UNIFORM_SLOT * UNIFORM_SLOTS;

/// [`GpuContext`] backed by wgpu, drawing into a winit window.
///
/// Each program owns one uniform buffer laid out as the camera matrix
/// followed by 16-byte slots assigned to custom uniforms in the order they
/// are first written. Frame calls are collected and replayed as a single
/// render pass in [`present`](GpuContext::present).
pub struct WgpuContext {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    uniform_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    buffers: HandleTable<GpuBuffer>,
    programs: HandleTable<Program>,
    vertex_arrays: HandleTable<VertexArray>,
    frame: FrameState,
}

impl WgpuContext {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("orbit-mesh-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: Default::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no supported formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);
        let depth = DepthBuffer::create(&device, config.width, config.height);

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform-block-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(UNIFORM_BLOCK_SIZE),
                },
                count: None,
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mesh-pipeline-layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });

        debug!(
            "wgpu surface configured: {}x{} {:?}",
            config.width, config.height, config.format
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            depth,
            uniform_layout,
            pipeline_layout,
            buffers: HandleTable::default(),
            programs: HandleTable::default(),
            vertex_arrays: HandleTable::default(),
            frame: FrameState::default(),
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.config.width, self.config.height)
    }

    fn create_pipeline(
        &self,
        program: &Program,
        attribute: VertexAttribute,
        mode: DrawMode,
        depth_test: bool,
    ) -> Result<wgpu::RenderPipeline, GpuError> {
        let attributes = [wgpu::VertexAttribute {
            format: vertex_format(attribute)?,
            offset: 0,
            shader_location: 0,
        }];
        let label = format!("{}-{}", program.label, mode.name());

        Ok(self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&label),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.vertex,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: attribute.stride(),
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                },
                primitive: wgpu::PrimitiveState {
                    topology: topology(mode),
                    strip_index_format: mode.is_strip().then_some(wgpu::IndexFormat::Uint32),
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DepthBuffer::FORMAT,
                    depth_write_enabled: depth_test,
                    depth_compare: if depth_test {
                        wgpu::CompareFunction::Less
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &program.fragment,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            }))
    }

    /// Runs `build` inside a validation error scope and reports what it caught.
    fn validated<T>(
        &self,
        label: &str,
        build: impl FnOnce(&Self) -> Result<T, GpuError>,
    ) -> Result<T, GpuError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let built = build(self);
        let caught = pollster::block_on(self.device.pop_error_scope());
        match caught {
            Some(err) => Err(GpuError::ShaderCompilation {
                label: label.to_string(),
                message: err.to_string(),
            }),
            None => built,
        }
    }

    fn record_pass(&self, frame: FrameState, view: &wgpu::TextureView) -> wgpu::CommandBuffer {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        let (color_load, depth_load) = match frame.clear {
            Some(([r, g, b, a], depth)) => (
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: f64::from(r),
                    g: f64::from(g),
                    b: f64::from(b),
                    a: f64::from(a),
                }),
                wgpu::LoadOp::Clear(depth),
            ),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        };

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("mesh-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some((x, y, width, height)) = frame.viewport {
                let (x, y, width, height) =
                    clamp_viewport((x, y, width, height), (self.config.width, self.config.height));
                if width > 0 && height > 0 {
                    pass.set_viewport(
                        x as f32,
                        y as f32,
                        width as f32,
                        height as f32,
                        0.0,
                        1.0,
                    );
                }
            }

            for draw in &frame.draws {
                let Some(vertex_array) = self.vertex_arrays.get(draw.vertex_array.0) else {
                    warn!("draw with released vertex array {}", draw.vertex_array.0);
                    continue;
                };
                let (Some(program), Some(vertices), Some(indices)) = (
                    self.programs.get(vertex_array.program.0),
                    self.buffers.get(vertex_array.vertices.0),
                    self.buffers.get(vertex_array.indices.0),
                ) else {
                    warn!(
                        "vertex array {} refers to released resources",
                        draw.vertex_array.0
                    );
                    continue;
                };
                let Some(pipeline) = vertex_array.pipelines.get(&(draw.mode, draw.depth_test))
                else {
                    continue;
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &program.bind_group, &[]);
                pass.set_vertex_buffer(0, vertices.buffer.slice(..));
                pass.set_index_buffer(indices.buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        encoder.finish()
    }
}

impl GpuContext for WgpuContext {
    fn create_buffer(
        &mut self,
        label: &str,
        kind: BufferKind,
        contents: &[u8],
    ) -> Result<BufferHandle, GpuError> {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = if contents.is_empty() {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: wgpu::COPY_BUFFER_ALIGNMENT,
                usage,
                mapped_at_creation: false,
            })
        } else {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents,
                    usage,
                })
        };
        Ok(BufferHandle(self.buffers.insert(GpuBuffer { buffer, kind })))
    }

    fn create_program(&mut self, source: &ShaderSource) -> Result<ProgramHandle, GpuError> {
        let program = self.validated(&source.label, |ctx| {
            let vertex = ctx
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&format!("{}-vertex", source.label)),
                    source: wgpu::ShaderSource::Wgsl(source.vertex.as_str().into()),
                });
            let fragment = ctx
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&format!("{}-fragment", source.label)),
                    source: wgpu::ShaderSource::Wgsl(source.fragment.as_str().into()),
                });

            let uniforms = ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{}-uniforms", source.label)),
                size: UNIFORM_BLOCK_SIZE,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{}-bind-group", source.label)),
                layout: &ctx.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                }],
            });

            Ok(Program {
                label: source.label.clone(),
                vertex,
                fragment,
                uniforms,
                bind_group,
                layout: UniformLayout::default(),
            })
        })?;

        debug!("compiled program {}", program.label);
        Ok(ProgramHandle(self.programs.insert(program)))
    }

    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        name: &str,
        value: &UniformValue,
    ) -> Result<(), GpuError> {
        let recorded = self
            .programs
            .get_mut(program.0)
            .ok_or(GpuError::UnknownHandle {
                kind: "program",
                id: program.0,
            })?;
        let offset =
            recorded
                .layout
                .offset(name, value)
                .ok_or_else(|| GpuError::UniformCapacity {
                    label: recorded.label.clone(),
                    name: name.to_string(),
                })?;
        self.queue
            .write_buffer(&recorded.uniforms, offset, value.as_bytes());
        Ok(())
    }

    fn create_vertex_array(
        &mut self,
        program: ProgramHandle,
        vertices: BufferHandle,
        attribute: VertexAttribute,
        indices: BufferHandle,
    ) -> Result<VertexArrayHandle, GpuError> {
        let recorded = self.programs.get(program.0).ok_or(GpuError::UnknownHandle {
            kind: "program",
            id: program.0,
        })?;
        for (buffer, expected) in [(vertices, BufferKind::Vertex), (indices, BufferKind::Index)] {
            match self.buffers.get(buffer.0) {
                Some(found) if found.kind == expected => {}
                _ => {
                    return Err(GpuError::UnknownHandle {
                        kind: "buffer",
                        id: buffer.0,
                    })
                }
            }
        }

        let pipelines = self.validated(&recorded.label, |ctx| {
            let mut pipelines = HashMap::new();
            for mode in DrawMode::ALL {
                for depth_test in [false, true] {
                    let pipeline = ctx.create_pipeline(recorded, attribute, mode, depth_test)?;
                    pipelines.insert((mode, depth_test), pipeline);
                }
            }
            Ok(pipelines)
        })?;

        Ok(VertexArrayHandle(self.vertex_arrays.insert(VertexArray {
            program,
            vertices,
            indices,
            pipelines,
        })))
    }

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.frame.viewport = Some((x, y, width, height));
    }

    fn enable_depth_test(&mut self) {
        self.frame.depth_test = true;
    }

    fn clear(&mut self, color: Rgba, depth: f32) {
        self.frame.clear = Some((color, depth));
        self.frame.draws.clear();
    }

    fn draw(&mut self, vertex_array: VertexArrayHandle, mode: DrawMode, index_count: u32) {
        if index_count == 0 {
            return;
        }
        let depth_test = self.frame.depth_test;
        self.frame.draws.push(QueuedDraw {
            vertex_array,
            mode,
            index_count,
            depth_test,
        });
    }

    fn present(&mut self) {
        let frame = std::mem::take(&mut self.frame);
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return;
            }
            Err(err) => {
                warn!("skipping frame: {err}");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let commands = self.record_pass(frame, &view);
        self.queue.submit(std::iter::once(commands));
        output.present();
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, width, height);
    }

    fn release_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_arrays.remove(vertex_array.0);
    }

    fn release_program(&mut self, program: ProgramHandle) {
        self.programs.remove(program.0);
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        if let Some(released) = self.buffers.remove(buffer.0) {
            released.buffer.destroy();
        }
    }
}

struct GpuBuffer {
    buffer: wgpu::Buffer,
    kind: BufferKind,
}

struct Program {
    label: String,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    layout: UniformLayout,
}

struct VertexArray {
    program: ProgramHandle,
    vertices: BufferHandle,
    indices: BufferHandle,
    pipelines: HashMap<(DrawMode, bool), wgpu::RenderPipeline>,
}

#[derive(Default)]
struct FrameState {
    viewport: Option<(u32, u32, u32, u32)>,
    depth_test: bool,
    clear: Option<(Rgba, f32)>,
    draws: Vec<QueuedDraw>,
}

struct QueuedDraw {
    vertex_array: VertexArrayHandle,
    mode: DrawMode,
    index_count: u32,
    depth_test: bool,
}

/// Offsets of named uniforms inside a program's uniform buffer.
#[derive(Debug, Default)]
struct UniformLayout {
    slots: Vec<(String, u64)>,
    /// Bytes taken after the camera matrix.
    used: u64,
}

impl UniformLayout {
    /// Byte offset for `name`, assigning the next free slot on first use.
    fn offset(&mut self, name: &str, value: &UniformValue) -> Option<u64> {
        if name == CAMERA_UNIFORM {
            return Some(0);
        }
        if let Some((_, offset)) = self.slots.iter().find(|(slot, _)| slot == name) {
            return Some(*offset);
        }

        let offset = CAMERA_MATRIX_SIZE + self.used;
        if offset + slot_span(value) > UNIFORM_BLOCK_SIZE {
            return None;
        }
        self.used += slot_span(value);
        self.slots.push((name.to_string(), offset));
        Some(offset)
    }
}

fn slot_span(value: &UniformValue) -> u64 {
    match value {
        UniformValue::Mat4(_) => 4 * UNIFORM_SLOT,
        _ => UNIFORM_SLOT,
    }
}

fn topology(mode: DrawMode) -> wgpu::PrimitiveTopology {
    match mode {
        DrawMode::Points => wgpu::PrimitiveTopology::PointList,
        DrawMode::Lines => wgpu::PrimitiveTopology::LineList,
        DrawMode::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        DrawMode::Triangles => wgpu::PrimitiveTopology::TriangleList,
        DrawMode::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

fn vertex_format(attribute: VertexAttribute) -> Result<wgpu::VertexFormat, GpuError> {
    match attribute.components {
        1 => Ok(wgpu::VertexFormat::Float32),
        2 => Ok(wgpu::VertexFormat::Float32x2),
        3 => Ok(wgpu::VertexFormat::Float32x3),
        4 => Ok(wgpu::VertexFormat::Float32x4),
        other => Err(GpuError::Backend(format!(
            "attribute `{}` has unsupported component count {other}",
            attribute.name
        ))),
    }
}

fn clamp_viewport(viewport: (u32, u32, u32, u32), target: (u32, u32)) -> (u32, u32, u32, u32) {
    let (x, y, width, height) = viewport;
    let x = x.min(target.0);
    let y = y.min(target.1);
    (x, y, width.min(target.0 - x), height.min(target.1 - y))
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_matrix_always_sits_at_the_front() {
        let mut layout = UniformLayout::default();
        let matrix = UniformValue::Mat4([0.0; 16]);
        assert_eq!(layout.offset(CAMERA_UNIFORM, &matrix), Some(0));
        assert!(layout.slots.is_empty());
    }

    #[test]
    fn uniforms_take_slots_in_first_write_order() {
        let mut layout = UniformLayout::default();
        let color = UniformValue::Vec4([1.0; 4]);
        let radius = UniformValue::Float(0.5);
        assert_eq!(layout.offset("color", &color), Some(64));
        assert_eq!(layout.offset("radius", &radius), Some(80));
        assert_eq!(layout.offset("color", &color), Some(64));
    }

    #[test]
    fn matrices_span_four_slots() {
        let mut layout = UniformLayout::default();
        let matrix = UniformValue::Mat4([0.0; 16]);
        assert_eq!(layout.offset("model", &matrix), Some(64));
        assert_eq!(layout.offset("tint", &UniformValue::Float(1.0)), Some(128));
    }

    #[test]
    fn runs_out_of_slots() {
        let mut layout = UniformLayout::default();
        for index in 0..UNIFORM_SLOTS {
            assert!(layout
                .offset(&format!("u{index}"), &UniformValue::Float(0.0))
                .is_some());
        }
        assert_eq!(layout.offset("overflow", &UniformValue::Float(0.0)), None);
    }

    #[test]
    fn viewport_is_clamped_to_the_target() {
        assert_eq!(clamp_viewport((0, 0, 800, 600), (640, 480)), (0, 0, 640, 480));
        assert_eq!(clamp_viewport((700, 0, 10, 10), (640, 480)), (640, 0, 0, 10));
    }

    #[test]
    fn strip_modes_map_to_strip_topologies() {
        assert_eq!(
            topology(DrawMode::TriangleStrip),
            wgpu::PrimitiveTopology::TriangleStrip
        );
        assert_eq!(topology(DrawMode::LineStrip), wgpu::PrimitiveTopology::LineStrip);
        assert_eq!(topology(DrawMode::Points), wgpu::PrimitiveTopology::PointList);
    }
}
