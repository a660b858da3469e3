use std::io;
use std::path::PathBuf;

use glam::{Mat4, Vec3};
use log::{debug, error, info, warn};
use thiserror::Error;

use super::gpu::{
    BufferHandle, BufferKind, GpuContext, GpuError, ProgramHandle, VertexArrayHandle,
    VertexAttribute, CAMERA_UNIFORM,
};
use super::shader::{load_shader_source, ShaderStage};
use crate::camera::Camera;
use crate::mesh::{DrawMode, Mesh, Rgba, UniformValue};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("missing {stage} shader source: {}", path.display())]
    MissingShader { stage: ShaderStage, path: PathBuf },
    #[error("failed to read {stage} shader {}", path.display())]
    ShaderRead {
        stage: ShaderStage,
        path: PathBuf,
        source: io::Error,
    },
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Where the renderer's camera came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSource {
    Supplied,
    Synthesized,
}

/// Draws a fixed list of meshes through a [`GpuContext`].
///
/// Every mesh gets its own vertex buffer, index buffer, program and vertex
/// array when the renderer is built. Nothing is allocated per frame, and all
/// of it is released when the renderer is dropped.
pub struct Renderer<G: GpuContext> {
    ctx: G,
    meshes: Vec<Mesh>,
    resources: Vec<MeshResources>,
    background: Rgba,
    viewport: (u32, u32),
    camera: Camera,
    camera_source: CameraSource,
}

impl<G: GpuContext> Renderer<G> {
    /// Uploads `meshes` and renders them through `camera`.
    ///
    /// Fails on the first mesh whose buffers, shaders or uniforms cannot be
    /// set up; everything created up to that point is released first.
    pub fn new(
        ctx: G,
        viewport: (u32, u32),
        meshes: Vec<Mesh>,
        background: Rgba,
        camera: Camera,
    ) -> Result<Self, RenderError> {
        Self::build(ctx, viewport, meshes, background, camera, CameraSource::Supplied)
    }

    /// Same as [`new`](Self::new) with [`default_camera`] for the viewport.
    pub fn with_default_camera(
        ctx: G,
        viewport: (u32, u32),
        meshes: Vec<Mesh>,
        background: Rgba,
    ) -> Result<Self, RenderError> {
        let camera = default_camera(viewport);
        Self::build(ctx, viewport, meshes, background, camera, CameraSource::Synthesized)
    }

    fn build(
        ctx: G,
        viewport: (u32, u32),
        meshes: Vec<Mesh>,
        background: Rgba,
        camera: Camera,
        camera_source: CameraSource,
    ) -> Result<Self, RenderError> {
        let mut renderer = Self {
            ctx,
            meshes: Vec::new(),
            resources: Vec::with_capacity(meshes.len()),
            background,
            viewport,
            camera,
            camera_source,
        };

        // Dropping `renderer` on an early return releases the finished meshes.
        for (index, mesh) in meshes.iter().enumerate() {
            let resources = renderer.upload(index, mesh)?;
            renderer.resources.push(resources);
        }
        renderer.meshes = meshes;

        info!(
            "renderer ready: {} mesh(es), viewport {}x{}, {:?} camera",
            renderer.meshes.len(),
            viewport.0,
            viewport.1,
            camera_source
        );
        Ok(renderer)
    }

    fn upload(&mut self, index: usize, mesh: &Mesh) -> Result<MeshResources, RenderError> {
        let mut partial = PartialResources::default();
        match upload_mesh(&mut self.ctx, index, mesh, &mut partial) {
            Ok(resources) => {
                debug!(
                    "mesh {index}: {} vertices, {} indices, {}",
                    mesh.vertex_count(),
                    mesh.index_count(),
                    mesh.draw_mode().name()
                );
                Ok(resources)
            }
            Err(err) => {
                error!("failed to prepare mesh {index}: {err}");
                partial.release(&mut self.ctx);
                Err(err)
            }
        }
    }

    /// Draws one frame.
    ///
    /// The camera matrix is recomputed from the current camera state and
    /// written into every program before its draw call. Meshes are drawn in
    /// construction order.
    pub fn render(&mut self) {
        let (width, height) = self.viewport;
        self.ctx.set_viewport(0, 0, width, height);
        self.ctx.enable_depth_test();
        self.ctx.clear(self.background, 1.0);

        let camera_matrix = UniformValue::Mat4(self.camera.camera_matrix_upload());
        for (index, resources) in self.resources.iter().enumerate() {
            if let Err(err) = self
                .ctx
                .set_uniform(resources.program, CAMERA_UNIFORM, &camera_matrix)
            {
                warn!("mesh {index}: camera matrix not written: {err}");
            }
            self.ctx
                .draw(resources.vertex_array, resources.mode, resources.index_count);
        }
        self.ctx.present();
    }

    /// Updates the viewport and, when the camera corrects for it, the aspect ratio.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.viewport = (width, height);
        self.ctx.resize(width, height);
        if self.camera.aspect_ratio.is_some() {
            self.camera.aspect_ratio = Some(width as f32 / height as f32);
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn camera_source(&self) -> CameraSource {
        self.camera_source
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn background(&self) -> Rgba {
        self.background
    }

    pub fn context(&self) -> &G {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut G {
        &mut self.ctx
    }
}

impl<G: GpuContext> Drop for Renderer<G> {
    fn drop(&mut self) {
        let count = self.resources.len();
        for resources in self.resources.drain(..) {
            resources.release(&mut self.ctx);
        }
        debug!("released GPU resources for {count} mesh(es)");
    }
}

/// Camera used when none is supplied: one unit above the origin looking
/// down, identity projection, aspect ratio taken from the viewport.
pub fn default_camera(viewport: (u32, u32)) -> Camera {
    let (width, height) = viewport;
    let aspect_ratio = if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    };
    Camera::new(Vec3::new(0.0, 0.0, 1.0), Vec3::ZERO, Some(aspect_ratio), Mat4::IDENTITY)
}

fn upload_mesh<G: GpuContext>(
    ctx: &mut G,
    index: usize,
    mesh: &Mesh,
    partial: &mut PartialResources,
) -> Result<MeshResources, RenderError> {
    let label = format!("mesh-{index}");
    let vertices = *partial.vertices.insert(ctx.create_buffer(
        &format!("{label}-vertices"),
        BufferKind::Vertex,
        mesh.serialize_vertices(),
    )?);
    let indices = *partial.indices.insert(ctx.create_buffer(
        &format!("{label}-indices"),
        BufferKind::Index,
        mesh.serialize_indices(),
    )?);

    let source = load_shader_source(&label, mesh.render_properties())?;
    let program = *partial.program.insert(ctx.create_program(&source)?);
    for uniform in &mesh.render_properties().uniforms {
        ctx.set_uniform(program, &uniform.name, &uniform.value)?;
    }

    let vertex_array =
        ctx.create_vertex_array(program, vertices, VertexAttribute::POSITION, indices)?;

    Ok(MeshResources {
        vertices,
        indices,
        program,
        vertex_array,
        index_count: mesh.index_count() as u32,
        mode: mesh.draw_mode(),
    })
}

struct MeshResources {
    vertices: BufferHandle,
    indices: BufferHandle,
    program: ProgramHandle,
    vertex_array: VertexArrayHandle,
    index_count: u32,
    mode: DrawMode,
}

impl MeshResources {
    fn release<G: GpuContext>(self, ctx: &mut G) {
        ctx.release_vertex_array(self.vertex_array);
        ctx.release_program(self.program);
        ctx.release_buffer(self.indices);
        ctx.release_buffer(self.vertices);
    }
}

/// Resources of a mesh that is still being set up.
#[derive(Default)]
struct PartialResources {
    vertices: Option<BufferHandle>,
    indices: Option<BufferHandle>,
    program: Option<ProgramHandle>,
}

impl PartialResources {
    fn release<G: GpuContext>(self, ctx: &mut G) {
        if let Some(program) = self.program {
            ctx.release_program(program);
        }
        if let Some(indices) = self.indices {
            ctx.release_buffer(indices);
        }
        if let Some(vertices) = self.vertices {
            ctx.release_buffer(vertices);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::mesh::{Material, RenderProperties, Uniform};
    use crate::render::recording::{GpuCommand, RecordingContext};

    const BLACK: Rgba = [0.0, 0.0, 0.0, 1.0];

    fn shader_dir() -> TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("vertex.wgsl"), "// vertex").unwrap();
        fs::write(dir.path().join("fragment.wgsl"), "// fragment").unwrap();
        dir
    }

    fn properties(dir: &Path) -> RenderProperties {
        RenderProperties::new(dir.join("vertex.wgsl"), dir.join("fragment.wgsl"))
    }

    fn triangle(props: RenderProperties) -> Mesh {
        Mesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            Some(vec![0, 1, 2]),
            Material::default(),
            props,
        )
        .unwrap()
    }

    fn camera() -> Camera {
        Camera::orbiting(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO)
    }

    #[test]
    fn allocates_one_resource_set_per_mesh() {
        let dir = shader_dir();
        let ctx = RecordingContext::new();
        let meshes = vec![triangle(properties(dir.path())), triangle(properties(dir.path()))];
        let renderer = Renderer::new(ctx.clone(), (640, 480), meshes, BLACK, camera()).unwrap();

        assert_eq!(ctx.live_buffers(), 4);
        assert_eq!(ctx.live_programs(), 2);
        assert_eq!(ctx.live_vertex_arrays(), 2);
        assert_eq!(renderer.meshes().len(), 2);
        assert_eq!(renderer.camera_source(), CameraSource::Supplied);
    }

    #[test]
    fn binds_declared_uniforms_by_name() {
        let dir = shader_dir();
        let ctx = RecordingContext::new();
        let props = properties(dir.path())
            .with_uniform(Uniform::new("radius", UniformValue::Float(0.25)))
            .with_uniform(Uniform::new("color", UniformValue::Vec4([1.0, 0.0, 0.0, 1.0])));
        let _renderer =
            Renderer::new(ctx.clone(), (640, 480), vec![triangle(props)], BLACK, camera()).unwrap();

        let bound: Vec<String> = ctx
            .commands()
            .into_iter()
            .filter_map(|command| match command {
                GpuCommand::SetUniform { name, .. } => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(bound, vec!["radius".to_string(), "color".to_string()]);
    }

    #[test]
    fn missing_shader_aborts_and_releases_everything() {
        let dir = shader_dir();
        let ctx = RecordingContext::new();
        let mut meshes: Vec<Mesh> = (0..5).map(|_| triangle(properties(dir.path()))).collect();
        meshes[2] = triangle(RenderProperties::new(
            dir.path().join("vertex.wgsl"),
            dir.path().join("nope.wgsl"),
        ));

        let result = Renderer::new(ctx.clone(), (640, 480), meshes, BLACK, camera());
        match result {
            Err(RenderError::MissingShader { stage, .. }) => {
                assert_eq!(stage, ShaderStage::Fragment)
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("construction should fail"),
        }
        assert_eq!(ctx.live_resources(), 0);
        // Two complete meshes plus the buffers of the third were created first.
        assert_eq!(ctx.created_buffers(), 6);
    }

    #[test]
    fn rejected_program_releases_partial_mesh() {
        let dir = shader_dir();
        let ctx = RecordingContext::new();
        ctx.reject_program("mesh-1");
        let meshes = vec![triangle(properties(dir.path())), triangle(properties(dir.path()))];

        let result = Renderer::new(ctx.clone(), (640, 480), meshes, BLACK, camera());
        assert!(matches!(
            result,
            Err(RenderError::Gpu(GpuError::ShaderCompilation { .. }))
        ));
        assert_eq!(ctx.live_resources(), 0);
    }

    #[test]
    fn drop_releases_all_resources() {
        let dir = shader_dir();
        let ctx = RecordingContext::new();
        let renderer = Renderer::new(
            ctx.clone(),
            (640, 480),
            vec![triangle(properties(dir.path()))],
            BLACK,
            camera(),
        )
        .unwrap();
        assert_eq!(ctx.live_resources(), 4);
        drop(renderer);
        assert_eq!(ctx.live_resources(), 0);
    }

    #[test]
    fn render_sets_frame_state_then_draws_in_order() {
        let dir = shader_dir();
        let ctx = RecordingContext::new();
        let strip = triangle(properties(dir.path()).with_mode(DrawMode::TriangleStrip));
        let meshes = vec![triangle(properties(dir.path())), strip];
        let background = [0.1, 0.2, 0.3, 1.0];
        let mut renderer = Renderer::new(ctx.clone(), (800, 600), meshes, background, camera()).unwrap();
        ctx.take_commands();

        renderer.render();
        let commands = ctx.commands();
        assert_eq!(
            &commands[..3],
            &[
                GpuCommand::SetViewport {
                    x: 0,
                    y: 0,
                    width: 800,
                    height: 600
                },
                GpuCommand::EnableDepthTest,
                GpuCommand::Clear {
                    color: background,
                    depth: 1.0
                },
            ]
        );
        let modes: Vec<DrawMode> = ctx.draw_calls().iter().map(|draw| draw.mode).collect();
        assert_eq!(modes, vec![DrawMode::Triangles, DrawMode::TriangleStrip]);
        assert_eq!(commands.last(), Some(&GpuCommand::Present));
    }

    #[test]
    fn render_uploads_current_camera_matrix() {
        let dir = shader_dir();
        let ctx = RecordingContext::new();
        let mut renderer = Renderer::new(
            ctx.clone(),
            (640, 480),
            vec![triangle(properties(dir.path()))],
            BLACK,
            camera(),
        )
        .unwrap();

        renderer.camera_mut().set_polar(1.0);
        renderer.render();
        let program = ctx.programs()[0];
        assert_eq!(
            ctx.uniform(program, CAMERA_UNIFORM),
            Some(UniformValue::Mat4(renderer.camera().camera_matrix_upload()))
        );
    }

    #[test]
    fn default_camera_is_synthesized_from_viewport() {
        let ctx = RecordingContext::new();
        let renderer = Renderer::with_default_camera(ctx, (1280, 720), Vec::new(), BLACK).unwrap();
        assert_eq!(renderer.camera_source(), CameraSource::Synthesized);
        let camera = renderer.camera();
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(camera.target, Vec3::ZERO);
        assert_eq!(camera.projection, Mat4::IDENTITY);
        assert_eq!(camera.aspect_ratio, Some(1280.0 / 720.0));
        assert_eq!(default_camera((10, 0)).aspect_ratio, Some(1.0));
    }

    #[test]
    fn resize_updates_viewport_and_aspect() {
        let ctx = RecordingContext::new();
        let mut renderer =
            Renderer::with_default_camera(ctx.clone(), (100, 100), Vec::new(), BLACK).unwrap();
        renderer.resize(300, 100);
        assert_eq!(renderer.viewport(), (300, 100));
        assert_eq!(renderer.camera().aspect_ratio, Some(3.0));
        renderer.resize(0, 50);
        assert_eq!(renderer.viewport(), (300, 100));
        assert!(ctx.commands().contains(&GpuCommand::Resize {
            width: 300,
            height: 100
        }));
    }
}
