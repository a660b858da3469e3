use std::fs;
use std::path::Path;

use glam::{Mat4, Vec3};
use orbit_mesh::render::{BufferKind, GpuCommand, CAMERA_UNIFORM};
use orbit_mesh::{
    Camera, DrawMode, Material, Mesh, RecordingContext, RenderError, RenderProperties, Renderer,
    Uniform, UniformValue,
};
use tempfile::tempdir;

fn write_shaders(dir: &Path) -> RenderProperties {
    let vertex = dir.join("vertex.wgsl");
    let fragment = dir.join("fragment.wgsl");
    fs::write(&vertex, "@vertex fn vs_main() {}").expect("write vertex shader");
    fs::write(&fragment, "@fragment fn fs_main() {}").expect("write fragment shader");
    RenderProperties::new(vertex, fragment)
}

fn triangle(props: RenderProperties) -> Mesh {
    Mesh::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        Some(vec![0, 1, 2]),
        Material::default(),
        props,
    )
    .expect("valid triangle")
}

#[test]
fn single_triangle_end_to_end() {
    let dir = tempdir().expect("temp dir");
    let props = write_shaders(dir.path())
        .with_uniform(Uniform::new("color", UniformValue::Vec4([1.0, 0.0, 0.0, 1.0])));
    let ctx = RecordingContext::new();
    let camera = Camera::new(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Some(1.0), Mat4::IDENTITY);

    let mut renderer = Renderer::new(
        ctx.clone(),
        (640, 480),
        vec![triangle(props)],
        [0.0, 0.0, 0.0, 1.0],
        camera.clone(),
    )
    .expect("renderer builds");

    let setup = ctx.take_commands();
    let vertex_upload = setup
        .iter()
        .find_map(|command| match command {
            GpuCommand::CreateBuffer {
                buffer,
                kind: BufferKind::Vertex,
                ..
            } => Some(*buffer),
            _ => None,
        })
        .expect("vertex buffer created");
    let expected: Vec<u8> = [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        .iter()
        .flat_map(|value| value.to_ne_bytes())
        .collect();
    assert_eq!(ctx.buffer_contents(vertex_upload), Some(expected));

    renderer.render();
    let frame = ctx.commands();

    let draws = ctx.draw_calls();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].index_count, 3);
    assert_eq!(draws[0].mode, DrawMode::Triangles);

    let camera_write = frame
        .iter()
        .position(|command| {
            matches!(command, GpuCommand::SetUniform { name, .. } if name == CAMERA_UNIFORM)
        })
        .expect("camera matrix written");
    let draw = frame
        .iter()
        .position(|command| matches!(command, GpuCommand::Draw(_)))
        .expect("draw issued");
    assert!(camera_write < draw);

    match &frame[camera_write] {
        GpuCommand::SetUniform { value, .. } => {
            assert_eq!(*value, UniformValue::Mat4(camera.camera_matrix_upload()));
        }
        other => panic!("unexpected command {other:?}"),
    }
    assert_eq!(frame.last(), Some(&GpuCommand::Present));
}

#[test]
fn camera_changes_reach_the_next_frame() {
    let dir = tempdir().expect("temp dir");
    let ctx = RecordingContext::new();
    let camera = Camera::orbiting(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO);
    let mut renderer = Renderer::new(
        ctx.clone(),
        (640, 480),
        vec![triangle(write_shaders(dir.path()))],
        [0.0, 0.0, 0.0, 1.0],
        camera,
    )
    .expect("renderer builds");

    renderer.render();
    let program = ctx.programs()[0];
    let first = ctx.uniform(program, CAMERA_UNIFORM);

    renderer.camera_mut().set_radius(6.0);
    renderer.render();
    let second = ctx.uniform(program, CAMERA_UNIFORM);

    assert_ne!(first, second);
    assert_eq!(
        second,
        Some(UniformValue::Mat4(renderer.camera().camera_matrix_upload()))
    );
    assert_eq!(ctx.frames_presented(), 2);
}

#[test]
fn failed_construction_leaves_no_live_resources() {
    let dir = tempdir().expect("temp dir");
    let good = write_shaders(dir.path());
    let bad = RenderProperties::new(dir.path().join("gone.wgsl"), dir.path().join("fragment.wgsl"));
    let meshes = vec![
        triangle(good.clone()),
        triangle(good.clone()),
        triangle(bad),
        triangle(good.clone()),
        triangle(good),
    ];
    let ctx = RecordingContext::new();

    let result = Renderer::with_default_camera(ctx.clone(), (640, 480), meshes, [0.0; 4]);
    let err = match result {
        Err(err) => err,
        Ok(_) => panic!("third mesh has no vertex shader"),
    };
    assert!(matches!(err, RenderError::MissingShader { .. }));
    assert!(err.to_string().contains("missing vertex shader source"));
    assert_eq!(ctx.live_buffers(), 0);
    assert_eq!(ctx.live_programs(), 0);
    assert_eq!(ctx.live_vertex_arrays(), 0);
}
