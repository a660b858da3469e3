use anyhow::{Context, Result};
use glam::Vec3;

use crate::camera::Camera;
use crate::config::WindowSettings;
use crate::math::perspective_z_up;
use crate::mesh::{Material, Mesh, Rgba};
use crate::render::DrawCall;
use crate::shapes::{equation_curve, equation_surface, ShaderLibrary};

pub const BACKGROUND: Rgba = [0.03, 0.03, 0.05, 1.0];

/// Sombrero surface with a sine ribbon running across it.
pub fn demo_scene(shaders: &ShaderLibrary) -> Result<Vec<Mesh>> {
    let surface = equation_surface(
        Material::filled([1.0, 0.5, 0.2, 1.0]),
        sombrero,
        50,
        50,
        shaders,
    )
    .context("failed to build sombrero surface")?;
    let curve = equation_curve(
        Material::filled([0.2, 0.6, 1.0, 1.0]),
        |x| 0.5 * (3.0 * x).sin(),
        200,
        shaders,
    )
    .context("failed to build sine curve")?;
    Ok(vec![surface, curve])
}

fn sombrero(x: f32, y: f32) -> f32 {
    let r = (x * x + y * y).sqrt();
    r.sin() / (r + 0.001)
}

/// Perspective camera at (3, 3, 3) looking at the origin.
pub fn demo_camera(window: &WindowSettings) -> Camera {
    let (width, height) = window.window_size;
    let aspect_ratio = if height == 0 {
        window.aspect_ratio
    } else {
        width as f32 / height as f32
    };
    Camera::new(
        Vec3::splat(3.0),
        Vec3::ZERO,
        Some(aspect_ratio),
        perspective_z_up(45f32.to_radians(), 0.1, 100.0),
    )
}

/// Shader directory name a mesh draws with, e.g. `equation_surface`.
pub fn shader_name(mesh: &Mesh) -> String {
    mesh.render_properties()
        .vertex_shader_path
        .parent()
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string())
}

pub fn print_scene_summary(meshes: &[Mesh]) {
    println!("Loaded scene with {} meshes", meshes.len());
    for (index, mesh) in meshes.iter().enumerate() {
        println!(
            " - mesh {index}: {} ({}) vertices={} indices={}",
            shader_name(mesh),
            mesh.draw_mode().name(),
            mesh.vertex_count(),
            mesh.index_count()
        );
    }
}

pub fn print_camera(camera: &Camera) {
    let spherical = camera.spherical();
    println!(
        "Camera at ({:.2}, {:.2}, {:.2}) radius={:.3} polar={:.3} azimuthal={:.3}",
        camera.position.x,
        camera.position.y,
        camera.position.z,
        spherical.radius,
        spherical.polar,
        spherical.azimuthal
    );
}

pub fn print_frame(frame: usize, draws: &[DrawCall]) {
    println!("Frame {frame}: {} draw call(s)", draws.len());
    for draw in draws {
        println!("   {} x{}", draw.mode.name(), draw.index_count);
    }
}
