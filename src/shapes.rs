//! Generators for the built-in parametric meshes.
//!
//! Each generator returns a validated [`Mesh`] whose render properties point at
//! a shader pair inside a [`ShaderLibrary`].

use std::f32::consts::TAU;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use log::debug;

use crate::math::linspace;
use crate::mesh::{
    DrawMode, Material, Mesh, MeshError, RenderProperties, Uniform, UniformType, UniformValue,
};

/// Half-width of the ribbon drawn around an equation curve.
pub const CURVE_HALF_WIDTH: f32 = 0.02;

/// Directory holding one `vertex.wgsl`/`fragment.wgsl` pair per shape kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderLibrary {
    root: PathBuf,
}

impl ShaderLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Render properties for the shader pair stored under `name`.
    pub fn properties(&self, name: &str) -> RenderProperties {
        let dir = self.root.join(name);
        RenderProperties::new(dir.join("vertex.wgsl"), dir.join("fragment.wgsl"))
    }
}

/// Filled disc in the XY plane, as a fan of `segments` triangles.
pub fn circle(
    material: Material,
    radius: f32,
    segments: usize,
    shaders: &ShaderLibrary,
) -> Result<Mesh, MeshError> {
    require("circle segments", 3, segments)?;

    let mut vertices = Vec::with_capacity(segments + 1);
    vertices.push(Vec3::ZERO);
    vertices.extend((0..segments).map(|i| {
        let angle = TAU * i as f32 / segments as f32;
        Vec3::new(radius * angle.cos(), radius * angle.sin(), 0.0)
    }));

    let rim = segments as i32;
    let indices = (0..rim)
        .flat_map(|i| [0, i + 1, (i + 1) % rim + 1])
        .collect();

    let properties = shaders
        .properties("circle")
        .with_mode(DrawMode::Triangles)
        .with_uniform(Uniform::typed(
            "color",
            UniformType::Vec4,
            UniformValue::Vec4(material.fill_color),
        ));
    Mesh::new(vertices, Some(indices), material, properties)
}

/// Axis-aligned rectangle centred on the origin.
///
/// The corners are rounded in the fragment shader from the `radius` and
/// `dimensions` uniforms.
pub fn rounded_rectangle(
    material: Material,
    width: f32,
    height: f32,
    corner_radius: f32,
    shaders: &ShaderLibrary,
) -> Result<Mesh, MeshError> {
    let (hw, hh) = (width / 2.0, height / 2.0);
    let vertices = vec![
        Vec3::new(-hw, -hh, 0.0),
        Vec3::new(hw, -hh, 0.0),
        Vec3::new(hw, hh, 0.0),
        Vec3::new(-hw, hh, 0.0),
    ];
    let indices = vec![0, 1, 2, 2, 3, 0];

    let properties = shaders
        .properties("rounded_rectangle")
        .with_mode(DrawMode::Triangles)
        .with_uniform(Uniform::typed(
            "color",
            UniformType::Vec4,
            UniformValue::Vec4(material.fill_color),
        ))
        .with_uniform(Uniform::typed(
            "radius",
            UniformType::Float,
            UniformValue::Float(corner_radius),
        ))
        .with_uniform(Uniform::typed(
            "dimensions",
            UniformType::Vec2,
            UniformValue::Vec2([width, height]),
        ));
    Mesh::new(vertices, Some(indices), material, properties)
}

/// Height range of an equation surface before normalisation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct HeightRange {
    min: f32,
    max: f32,
    /// `max - min`, reported as 1.0 for a flat surface.
    span: f32,
}

/// Surface `z = f(x, y)` sampled on a `rows x cols` grid over `[-1, 1]^2`.
///
/// Heights are recentred and scaled into `[-1, 1]`; the sampled range is
/// passed to the shader as `z_min`, `z_max` and `z_span`.
pub fn equation_surface<F>(
    material: Material,
    equation: F,
    rows: usize,
    cols: usize,
    shaders: &ShaderLibrary,
) -> Result<Mesh, MeshError>
where
    F: Fn(f32, f32) -> f32,
{
    require("surface rows", 2, rows)?;
    require("surface cols", 2, cols)?;

    let xs = linspace(-1.0, 1.0, cols);
    let ys = linspace(-1.0, 1.0, rows);
    let samples: Vec<(f32, f32, f32)> = ys
        .iter()
        .flat_map(|&y| xs.iter().map(move |&x| (x, y)))
        .map(|(x, y)| (x, y, equation(x, y)))
        .collect();

    let range = height_range(samples.iter().map(|&(_, _, z)| z));
    let raw_span = range.max - range.min;
    debug!(
        "equation surface height range: min={} max={} span={}",
        range.min, range.max, raw_span
    );
    let center = (range.min + range.max) / 2.0;
    let vertices = samples
        .into_iter()
        .map(|(x, y, z)| {
            let z = if raw_span == 0.0 {
                0.0
            } else {
                (z - center) / (raw_span / 2.0)
            };
            Vec3::new(x, y, z)
        })
        .collect();

    let properties = shaders
        .properties("equation_surface")
        .with_mode(DrawMode::Triangles)
        .with_uniform(Uniform::typed("z_min", UniformType::Float, UniformValue::Float(range.min)))
        .with_uniform(Uniform::typed("z_max", UniformType::Float, UniformValue::Float(range.max)))
        .with_uniform(Uniform::typed(
            "z_span",
            UniformType::Float,
            UniformValue::Float(range.span),
        ));
    Mesh::new(vertices, Some(grid_indices(rows, cols)), material, properties)
}

fn height_range(heights: impl Iterator<Item = f32>) -> HeightRange {
    let (min, max) = heights.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), z| {
        (lo.min(z), hi.max(z))
    });
    let span = max - min;
    HeightRange {
        min,
        max,
        span: if span == 0.0 { 1.0 } else { span },
    }
}

/// Two triangles per grid cell, row-major vertex order.
fn grid_indices(rows: usize, cols: usize) -> Vec<i32> {
    let cols_i = cols as i32;
    let mut indices = Vec::with_capacity((rows - 1) * (cols - 1) * 6);
    for row in 0..rows - 1 {
        for col in 0..cols - 1 {
            let t = (row * cols + col) as i32;
            indices.extend_from_slice(&[t, t + 1, t + cols_i, t + cols_i + 1, t + cols_i, t + 1]);
        }
    }
    indices
}

/// Ribbon around the curve `y = f(x)` for `x` in `[-1, 1]`, as a triangle strip.
///
/// Each of the `segments` segments contributes a vertex on either side of the
/// curve, offset along the segment normal by [`CURVE_HALF_WIDTH`].
pub fn equation_curve<F>(
    material: Material,
    equation: F,
    segments: usize,
    shaders: &ShaderLibrary,
) -> Result<Mesh, MeshError>
where
    F: Fn(f32) -> f32,
{
    require("curve segments", 1, segments)?;

    let points: Vec<Vec2> = linspace(-1.0, 1.0, segments + 1)
        .into_iter()
        .map(|x| Vec2::new(x, equation(x)))
        .collect();

    let vertices = points
        .windows(2)
        .flat_map(|pair| {
            let direction = (pair[1] - pair[0]).normalize_or_zero();
            let normal = direction.perp() * CURVE_HALF_WIDTH;
            let upper = pair[0] + normal;
            let lower = pair[0] - normal;
            [upper.extend(0.0), lower.extend(0.0)]
        })
        .collect();

    let properties = shaders
        .properties("equation_curve")
        .with_mode(DrawMode::TriangleStrip)
        .with_uniform(Uniform::typed(
            "color",
            UniformType::Vec4,
            UniformValue::Vec4(material.fill_color),
        ));
    Mesh::polyline(vertices, material, properties)
}

fn require(what: &'static str, minimum: usize, actual: usize) -> Result<(), MeshError> {
    if actual < minimum {
        Err(MeshError::InvalidResolution {
            what,
            minimum,
            actual,
        })
    } else {
        Ok(())
    }
}
