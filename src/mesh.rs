use std::path::PathBuf;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while assembling a mesh.
#[derive(Debug, Error, PartialEq)]
pub enum MeshError {
    #[error("index {index} at position {position} is outside 0..{vertex_count}")]
    IndexOutOfRange {
        position: usize,
        index: i32,
        vertex_count: usize,
    },
    #[error("uniform `{name}` is declared as {declared:?} but holds a {actual:?}")]
    UniformTypeMismatch {
        name: String,
        declared: UniformType,
        actual: UniformType,
    },
    #[error("stroke width must be positive and finite, got {0}")]
    InvalidStrokeWidth(f32),
    #[error("{what} must be at least {minimum}, got {actual}")]
    InvalidResolution {
        what: &'static str,
        minimum: usize,
        actual: usize,
    },
}

pub type Rgba = [f32; 4];

/// Visual attributes of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    #[serde(default = "default_fill")]
    pub fill_color: Rgba,
    #[serde(default = "default_stroke")]
    pub stroke_color: Rgba,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            fill_color: default_fill(),
            stroke_color: default_stroke(),
            stroke_width: default_stroke_width(),
        }
    }
}

impl Material {
    pub fn filled(fill_color: Rgba) -> Self {
        Self {
            fill_color,
            ..Self::default()
        }
    }
}

fn default_fill() -> Rgba {
    [1.0, 1.0, 1.0, 1.0]
}

fn default_stroke() -> Rgba {
    [0.0, 0.0, 0.0, 1.0]
}

fn default_stroke_width() -> f32 {
    1.0
}

/// Primitive topology used to read a mesh's index stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawMode {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
}

impl DrawMode {
    pub const ALL: [DrawMode; 5] = [
        DrawMode::Points,
        DrawMode::Lines,
        DrawMode::LineStrip,
        DrawMode::Triangles,
        DrawMode::TriangleStrip,
    ];

    pub fn is_strip(self) -> bool {
        matches!(self, DrawMode::LineStrip | DrawMode::TriangleStrip)
    }

    pub fn name(self) -> &'static str {
        match self {
            DrawMode::Points => "points",
            DrawMode::Lines => "lines",
            DrawMode::LineStrip => "line_strip",
            DrawMode::Triangles => "triangles",
            DrawMode::TriangleStrip => "triangle_strip",
        }
    }
}

/// Shader-side type of a uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniformType {
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

/// Value bound to a named shader uniform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major.
    Mat4([f32; 16]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformType {
        match self {
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Int(_) => UniformType::Int,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::Mat4(_) => UniformType::Mat4,
        }
    }

    /// Raw native-endian bytes of the value.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            UniformValue::Float(v) => bytemuck::bytes_of(v),
            UniformValue::Int(v) => bytemuck::bytes_of(v),
            UniformValue::Vec2(v) => bytemuck::cast_slice(v),
            UniformValue::Vec3(v) => bytemuck::cast_slice(v),
            UniformValue::Vec4(v) => bytemuck::cast_slice(v),
            UniformValue::Mat4(v) => bytemuck::cast_slice(v),
        }
    }
}

/// A named uniform with an optional declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Uniform {
    pub name: String,
    pub value: UniformValue,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub declared: Option<UniformType>,
}

impl Uniform {
    pub fn new(name: impl Into<String>, value: UniformValue) -> Self {
        Self {
            name: name.into(),
            value,
            declared: None,
        }
    }

    pub fn typed(name: impl Into<String>, declared: UniformType, value: UniformValue) -> Self {
        Self {
            name: name.into(),
            value,
            declared: Some(declared),
        }
    }
}

/// Shader pair, draw mode and uniforms for one mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderProperties {
    pub vertex_shader_path: PathBuf,
    pub fragment_shader_path: PathBuf,
    #[serde(default)]
    pub draw_mode: DrawMode,
    #[serde(default)]
    pub uniforms: Vec<Uniform>,
}

impl RenderProperties {
    pub fn new(vertex_shader_path: impl Into<PathBuf>, fragment_shader_path: impl Into<PathBuf>) -> Self {
        Self {
            vertex_shader_path: vertex_shader_path.into(),
            fragment_shader_path: fragment_shader_path.into(),
            draw_mode: DrawMode::default(),
            uniforms: Vec::new(),
        }
    }

    pub fn with_mode(mut self, draw_mode: DrawMode) -> Self {
        self.draw_mode = draw_mode;
        self
    }

    pub fn with_uniform(mut self, uniform: Uniform) -> Self {
        self.uniforms.push(uniform);
        self
    }
}

/// Vertex positions plus topology, material and render state.
///
/// A mesh is validated once and never changes afterwards. Meshes built
/// without indices are polylines and draw with the implicit sequence
/// `0..vertex_count`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vec3>,
    indices: Vec<i32>,
    indexed: bool,
    material: Material,
    render_properties: RenderProperties,
}

impl Mesh {
    /// Builds a mesh, rejecting indices that do not name a vertex.
    pub fn new(
        vertices: Vec<Vec3>,
        indices: Option<Vec<i32>>,
        material: Material,
        render_properties: RenderProperties,
    ) -> Result<Self, MeshError> {
        validate_material(&material)?;
        validate_uniforms(&render_properties.uniforms)?;

        let vertex_count = vertices.len();
        let indexed = indices.is_some();
        let indices = match indices {
            Some(indices) => {
                if let Some(position) = indices
                    .iter()
                    .position(|&index| index < 0 || index as usize >= vertex_count)
                {
                    return Err(MeshError::IndexOutOfRange {
                        position,
                        index: indices[position],
                        vertex_count,
                    });
                }
                indices
            }
            None => (0..vertex_count as i32).collect(),
        };

        Ok(Self {
            vertices,
            indices,
            indexed,
            material,
            render_properties,
        })
    }

    /// Builds an unindexed mesh.
    pub fn polyline(
        vertices: Vec<Vec3>,
        material: Material,
        render_properties: RenderProperties,
    ) -> Result<Self, MeshError> {
        Self::new(vertices, None, material, render_properties)
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn indices(&self) -> &[i32] {
        &self.indices
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn render_properties(&self) -> &RenderProperties {
        &self.render_properties
    }

    pub fn draw_mode(&self) -> DrawMode {
        self.render_properties.draw_mode
    }

    /// Positions as contiguous `f32` bytes, `x0 y0 z0 x1 y1 z1 ...`.
    pub fn serialize_vertices(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Indices as contiguous `i32` bytes.
    pub fn serialize_indices(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

fn validate_material(material: &Material) -> Result<(), MeshError> {
    if material.stroke_width.is_finite() && material.stroke_width > 0.0 {
        Ok(())
    } else {
        Err(MeshError::InvalidStrokeWidth(material.stroke_width))
    }
}

fn validate_uniforms(uniforms: &[Uniform]) -> Result<(), MeshError> {
    for uniform in uniforms {
        let actual = uniform.value.kind();
        if let Some(declared) = uniform.declared {
            if declared != actual {
                return Err(MeshError::UniformTypeMismatch {
                    name: uniform.name.clone(),
                    declared,
                    actual,
                });
            }
        }
    }
    Ok(())
}
