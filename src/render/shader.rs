use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use super::gpu::ShaderSource;
use super::renderer::RenderError;
use crate::mesh::RenderProperties;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// Reads the shader pair named by `properties`.
///
/// Both paths must exist before either file is read.
pub fn load_shader_source(
    label: &str,
    properties: &RenderProperties,
) -> Result<ShaderSource, RenderError> {
    let stages = [
        (ShaderStage::Vertex, properties.vertex_shader_path.as_path()),
        (ShaderStage::Fragment, properties.fragment_shader_path.as_path()),
    ];
    for (stage, path) in stages {
        if !path.is_file() {
            return Err(RenderError::MissingShader {
                stage,
                path: path.to_path_buf(),
            });
        }
    }

    Ok(ShaderSource {
        label: label.to_string(),
        vertex: read_stage(ShaderStage::Vertex, &properties.vertex_shader_path)?,
        fragment: read_stage(ShaderStage::Fragment, &properties.fragment_shader_path)?,
    })
}

fn read_stage(stage: ShaderStage, path: &Path) -> Result<String, RenderError> {
    fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => RenderError::MissingShader {
            stage,
            path: path.to_path_buf(),
        },
        _ => RenderError::ShaderRead {
            stage,
            path: path.to_path_buf(),
            source,
        },
    })
}
