//! Z-up orbit camera and a small mesh renderer.
//!
//! Meshes are plain vertex/index data plus the shader pair and uniforms they
//! draw with. The [`Renderer`] uploads each one once through a [`GpuContext`]
//! and redraws them every frame with the current [`Camera`] matrix. The
//! context is a trait so the same renderer runs on a wgpu window surface or
//! headless against a [`RecordingContext`].

pub mod app;
pub mod camera;
pub mod config;
pub mod input;
pub mod math;
pub mod mesh;
pub mod render;
pub mod shapes;

pub use camera::{Camera, RollMode, Spherical, VERTICAL};
pub use config::{Settings, WindowSettings};
pub use input::{MouseButton, OrbitControls};
pub use mesh::{
    DrawMode, Material, Mesh, MeshError, RenderProperties, Rgba, Uniform, UniformType,
    UniformValue,
};
pub use render::{
    CameraSource, GpuContext, GpuError, RecordingContext, RenderError, Renderer, WgpuContext,
};
pub use shapes::ShaderLibrary;
