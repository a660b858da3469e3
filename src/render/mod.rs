pub mod gpu;
pub mod native;
pub mod recording;
mod renderer;
mod shader;

pub use gpu::{
    BufferHandle, BufferKind, GpuContext, GpuError, ProgramHandle, ShaderSource,
    VertexArrayHandle, VertexAttribute, CAMERA_UNIFORM, POSITION_ATTRIBUTE,
};
pub use native::WgpuContext;
pub use recording::{DrawCall, GpuCommand, RecordingContext};
pub use renderer::{default_camera, CameraSource, RenderError, Renderer};
pub use shader::{load_shader_source, ShaderStage};
