//! The GPU boundary the renderer is written against.
//!
//! Resources are referred to by small handles so that the renderer can store
//! them, hand them back for drawing and release them explicitly, the way a GL
//! context works. Backends keep the real objects in a [`HandleTable`].

use thiserror::Error;

use crate::mesh::{DrawMode, Rgba, UniformValue};

/// Name of the vertex attribute fed from the position buffer.
pub const POSITION_ATTRIBUTE: &str = "in_pos";

/// Name of the uniform holding the composed camera matrix.
pub const CAMERA_UNIFORM: &str = "camera_matrix";

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("shader program `{label}` failed to compile: {message}")]
    ShaderCompilation { label: String, message: String },
    #[error("program `{label}` has no room left for uniform `{name}`")]
    UniformCapacity { label: String, name: String },
    #[error("unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u32 },
    #[error("GPU backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayHandle(pub(crate) u32);

/// What a buffer will be bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// Vertex and fragment source text for one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub label: String,
    pub vertex: String,
    pub fragment: String,
}

/// Single float attribute read from a tightly packed vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: &'static str,
    pub components: u32,
}

impl VertexAttribute {
    /// Three floats per vertex bound to [`POSITION_ATTRIBUTE`].
    pub const POSITION: Self = Self {
        name: POSITION_ATTRIBUTE,
        components: 3,
    };

    pub fn stride(self) -> u64 {
        u64::from(self.components) * std::mem::size_of::<f32>() as u64
    }
}

/// Operations the renderer needs from a graphics context.
///
/// Frame state calls (`set_viewport`, `enable_depth_test`, `clear`, `draw`)
/// may be deferred by a backend until [`present`](Self::present).
pub trait GpuContext {
    fn create_buffer(
        &mut self,
        label: &str,
        kind: BufferKind,
        contents: &[u8],
    ) -> Result<BufferHandle, GpuError>;

    fn create_program(&mut self, source: &ShaderSource) -> Result<ProgramHandle, GpuError>;

    /// Writes a uniform into a program by name.
    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        name: &str,
        value: &UniformValue,
    ) -> Result<(), GpuError>;

    /// Binds `vertices` to `attribute` of `program` with `indices` as the element source.
    fn create_vertex_array(
        &mut self,
        program: ProgramHandle,
        vertices: BufferHandle,
        attribute: VertexAttribute,
        indices: BufferHandle,
    ) -> Result<VertexArrayHandle, GpuError>;

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32);

    fn enable_depth_test(&mut self);

    fn clear(&mut self, color: Rgba, depth: f32);

    fn draw(&mut self, vertex_array: VertexArrayHandle, mode: DrawMode, index_count: u32);

    /// Submits the frame recorded since the last `clear`.
    fn present(&mut self) {}

    /// Drawable size changed.
    fn resize(&mut self, _width: u32, _height: u32) {}

    fn release_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    fn release_program(&mut self, program: ProgramHandle);

    fn release_buffer(&mut self, buffer: BufferHandle);
}

/// Dense storage that hands out stable `u32` ids and never reuses them.
#[derive(Debug)]
pub(crate) struct HandleTable<T> {
    slots: Vec<Option<T>>,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> HandleTable<T> {
    pub(crate) fn insert(&mut self, value: T) -> u32 {
        self.slots.push(Some(value));
        (self.slots.len() - 1) as u32
    }

    pub(crate) fn get(&self, id: u32) -> Option<&T> {
        self.slots.get(id as usize).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.slots.get_mut(id as usize).and_then(Option::as_mut)
    }

    pub(crate) fn remove(&mut self, id: u32) -> Option<T> {
        self.slots.get_mut(id as usize).and_then(Option::take)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_table_does_not_reuse_ids() {
        let mut table = HandleTable::default();
        let a = table.insert("a");
        let b = table.insert("b");
        assert_eq!(table.remove(a), Some("a"));
        let c = table.insert("c");
        assert_ne!(c, a);
        assert_eq!(table.get(b), Some(&"b"));
        assert_eq!(table.get(a), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn position_attribute_is_three_packed_floats() {
        assert_eq!(VertexAttribute::POSITION.name, "in_pos");
        assert_eq!(VertexAttribute::POSITION.stride(), 12);
    }
}
