//! Headless [`GpuContext`] that records every call.
//!
//! Used for the `--summary-only` mode of the binary and as the test double for
//! the renderer. Clones share one log, so a caller can keep a handle while the
//! renderer owns another.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::gpu::{
    BufferHandle, BufferKind, GpuContext, GpuError, HandleTable, ProgramHandle, ShaderSource,
    VertexArrayHandle, VertexAttribute,
};
use crate::mesh::{DrawMode, Rgba, UniformValue};

#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    CreateBuffer {
        buffer: BufferHandle,
        kind: BufferKind,
        len: usize,
    },
    CreateProgram {
        program: ProgramHandle,
        label: String,
    },
    SetUniform {
        program: ProgramHandle,
        name: String,
        value: UniformValue,
    },
    CreateVertexArray {
        vertex_array: VertexArrayHandle,
        program: ProgramHandle,
        vertices: BufferHandle,
        indices: BufferHandle,
    },
    SetViewport {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    EnableDepthTest,
    Clear {
        color: Rgba,
        depth: f32,
    },
    Draw(DrawCall),
    Present,
    Resize {
        width: u32,
        height: u32,
    },
    ReleaseVertexArray(VertexArrayHandle),
    ReleaseProgram(ProgramHandle),
    ReleaseBuffer(BufferHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub vertex_array: VertexArrayHandle,
    pub program: ProgramHandle,
    pub mode: DrawMode,
    pub index_count: u32,
}

#[derive(Debug)]
struct RecordedBuffer {
    kind: BufferKind,
    contents: Vec<u8>,
}

#[derive(Debug)]
struct RecordedProgram {
    uniforms: Vec<(String, UniformValue)>,
}

#[derive(Debug)]
struct RecordedVertexArray {
    program: ProgramHandle,
}

#[derive(Debug, Default)]
struct RecordingState {
    buffers: HandleTable<RecordedBuffer>,
    programs: HandleTable<RecordedProgram>,
    vertex_arrays: HandleTable<RecordedVertexArray>,
    commands: Vec<GpuCommand>,
    rejected_programs: HashSet<String>,
    created_buffers: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingContext {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `create_program` fail for programs with this label.
    pub fn reject_program(&self, label: impl Into<String>) {
        self.state.lock().rejected_programs.insert(label.into());
    }

    pub fn commands(&self) -> Vec<GpuCommand> {
        self.state.lock().commands.clone()
    }

    /// Returns the log and starts a fresh one.
    pub fn take_commands(&self) -> Vec<GpuCommand> {
        std::mem::take(&mut self.state.lock().commands)
    }

    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.state
            .lock()
            .commands
            .iter()
            .filter_map(|command| match command {
                GpuCommand::Draw(draw) => Some(*draw),
                _ => None,
            })
            .collect()
    }

    pub fn frames_presented(&self) -> usize {
        self.state
            .lock()
            .commands
            .iter()
            .filter(|command| matches!(command, GpuCommand::Present))
            .count()
    }

    /// Live programs in creation order.
    pub fn programs(&self) -> Vec<ProgramHandle> {
        let state = self.state.lock();
        state
            .commands
            .iter()
            .filter_map(|command| match command {
                GpuCommand::CreateProgram { program, .. } => Some(*program),
                _ => None,
            })
            .filter(|program| state.programs.get(program.0).is_some())
            .collect()
    }

    pub fn uniform(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
        let state = self.state.lock();
        state
            .programs
            .get(program.0)?
            .uniforms
            .iter()
            .find(|(uniform, _)| uniform == name)
            .map(|(_, value)| *value)
    }

    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.state
            .lock()
            .buffers
            .get(buffer.0)
            .map(|recorded| recorded.contents.clone())
    }

    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.lock().programs.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.state.lock().vertex_arrays.len()
    }

    pub fn live_resources(&self) -> usize {
        let state = self.state.lock();
        state.buffers.len() + state.programs.len() + state.vertex_arrays.len()
    }

    /// Buffers ever created, released or not.
    pub fn created_buffers(&self) -> usize {
        self.state.lock().created_buffers
    }
}

impl GpuContext for RecordingContext {
    fn create_buffer(
        &mut self,
        _label: &str,
        kind: BufferKind,
        contents: &[u8],
    ) -> Result<BufferHandle, GpuError> {
        let mut state = self.state.lock();
        let buffer = BufferHandle(state.buffers.insert(RecordedBuffer {
            kind,
            contents: contents.to_vec(),
        }));
        state.created_buffers += 1;
        state.commands.push(GpuCommand::CreateBuffer {
            buffer,
            kind,
            len: contents.len(),
        });
        Ok(buffer)
    }

    fn create_program(&mut self, source: &ShaderSource) -> Result<ProgramHandle, GpuError> {
        let mut state = self.state.lock();
        if state.rejected_programs.contains(&source.label) {
            return Err(GpuError::ShaderCompilation {
                label: source.label.clone(),
                message: "rejected by recording context".to_string(),
            });
        }
        let program = ProgramHandle(state.programs.insert(RecordedProgram {
            uniforms: Vec::new(),
        }));
        state.commands.push(GpuCommand::CreateProgram {
            program,
            label: source.label.clone(),
        });
        Ok(program)
    }

    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        name: &str,
        value: &UniformValue,
    ) -> Result<(), GpuError> {
        let mut state = self.state.lock();
        let recorded = state
            .programs
            .get_mut(program.0)
            .ok_or(GpuError::UnknownHandle {
                kind: "program",
                id: program.0,
            })?;
        match recorded.uniforms.iter_mut().find(|(uniform, _)| uniform == name) {
            Some((_, slot)) => *slot = *value,
            None => recorded.uniforms.push((name.to_string(), *value)),
        }
        state.commands.push(GpuCommand::SetUniform {
            program,
            name: name.to_string(),
            value: *value,
        });
        Ok(())
    }

    fn create_vertex_array(
        &mut self,
        program: ProgramHandle,
        vertices: BufferHandle,
        _attribute: VertexAttribute,
        indices: BufferHandle,
    ) -> Result<VertexArrayHandle, GpuError> {
        let mut state = self.state.lock();
        if state.programs.get(program.0).is_none() {
            return Err(GpuError::UnknownHandle {
                kind: "program",
                id: program.0,
            });
        }
        for (buffer, expected) in [(vertices, BufferKind::Vertex), (indices, BufferKind::Index)] {
            match state.buffers.get(buffer.0) {
                Some(recorded) if recorded.kind == expected => {}
                _ => {
                    return Err(GpuError::UnknownHandle {
                        kind: "buffer",
                        id: buffer.0,
                    })
                }
            }
        }
        let vertex_array =
            VertexArrayHandle(state.vertex_arrays.insert(RecordedVertexArray { program }));
        state.commands.push(GpuCommand::CreateVertexArray {
            vertex_array,
            program,
            vertices,
            indices,
        });
        Ok(vertex_array)
    }

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.state.lock().commands.push(GpuCommand::SetViewport {
            x,
            y,
            width,
            height,
        });
    }

    fn enable_depth_test(&mut self) {
        self.state.lock().commands.push(GpuCommand::EnableDepthTest);
    }

    fn clear(&mut self, color: Rgba, depth: f32) {
        self.state
            .lock()
            .commands
            .push(GpuCommand::Clear { color, depth });
    }

    fn draw(&mut self, vertex_array: VertexArrayHandle, mode: DrawMode, index_count: u32) {
        let mut state = self.state.lock();
        let Some(program) = state
            .vertex_arrays
            .get(vertex_array.0)
            .map(|recorded| recorded.program)
        else {
            log::warn!("draw with released vertex array {}", vertex_array.0);
            return;
        };
        state.commands.push(GpuCommand::Draw(DrawCall {
            vertex_array,
            program,
            mode,
            index_count,
        }));
    }

    fn present(&mut self) {
        self.state.lock().commands.push(GpuCommand::Present);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.state
            .lock()
            .commands
            .push(GpuCommand::Resize { width, height });
    }

    fn release_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        let mut state = self.state.lock();
        if state.vertex_arrays.remove(vertex_array.0).is_some() {
            state
                .commands
                .push(GpuCommand::ReleaseVertexArray(vertex_array));
        }
    }

    fn release_program(&mut self, program: ProgramHandle) {
        let mut state = self.state.lock();
        if state.programs.remove(program.0).is_some() {
            state.commands.push(GpuCommand::ReleaseProgram(program));
        }
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        let mut state = self.state.lock();
        if state.buffers.remove(buffer.0).is_some() {
            state.commands.push(GpuCommand::ReleaseBuffer(buffer));
        }
    }
}
