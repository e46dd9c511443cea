use std::collections::{HashMap, HashSet};

use glam::DVec3;

use crate::{
    error::{RenderError, RenderResult},
    rendering::{
        backend::{
            BufferHandle, BufferUsage, CacheKey, GraphicsBackend, ProgramHandle, ProgramKind,
        },
        draw_state::{DrawPrimitive, DrawState, VertexBinding},
    },
};

/// Snapshot of one submitted draw call.
#[derive(Debug, Clone)]
pub struct RecordedDraw {
    pub program: Option<ProgramHandle>,
    pub vertex_bindings: Vec<VertexBinding>,
    pub element_buffer: Option<BufferHandle>,
    pub local_origin: DVec3,
    pub primitives: Vec<DrawPrimitive>,
    pub depth_test: bool,
    pub depth_write: bool,
    pub pick_mode: bool,
}

impl RecordedDraw {
    pub fn index_count(&self) -> u32 {
        self.primitives
            .iter()
            .map(|primitive| primitive.index_range.end - primitive.index_range.start)
            .sum()
    }
}

struct CachedBuffer {
    usage: BufferUsage,
    contents: Vec<u8>,
}

/// Headless backend that keeps uploads in memory and records every draw.
#[derive(Default)]
pub struct RecordingBackend {
    buffers: HashMap<CacheKey, CachedBuffer>,
    uploads: Vec<CacheKey>,
    draws: Vec<RecordedDraw>,
    failing_keys: HashSet<CacheKey>,
    fail_programs: bool,
    frames: u64,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later request for `key` fail as if the resource were not ready.
    pub fn fail_binding_for(&mut self, key: CacheKey) {
        self.failing_keys.insert(key);
    }

    pub fn set_fail_programs(&mut self, fail: bool) {
        self.fail_programs = fail;
    }

    pub fn clear_failures(&mut self) {
        self.failing_keys.clear();
        self.fail_programs = false;
    }

    /// Keys in the order their buffers were created.
    pub fn uploads(&self) -> &[CacheKey] {
        &self.uploads
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.len()
    }

    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    pub fn take_draws(&mut self) -> Vec<RecordedDraw> {
        std::mem::take(&mut self.draws)
    }

    pub fn is_cached(&self, key: CacheKey) -> bool {
        self.buffers.contains_key(&key)
    }

    pub fn buffer_contents(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.buffers
            .get(&CacheKey(handle.0))
            .map(|buffer| buffer.contents.as_slice())
    }

    pub fn buffer_usage(&self, handle: BufferHandle) -> Option<BufferUsage> {
        self.buffers.get(&CacheKey(handle.0)).map(|buffer| buffer.usage)
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    fn check_bound(&self, resource: &'static str, handle: BufferHandle) -> RenderResult<()> {
        if self.buffers.contains_key(&CacheKey(handle.0)) {
            Ok(())
        } else {
            Err(RenderError::binding(
                resource,
                format!("buffer {} is not resident", handle.0),
            ))
        }
    }
}

impl GraphicsBackend for RecordingBackend {
    fn get_buffer_object(
        &mut self,
        key: CacheKey,
        usage: BufferUsage,
        contents: &[u8],
    ) -> RenderResult<BufferHandle> {
        if self.failing_keys.contains(&key) {
            return Err(RenderError::binding(
                "buffer",
                format!("cache key {} is not ready", key.value()),
            ));
        }

        if !self.buffers.contains_key(&key) {
            self.buffers.insert(
                key,
                CachedBuffer {
                    usage,
                    contents: contents.to_vec(),
                },
            );
            self.uploads.push(key);
        }

        Ok(BufferHandle(key.value()))
    }

    fn shader_program(&mut self, kind: ProgramKind) -> RenderResult<ProgramHandle> {
        if self.fail_programs {
            return Err(RenderError::MissingProgram(format!("{kind:?}")));
        }

        Ok(ProgramHandle(kind as u64))
    }

    fn draw(&mut self, state: &DrawState) -> RenderResult<()> {
        if state.program.is_none() {
            return Err(RenderError::MissingProgram("no program bound".to_string()));
        }

        for binding in &state.vertex_bindings {
            self.check_bound("vertex buffer", binding.buffer)?;
        }

        let element_buffer = state
            .element_buffer
            .ok_or_else(|| RenderError::binding("element buffer", "not bound"))?;
        self.check_bound("element buffer", element_buffer)?;

        self.draws.push(RecordedDraw {
            program: state.program,
            vertex_bindings: state.vertex_bindings.clone(),
            element_buffer: state.element_buffer,
            local_origin: state.local_origin,
            primitives: state.primitives.clone(),
            depth_test: state.depth_test,
            depth_write: state.depth_write,
            pick_mode: state.pick_mode,
        });

        Ok(())
    }

    fn end_frame(&mut self) {
        self.frames += 1;
    }
}
