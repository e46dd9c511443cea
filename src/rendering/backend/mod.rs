//! The seam between batching and the graphics API.
//!
//! Batches never create GPU objects directly. They ask the backend for a
//! buffer by [`CacheKey`], passing the bytes it should be created from; the
//! backend only reads those bytes when it does not already hold a buffer for
//! that key. A batch that changes one of its arrays takes a fresh key for that
//! array alone, so the other arrays stay resident.

mod recording;
mod wgpu_backend;

pub use recording::{RecordedDraw, RecordingBackend};
pub use wgpu_backend::WgpuBackend;

use crate::{error::RenderResult, rendering::draw_state::DrawState};

/// Identifies one version of one assembled array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(u64);

impl CacheKey {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Monotonic cache-key source owned by a render context.
#[derive(Debug, Default)]
pub struct CacheKeyGenerator {
    next: u64,
}

impl CacheKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_key(&mut self) -> CacheKey {
        let key = CacheKey(self.next);
        self.next += 1;
        key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Expands stacked line vertices to screen-space quads.
    ScreenSpaceLine,
}

pub trait GraphicsBackend {
    /// Returns the buffer cached under `key`, creating it from `contents` on a miss.
    fn get_buffer_object(
        &mut self,
        key: CacheKey,
        usage: BufferUsage,
        contents: &[u8],
    ) -> RenderResult<BufferHandle>;

    fn shader_program(&mut self, kind: ProgramKind) -> RenderResult<ProgramHandle>;

    /// Submits one draw call. The state is only borrowed for the duration of the call.
    fn draw(&mut self, state: &DrawState) -> RenderResult<()>;

    /// Called once after every layer has been drawn.
    fn end_frame(&mut self) {}
}
