//! Per-draw-call state and the pool it is recycled through.
//!
//! A `DrawState` is handed out by value, so exactly one owner can populate it
//! between `acquire` and `release`. Releasing resets every field to the
//! defaults below before the instance goes back on the free list.

use std::ops::Range;

use glam::DVec3;

use crate::{
    math::color::Color,
    rendering::backend::{BufferHandle, ProgramHandle, TextureHandle},
};

/// Which shader input a vertex buffer binding feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    PreviousPoint,
    Point,
    NextPoint,
    Color,
    Width,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBinding {
    pub attribute: VertexAttribute,
    pub buffer: BufferHandle,
    /// Byte offset into the buffer.
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawPrimitive {
    /// Multiplied with the per-vertex colour.
    pub color: Color,
    /// Added to the per-vertex width.
    pub line_width: f32,
    pub opacity: f32,
    /// Carried to the backend for textured outlines. The wgpu backend does
    /// not sample it yet and draws such lines with their vertex colour.
    pub texture: Option<TextureHandle>,
    pub index_range: Range<u32>,
}

#[derive(Debug, Clone)]
pub struct DrawState {
    pub program: Option<ProgramHandle>,
    pub vertex_bindings: Vec<VertexBinding>,
    pub element_buffer: Option<BufferHandle>,
    /// World-space point the vertex positions are relative to.
    pub local_origin: DVec3,
    pub primitives: Vec<DrawPrimitive>,
    pub depth_test: bool,
    pub depth_write: bool,
    pub pick_mode: bool,
}

impl DrawState {
    fn new() -> Self {
        Self {
            program: None,
            vertex_bindings: Vec::new(),
            element_buffer: None,
            local_origin: DVec3::ZERO,
            primitives: Vec::new(),
            depth_test: true,
            depth_write: true,
            pick_mode: false,
        }
    }

    fn reset(&mut self) {
        self.program = None;
        self.vertex_bindings.clear();
        self.element_buffer = None;
        self.local_origin = DVec3::ZERO;
        self.primitives.clear();
        self.depth_test = true;
        self.depth_write = true;
        self.pick_mode = false;
    }

    pub fn bind_vertex_buffer(
        &mut self,
        attribute: VertexAttribute,
        buffer: BufferHandle,
        offset: u64,
    ) {
        self.vertex_bindings.push(VertexBinding {
            attribute,
            buffer,
            offset,
        });
    }

    pub fn vertex_binding(&self, attribute: VertexAttribute) -> Option<&VertexBinding> {
        self.vertex_bindings
            .iter()
            .find(|binding| binding.attribute == attribute)
    }

    pub fn draw_elements(&mut self, primitive: DrawPrimitive) {
        self.primitives.push(primitive);
    }

    pub fn index_count(&self) -> u32 {
        self.primitives
            .iter()
            .map(|primitive| primitive.index_range.end - primitive.index_range.start)
            .sum()
    }
}

#[derive(Debug, Default)]
pub struct DrawStatePool {
    free: Vec<DrawState>,
    outstanding: usize,
    created: usize,
}

impl DrawStatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self) -> DrawState {
        self.outstanding += 1;

        self.free.pop().unwrap_or_else(|| {
            self.created += 1;
            DrawState::new()
        })
    }

    pub fn release(&mut self, mut state: DrawState) {
        state.reset();
        self.outstanding = self.outstanding.saturating_sub(1);
        self.free.push(state);
    }

    /// States acquired and not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Total instances ever allocated by this pool.
    pub fn created(&self) -> usize {
        self.created
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_resets_and_recycles() {
        let mut pool = DrawStatePool::new();

        let mut state = pool.acquire();
        state.program = Some(ProgramHandle(3));
        state.pick_mode = true;
        state.depth_write = false;
        state.bind_vertex_buffer(VertexAttribute::Point, BufferHandle(1), 32);
        state.draw_elements(DrawPrimitive {
            color: Color::RED,
            line_width: 2.0,
            opacity: 0.5,
            texture: None,
            index_range: 0..12,
        });
        assert_eq!(state.index_count(), 12);
        assert_eq!(pool.outstanding(), 1);

        pool.release(state);
        assert_eq!(pool.outstanding(), 0);

        let state = pool.acquire();
        assert_eq!(pool.created(), 1, "the released instance must be reused");
        assert!(state.program.is_none());
        assert!(state.vertex_bindings.is_empty());
        assert!(state.primitives.is_empty());
        assert!(!state.pick_mode);
        assert!(state.depth_write);
        pool.release(state);
    }

    #[test]
    fn test_concurrent_acquires_get_distinct_instances() {
        let mut pool = DrawStatePool::new();

        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(pool.created(), 2);
        assert_eq!(pool.outstanding(), 2);

        pool.release(a);
        pool.release(b);
        assert_eq!(pool.available(), 2);
    }
}
