//! Batching and resource management for drawing many geographic polylines
//! with few draw calls.
//!
//! Paths with equal visual attributes share a [`rendering::batching::LineBatch`]
//! inside a layer's [`rendering::batching::BatchRegistry`]; everything that
//! touches the GPU goes through the [`rendering::backend::GraphicsBackend`] trait.

pub mod error;
pub mod layer;
pub mod math;
pub mod picking;
pub mod rendering;
pub mod shapes;

pub use error::{RenderError, RenderResult};
pub use layer::{BatchState, LayerStats, PathLayer, ShapeId};
pub use rendering::{
    config::RenderConfig,
    render_context::{FrameParams, RenderContext, Viewport},
};
