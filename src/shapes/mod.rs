pub mod attributes;
pub mod path;

use std::any::Any;

pub use attributes::{AltitudeMode, ShapeAttributes};
pub use path::Path;

use crate::{
    error::RenderResult,
    layer::ShapeId,
    rendering::{
        backend::GraphicsBackend,
        batching::{AttributeGroupKey, PathEntry},
        render_context::RenderContext,
    },
};

/// What a shape must expose to be drawn by a [`crate::layer::PathLayer`],
/// either on its own or as a member of a shared line batch.
pub trait Renderable: Any {
    fn display_name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    /// Whether the shape can be drawn from a shared batch this frame.
    fn can_be_batched(&self, rc: &RenderContext) -> bool;

    /// Resolves the attributes the shape is drawn with this frame.
    fn update_attributes(&mut self, rc: &RenderContext);

    /// Key of the attributes resolved by the last `update_attributes`.
    fn group_key(&self) -> AttributeGroupKey;

    /// Fresh, fully dirty batch entry for this shape.
    fn snapshot_entry(&mut self, key: ShapeId) -> PathEntry<ShapeId>;

    /// Copies changed state into an already placed entry, raising only the
    /// matching dirty flags.
    fn sync_entry(&mut self, entry: &mut PathEntry<ShapeId>);

    fn set_pick_id(&mut self, pick_id: Option<u32>);

    /// Draws the shape on its own.
    fn render(
        &mut self,
        rc: &mut RenderContext,
        backend: &mut dyn GraphicsBackend,
    ) -> RenderResult<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
