use crate::shapes::attributes::ShapeAttributes;

/// Equality key over the visual state that must be uniform within one batch.
///
/// Built from the attributes a path is drawn with this frame, so a path
/// switching to its highlight attributes gets a different key. Floats are
/// stored as bit patterns to make the key hashable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeGroupKey {
    color: [u32; 4],
    width: u32,
    highlighted: bool,
    depth_test: bool,
    depth_write: bool,
    surface: bool,
}

impl AttributeGroupKey {
    pub fn new(active: &ShapeAttributes, highlighted: bool, surface: bool) -> Self {
        Self {
            color: active.outline_color.to_bits(),
            width: active.outline_width.to_bits(),
            highlighted,
            depth_test: active.depth_test,
            depth_write: active.depth_write,
            surface,
        }
    }

    pub fn is_surface(&self) -> bool {
        self.surface
    }

    pub fn depth_test(&self) -> bool {
        self.depth_test
    }

    pub fn depth_write(&self) -> bool {
        self.depth_write
    }
}
