pub mod id_allocator;
pub mod pick_color;

pub use id_allocator::{IdAllocator, PICK_ID_SPACE};

/// A pickable object drawn during a pick frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickedObject {
    pub pick_id: u32,
    /// Encoded colour the object was drawn with.
    pub color: u32,
}

impl PickedObject {
    pub fn new(pick_id: u32) -> Self {
        Self {
            pick_id,
            color: pick_color::encode(pick_id),
        }
    }
}
