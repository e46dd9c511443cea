use crate::{
    math::{color::Color, geo::Position},
    rendering::batching::tessellate::PathType,
};

/// Which assembled arrays an entry's changes invalidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirtyFlags {
    pub positions: bool,
    pub color: bool,
    pub width: bool,
    pub pick_color: bool,
}

impl DirtyFlags {
    pub const NONE: Self = Self {
        positions: false,
        color: false,
        width: false,
        pick_color: false,
    };

    pub const ALL: Self = Self {
        positions: true,
        color: true,
        width: true,
        pick_color: true,
    };

    pub fn any(&self) -> bool {
        self.positions || self.color || self.width || self.pick_color
    }

    pub fn merge(&mut self, other: DirtyFlags) {
        self.positions |= other.positions;
        self.color |= other.color;
        self.width |= other.width;
        self.pick_color |= other.pick_color;
    }
}

/// The batchable state of one path, held by value inside its batch.
#[derive(Debug, Clone)]
pub struct PathEntry<K> {
    key: K,
    positions: Vec<Position>,
    path_type: PathType,
    intermediate_points: u32,
    color: Color,
    width: f32,
    pick_id: Option<u32>,
    dirty: DirtyFlags,
}

impl<K: Copy> PathEntry<K> {
    /// A new entry starts fully dirty.
    pub fn new(
        key: K,
        positions: Vec<Position>,
        path_type: PathType,
        intermediate_points: u32,
        color: Color,
        width: f32,
    ) -> Self {
        Self {
            key,
            positions,
            path_type,
            intermediate_points,
            color,
            width,
            pick_id: None,
            dirty: DirtyFlags::ALL,
        }
    }

    pub fn key(&self) -> K {
        self.key
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn path_type(&self) -> PathType {
        self.path_type
    }

    pub fn intermediate_points(&self) -> u32 {
        self.intermediate_points
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn pick_id(&self) -> Option<u32> {
        self.pick_id
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    pub fn set_positions(&mut self, positions: Vec<Position>) {
        self.positions = positions;
        self.dirty.positions = true;
    }

    pub fn set_tessellation(&mut self, path_type: PathType, intermediate_points: u32) {
        if self.path_type != path_type || self.intermediate_points != intermediate_points {
            self.path_type = path_type;
            self.intermediate_points = intermediate_points;
            self.dirty.positions = true;
        }
    }

    pub fn set_color(&mut self, color: Color) {
        if self.color != color {
            self.color = color;
            self.dirty.color = true;
        }
    }

    pub fn set_width(&mut self, width: f32) {
        if self.width != width {
            self.width = width;
            self.dirty.width = true;
        }
    }

    pub fn set_pick_id(&mut self, pick_id: Option<u32>) {
        if self.pick_id != pick_id {
            self.pick_id = pick_id;
            self.dirty.pick_color = true;
        }
    }

    pub(crate) fn mark_dirty(&mut self, flags: DirtyFlags) {
        self.dirty.merge(flags);
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = DirtyFlags::NONE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> PathEntry<u32> {
        PathEntry::new(
            7,
            vec![Position::new(0.0, 0.0, 0.0), Position::new(1.0, 1.0, 0.0)],
            PathType::GreatCircle,
            4,
            Color::WHITE,
            1.0,
        )
    }

    #[test]
    fn test_setters_raise_only_their_flag() {
        let mut entry = entry();
        assert_eq!(entry.dirty(), DirtyFlags::ALL);
        entry.clear_dirty();

        entry.set_color(Color::RED);
        assert_eq!(
            entry.dirty(),
            DirtyFlags {
                color: true,
                ..DirtyFlags::NONE
            }
        );

        entry.clear_dirty();
        entry.set_pick_id(Some(3));
        assert!(entry.dirty().pick_color);
        assert!(!entry.dirty().positions);
    }

    #[test]
    fn test_unchanged_values_stay_clean() {
        let mut entry = entry();
        entry.clear_dirty();

        entry.set_color(Color::WHITE);
        entry.set_width(1.0);
        entry.set_pick_id(None);
        entry.set_tessellation(PathType::GreatCircle, 4);

        assert!(!entry.dirty().any());
    }
}
