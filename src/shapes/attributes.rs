use crate::{math::color::Color, rendering::backend::TextureHandle};

/// How path altitudes are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AltitudeMode {
    #[default]
    Absolute,
    /// There is no terrain model here, so this is drawn like `Absolute`.
    RelativeToGround,
    /// Drawn on the ellipsoid surface; culled by lat/lon sector.
    ClampToGround,
}

impl AltitudeMode {
    pub fn is_surface(&self) -> bool {
        matches!(self, AltitudeMode::ClampToGround)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeAttributes {
    pub outline_color: Color,
    /// Pixels.
    pub outline_width: f32,
    pub depth_test: bool,
    pub depth_write: bool,
    pub outline_texture: Option<TextureHandle>,
    /// Extruded paths draw walls down to the ground and cannot share a line batch.
    pub extrude: bool,
}

impl ShapeAttributes {
    pub fn with_color(mut self, color: Color) -> Self {
        self.outline_color = color;
        self
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.outline_width = width;
        self
    }
}

impl Default for ShapeAttributes {
    fn default() -> Self {
        Self {
            outline_color: Color::WHITE,
            outline_width: 1.0,
            depth_test: true,
            depth_write: true,
            outline_texture: None,
            extrude: false,
        }
    }
}
