pub mod bounds;
pub mod color;
pub mod frustum;
pub mod geo;
pub mod globe;
pub mod plane;
