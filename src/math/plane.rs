use glam::DVec3;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Plane {
    pub normal: DVec3,
    pub distance: f64,
}

impl Plane {
    pub fn new(normal: DVec3, distance: f64) -> Self {
        Self { normal, distance }
    }

    /// Plane through three points. The normal follows the right-hand rule on `a -> b -> c`.
    pub fn from_points(a: DVec3, b: DVec3, c: DVec3) -> Self {
        let normal = (b - a).cross(c - a).normalize_or_zero();
        let distance = -normal.dot(a);
        Self { normal, distance }
    }

    pub fn flip(self) -> Self {
        Self {
            normal: -self.normal,
            distance: -self.distance,
        }
    }

    pub fn signed_distance_to_point(&self, point: DVec3) -> f64 {
        self.normal.dot(point) + self.distance
    }
}
