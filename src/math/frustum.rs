use glam::{dvec4, DMat4, DVec3, Vec4Swizzles};

use crate::math::plane::Plane;

#[derive(Debug, Copy, Clone)]
pub struct Frustum {
    // Planes are in the order: left, right, bottom, top, near, far.
    // Every normal points into the frustum.
    pub planes: [Plane; 6],
}

impl Frustum {
    fn corners(view_projection: DMat4) -> [DVec3; 8] {
        // wgpu clip space: depth runs from 0 (near) to 1 (far)
        let corners = [
            // Left - Bottom - Near
            dvec4(-1.0, -1.0, 0.0, 1.0),
            // Right - Bottom - Near
            dvec4(1.0, -1.0, 0.0, 1.0),
            // Left - Top - Near
            dvec4(-1.0, 1.0, 0.0, 1.0),
            // Right - Top - Near
            dvec4(1.0, 1.0, 0.0, 1.0),
            // Left - Bottom - Far
            dvec4(-1.0, -1.0, 1.0, 1.0),
            // Right - Bottom - Far
            dvec4(1.0, -1.0, 1.0, 1.0),
            // Left - Top - Far
            dvec4(-1.0, 1.0, 1.0, 1.0),
            // Right - Top - Far
            dvec4(1.0, 1.0, 1.0, 1.0),
        ];

        let inverse = view_projection.inverse();

        corners.map(|corner| {
            let corner = inverse * corner;
            (corner / corner.w).xyz()
        })
    }

    pub fn from_view_projection(view_projection: DMat4) -> Frustum {
        let corners = Self::corners(view_projection);
        let [
            left_bottom_near,
            right_bottom_near,
            left_top_near,
            right_top_near,
            left_bottom_far,
            right_bottom_far,
            left_top_far,
            _right_top_far,
        ] = corners;

        let centroid = corners.iter().copied().sum::<DVec3>() / 8.0;

        let planes = [
            // Left
            Plane::from_points(left_bottom_near, left_top_far, left_bottom_far),
            // Right
            Plane::from_points(right_bottom_near, right_bottom_far, right_top_near),
            // Bottom
            Plane::from_points(left_bottom_near, right_bottom_near, left_bottom_far),
            // Top
            Plane::from_points(left_top_near, right_top_near, left_top_far),
            // Near
            Plane::from_points(left_bottom_near, right_bottom_near, left_top_near),
            // Far
            Plane::from_points(left_bottom_far, right_bottom_far, left_top_far),
        ]
        .map(|plane| {
            if plane.signed_distance_to_point(centroid) < 0.0 {
                plane.flip()
            } else {
                plane
            }
        });

        Frustum { planes }
    }

    pub fn contains_point(&self, point: DVec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance_to_point(point) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frustum() -> Frustum {
        let view = DMat4::look_at_rh(DVec3::ZERO, DVec3::NEG_Z, DVec3::Y);
        let projection = DMat4::perspective_rh(60f64.to_radians(), 1.0, 1.0, 100.0);
        Frustum::from_view_projection(projection * view)
    }

    #[test]
    fn test_point_in_front_is_inside() {
        let frustum = test_frustum();

        assert!(frustum.contains_point(DVec3::new(0.0, 0.0, -10.0)));
    }

    #[test]
    fn test_points_outside_each_side() {
        let frustum = test_frustum();

        assert!(!frustum.contains_point(DVec3::new(0.0, 0.0, 10.0)));
        assert!(!frustum.contains_point(DVec3::new(0.0, 0.0, -0.5)));
        assert!(!frustum.contains_point(DVec3::new(0.0, 0.0, -200.0)));
        assert!(!frustum.contains_point(DVec3::new(50.0, 0.0, -10.0)));
        assert!(!frustum.contains_point(DVec3::new(0.0, -50.0, -10.0)));
    }
}
