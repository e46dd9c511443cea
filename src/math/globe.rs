use glam::DVec3;

use crate::math::geo::Position;

/// Converts geographic positions to world-space Cartesian coordinates.
pub trait Globe {
    fn geographic_to_cartesian(&self, position: &Position) -> DVec3;
}

/// WGS84 ellipsoid in an Earth-centred, Earth-fixed frame (metres, Z towards the north pole).
#[derive(Debug, Clone, Copy, Default)]
pub struct Wgs84Globe;

impl Wgs84Globe {
    pub const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
    pub const ECCENTRICITY_SQUARED: f64 = 6.694_379_990_141_316_996e-3;
}

impl Globe for Wgs84Globe {
    fn geographic_to_cartesian(&self, position: &Position) -> DVec3 {
        let (sin_lat, cos_lat) = position.latitude.to_radians().sin_cos();
        let (sin_lon, cos_lon) = position.longitude.to_radians().sin_cos();

        // Radius of curvature in the prime vertical
        let n =
            Self::SEMI_MAJOR_AXIS / (1.0 - Self::ECCENTRICITY_SQUARED * sin_lat * sin_lat).sqrt();
        let h = position.altitude;

        DVec3::new(
            (n + h) * cos_lat * cos_lon,
            (n + h) * cos_lat * sin_lon,
            (n * (1.0 - Self::ECCENTRICITY_SQUARED) + h) * sin_lat,
        )
    }
}
