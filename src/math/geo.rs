//! Geographic positions and the great-circle / rhumb-line formulas used to
//! tessellate path segments.
//!
//! All distances returned from this module are angular distances in radians on
//! the unit sphere. Azimuths are radians clockwise from north.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    /// Degrees, positive north.
    pub latitude: f64,
    /// Degrees, positive east.
    pub longitude: f64,
    /// Metres above the ellipsoid.
    pub altitude: f64,
}

impl Position {
    pub const fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    pub fn from_radians(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude: normalize_latitude(latitude.to_degrees()),
            longitude: normalize_longitude(longitude.to_degrees()),
            altitude,
        }
    }

    fn lat_rad(&self) -> f64 {
        self.latitude.to_radians()
    }

    fn lon_rad(&self) -> f64 {
        self.longitude.to_radians()
    }

    fn same_location(&self, other: &Position) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }

    /// Initial azimuth of the great circle from `self` towards `other`.
    pub fn great_circle_azimuth(&self, other: &Position) -> f64 {
        let (lat1, lon1) = (self.lat_rad(), self.lon_rad());
        let (lat2, lon2) = (other.lat_rad(), other.lon_rad());

        if self.same_location(other) {
            return 0.0;
        }

        if lon1 == lon2 {
            return if lat1 > lat2 { PI } else { 0.0 };
        }

        let y = lat2.cos() * (lon2 - lon1).sin();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * (lon2 - lon1).cos();
        y.atan2(x)
    }

    /// Angular great-circle distance, computed with the haversine formula.
    pub fn great_circle_distance(&self, other: &Position) -> f64 {
        let (lat1, lon1) = (self.lat_rad(), self.lon_rad());
        let (lat2, lon2) = (other.lat_rad(), other.lon_rad());

        if self.same_location(other) {
            return 0.0;
        }

        let a = ((lat2 - lat1) / 2.0).sin();
        let b = ((lon2 - lon1) / 2.0).sin();
        let c = a * a + lat1.cos() * lat2.cos() * b * b;
        2.0 * c.sqrt().min(1.0).asin()
    }

    /// The location reached by travelling `distance` radians along the great
    /// circle leaving `self` at `azimuth`. Altitude is carried over unchanged.
    pub fn great_circle_location(&self, azimuth: f64, distance: f64) -> Position {
        if distance == 0.0 {
            return *self;
        }

        let lat1 = self.lat_rad();
        let lon1 = self.lon_rad();

        let lat2 = (lat1.sin() * distance.cos() + lat1.cos() * distance.sin() * azimuth.cos())
            .clamp(-1.0, 1.0)
            .asin();
        let lon2 = lon1
            + (azimuth.sin() * distance.sin() * lat1.cos())
                .atan2(distance.cos() - lat1.sin() * lat2.sin());

        Position::from_radians(lat2, lon2, self.altitude)
    }

    /// Constant azimuth of the rhumb line from `self` towards `other`.
    pub fn rhumb_azimuth(&self, other: &Position) -> f64 {
        let (lat1, lon1) = (self.lat_rad(), self.lon_rad());
        let (lat2, lon2) = (other.lat_rad(), other.lon_rad());

        if self.same_location(other) {
            return 0.0;
        }

        let mut d_lon = lon2 - lon1;
        let d_phi = mercator_stretch(lat2) - mercator_stretch(lat1);

        // Take the shorter way around the antimeridian.
        if d_lon.abs() > PI {
            d_lon = if d_lon > 0.0 {
                -(2.0 * PI - d_lon)
            } else {
                2.0 * PI + d_lon
            };
        }

        d_lon.atan2(d_phi)
    }

    /// Angular length of the rhumb line between `self` and `other`.
    pub fn rhumb_distance(&self, other: &Position) -> f64 {
        let (lat1, lon1) = (self.lat_rad(), self.lon_rad());
        let (lat2, lon2) = (other.lat_rad(), other.lon_rad());

        if self.same_location(other) {
            return 0.0;
        }

        let d_lat = lat2 - lat1;
        let mut d_lon = lon2 - lon1;
        let d_phi = mercator_stretch(lat2) - mercator_stretch(lat1);
        let q = if d_phi.abs() > 1e-12 {
            d_lat / d_phi
        } else {
            lat1.cos()
        };

        if d_lon.abs() > PI {
            d_lon = if d_lon > 0.0 {
                -(2.0 * PI - d_lon)
            } else {
                2.0 * PI + d_lon
            };
        }

        (d_lat * d_lat + q * q * d_lon * d_lon).sqrt()
    }

    /// The location reached by travelling `distance` radians along the rhumb
    /// line leaving `self` at `azimuth`. Altitude is carried over unchanged.
    pub fn rhumb_location(&self, azimuth: f64, distance: f64) -> Position {
        if distance == 0.0 {
            return *self;
        }

        let lat1 = self.lat_rad();
        let lon1 = self.lon_rad();

        let mut lat2 = lat1 + distance * azimuth.cos();
        let d_phi = mercator_stretch(lat2) - mercator_stretch(lat1);
        let q = if d_phi.abs() > 1e-12 {
            (lat2 - lat1) / d_phi
        } else {
            lat1.cos()
        };
        let d_lon = distance * azimuth.sin() / q;

        // Went past a pole: reflect back onto the globe.
        if lat2.abs() > FRAC_PI_2 {
            lat2 = if lat2 > 0.0 { PI - lat2 } else { -PI - lat2 };
        }

        let lon2 = (lon1 + d_lon + PI).rem_euclid(2.0 * PI) - PI;

        Position::from_radians(lat2, lon2, self.altitude)
    }
}

fn mercator_stretch(lat: f64) -> f64 {
    (lat / 2.0 + FRAC_PI_4).tan().ln()
}

pub fn normalize_latitude(degrees: f64) -> f64 {
    let lat = degrees % 180.0;
    if lat > 90.0 {
        180.0 - lat
    } else if lat < -90.0 {
        -180.0 - lat
    } else {
        lat
    }
}

pub fn normalize_longitude(degrees: f64) -> f64 {
    let lon = degrees % 360.0;
    if lon > 180.0 {
        lon - 360.0
    } else if lon < -180.0 {
        360.0 + lon
    } else {
        lon
    }
}
