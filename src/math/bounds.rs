use glam::DVec3;

use crate::math::{frustum::Frustum, geo::Position};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(point1: DVec3, point2: DVec3) -> Aabb {
        let min = point1.min(point2);
        let max = point1.max(point2);
        Aabb { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Option<Aabb> {
        let mut points = points.into_iter();
        let first = points.next()?;

        let (min, max) = points.fold((first, first), |(min, max), point| {
            (min.min(point), max.max(point))
        });

        Some(Aabb { min, max })
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn translate(&self, offset: DVec3) -> Aabb {
        Aabb {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    pub fn corners(&self) -> [DVec3; 8] {
        [
            DVec3::new(self.min.x, self.min.y, self.min.z),
            DVec3::new(self.max.x, self.min.y, self.min.z),
            DVec3::new(self.min.x, self.max.y, self.min.z),
            DVec3::new(self.max.x, self.max.y, self.min.z),
            DVec3::new(self.min.x, self.min.y, self.max.z),
            DVec3::new(self.max.x, self.min.y, self.max.z),
            DVec3::new(self.min.x, self.max.y, self.max.z),
            DVec3::new(self.max.x, self.max.y, self.max.z),
        ]
    }

    /// Conservative test: false only when every corner is behind a single plane.
    pub fn intersects_frustum(&self, frustum: &Frustum) -> bool {
        let corners = self.corners();

        for plane in &frustum.planes {
            let outside = corners
                .iter()
                .all(|corner| plane.signed_distance_to_point(*corner) < 0.0);

            if outside {
                return false;
            }
        }

        true
    }

    pub fn contains_point(&self, point: DVec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }
}

/// Latitude/longitude envelope in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sector {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl Sector {
    pub const FULL_SPHERE: Sector = Sector {
        min_latitude: -90.0,
        max_latitude: 90.0,
        min_longitude: -180.0,
        max_longitude: 180.0,
    };

    pub fn new(
        min_latitude: f64,
        max_latitude: f64,
        min_longitude: f64,
        max_longitude: f64,
    ) -> Self {
        Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        }
    }

    pub fn from_positions<'a>(positions: impl IntoIterator<Item = &'a Position>) -> Option<Sector> {
        let mut positions = positions.into_iter();
        let first = positions.next()?;

        let mut sector = Sector::new(
            first.latitude,
            first.latitude,
            first.longitude,
            first.longitude,
        );

        for position in positions {
            sector.min_latitude = sector.min_latitude.min(position.latitude);
            sector.max_latitude = sector.max_latitude.max(position.latitude);
            sector.min_longitude = sector.min_longitude.min(position.longitude);
            sector.max_longitude = sector.max_longitude.max(position.longitude);
        }

        Some(sector)
    }

    pub fn union(&self, other: &Sector) -> Sector {
        Sector {
            min_latitude: self.min_latitude.min(other.min_latitude),
            max_latitude: self.max_latitude.max(other.max_latitude),
            min_longitude: self.min_longitude.min(other.min_longitude),
            max_longitude: self.max_longitude.max(other.max_longitude),
        }
    }

    pub fn intersects(&self, other: &Sector) -> bool {
        self.min_latitude <= other.max_latitude
            && self.max_latitude >= other.min_latitude
            && self.min_longitude <= other.max_longitude
            && self.max_longitude >= other.min_longitude
    }

    pub fn contains(&self, position: &Position) -> bool {
        position.latitude >= self.min_latitude
            && position.latitude <= self.max_latitude
            && position.longitude >= self.min_longitude
            && position.longitude <= self.max_longitude
    }
}

/// Bounding volume of an assembled batch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BatchBounds {
    #[default]
    Empty,
    /// World-space box, already translated by the batch's local origin.
    Cartesian(Aabb),
    /// Envelope of surface (terrain-following) geometry.
    Geographic(Sector),
}
