use itertools::Itertools;

use crate::math::geo::Position;

/// How consecutive path positions are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PathType {
    /// Straight line in Cartesian space; never subdivided.
    Linear,
    #[default]
    GreatCircle,
    RhumbLine,
}

impl PathType {
    pub fn interpolates(&self) -> bool {
        !matches!(self, PathType::Linear)
    }
}

/// Intermediate locations strictly between `begin` and `end`.
///
/// Emits `intermediate_points` locations spaced at `k / (n + 1)` of the
/// segment length with linearly interpolated altitude. Nothing is emitted for
/// linear paths or when the endpoints are closer than `near_zero_threshold`
/// radians, where the azimuth is undefined.
pub fn interpolate(
    begin: &Position,
    end: &Position,
    path_type: PathType,
    intermediate_points: u32,
    near_zero_threshold: f64,
) -> Vec<Position> {
    if intermediate_points == 0 {
        return Vec::new();
    }

    let (azimuth, distance) = match path_type {
        PathType::Linear => return Vec::new(),
        PathType::GreatCircle => (
            begin.great_circle_azimuth(end),
            begin.great_circle_distance(end),
        ),
        PathType::RhumbLine => (begin.rhumb_azimuth(end), begin.rhumb_distance(end)),
    };

    if distance < near_zero_threshold {
        return Vec::new();
    }

    let steps = intermediate_points as f64 + 1.0;

    (1..=intermediate_points)
        .map(|k| {
            let s = k as f64 / steps;
            let mut location = match path_type {
                PathType::RhumbLine => begin.rhumb_location(azimuth, s * distance),
                _ => begin.great_circle_location(azimuth, s * distance),
            };
            location.altitude = begin.altitude + s * (end.altitude - begin.altitude);
            location
        })
        .collect()
}

/// Every point a path draws through: its own positions with the intermediate
/// locations of each segment inserted between them.
pub fn tessellate(
    positions: &[Position],
    path_type: PathType,
    intermediate_points: u32,
    near_zero_threshold: f64,
) -> Vec<Position> {
    let Some(first) = positions.first() else {
        return Vec::new();
    };

    let mut points = Vec::with_capacity(estimated_vertex_count(
        positions.len(),
        path_type,
        intermediate_points,
    ));
    points.push(*first);

    for (begin, end) in positions.iter().tuple_windows() {
        points.extend(interpolate(
            begin,
            end,
            path_type,
            intermediate_points,
            near_zero_threshold,
        ));
        points.push(*end);
    }

    points
}

/// Logical vertices a path emits, including the leading and trailing
/// duplicates used for joins. Degenerate segments may emit fewer.
pub fn estimated_vertex_count(
    position_count: usize,
    path_type: PathType,
    intermediate_points: u32,
) -> usize {
    if position_count == 0 {
        return 0;
    }

    let subdivisions = if path_type.interpolates() {
        intermediate_points as usize
    } else {
        0
    };

    2 + position_count + (position_count - 1) * subdivisions
}
