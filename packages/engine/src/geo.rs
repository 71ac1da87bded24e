//! Great-circle distance and neighbor queries over coordinates.

use beacon_entity::Coordinate;
use geo::{Distance, Haversine, Point};

/// Mean Earth radius used by the haversine formula
pub const MEAN_EARTH_RADIUS_METERS: f64 = 6_371_008.8;

const HALF_CIRCUMFERENCE_METERS: f64 = std::f64::consts::PI * MEAN_EARTH_RADIUS_METERS;

/// Great-circle distance in meters.
///
/// Symmetric, zero for identical points, and finite for antipodal points
/// where rounding can push the haversine term past 1.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let meters = Haversine::distance(Point::new(a.lon, a.lat), Point::new(b.lon, b.lat));
    if meters.is_finite() {
        meters
    } else {
        HALF_CIRCUMFERENCE_METERS
    }
}

/// Indices of `points` within `eps` meters of `points[index]`, including `index`.
///
/// Linear in `points`; an out-of-range `index` yields nothing.
pub fn neighbors_within(points: &[Coordinate], index: usize, eps: f64) -> Vec<usize> {
    let Some(origin) = points.get(index).copied() else {
        return Vec::new();
    };

    points
        .iter()
        .enumerate()
        .filter(|(i, point)| *i == index || distance(origin, **point) <= eps)
        .map(|(i, _)| i)
        .collect()
}
