//! Utility functions for longitude handling and spherical measurements

use geo::{Bearing, Distance, Haversine, Point};

/// Longitude of the antimeridian in degrees
pub const ANTIMERIDIAN: f64 = 180.0;

/// Metres per kilometre, `geo` measures in metres
const METERS_PER_KM: f64 = 1000.0;

/// Normalize a longitude into `[-180, 180)`
#[inline(always)]
pub fn normalize_longitude(lng: f64) -> f64 {
    (lng + ANTIMERIDIAN).rem_euclid(2.0 * ANTIMERIDIAN) - ANTIMERIDIAN
}

/// Normalize the longitude of a point, leaving latitude untouched
#[inline(always)]
pub fn normalize_point(point: Point<f64>) -> Point<f64> {
    Point::new(normalize_longitude(point.x()), point.y())
}

/// Great-circle distance in kilometres between two `(lng, lat)` points
#[inline(always)]
pub fn distance_km(a: Point<f64>, b: Point<f64>) -> f64 {
    Haversine.distance(a, b) / METERS_PER_KM
}

/// Initial great-circle bearing from `a` to `b` in degrees
#[inline]
pub fn bearing_degrees(a: Point<f64>, b: Point<f64>) -> f64 {
    Haversine.bearing(a, b)
}

/// Whether the straight longitude delta between two points exceeds 180°
#[inline(always)]
pub fn crosses_antimeridian(from_lng: f64, to_lng: f64) -> bool {
    (to_lng - from_lng).abs() > ANTIMERIDIAN
}

/// Shift `lng` by whole turns so it lies within 180° of `reference`
#[inline]
pub fn unwrap_longitude(reference: f64, lng: f64) -> f64 {
    let mut lng = lng;
    while lng - reference > ANTIMERIDIAN {
        lng -= 2.0 * ANTIMERIDIAN;
    }
    while reference - lng > ANTIMERIDIAN {
        lng += 2.0 * ANTIMERIDIAN;
    }
    lng
}

/// Where the segment `from -> to` meets the antimeridian
///
/// `to` is replaced by a synthetic coordinate unwrapped onto `from`'s side of
/// the globe, and the crossing latitude is interpolated linearly against it.
///
/// # Returns
/// `(edge, latitude)` where `edge` is `+180` or `-180`, the side `from` is on
pub fn antimeridian_crossing(from: Point<f64>, to: Point<f64>) -> (f64, f64) {
    let edge = if from.x() >= 0.0 {
        ANTIMERIDIAN
    } else {
        -ANTIMERIDIAN
    };
    let unwrapped_x = unwrap_longitude(from.x(), to.x());

    let span = unwrapped_x - from.x();
    if span.abs() < f64::EPSILON {
        return (edge, from.y());
    }

    let t = ((edge - from.x()) / span).clamp(0.0, 1.0);
    (edge, from.y() + t * (to.y() - from.y()))
}
