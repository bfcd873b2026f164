//! Geometry projection
//!
//! Turns an ordered list of station ids into coordinate polylines ready for a
//! map surface. Long spans follow the great circle and spans crossing the
//! antimeridian are split so no segment implicitly wraps around the globe.

use crate::{Station, StationId, utils};
use geo::{Coord, Haversine, InterpolatePoint, LineString, MultiLineString, Point};
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Spans at least this long (km) are drawn as great-circle arcs
pub const LONG_HAUL_THRESHOLD_KM: f64 = 300.0;

/// Target spacing (km) between interpolated great-circle vertices
pub const GREAT_CIRCLE_SPACING_KM: f64 = 100.0;

/// Tuning for the projector
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProjectionOptions {
    pub long_haul_threshold_km: f64,
    pub great_circle_spacing_km: f64,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            long_haul_threshold_km: LONG_HAUL_THRESHOLD_KM,
            great_circle_spacing_km: GREAT_CIRCLE_SPACING_KM,
        }
    }
}

/// Resolve ids to normalized points, skipping ids absent from `stations`
fn resolve(stations: &HashMap<StationId, Station>, ids: &[StationId]) -> Vec<Point<f64>> {
    ids.iter()
        .filter_map(|id| match stations.get(id) {
            Some(station) => Some(utils::normalize_point(station.position)),
            None => {
                tracing::trace!("Skipping missing station {id} during projection");
                None
            }
        })
        .collect()
}

/// Insert great-circle vertices between points that are far apart
fn densify(points: &[Point<f64>], options: &ProjectionOptions) -> Vec<Point<f64>> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };

    let mut dense = Vec::with_capacity(points.len());
    dense.push(first);

    for pair in points.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let distance = utils::distance_km(from, to);

        if distance >= options.long_haul_threshold_km {
            let spacing = options.great_circle_spacing_km.max(1.0);
            let steps = (distance / spacing).ceil().max(2.0) as usize;
            for step in 1..steps {
                let ratio = step as f64 / steps as f64;
                let point = Haversine.point_at_ratio_between(from, to, ratio);
                dense.push(utils::normalize_point(point));
            }
        }

        dense.push(to);
    }

    dense
}

/// Project ids into rendering-ready parts
///
/// Every part has at least two vertices. Crossing the antimeridian closes the
/// running part at ±180 and reopens the next one at the opposite sign, both at
/// the interpolated crossing latitude. Fewer than two resolvable stations give
/// an empty collection.
pub fn project_multi(
    stations: &HashMap<StationId, Station>,
    ids: &[StationId],
    options: &ProjectionOptions,
) -> MultiLineString<f64> {
    #[cfg(feature = "profiling")]
    profiling::scope!("projection::project_multi");

    let points = densify(&resolve(stations, ids), options);
    if points.len() < 2 {
        return MultiLineString::new(Vec::new());
    }

    let mut parts: Vec<LineString<f64>> = Vec::new();
    let mut current: Vec<Coord<f64>> = vec![points[0].into()];

    for pair in points.windows(2) {
        let (from, to) = (pair[0], pair[1]);

        if utils::crosses_antimeridian(from.x(), to.x()) {
            let (edge, lat) = utils::antimeridian_crossing(from, to);
            current.push(Coord { x: edge, y: lat });
            parts.push(LineString::new(std::mem::take(&mut current)));
            current.push(Coord { x: -edge, y: lat });
        }

        current.push(to.into());
    }
    parts.push(LineString::new(current));

    parts.retain(|part| part.0.len() >= 2);
    MultiLineString::new(parts)
}

/// Project ids into one continuous polyline
///
/// Instead of splitting at the antimeridian, longitudes keep increasing (or
/// decreasing) past ±180 so consecutive vertices are never more than 180°
/// apart. Lengths and interpolated positions along the result are correct;
/// callers normalize positions before display.
pub fn project(
    stations: &HashMap<StationId, Station>,
    ids: &[StationId],
    options: &ProjectionOptions,
) -> LineString<f64> {
    let points = densify(&resolve(stations, ids), options);
    if points.len() < 2 {
        return LineString::new(Vec::new());
    }

    let mut coords = Vec::with_capacity(points.len());
    let mut previous_x = points[0].x();
    for point in points {
        let x = utils::unwrap_longitude(previous_x, point.x());
        coords.push(Coord { x, y: point.y() });
        previous_x = x;
    }

    LineString::new(coords)
}

/// Great-circle length of a polyline in kilometres
pub fn path_length_km(path: &LineString<f64>) -> f64 {
    path.lines()
        .map(|line| utils::distance_km(line.start.into(), line.end.into()))
        .sum()
}

/// Position and bearing `distance_km` along `path`
///
/// Distances past either end clamp to the end vertex. Returns `None` for a
/// path with fewer than two vertices.
pub fn point_along(path: &LineString<f64>, distance_km: f64) -> Option<(Point<f64>, f64)> {
    let mut remaining = distance_km.max(0.0);
    let mut last = None;

    for line in path.lines() {
        let (start, end): (Point<f64>, Point<f64>) = (line.start.into(), line.end.into());
        let length = utils::distance_km(start, end);
        let bearing = utils::bearing_degrees(start, end);

        if remaining <= length {
            let point = if length <= f64::EPSILON {
                start
            } else {
                Haversine.point_at_ratio_between(start, end, remaining / length)
            };
            return Some((utils::normalize_point(point), bearing));
        }

        remaining -= length;
        last = Some((utils::normalize_point(end), bearing));
    }

    last
}
