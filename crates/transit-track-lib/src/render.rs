//! Rendering-ready output
//!
//! Everything here is plain data handed to the display surface: track
//! polylines with colour/offset/role attributes, vehicle points and the set of
//! vehicle layer generations that should currently be drawn.

use crate::interline::InterlineSegment;
use crate::projection::{self, ProjectionOptions};
use crate::vehicle::{LineTrack, Phase, VehicleState};
use crate::{Line, Result, Station, StationId};
use geo::{MultiLineString, Point};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What a track feature depicts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrackRole {
    /// A whole line, drawn beneath everything else
    Base,
    /// One pattern's strand of a merged interline segment
    Interline,
}

/// A polyline to draw
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackFeature {
    /// Line id for [`TrackRole::Base`], segment key for [`TrackRole::Interline`]
    pub id: String,
    pub role: TrackRole,
    pub color: String,
    pub icon: Option<String>,
    /// Lateral offset in pixels
    pub offset: f64,
    /// Lines drawn by this feature
    pub line_ids: BTreeSet<String>,
    pub parts: MultiLineString<f64>,
}

impl TrackFeature {
    /// Base track for a whole line
    pub fn for_line(
        line: &Line,
        stations: &HashMap<StationId, Station>,
        options: &ProjectionOptions,
    ) -> Self {
        Self {
            id: line.id.clone(),
            role: TrackRole::Base,
            color: line.color.clone(),
            icon: line.icon.clone(),
            offset: 0.0,
            line_ids: BTreeSet::from([line.id.clone()]),
            parts: projection::project_multi(stations, &line.station_ids, options),
        }
    }

    /// One feature per pattern of an interline segment, sharing its geometry
    pub fn for_segment(
        segment: &InterlineSegment,
        stations: &HashMap<StationId, Station>,
        options: &ProjectionOptions,
    ) -> Vec<Self> {
        let parts = projection::project_multi(stations, &segment.station_ids, options);
        if parts.0.is_empty() {
            return Vec::new();
        }

        segment
            .patterns
            .iter()
            .zip(segment.offsets.iter())
            .map(|(pattern, offset)| Self {
                id: segment.key.clone(),
                role: TrackRole::Interline,
                color: pattern.color.clone(),
                icon: pattern.icon.clone(),
                offset: *offset,
                line_ids: segment.line_ids.clone(),
                parts: parts.clone(),
            })
            .collect()
    }

    /// Number of vertices over all parts
    pub fn vertex_count(&self) -> usize {
        self.parts.0.iter().map(|part| part.0.len()).sum()
    }
}

/// Kinematic fields for debugging overlays
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleDebug {
    pub section_index: usize,
    pub distance: f64,
    pub route_distance: f64,
    pub speed: f64,
    pub phase: Phase,
}

/// A vehicle point to draw
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleFeature {
    pub line_id: String,
    pub color: String,
    pub icon: Option<String>,
    /// Normalized `(lng, lat)`
    pub position: Point<f64>,
    /// Heading in degrees clockwise from north
    pub bearing: f64,
    pub forward: bool,
    /// Vehicle layer generation this feature belongs to
    pub layer: u64,
    /// Omitted in performance mode
    pub debug: Option<VehicleDebug>,
}

impl VehicleFeature {
    pub fn new(
        state: &VehicleState,
        line: &Line,
        track: &LineTrack,
        layer: u64,
        with_debug: bool,
    ) -> Result<Self> {
        let (position, bearing) = state.position(track)?;

        Ok(Self {
            line_id: line.id.clone(),
            color: line.color.clone(),
            icon: line.icon.clone(),
            position,
            bearing,
            forward: state.forward,
            layer,
            debug: with_debug.then(|| VehicleDebug {
                section_index: state.section_index,
                distance: state.distance,
                route_distance: state.route_distance,
                speed: state.speed,
                phase: state.phase,
            }),
        })
    }
}

/// Generations of rendered vehicle entities
///
/// Swapping installs a fresh generation at once and keeps the previous one
/// visible for `delay`, so the display never shows an empty frame in between.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleLayers {
    active: u64,
    /// `(generation, remove_at)`
    retiring: Vec<(u64, Duration)>,
    delay: Duration,
}

impl VehicleLayers {
    pub fn new(delay: Duration) -> Self {
        Self {
            active: 0,
            retiring: Vec::new(),
            delay,
        }
    }

    #[inline]
    pub fn active(&self) -> u64 {
        self.active
    }

    /// Install a new generation and schedule the current one for removal
    pub fn swap(&mut self, now: Duration) -> u64 {
        self.retiring.push((self.active, now.saturating_add(self.delay)));
        self.active += 1;
        tracing::debug!("Vehicle layer {} installed", self.active);
        self.active
    }

    /// Forget generations whose removal time has passed
    pub fn prune(&mut self, now: Duration) {
        self.retiring.retain(|(_, remove_at)| *remove_at > now);
    }

    /// Generations to draw at `now`, oldest first
    pub fn visible(&self, now: Duration) -> Vec<u64> {
        self.retiring
            .iter()
            .filter(|(_, remove_at)| *remove_at > now)
            .map(|(generation, _)| *generation)
            .chain(std::iter::once(self.active))
            .collect()
    }
}

/// Everything the display surface needs for one tick
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Frame<'a> {
    pub timestamp: Duration,
    /// Bumped whenever track geometry changes
    pub revision: u64,
    pub tracks: &'a [TrackFeature],
    pub segments: &'a [TrackFeature],
    pub vehicles: Vec<VehicleFeature>,
    pub layers: Vec<u64>,
}

impl Frame<'_> {
    pub fn empty(timestamp: Duration) -> Self {
        Frame {
            timestamp,
            revision: 0,
            tracks: &[],
            segments: &[],
            vehicles: Vec::new(),
            layers: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty() && self.segments.is_empty() && self.vehicles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interline::{self, StationLineIndex};
    use crate::vehicle::MotionOptions;

    fn lookup(stations: &[Station]) -> HashMap<StationId, Station> {
        stations.iter().map(|s| (s.id.clone(), s.clone())).collect()
    }

    #[test]
    fn test_layer_swap_keeps_old_generation_briefly() {
        let mut layers = VehicleLayers::new(Duration::from_millis(100));
        assert_eq!(layers.visible(Duration::ZERO), vec![0]);

        let generation = layers.swap(Duration::from_millis(1000));
        assert_eq!(generation, 1);
        assert_eq!(layers.active(), 1);
        assert_eq!(layers.visible(Duration::from_millis(1050)), vec![0, 1]);
        assert_eq!(layers.visible(Duration::from_millis(1100)), vec![1]);

        layers.swap(Duration::from_millis(1060));
        assert_eq!(layers.visible(Duration::from_millis(1070)), vec![0, 1, 2]);

        layers.prune(Duration::from_millis(1120));
        assert_eq!(layers.visible(Duration::from_millis(1120)), vec![1, 2]);
        layers.prune(Duration::from_millis(2000));
        assert_eq!(layers.visible(Duration::from_millis(2000)), vec![2]);
    }

    #[test]
    fn test_layer_swap_at_end_of_time() {
        let mut layers = VehicleLayers::new(Duration::from_millis(150));
        assert_eq!(layers.swap(Duration::MAX), 1);
        assert_eq!(
            layers.visible(Duration::MAX - Duration::from_secs(1)),
            vec![0, 1]
        );
        assert_eq!(layers.visible(Duration::MAX), vec![1]);
    }

    #[test]
    fn test_base_track_feature() {
        let stations = lookup(&[Station::new("A", 0.0, 0.0), Station::new("B", 0.0, 1.0)]);
        let mut line = Line::new("L1", "red", ["A", "B"]);
        line.icon = Some("tram".to_string());

        let feature = TrackFeature::for_line(&line, &stations, &ProjectionOptions::default());
        assert_eq!(feature.role, TrackRole::Base);
        assert_eq!(feature.id, "L1");
        assert_eq!(feature.icon.as_deref(), Some("tram"));
        assert_eq!(feature.vertex_count(), 2);
    }

    #[test]
    fn test_segment_features_carry_offsets() {
        let stations = lookup(&[
            Station::new("A", 0.0, 0.0),
            Station::new("B", 0.0, 0.01),
            Station::new("C", 0.0, 0.02),
        ]);
        let lines = [
            Line::new("L1", "red", ["A", "B", "C"]),
            Line::new("L2", "blue", ["A", "B", "C"]),
        ];
        let index = StationLineIndex::build(&lines);
        let segments = interline::build_segments(&lines, &stations, &index, 4.0);
        assert_eq!(segments.len(), 1);

        let segment = segments.values().next().unwrap();
        let features = TrackFeature::for_segment(segment, &stations, &ProjectionOptions::default());
        assert_eq!(features.len(), 2);
        assert!(features.iter().all(|f| f.role == TrackRole::Interline));
        assert_eq!(features.iter().map(|f| f.offset).sum::<f64>(), 0.0);
        assert_eq!(features[0].line_ids.len(), 2);
    }

    #[test]
    fn test_segment_without_geometry_has_no_features() {
        let stations = lookup(&[Station::new("A", 0.0, 0.0)]);
        let segment = InterlineSegment {
            key: "B|A".to_string(),
            station_ids: vec!["B".to_string(), "A".to_string()],
            patterns: Default::default(),
            offsets: Default::default(),
            line_ids: BTreeSet::new(),
        };
        assert!(TrackFeature::for_segment(&segment, &stations, &ProjectionOptions::default()).is_empty());
    }

    #[test]
    fn test_vehicle_feature_debug_toggle() {
        let stations = lookup(&[Station::new("A", 0.0, 0.0), Station::new("B", 0.0, 1.0)]);
        let line = Line::new("L1", "red", ["A", "B"]);
        let track = LineTrack::build(
            &line,
            &stations,
            &ProjectionOptions::default(),
            &MotionOptions::default(),
        );
        let state = VehicleState {
            line_id: "L1".to_string(),
            section_index: 0,
            forward: true,
            distance: 10.0,
            speed: 0.5,
            route_distance: track.length(0),
            is_circular: false,
            pause_until: None,
            last_tick: None,
            phase: Phase::Cruising,
        };

        let full = VehicleFeature::new(&state, &line, &track, 3, true).unwrap();
        assert_eq!(full.layer, 3);
        assert_eq!(full.debug.as_ref().map(|d| d.speed), Some(0.5));

        let lean = VehicleFeature::new(&state, &line, &track, 3, false).unwrap();
        assert!(lean.debug.is_none());
        assert_eq!(lean.position, full.position);
    }
}
