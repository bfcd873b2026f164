//! Simulator - Owner of all derived track and vehicle state
//!
//! The simulator never owns the station/line graph. Every call receives the
//! caller's current [`MapSnapshot`]; [`Simulator::recompute`] refreshes the
//! derived geometry for whatever a [`ChangeSet`] names and [`Simulator::tick`]
//! advances one vehicle per line.

use crate::interline::{self, InterlineSegment, StationLineIndex};
use crate::projection::ProjectionOptions;
use crate::render::{Frame, TrackFeature, VehicleFeature, VehicleLayers};
use crate::vehicle::{LineTrack, MotionOptions, VehicleState};
use crate::{ChangeSet, Line, LineId, MapSnapshot, ModeTable};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Configuration for the simulator
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimulatorConfig {
    /// Rendered track thickness in pixels, the interline offset step.
    /// Default: 6
    pub track_thickness: f64,
    /// Great-circle and antimeridian handling
    pub projection: ProjectionOptions,
    /// Speed floor, frame clamp and fallback route length
    pub motion: MotionOptions,
    /// How long a replaced vehicle layer stays visible.
    /// Default: 150 ms
    pub layer_swap_delay: Duration,
    /// Seed for starting sections and directions
    pub seed: u64,
    /// Start with vehicle debug fields omitted
    pub performance_mode: bool,
    /// Kinematic constants per vehicle mode
    pub modes: ModeTable,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            track_thickness: interline::DEFAULT_TRACK_THICKNESS,
            projection: ProjectionOptions::default(),
            motion: MotionOptions::default(),
            layer_swap_delay: Duration::from_millis(150),
            seed: 0,
            performance_mode: false,
            modes: ModeTable::default(),
        }
    }
}

/// Derived state for one snapshot, rebuilt incrementally
#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimulatorConfig,
    rng: ChaCha8Rng,
    /// Per-line sections and section geometry
    tracks: BTreeMap<LineId, LineTrack>,
    /// Per-line base track features
    bases: BTreeMap<LineId, TrackFeature>,
    vehicles: BTreeMap<LineId, VehicleState>,
    segments: BTreeMap<String, InterlineSegment>,
    /// Features per segment key
    segment_features: BTreeMap<String, Vec<TrackFeature>>,
    /// Flattened views handed out in frames
    track_view: Vec<TrackFeature>,
    segment_view: Vec<TrackFeature>,
    layers: VehicleLayers,
    revision: u64,
    performance_mode: bool,
    /// Derived state is missing or released, the next recompute is full
    stale: bool,
    cancelled: bool,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            tracks: BTreeMap::new(),
            bases: BTreeMap::new(),
            vehicles: BTreeMap::new(),
            segments: BTreeMap::new(),
            segment_features: BTreeMap::new(),
            track_view: Vec::new(),
            segment_view: Vec::new(),
            layers: VehicleLayers::new(config.layer_swap_delay),
            revision: 0,
            performance_mode: config.performance_mode,
            stale: true,
            cancelled: false,
            config,
        }
    }

    /// Refresh derived state after the snapshot changed
    ///
    /// Lines named by `changes` (directly or through one of their stations) get
    /// new sections and geometry; interline segments are rebuilt from every
    /// line. The first call, and the first call after [`Self::cancel`], is
    /// always a full rebuild.
    ///
    /// # Returns
    /// Keys of interline segments whose rendering changed
    pub fn recompute(&mut self, snapshot: &MapSnapshot, changes: &ChangeSet) -> BTreeSet<String> {
        #[cfg(feature = "profiling")]
        profiling::scope!("simulator::recompute");

        let full = changes.full || self.stale;
        self.cancelled = false;
        if !full && changes.is_empty() {
            return BTreeSet::new();
        }

        // Lines gone from the snapshot
        let removed: Vec<LineId> = self
            .tracks
            .keys()
            .filter(|id| !snapshot.lines.contains_key(*id))
            .cloned()
            .collect();
        for id in &removed {
            self.tracks.remove(id);
            self.bases.remove(id);
            self.vehicles.remove(id);
        }

        let dirty: Vec<&Line> = snapshot
            .lines
            .values()
            .filter(|line| full || !self.tracks.contains_key(&line.id) || changes.touches_line(line))
            .collect();

        let projection = self.config.projection;
        let motion = self.config.motion;
        let rebuilt: Vec<(LineId, LineTrack, TrackFeature)> = dirty
            .par_iter()
            .map(|line| {
                (
                    line.id.clone(),
                    LineTrack::build(line, &snapshot.stations, &projection, &motion),
                    TrackFeature::for_line(line, &snapshot.stations, &projection),
                )
            })
            .collect();

        for (id, track, base) in rebuilt {
            self.refresh_vehicle(snapshot, &id, &track);
            self.tracks.insert(id.clone(), track);
            self.bases.insert(id, base);
        }

        let changed = self.rebuild_segments(snapshot, changes, full);

        self.track_view = self.bases.values().cloned().collect();
        self.revision += 1;
        self.stale = false;

        tracing::debug!(
            "Recomputed {} of {} lines, {} segments changed",
            dirty.len(),
            snapshot.lines.len(),
            changed.len()
        );
        changed
    }

    /// Drop or repair a vehicle whose line was rebuilt
    fn refresh_vehicle(&mut self, snapshot: &MapSnapshot, id: &str, track: &LineTrack) {
        let Some(line) = snapshot.line(id) else {
            self.vehicles.remove(id);
            return;
        };

        if track.is_empty() || line.stop_count(&snapshot.stations) < 2 {
            if self.vehicles.remove(id).is_some() {
                tracing::debug!("Line {id} no longer has two stops, vehicle removed");
            }
            return;
        }

        let Some(state) = self.vehicles.get_mut(id) else {
            return;
        };
        if !state.is_consistent_with(track) {
            tracing::debug!("Vehicle state of line {id} reset after edit");
            self.vehicles.remove(id);
            return;
        }

        state.is_circular = line.is_circular();
        if state.is_circular {
            state.forward = true;
        }
        state.route_distance = track.length(state.section_index);
        state.distance = state.distance.clamp(0.0, state.route_distance);
    }

    /// Rebuild interline segments and the features of every changed key
    fn rebuild_segments(
        &mut self,
        snapshot: &MapSnapshot,
        changes: &ChangeSet,
        full: bool,
    ) -> BTreeSet<String> {
        let index = StationLineIndex::build(snapshot.lines.values());
        let segments = interline::build_segments(
            snapshot.lines.values(),
            &snapshot.stations,
            &index,
            self.config.track_thickness,
        );

        let mut changed = interline::diff_segments(&self.segments, &segments);
        changed.extend(
            changes
                .segments
                .iter()
                .filter(|key| segments.contains_key(*key) || self.segments.contains_key(*key))
                .cloned(),
        );
        // Same key and patterns but a station moved underneath
        changed.extend(
            segments
                .values()
                .filter(|segment| {
                    full || segment
                        .station_ids
                        .iter()
                        .any(|id| changes.stations.contains(id))
                })
                .map(|segment| segment.key.clone()),
        );

        for key in &changed {
            match segments.get(key) {
                Some(segment) => {
                    let features = TrackFeature::for_segment(
                        segment,
                        &snapshot.stations,
                        &self.config.projection,
                    );
                    self.segment_features.insert(key.clone(), features);
                }
                None => {
                    self.segment_features.remove(key);
                }
            }
        }

        self.segment_view = self.segment_features.values().flatten().cloned().collect();
        self.segments = segments;
        changed
    }

    /// Advance every vehicle to `now` and collect the frame
    ///
    /// Lines not yet seen by [`Self::recompute`] are left out. A vehicle that
    /// fails to advance or to resolve a position is logged and omitted from
    /// this frame only.
    pub fn tick(&mut self, snapshot: &MapSnapshot, now: Duration) -> Frame<'_> {
        #[cfg(feature = "profiling")]
        profiling::scope!("simulator::tick");

        if self.cancelled {
            return Frame::empty(now);
        }

        self.layers.prune(now);
        let layer = self.layers.active();
        let with_debug = !self.performance_mode;
        let mut vehicles = Vec::with_capacity(self.vehicles.len());

        for (id, line) in &snapshot.lines {
            let Some(track) = self.tracks.get(id) else {
                continue;
            };
            if track.is_empty() {
                continue;
            }

            let state = match self.vehicles.entry(id.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    if line.stop_count(&snapshot.stations) < 2 {
                        continue;
                    }
                    match VehicleState::spawn(line, track, &mut self.rng) {
                        Ok(state) => entry.insert(state),
                        Err(err) => {
                            tracing::debug!("No vehicle for line {id}: {err}");
                            continue;
                        }
                    }
                }
            };

            let mode = self.config.modes.get(line.mode.as_deref());
            if let Err(err) = state.advance(
                line,
                track,
                &snapshot.stations,
                &mode,
                &self.config.motion,
                now,
            ) {
                tracing::warn!("Skipping vehicle of line {id}: {err}");
                continue;
            }

            match VehicleFeature::new(state, line, track, layer, with_debug) {
                Ok(feature) => vehicles.push(feature),
                Err(err) => tracing::warn!("Skipping vehicle of line {id}: {err}"),
            }
        }

        Frame {
            timestamp: now,
            revision: self.revision,
            tracks: &self.track_view,
            segments: &self.segment_view,
            vehicles,
            layers: self.layers.visible(now),
        }
    }

    /// Toggle vehicle debug fields; a change swaps the vehicle layer
    pub fn set_performance_mode(&mut self, enabled: bool, now: Duration) {
        if self.performance_mode != enabled {
            self.performance_mode = enabled;
            self.layers.swap(now);
            tracing::info!("Performance mode {}", if enabled { "on" } else { "off" });
        }
    }

    /// Re-render every vehicle in a fresh layer
    pub fn reset_display(&mut self, now: Duration) {
        self.layers.swap(now);
    }

    /// Release derived state; ticks return empty frames until the next recompute
    pub fn cancel(&mut self) {
        self.tracks.clear();
        self.bases.clear();
        self.vehicles.clear();
        self.segments.clear();
        self.segment_features.clear();
        self.track_view.clear();
        self.segment_view.clear();
        self.stale = true;
        self.cancelled = true;
        tracing::debug!("Simulator cancelled");
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    #[inline]
    pub fn performance_mode(&self) -> bool {
        self.performance_mode
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Bumped by every recompute that did work
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn vehicle(&self, line_id: &str) -> Option<&VehicleState> {
        self.vehicles.get(line_id)
    }

    pub fn vehicles(&self) -> &BTreeMap<LineId, VehicleState> {
        &self.vehicles
    }

    pub fn track(&self, line_id: &str) -> Option<&LineTrack> {
        self.tracks.get(line_id)
    }

    pub fn segments(&self) -> &BTreeMap<String, InterlineSegment> {
        &self.segments
    }

    pub fn layers(&self) -> &VehicleLayers {
        &self.layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Station, TrackRole};
    use geo::LineString;

    const FRAME: Duration = Duration::from_millis(16);

    fn snapshot() -> MapSnapshot {
        let mut snapshot = MapSnapshot::new();
        for (id, lat, lng) in [
            ("A", 0.0, 0.0),
            ("B", 0.0, 0.01),
            ("C", 0.0, 0.02),
            ("D", 0.0, 0.03),
        ] {
            snapshot.insert_station(Station::new(id, lat, lng));
        }
        snapshot.insert_line(Line::new("L1", "red", ["A", "B", "C"]));
        snapshot.insert_line(Line::new("L2", "blue", ["B", "C", "D"]));
        snapshot
    }

    fn run(simulator: &mut Simulator, snapshot: &MapSnapshot, frames: u64) {
        for frame in 0..frames {
            simulator.tick(snapshot, FRAME * frame as u32);
        }
    }

    #[test]
    fn test_first_recompute_builds_everything() {
        let snapshot = snapshot();
        let mut simulator = Simulator::new(SimulatorConfig::default());

        let changed = simulator.recompute(&snapshot, &ChangeSet::default());
        assert_eq!(
            changed.into_iter().collect::<Vec<_>>(),
            vec!["B|A", "C|B", "D|C"]
        );
        assert_eq!(simulator.revision(), 1);

        let frame = simulator.tick(&snapshot, Duration::ZERO);
        assert_eq!(frame.tracks.len(), 2);
        assert!(frame.tracks.iter().all(|t| t.role == TrackRole::Base));
        // Shared B-C carries both patterns
        assert_eq!(frame.segments.len(), 4);
        assert_eq!(frame.vehicles.len(), 2);
        assert_eq!(frame.layers, vec![0]);
    }

    #[test]
    fn test_empty_change_set_is_a_no_op() {
        let snapshot = snapshot();
        let mut simulator = Simulator::new(SimulatorConfig::default());
        simulator.recompute(&snapshot, &ChangeSet::full());

        assert!(simulator.recompute(&snapshot, &ChangeSet::default()).is_empty());
        assert_eq!(simulator.revision(), 1);
    }

    #[test]
    fn test_line_edit_reports_changed_segments() {
        let mut snapshot = snapshot();
        let mut simulator = Simulator::new(SimulatorConfig::default());
        simulator.recompute(&snapshot, &ChangeSet::full());

        snapshot.insert_line(Line::new("L3", "green", ["C", "D"]));
        let changed = simulator.recompute(&snapshot, &ChangeSet::lines(["L3"]));
        assert_eq!(changed.into_iter().collect::<Vec<_>>(), vec!["D|C"]);
        assert!(simulator.track("L3").is_some());
        assert_eq!(simulator.segments()["D|C"].patterns.len(), 2);
    }

    #[test]
    fn test_moved_station_refreshes_its_segments() {
        let mut snapshot = snapshot();
        let mut simulator = Simulator::new(SimulatorConfig::default());
        simulator.recompute(&snapshot, &ChangeSet::full());

        snapshot.insert_station(Station::new("A", 0.005, 0.0));
        let changed = simulator.recompute(&snapshot, &ChangeSet::stations(["A"]));
        assert_eq!(changed.into_iter().collect::<Vec<_>>(), vec!["B|A"]);

        let frame = simulator.tick(&snapshot, Duration::ZERO);
        let moved = frame.segments.iter().find(|f| f.id == "B|A").unwrap();
        assert!(moved.parts.0[0].0.iter().any(|c| (c.y - 0.005).abs() < 1e-12));
    }

    #[test]
    fn test_explicit_segment_keys_are_reported() {
        let snapshot = snapshot();
        let mut simulator = Simulator::new(SimulatorConfig::default());
        simulator.recompute(&snapshot, &ChangeSet::full());

        let changes = ChangeSet {
            segments: BTreeSet::from(["C|B".to_string(), "Z|Y".to_string()]),
            ..ChangeSet::default()
        };
        let changed = simulator.recompute(&snapshot, &changes);
        assert_eq!(changed.into_iter().collect::<Vec<_>>(), vec!["C|B"]);
    }

    #[test]
    fn test_removed_line_drops_its_vehicle() {
        let mut snapshot = snapshot();
        let mut simulator = Simulator::new(SimulatorConfig::default());
        simulator.recompute(&snapshot, &ChangeSet::full());
        run(&mut simulator, &snapshot, 3);
        assert!(simulator.vehicle("L2").is_some());

        snapshot.remove_line("L2");
        let changed = simulator.recompute(&snapshot, &ChangeSet::lines(["L2"]));
        assert!(changed.contains("D|C"));
        assert!(simulator.vehicle("L2").is_none());
        assert!(simulator.track("L2").is_none());

        let frame = simulator.tick(&snapshot, FRAME * 3);
        assert_eq!(frame.vehicles.len(), 1);
        assert_eq!(frame.tracks.len(), 1);
    }

    #[test]
    fn test_line_below_two_stops_has_no_vehicle() {
        let mut snapshot = snapshot();
        snapshot.insert_station(Station::waypoint("W", 0.0, 0.04));
        snapshot.insert_line(Line::new("L3", "green", ["D", "W"]));

        let mut simulator = Simulator::new(SimulatorConfig::default());
        simulator.recompute(&snapshot, &ChangeSet::full());
        run(&mut simulator, &snapshot, 5);

        assert!(simulator.vehicle("L3").is_none());
        assert!(simulator.vehicle("L1").is_some());
    }

    #[test]
    fn test_shortened_line_resets_vehicle_state() {
        let mut snapshot = snapshot();
        snapshot.insert_line(Line::new("L1", "red", ["A", "B", "C", "D"]));
        let mut simulator = Simulator::new(SimulatorConfig {
            seed: 3,
            ..SimulatorConfig::default()
        });
        simulator.recompute(&snapshot, &ChangeSet::full());
        run(&mut simulator, &snapshot, 2);

        // Force the vehicle onto the last section, then cut the line short
        let mut state = simulator.vehicle("L1").cloned().unwrap();
        state.section_index = 2;
        simulator.vehicles.insert("L1".to_string(), state);

        snapshot.insert_line(Line::new("L1", "red", ["A", "B"]));
        simulator.recompute(&snapshot, &ChangeSet::lines(["L1"]));
        assert!(simulator.vehicle("L1").is_none());

        simulator.tick(&snapshot, FRAME * 2);
        assert_eq!(simulator.vehicle("L1").map(|v| v.section_index), Some(0));
    }

    #[test]
    fn test_line_edited_before_recompute_skips_its_vehicle() {
        let mut snapshot = snapshot();
        snapshot.insert_station(Station::waypoint("W1", 0.005, 0.015));
        snapshot.insert_station(Station::waypoint("W2", 0.005, 0.018));
        snapshot.insert_station(Station::new("X", 0.01, 0.0));
        snapshot.insert_station(Station::new("Y", 0.01, 0.01));
        snapshot.insert_line(Line::new("L1", "red", ["A", "B", "W1", "W2", "C"]));
        let mut simulator = Simulator::new(SimulatorConfig::default());
        simulator.recompute(&snapshot, &ChangeSet::full());
        run(&mut simulator, &snapshot, 1);

        // Heading back to A, about to leave the first section
        let mut state = simulator.vehicle("L1").cloned().unwrap();
        state.section_index = 0;
        state.forward = false;
        state.pause_until = None;
        state.route_distance = simulator.track("L1").unwrap().length(0);
        state.distance = state.route_distance - 1e-9;
        simulator.vehicles.insert("L1".to_string(), state.clone());

        // The caller edits the line but ticks before recomputing
        snapshot.insert_line(Line::new("L1", "red", ["X", "Y", "A"]));
        let frame = simulator.tick(&snapshot, FRAME);
        let lines: Vec<String> = frame.vehicles.iter().map(|v| v.line_id.clone()).collect();
        assert_eq!(lines, vec!["L2"]);
        assert_eq!(simulator.vehicle("L1"), Some(&state));

        simulator.recompute(&snapshot, &ChangeSet::lines(["L1"]));
        let frame = simulator.tick(&snapshot, FRAME * 2);
        assert_eq!(frame.vehicles.len(), 2);
    }

    #[test]
    fn test_failing_vehicle_does_not_stop_the_others() {
        let mut snapshot = snapshot();
        snapshot.insert_line(Line::new("L3", "green", ["A", "D"]));
        let mut simulator = Simulator::new(SimulatorConfig::default());
        simulator.recompute(&snapshot, &ChangeSet::full());
        run(&mut simulator, &snapshot, 2);
        assert_eq!(simulator.vehicles().len(), 3);

        // L2 loses its geometry and L3 is edited without a recompute
        if let Some(track) = simulator.tracks.get_mut("L2") {
            for path in &mut track.paths {
                *path = LineString::new(Vec::new());
            }
        }
        snapshot.insert_line(Line::new("L3", "green", ["D", "C", "B", "A"]));

        let frame = simulator.tick(&snapshot, FRAME * 2);
        let lines: Vec<String> = frame.vehicles.iter().map(|v| v.line_id.clone()).collect();
        assert_eq!(lines, vec!["L1"]);

        assert_eq!(simulator.vehicle("L1").unwrap().last_tick, Some(FRAME * 2));
        // L2 still moves, it just has nowhere to be drawn
        assert_eq!(simulator.vehicle("L2").unwrap().last_tick, Some(FRAME * 2));
        assert_eq!(simulator.vehicle("L3").unwrap().last_tick, Some(FRAME));
    }

    #[test]
    fn test_same_seed_same_frames() {
        let snapshot = snapshot();
        let config = SimulatorConfig {
            seed: 11,
            ..SimulatorConfig::default()
        };
        let mut first = Simulator::new(config.clone());
        let mut second = Simulator::new(config);
        first.recompute(&snapshot, &ChangeSet::full());
        second.recompute(&snapshot, &ChangeSet::full());

        for frame in 0..100u32 {
            let now = FRAME * frame;
            let a = first.tick(&snapshot, now).vehicles;
            let b = second.tick(&snapshot, now).vehicles;
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_resumed_clock_is_clamped() {
        let snapshot = snapshot();
        let mut simulator = Simulator::new(SimulatorConfig::default());
        simulator.recompute(&snapshot, &ChangeSet::full());
        simulator.tick(&snapshot, Duration::ZERO);

        simulator.tick(&snapshot, Duration::from_secs(3600));
        for state in simulator.vehicles().values() {
            assert!(state.distance <= state.route_distance);
            assert_eq!(state.last_tick, Some(Duration::from_secs(3600)));
        }
    }

    #[test]
    fn test_performance_mode_swaps_layers() {
        let snapshot = snapshot();
        let mut simulator = Simulator::new(SimulatorConfig {
            layer_swap_delay: Duration::from_millis(100),
            ..SimulatorConfig::default()
        });
        simulator.recompute(&snapshot, &ChangeSet::full());

        let frame = simulator.tick(&snapshot, Duration::ZERO);
        assert!(frame.vehicles.iter().all(|v| v.debug.is_some()));

        simulator.set_performance_mode(true, Duration::from_millis(10));
        simulator.set_performance_mode(true, Duration::from_millis(10));
        let frame = simulator.tick(&snapshot, Duration::from_millis(20));
        assert!(frame.vehicles.iter().all(|v| v.debug.is_none() && v.layer == 1));
        assert_eq!(frame.layers, vec![0, 1]);

        let frame = simulator.tick(&snapshot, Duration::from_millis(200));
        assert_eq!(frame.layers, vec![1]);

        simulator.reset_display(Duration::from_millis(200));
        assert_eq!(simulator.layers().active(), 2);
    }

    #[test]
    fn test_cancel_releases_state() {
        let snapshot = snapshot();
        let mut simulator = Simulator::new(SimulatorConfig::default());
        simulator.recompute(&snapshot, &ChangeSet::full());
        run(&mut simulator, &snapshot, 3);

        simulator.cancel();
        assert!(simulator.is_cancelled());
        assert!(simulator.vehicles().is_empty());
        assert!(simulator.tick(&snapshot, FRAME * 4).is_empty());

        // Any recompute after a cancel rebuilds in full
        let changed = simulator.recompute(&snapshot, &ChangeSet::default());
        assert_eq!(changed.len(), 3);
        assert!(!simulator.tick(&snapshot, FRAME * 5).is_empty());
    }

    #[test]
    fn test_modes_drive_speed() {
        let mut snapshot = MapSnapshot::new();
        snapshot.insert_station(Station::new("A", 0.0, 0.0));
        snapshot.insert_station(Station::new("B", 0.0, 5.0));
        let mut slow = Line::new("L1", "red", ["A", "B"]);
        slow.mode = Some("BUS".to_string());
        let mut fast = Line::new("L2", "blue", ["A", "B"]);
        fast.mode = Some("AIR".to_string());
        snapshot.insert_line(slow);
        snapshot.insert_line(fast);

        let mut simulator = Simulator::new(SimulatorConfig::default());
        simulator.recompute(&snapshot, &ChangeSet::full());
        run(&mut simulator, &snapshot, 120);

        let bus = simulator.vehicle("L1").unwrap();
        let air = simulator.vehicle("L2").unwrap();
        assert!(bus.speed <= 0.4);
        assert!(air.speed > bus.speed);
    }
}
