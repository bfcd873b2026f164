//! Vehicle kinematics
//!
//! Every line carries one vehicle. A vehicle accelerates away from a stop,
//! cruises, brakes into the next stop and dwells there before moving on. At the
//! end of the line it wraps (circular lines), jumps back into a loop the line
//! already traversed, or turns around.

use crate::projection::{self, ProjectionOptions};
use crate::section::{self, Section};
use crate::{Line, MapError, Mode, Result, Station, StationId};
use geo::{LineString, Point};
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fraction of the speed cap a moving vehicle never drops below
pub const MIN_SPEED_RATIO: f64 = 0.02;

/// Default route length (km) for a section without usable geometry
pub const NOMINAL_ROUTE_DISTANCE_KM: f64 = 0.1;

/// Motion phase, reported for debugging overlays
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Phase {
    #[default]
    Accelerating,
    Cruising,
    Decelerating,
    Paused,
}

/// Tuning for vehicle motion
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotionOptions {
    /// See [`MIN_SPEED_RATIO`]
    pub min_speed_ratio: f64,
    /// Longest time step a single tick integrates
    pub max_frame_delta: Duration,
    /// Route length (km) assumed for a section without usable geometry
    pub nominal_route_distance: f64,
}

impl Default for MotionOptions {
    fn default() -> Self {
        Self {
            min_speed_ratio: MIN_SPEED_RATIO,
            max_frame_delta: Duration::from_millis(250),
            nominal_route_distance: NOMINAL_ROUTE_DISTANCE_KM,
        }
    }
}

/// Speed for a vehicle `distance` into a section of length `route_distance`
///
/// Ramps linearly over `speed / acceleration` at both ends of the section.
/// A section too short to reach top speed peaks at its midpoint with the cap
/// scaled by `route_distance / (2 × accel_distance)`.
pub fn target_speed(
    mode: &Mode,
    distance: f64,
    route_distance: f64,
    min_speed_ratio: f64,
) -> (f64, Phase) {
    let accel_distance = if mode.acceleration > 0.0 {
        mode.speed / mode.acceleration
    } else {
        0.0
    };

    let (cap, ramp) = if accel_distance <= 0.0 {
        (mode.speed, 0.0)
    } else if route_distance < 2.0 * accel_distance {
        (
            mode.speed * (route_distance / (2.0 * accel_distance)),
            route_distance / 2.0,
        )
    } else {
        (mode.speed, accel_distance)
    };
    let floor = (cap * min_speed_ratio).max(f64::MIN_POSITIVE);

    if ramp > 0.0 && distance < ramp {
        ((cap * distance / ramp).max(floor), Phase::Accelerating)
    } else if ramp > 0.0 && distance > route_distance - ramp {
        (
            (cap * (route_distance - distance) / ramp).max(floor),
            Phase::Decelerating,
        )
    } else {
        (cap.max(floor), Phase::Cruising)
    }
}

/// Per-line geometry the simulator moves vehicles along
#[derive(Debug, Clone)]
pub struct LineTrack {
    /// Station order the track was built from
    pub station_ids: Vec<StationId>,
    pub sections: Vec<Section>,
    /// Continuous polyline per section
    pub paths: Vec<LineString<f64>>,
    /// Length per section in km, never zero
    pub lengths: Vec<f64>,
    options: ProjectionOptions,
    nominal: f64,
}

impl LineTrack {
    pub fn build(
        line: &Line,
        stations: &HashMap<StationId, Station>,
        options: &ProjectionOptions,
        motion: &MotionOptions,
    ) -> Self {
        let nominal = motion.nominal_route_distance.max(f64::EPSILON);
        let sections = section::partition(line, stations);
        let paths: Vec<LineString<f64>> = sections
            .iter()
            .map(|section| projection::project(stations, &section.station_ids, options))
            .collect();
        let lengths = paths
            .iter()
            .enumerate()
            .map(|(index, path)| {
                let length = projection::path_length_km(path);
                if length > 0.0 {
                    length
                } else {
                    tracing::warn!(
                        "Section {index} of line {} has no usable geometry, assuming {nominal} km",
                        line.id
                    );
                    nominal
                }
            })
            .collect();

        Self {
            station_ids: line.station_ids.clone(),
            sections,
            paths,
            lengths,
            options: *options,
            nominal,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Length of a section, nominal when the index is out of range
    #[inline]
    pub fn length(&self, section_index: usize) -> f64 {
        self.lengths
            .get(section_index)
            .copied()
            .unwrap_or(self.nominal)
    }

    /// Length of the stations `ids` as projected for this track
    fn stretch_length(&self, stations: &HashMap<StationId, Station>, ids: &[StationId]) -> f64 {
        projection::path_length_km(&projection::project(stations, ids, &self.options))
    }
}

/// Where a vehicle re-enters a loop after reaching a terminus
#[derive(Debug, Clone, Copy, PartialEq)]
struct LoopReentry {
    section_index: usize,
    distance: f64,
}

/// Kinematic state of one line's vehicle
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleState {
    pub line_id: String,
    pub section_index: usize,
    /// Travelling in `station_ids` order
    pub forward: bool,
    /// Kilometres travelled into the current section
    pub distance: f64,
    /// Kilometres per second
    pub speed: f64,
    /// Length of the current section in km
    pub route_distance: f64,
    pub is_circular: bool,
    /// Dwelling at a stop until this timestamp
    pub pause_until: Option<Duration>,
    /// Timestamp of the previous tick
    pub last_tick: Option<Duration>,
    pub phase: Phase,
}

impl VehicleState {
    /// Place a new vehicle on a random section of `line`
    ///
    /// Circular lines always run forward; other lines pick a random direction.
    pub fn spawn<R: Rng>(line: &Line, track: &LineTrack, rng: &mut R) -> Result<Self> {
        if track.is_empty() {
            return Err(MapError::NotEnoughStops {
                line: line.id.clone(),
                stops: line.station_ids.len(),
            });
        }

        let is_circular = line.is_circular();
        let section_index = rng.gen_range(0..track.sections.len());
        let forward = is_circular || rng.gen_bool(0.5);

        Ok(Self {
            line_id: line.id.clone(),
            section_index,
            forward,
            distance: 0.0,
            speed: 0.0,
            route_distance: track.length(section_index),
            is_circular,
            pause_until: None,
            last_tick: None,
            phase: Phase::Accelerating,
        })
    }

    /// Whether the state still fits `track`
    pub fn is_consistent_with(&self, track: &LineTrack) -> bool {
        self.section_index < track.sections.len()
    }

    /// Reason `line` and `track` cannot move this vehicle, if any
    fn inconsistency(&self, line: &Line, track: &LineTrack) -> Option<String> {
        if line.station_ids != track.station_ids {
            Some("line changed since the last recompute".to_string())
        } else if !self.is_consistent_with(track) {
            Some(format!(
                "section {} of {}",
                self.section_index,
                track.sections.len()
            ))
        } else {
            None
        }
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.pause_until.is_some()
    }

    /// Advance the vehicle to `now`
    ///
    /// The first tick only records the timestamp. An inconsistent state (the
    /// line was edited underneath the vehicle, or `track` is stale) is
    /// reported and left untouched.
    pub fn advance(
        &mut self,
        line: &Line,
        track: &LineTrack,
        stations: &HashMap<StationId, Station>,
        mode: &Mode,
        options: &MotionOptions,
        now: Duration,
    ) -> Result<()> {
        if let Some(reason) = self.inconsistency(line, track) {
            return Err(MapError::InvalidState {
                line: line.id.clone(),
                reason,
            });
        }

        let elapsed = self
            .last_tick
            .map(|last| now.saturating_sub(last).min(options.max_frame_delta))
            .unwrap_or_default();
        self.last_tick = Some(now);

        if let Some(until) = self.pause_until {
            if now < until {
                self.speed = 0.0;
                self.phase = Phase::Paused;
                return Ok(());
            }
            self.pause_until = None;
        }

        self.route_distance = track.length(self.section_index);
        let (speed, phase) = target_speed(
            mode,
            self.distance,
            self.route_distance,
            options.min_speed_ratio,
        );
        self.speed = speed;
        self.phase = phase;
        self.distance += speed * elapsed.as_secs_f64();

        if self.distance > self.route_distance {
            self.enter_next_section(line, track, stations, mode, now)?;
        }

        Ok(())
    }

    /// Move on from the section just completed
    fn enter_next_section(
        &mut self,
        line: &Line,
        track: &LineTrack,
        stations: &HashMap<StationId, Station>,
        mode: &Mode,
        now: Duration,
    ) -> Result<()> {
        let count = track.sections.len();
        let departing = track.sections[self.section_index]
            .terminus(self.forward)
            .cloned();

        self.distance = 0.0;
        self.speed = 0.0;

        let next = if self.forward {
            Some(self.section_index + 1).filter(|next| *next < count)
        } else {
            self.section_index.checked_sub(1)
        };

        match next {
            Some(next) => self.section_index = next,
            None if self.is_circular => {
                self.section_index = if self.forward { 0 } else { count - 1 };
            }
            None => match self.find_loop_reentry(line, track, stations)? {
                Some(reentry) => {
                    tracing::trace!(
                        "Line {} re-enters its loop at section {}",
                        line.id,
                        reentry.section_index
                    );
                    self.section_index = reentry.section_index;
                    self.distance = reentry.distance;
                }
                None => self.forward = !self.forward,
            },
        }

        self.route_distance = track.length(self.section_index);
        self.distance = self.distance.min(self.route_distance);

        if let Some(station) = departing
            && line.is_stop(&station, stations)
        {
            let pause = Duration::try_from_secs_f64(mode.pause.max(0.0) / 1000.0).unwrap_or_default();
            self.pause_until = Some(now.saturating_add(pause));
            self.phase = Phase::Paused;
        }

        Ok(())
    }

    /// Locate an earlier visit of the terminus this vehicle just reached
    ///
    /// The scan runs in travel direction from the far end of the line and the
    /// first match wins. A match inside a section pre-loads the distance
    /// already covered so the vehicle does not jump back to the section start.
    fn find_loop_reentry(
        &self,
        line: &Line,
        track: &LineTrack,
        stations: &HashMap<StationId, Station>,
    ) -> Result<Option<LoopReentry>> {
        let ids = &track.station_ids;
        let Some(terminus) = track.sections[self.section_index].terminus(self.forward) else {
            return Ok(None);
        };

        let found = if self.forward {
            (0..ids.len().saturating_sub(1)).find(|&i| &ids[i] == terminus)
        } else {
            (1..ids.len()).rev().find(|&i| &ids[i] == terminus)
        };
        let Some(index) = found else {
            return Ok(None);
        };

        let section_index = if self.forward {
            section::section_containing(&track.sections, index)
        } else {
            track
                .sections
                .iter()
                .position(|s| index > s.start && index <= s.end())
        };
        let Some(section_index) = section_index else {
            return Err(MapError::UnresolvedLoop {
                line: line.id.clone(),
                station: terminus.clone(),
            });
        };

        let section = &track.sections[section_index];
        let distance = if self.forward && index > section.start {
            track.stretch_length(stations, &ids[section.start..=index])
        } else if !self.forward && index < section.end() {
            track.stretch_length(stations, &ids[index..=section.end()])
        } else {
            0.0
        };

        Ok(Some(LoopReentry {
            section_index,
            distance,
        }))
    }

    /// Current position and heading in degrees
    pub fn position(&self, track: &LineTrack) -> Result<(Point<f64>, f64)> {
        let path = track
            .paths
            .get(self.section_index)
            .ok_or_else(|| MapError::InvalidState {
                line: self.line_id.clone(),
                reason: format!("no path for section {}", self.section_index),
            })?;

        let along = if self.forward {
            self.distance
        } else {
            self.route_distance - self.distance
        };
        let along = along * projection::path_length_km(path) / self.route_distance.max(f64::EPSILON);

        let (point, bearing) = projection::point_along(path, along).ok_or_else(|| {
            MapError::InvalidGeometry(format!(
                "line {} section {} has fewer than two coordinates",
                self.line_id, self.section_index
            ))
        })?;

        let heading = if self.forward {
            bearing
        } else {
            (bearing + 180.0).rem_euclid(360.0)
        };
        Ok((point, heading))
    }
}
