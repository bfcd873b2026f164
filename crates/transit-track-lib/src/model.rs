//! Snapshot data model
//!
//! Stations and lines arrive from the editor as loosely typed records. This
//! module is the single place where they are decoded into typed values; every
//! other module works on [`MapSnapshot`] and never sees raw input.

use crate::interline::Pattern;
use crate::{MapError, Result, utils};
use geo::{BoundingRect, MultiPoint, Point};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub type StationId = String;
pub type LineId = String;

/// A coordinate as it arrives from the editor: a number or numeric text
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum RawCoordinate {
    Number(f64),
    Text(String),
}

/// Why a raw coordinate was rejected
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("{0} is not finite")]
    NotFinite(f64),

    #[error("{0} is out of range")]
    OutOfRange(f64),
}

impl RawCoordinate {
    /// Coerce to a finite float
    pub fn parse(&self) -> std::result::Result<f64, CoordinateError> {
        let value = match self {
            Self::Number(value) => *value,
            Self::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| CoordinateError::NotANumber(text.clone()))?,
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(CoordinateError::NotFinite(value))
        }
    }
}

impl From<f64> for RawCoordinate {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RawCoordinate {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Undecoded station record
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct RawStation {
    pub id: StationId,
    pub lat: RawCoordinate,
    pub lng: RawCoordinate,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_waypoint: bool,
}

/// Undecoded snapshot as handed over by the editor
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawSnapshot {
    #[cfg_attr(feature = "serde", serde(default))]
    pub stations: Vec<RawStation>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub lines: Vec<Line>,
}

/// A decoded station
#[derive(Clone, Debug, PartialEq)]
pub struct Station {
    pub id: StationId,
    /// Position with x = longitude, y = latitude (degrees)
    pub position: Point<f64>,
    pub name: String,
    /// Geometry-only point, never a boarding stop unless a line overrides it
    pub is_waypoint: bool,
}

impl Station {
    /// Create a regular stop
    pub fn new(id: impl Into<StationId>, lat: f64, lng: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            position: Point::new(lng, lat),
            is_waypoint: false,
        }
    }

    /// Create a waypoint
    pub fn waypoint(id: impl Into<StationId>, lat: f64, lng: f64) -> Self {
        Self {
            is_waypoint: true,
            ..Self::new(id, lat, lng)
        }
    }

    /// Decode a raw record, coercing textual coordinates
    pub fn from_raw(raw: RawStation) -> Result<Self> {
        let invalid = |axis, reason| MapError::InvalidCoordinate {
            station: raw.id.clone(),
            axis,
            reason,
        };
        let lat = raw.lat.parse().map_err(|reason| invalid("latitude", reason))?;
        let lng = raw.lng.parse().map_err(|reason| invalid("longitude", reason))?;

        if !(-90.0..=90.0).contains(&lat) {
            return Err(invalid("latitude", CoordinateError::OutOfRange(lat)));
        }

        Ok(Self {
            id: raw.id,
            position: Point::new(lng, lat),
            name: raw.name,
            is_waypoint: raw.is_waypoint,
        })
    }

    #[inline]
    pub fn lat(&self) -> f64 {
        self.position.y()
    }

    #[inline]
    pub fn lng(&self) -> f64 {
        self.position.x()
    }
}

/// A transit line
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct Line {
    pub id: LineId,
    pub name: String,
    pub color: String,
    /// Ordered stations; repeating an id expresses a loop
    pub station_ids: Vec<StationId>,
    /// Stations treated as waypoints on this line only
    pub waypoint_overrides: BTreeSet<StationId>,
    /// Key into the [`ModeTable`]
    pub mode: Option<String>,
    pub icon: Option<String>,
    pub line_group_id: Option<String>,
}

impl Line {
    pub fn new<I, S>(id: impl Into<LineId>, color: impl Into<String>, station_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StationId>,
    {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            color: color.into(),
            station_ids: station_ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Whether `station` is geometry-only on this line
    #[inline]
    pub fn is_waypoint_for(&self, station: &Station) -> bool {
        station.is_waypoint || self.waypoint_overrides.contains(&station.id)
    }

    /// Whether `station_id` resolves to a real boarding stop on this line
    pub fn is_stop(&self, station_id: &str, stations: &HashMap<StationId, Station>) -> bool {
        stations
            .get(station_id)
            .is_some_and(|station| !self.is_waypoint_for(station))
    }

    /// Number of entries in `station_ids` that are real stops
    pub fn stop_count(&self, stations: &HashMap<StationId, Station>) -> usize {
        self.station_ids
            .iter()
            .filter(|id| self.is_stop(id, stations))
            .count()
    }

    /// First and last stop ids match
    pub fn is_circular(&self) -> bool {
        self.station_ids.len() >= 2 && self.station_ids.first() == self.station_ids.last()
    }

    /// How this line renders along shared track
    pub fn pattern(&self) -> Pattern {
        Pattern::new(self.color.clone(), self.icon.clone())
    }
}

/// Kinematic profile of a vehicle mode
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Mode {
    /// Top speed in kilometres per second of animation time
    pub speed: f64,
    /// Kilometres per second squared
    pub acceleration: f64,
    /// Dwell at a real stop in milliseconds
    pub pause: f64,
}

impl Mode {
    pub const FALLBACK: Mode = Mode {
        speed: 0.5,
        acceleration: 0.25,
        pause: 1000.0,
    };
}

/// Read-only mode constants keyed by mode name
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModeTable {
    pub modes: BTreeMap<String, Mode>,
    /// Key used for lines without a mode or with an unknown one
    pub default_key: String,
}

impl Default for ModeTable {
    fn default() -> Self {
        let modes = [
            ("BUS", 0.4, 0.2, 1200.0),
            ("TRAM", 0.5, 0.25, 1000.0),
            ("METRO", 1.0, 0.5, 800.0),
            ("RAIL", 2.0, 0.5, 1500.0),
            ("FERRY", 0.6, 0.1, 2000.0),
            ("AIR", 20.0, 2.0, 2500.0),
        ]
        .into_iter()
        .map(|(key, speed, acceleration, pause)| {
            (
                key.to_string(),
                Mode {
                    speed,
                    acceleration,
                    pause,
                },
            )
        })
        .collect();

        Self {
            modes,
            default_key: "RAIL".to_string(),
        }
    }
}

impl ModeTable {
    /// Resolve a line's mode key, falling back to the default key
    pub fn get(&self, key: Option<&str>) -> Mode {
        key.and_then(|key| self.modes.get(key))
            .or_else(|| self.modes.get(&self.default_key))
            .copied()
            .unwrap_or(Mode::FALLBACK)
    }
}

/// Summary statistics for a snapshot
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SnapshotInfo {
    pub station_count: usize,
    pub waypoint_count: usize,
    pub line_count: usize,
    /// `(min_lat, min_lng, max_lat, max_lng)` over all stations
    pub bounding_box: Option<(f64, f64, f64, f64)>,
}

impl SnapshotInfo {
    /// Centre of the bounding box as `(lat, lng)`
    pub fn center(&self) -> Option<(f64, f64)> {
        self.bounding_box
            .map(|(min_lat, min_lng, max_lat, max_lng)| {
                ((min_lat + max_lat) / 2.0, (min_lng + max_lng) / 2.0)
            })
    }
}

/// Read-only view of the station/line graph for one invocation
#[derive(Clone, Debug, Default)]
pub struct MapSnapshot {
    pub stations: HashMap<StationId, Station>,
    /// Ordered by id so every derived collection is deterministic
    pub lines: BTreeMap<LineId, Line>,
}

impl MapSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw snapshot; the first bad coordinate aborts the decode
    pub fn from_raw(raw: RawSnapshot) -> Result<Self> {
        let mut snapshot = Self::new();
        for station in raw.stations {
            snapshot.insert_station(Station::from_raw(station)?);
        }
        for line in raw.lines {
            snapshot.insert_line(line);
        }

        tracing::debug!(
            "Decoded snapshot with {} stations and {} lines",
            snapshot.stations.len(),
            snapshot.lines.len()
        );
        Ok(snapshot)
    }

    pub fn insert_station(&mut self, station: Station) {
        self.stations.insert(station.id.clone(), station);
    }

    pub fn insert_line(&mut self, line: Line) {
        self.lines.insert(line.id.clone(), line);
    }

    pub fn remove_line(&mut self, id: &str) -> Option<Line> {
        self.lines.remove(id)
    }

    #[inline]
    pub fn station(&self, id: &str) -> Option<&Station> {
        self.stations.get(id)
    }

    #[inline]
    pub fn line(&self, id: &str) -> Option<&Line> {
        self.lines.get(id)
    }

    pub fn info(&self) -> SnapshotInfo {
        let points: MultiPoint<f64> = self
            .stations
            .values()
            .map(|station| {
                Point::new(utils::normalize_longitude(station.lng()), station.lat())
            })
            .collect();

        SnapshotInfo {
            station_count: self.stations.len(),
            waypoint_count: self.stations.values().filter(|s| s.is_waypoint).count(),
            line_count: self.lines.len(),
            bounding_box: points
                .bounding_rect()
                .map(|rect| (rect.min().y, rect.min().x, rect.max().y, rect.max().x)),
        }
    }
}

/// Ids changed since the last recompute
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChangeSet {
    /// Everything is stale
    pub full: bool,
    pub stations: BTreeSet<StationId>,
    pub lines: BTreeSet<LineId>,
    pub segments: BTreeSet<String>,
}

impl ChangeSet {
    pub fn full() -> Self {
        Self {
            full: true,
            ..Self::default()
        }
    }

    pub fn lines<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<LineId>,
    {
        Self {
            lines: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn stations<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StationId>,
    {
        Self {
            stations: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.full && self.stations.is_empty() && self.lines.is_empty() && self.segments.is_empty()
    }

    /// Whether `line` (as currently defined) needs its derived state rebuilt
    pub fn touches_line(&self, line: &Line) -> bool {
        self.full
            || self.lines.contains(&line.id)
            || line.station_ids.iter().any(|id| self.stations.contains(id))
    }
}
