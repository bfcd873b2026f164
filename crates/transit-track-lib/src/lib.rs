//! Transit Track Library - Track Geometry and Vehicle Simulation for Transit Maps
//!
//! This library turns a read-only snapshot of stations and lines into
//! rendering-ready geometry and drives one animated vehicle per line. It owns
//! only derived state; the station/line graph always belongs to the caller.
//!
//! # Architecture
//!
//! - **[`section`]**: splits a line's stop list into sections between real stops
//! - **[`projection`]**: station ids to polylines (great-circle spans, antimeridian splits)
//! - **[`interline`]**: shared-track detection, chain merging and lateral offsets
//! - **[`vehicle`]**: per-line kinematic state (accelerate, cruise, brake, dwell)
//! - **[`Simulator`]**: owner of all derived state, recomputed from snapshot + change set
//!
//! # Error Policy
//!
//! Only decoding a raw snapshot can fail hard. Everything downstream degrades:
//! missing stations are skipped, degenerate geometry becomes empty output and a
//! failing vehicle is dropped from a single frame.

pub mod interline;
mod model;
pub mod projection;
mod render;
pub mod section;
mod simulator;
pub mod utils;
pub mod vehicle;

// Public API exports
pub use interline::{InterlineSegment, Pattern, StationLineIndex};
pub use model::{
    ChangeSet, CoordinateError, Line, LineId, MapSnapshot, Mode, ModeTable, RawCoordinate,
    RawSnapshot, RawStation, SnapshotInfo, Station, StationId,
};
pub use render::{Frame, TrackFeature, TrackRole, VehicleDebug, VehicleFeature, VehicleLayers};
pub use section::Section;
pub use simulator::{Simulator, SimulatorConfig};
pub use vehicle::{LineTrack, MotionOptions, Phase, VehicleState};

/// Error types for the track engine
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Invalid {axis} for station {station}: {reason}")]
    InvalidCoordinate {
        station: String,
        axis: &'static str,
        #[source]
        reason: CoordinateError,
    },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Line {line} has {stops} stops, at least 2 are required")]
    NotEnoughStops { line: String, stops: usize },

    #[error("Inconsistent vehicle state for line {line}: {reason}")]
    InvalidState { line: String, reason: String },

    #[error("Loop terminus {station} of line {line} does not resolve to a section")]
    UnresolvedLoop { line: String, station: String },
}

pub type Result<T> = std::result::Result<T, MapError>;
