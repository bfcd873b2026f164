//! Snapshot loading and the frame loop

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use transit_track_lib::{
    ChangeSet, MapError, MapSnapshot, ModeTable, RawSnapshot, Simulator, SimulatorConfig,
    TrackFeature, VehicleFeature,
};

use crate::settings::Settings;

/// Error types for the driver
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Map(#[from] MapError),
}

pub type Result<T> = std::result::Result<T, SimError>;

/// One JSON line of output
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Record<'a> {
    /// Written before the first frame and whenever geometry changes
    Geometry {
        revision: u64,
        tracks: &'a [TrackFeature],
        segments: &'a [TrackFeature],
    },
    Frame {
        index: u64,
        timestamp_ms: u64,
        vehicles: &'a [VehicleFeature],
        layers: &'a [u64],
    },
}

/// Decode a JSON snapshot
pub fn parse_snapshot(json: &str) -> Result<MapSnapshot> {
    let raw: RawSnapshot = serde_json::from_str(json)?;
    Ok(MapSnapshot::from_raw(raw)?)
}

pub fn load_snapshot(path: &Path) -> Result<MapSnapshot> {
    let json = std::fs::read_to_string(path)?;
    parse_snapshot(&json)
}

pub fn load_modes(path: &Path) -> Result<ModeTable> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Simulate `frames` ticks `interval` apart, writing JSON lines to `out`
///
/// # Returns
/// Number of vehicle features written over all frames
pub fn simulate<W: Write>(
    snapshot: &MapSnapshot,
    config: SimulatorConfig,
    frames: u64,
    interval: Duration,
    out: &mut W,
) -> Result<usize> {
    let mut simulator = Simulator::new(config);
    let changed = simulator.recompute(snapshot, &ChangeSet::full());
    tracing::info!("Built {} interline segments", changed.len());

    let mut written_revision = None;
    let mut vehicle_count = 0;

    for index in 0..frames {
        let now = interval.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
        let frame = simulator.tick(snapshot, now);

        if written_revision != Some(frame.revision) {
            let record = Record::Geometry {
                revision: frame.revision,
                tracks: frame.tracks,
                segments: frame.segments,
            };
            serde_json::to_writer(&mut *out, &record)?;
            out.write_all(b"\n")?;
            written_revision = Some(frame.revision);
        }

        let record = Record::Frame {
            index,
            timestamp_ms: u64::try_from(frame.timestamp.as_millis()).unwrap_or(u64::MAX),
            vehicles: &frame.vehicles,
            layers: &frame.layers,
        };
        serde_json::to_writer(&mut *out, &record)?;
        out.write_all(b"\n")?;
        vehicle_count += frame.vehicles.len();
    }

    out.flush()?;
    Ok(vehicle_count)
}

/// Run the driver for parsed settings
pub fn run(settings: &Settings) -> Result<()> {
    let snapshot = load_snapshot(&settings.snapshot)?;
    let info = snapshot.info();
    tracing::info!(
        "Loaded {} stations ({} waypoints) and {} lines, centred at {:?}",
        info.station_count,
        info.waypoint_count,
        info.line_count,
        info.center()
    );

    let mut config = settings.simulator_config();
    if let Some(path) = &settings.modes {
        config.modes = load_modes(path)?;
    }

    let vehicles = match &settings.output {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            simulate(&snapshot, config, settings.frames, settings.frame_interval(), &mut out)?
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            simulate(&snapshot, config, settings.frames, settings.frame_interval(), &mut out)?
        }
    };

    tracing::info!(
        "Wrote {} frames with {} vehicle positions",
        settings.frames,
        vehicles
    );
    Ok(())
}
