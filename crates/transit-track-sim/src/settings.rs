use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use transit_track_lib::SimulatorConfig;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Transit Track Sim - Animate a transit map snapshot and write frames as JSON lines
pub struct Settings {
    /// JSON snapshot with `stations` and `lines`
    #[clap(long)]
    pub snapshot: PathBuf,

    /// JSON mode table replacing the built-in vehicle modes
    #[clap(long)]
    pub modes: Option<PathBuf>,

    /// Number of frames to simulate
    #[clap(long, default_value_t = 600)]
    pub frames: u64,

    /// Frames per second of animation time
    #[clap(long, default_value_t = 60.0)]
    pub fps: f64,

    /// Seed for starting sections and directions
    #[clap(long, default_value_t = 0)]
    pub seed: u64,

    /// Track thickness in pixels, the spacing between parallel lines
    #[clap(long, default_value_t = 6.0)]
    pub track_thickness: f64,

    /// Omit per-vehicle debug fields
    #[clap(long)]
    pub performance_mode: bool,

    /// Where to write frames (stdout if absent)
    #[clap(long)]
    pub output: Option<PathBuf>,

    /// Chrome trace output when built with profiling
    #[cfg(feature = "profiling")]
    #[clap(long)]
    pub trace_file: Option<PathBuf>,
}

impl Settings {
    /// Simulator configuration for these settings
    pub fn simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            track_thickness: self.track_thickness,
            seed: self.seed,
            performance_mode: self.performance_mode,
            ..SimulatorConfig::default()
        }
    }

    /// Animation time between two frames
    pub fn frame_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.fps).unwrap_or(Duration::from_millis(16))
    }
}
