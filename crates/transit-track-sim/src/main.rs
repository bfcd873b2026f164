//! Transit Track Sim - headless driver for transit-track-lib

mod logging;
mod run;
mod settings;

use clap::Parser;
use settings::Settings;

fn main() {
    let settings = Settings::parse();

    #[cfg(feature = "profiling")]
    let _logging = logging::setup_logging(settings.trace_file.as_deref());
    #[cfg(not(feature = "profiling"))]
    let _logging = logging::setup_logging(None);

    if let Err(err) = run::run(&settings) {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}
