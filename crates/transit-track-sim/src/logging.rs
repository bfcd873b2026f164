/*!
Logging and profiling setup for the driver.

Two implementations share one API:

- real: compiled with `feature = "profiling"`. Adds a tracing-chrome layer
  writing a trace file that is flushed when the returned guard drops.
- stub: formatted logging only.
*/

/// Default filter when RUST_LOG is unset
fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "debug,transit_track_lib=debug"
    } else {
        "info"
    }
}

/// Set RUST_LOG to a helpful default when the user did not
fn ensure_rust_log() {
    if std::env::var("RUST_LOG").is_err() {
        // Safety: single-threaded at startup
        unsafe {
            std::env::set_var("RUST_LOG", default_filter());
        }
    }
}

#[cfg(feature = "profiling")]
mod inner {
    use std::path::Path;

    use tracing_chrome::{ChromeLayerBuilder, FlushGuard};
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    /// Flushes the trace file on drop
    pub struct LoggingGuard {
        _flush: Option<FlushGuard>,
    }

    pub fn setup_logging(trace_file: Option<&Path>) -> LoggingGuard {
        super::ensure_rust_log();

        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(EnvFilter::from_default_env());

        let (chrome_layer, flush) = match trace_file {
            Some(path) => {
                let (layer, guard) = ChromeLayerBuilder::new().file(path).build();
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(chrome_layer)
            .with(fmt_layer)
            .init();

        if let Some(path) = trace_file {
            tracing::info!("Writing chrome trace to {}", path.display());
        }
        LoggingGuard { _flush: flush }
    }
}

#[cfg(not(feature = "profiling"))]
mod inner {
    use std::path::Path;

    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    pub struct LoggingGuard;

    pub fn setup_logging(trace_file: Option<&Path>) -> LoggingGuard {
        super::ensure_rust_log();

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(EnvFilter::from_default_env()),
            )
            .init();

        if trace_file.is_some() {
            tracing::warn!("Built without profiling, ignoring the trace file");
        }
        LoggingGuard
    }
}

pub use inner::{LoggingGuard, setup_logging};
