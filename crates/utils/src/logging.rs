//! Tracing setup shared by the binaries.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_DIRECTIVES: &str = "info";

/// Install the global subscriber. `RUST_LOG` wins over `default_directives`.
///
/// Calling this twice is harmless; the second install is ignored.
pub fn init(default_directives: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives.unwrap_or(DEFAULT_DIRECTIVES)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}
