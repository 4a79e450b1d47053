//! `tracing` subscriber for the CLI. Logs go to stderr so stdout stays
//! machine-readable.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "brms=info,warn";

pub(crate) fn init(json: bool, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if quiet { "error" } else { DEFAULT_FILTER })
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    // A second init (e.g. from tests) is harmless.
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}
