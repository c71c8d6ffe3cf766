//! Logging setup
//!
//! One process-wide fmt subscriber. The host passes the filter from its
//! config file; `RUST_LOG` always wins so a dongle session can be re-traced
//! (e.g. `RUST_LOG=driver=trace,protocol=debug`) without editing the config.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn parse_filter(directives: &str) -> crate::Result<EnvFilter> {
    EnvFilter::try_new(directives)
        .map_err(|err| crate::Error::Config(format!("invalid log filter {directives:?}: {err}")))
}

/// Install the global tracing subscriber
///
/// Call once at startup, before the driver spawns its worker threads.
pub fn setup_logging(default_filter: &str) -> crate::Result<()> {
    let directives = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(env) => env,
        Err(_) => default_filter.to_string(),
    };
    tracing_subscriber::registry()
        .with(parse_filter(&directives)?)
        .with(fmt::layer().with_target(true))
        .init();
    Ok(())
}
