//! Diagnostic logging for the engine.
//!
//! Events go to stderr so they never mix with command output. The filter comes from
//! `CMDKIT_LOG` (standard `EnvFilter` directives) and otherwise from the verbosity count.

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "CMDKIT_LOG";

/// Maps `-v` repetitions to a default directive.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "cmdkit=warn",
        1 => "cmdkit=debug",
        _ => "cmdkit=trace",
    }
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
