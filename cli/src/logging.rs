//! Diagnostic logging to stderr via `tracing`.
//!
//! `RUST_LOG` wins when set; otherwise `-v` raises this crate to `info`
//! (every executed command) and `-vv` to `debug` (SSH invocations).

use tracing_subscriber::EnvFilter;

/// Filter directive for a given `-v` count.
#[must_use]
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "warn,inbizio_deploy=info",
        _ => "warn,inbizio_deploy=debug",
    }
}

/// Install the global subscriber. Safe to call once per process.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
