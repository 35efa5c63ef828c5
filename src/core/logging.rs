//! Diagnostic logging setup
//!
//! User-facing output stays on stdout via `println!`. Diagnostics go through
//! `tracing` to stderr, filtered by `RELFIN_LOG` when set, otherwise by the
//! `-v` count given on the command line.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an explicit filter directive
pub const LOG_ENV: &str = "RELFIN_LOG";

static INIT_ONCE: Once = Once::new();

/// Map the `-v` count onto a default filter directive
pub fn default_directive(verbosity: u8) -> &'static str {
  match verbosity {
    0 => "warn",
    1 => "info",
    _ => "debug",
  }
}

/// Initialize the tracing subscriber once per process
pub fn init(verbosity: u8) {
  INIT_ONCE.call_once(|| {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .with_target(false)
      .init();
  });
}
