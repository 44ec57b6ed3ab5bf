//! Console logging for the `inspectkit` binary.
//!
//! stdout carries command output; all log events go to stderr.

use std::io::IsTerminal;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Crates whose events the default filter lets through.
const TUP_LOG_TARGETS: [&str; 5] = [
    "inspectkit",
    "inspectkit_cli",
    "inspectkit_core",
    "inspectkit_io_xlsx",
    "inspectkit_io_fs",
];

/// Level name for `-q` / `-v` flags.
pub fn derive_log_level(verbose: u8, if_quiet: bool) -> &'static str {
    if if_quiet {
        return "error";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Default directive string: our crates at `level`, everything else at warn.
pub fn derive_log_filter(level: &str) -> String {
    let mut l_directives = vec!["warn".to_string()];
    l_directives.extend(TUP_LOG_TARGETS.iter().map(|c_target| format!("{c_target}={level}")));
    l_directives.join(",")
}

/// Install the global subscriber. `RUST_LOG` overrides the flags.
///
/// Calling it twice keeps the first subscriber.
pub fn init_logging(verbose: u8, if_quiet: bool, if_no_color: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(derive_log_filter(derive_log_level(verbose, if_quiet))));

    let use_ansi = !if_no_color && std::io::stderr().is_terminal();
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(use_ansi);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
