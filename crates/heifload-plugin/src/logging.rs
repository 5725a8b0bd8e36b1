//! Log subscriber for the plugin process.
//!
//! The host owns stdout, so everything goes to stderr. Only the heifload
//! crates log by default. `RUST_LOG` replaces the whole filter.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("warn,heifload_core={level},heifload_plugin={level}")
}

/// Install the global subscriber, as JSON lines when `json_format` is set.
///
/// Returns false when a subscriber was already installed, which happens when
/// the host starts the plugin more than once in one process.
pub fn init(verbose: bool, json_format: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()
            .is_ok()
    }
}
