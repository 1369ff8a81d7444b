//! Logging setup for the command-line tool
//!
//! The library only emits `tracing` events; the binary installs the
//! subscriber once at startup. `RUST_LOG` takes precedence over the
//! built-in filter, e.g. `RUST_LOG=dump_carver::recovery=trace`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber
///
/// `info` by default, `debug` for this crate when `verbose` is set.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("dump_carver=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(verbose)
            .with_thread_ids(false)
            .with_writer(std::io::stderr)
            .compact(),
    );

    // already set, e.g. by a test harness
    let _ = tracing::subscriber::set_global_default(subscriber);
}
