//! Structured logging setup for the `paysession` binary.
//!
//! Events go to stderr so stdout stays reserved for session summaries.
//! `RUST_LOG` takes precedence over the verbosity flag.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// # Arguments
/// * `verbose` - Enables debug-level events from this crate.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("paysession=debug,warn")
            } else {
                EnvFilter::try_new("paysession=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_thread_ids(false)
                .with_line_number(false)
                .with_file(false)
                .compact(),
        )
        .try_init()?;

    Ok(())
}
