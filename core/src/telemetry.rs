// Logging setup
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Initialize the global tracing subscriber
///
/// Sets up:
/// - Compact fmt layer on stderr with subsystem targets (`session`, `transport`,
///   `llm_client`, `dashboard`, `config`)
/// - `EnvFilter` from `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`]
///
/// Calling it more than once is harmless; only the first call installs a subscriber.
/// Returns `false` when a subscriber was already installed.
///
/// # Example
///
/// ```no_run
/// maintwatch_core::telemetry::init_logging();
/// tracing::info!(target: "session", "ready");
/// ```
pub fn init_logging() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}
