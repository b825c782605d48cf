use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable compact output.
    Human,
    /// Structured JSON, one object per line (for boot logs collected by the host).
    Json,
}

/// Initialize the global tracing subscriber.
///
/// Call once at program startup. Respects `RUST_LOG`.
/// Default filter: `guestinfo=info,warn`. Logs go to stderr so stdout
/// carries only command output.
pub fn init(format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("guestinfo=info,warn"));

    match format {
        LogFormat::Human => {
            let subscriber = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .compact();
            tracing_subscriber::registry()
                .with(env_filter)
                .with(subscriber)
                .init();
        }
        LogFormat::Json => {
            let subscriber = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(subscriber)
                .init();
        }
    }
}
