pub mod config;
pub mod disposition;
pub mod input;
pub mod models;
pub mod pipeline;
pub mod review;
pub mod session;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over the built-in filter;
/// a second call is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
