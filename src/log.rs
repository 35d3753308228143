// Logging initialization for embedding applications
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Routes crate logs to stderr. Quiet by default so the embedding UI owns
/// the terminal; `RUST_LOG` overrides the verbose flag when set.
pub fn init_logging(verbose: bool) {
    let default_directive = if verbose { "cambist=debug" } else { "off" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
