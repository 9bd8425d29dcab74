//! Diagnostic logging to stderr. Reports go to stdout, logs never do.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the verbosity flag.
pub const LOG_ENV: &str = "CLOUDGEN_LOG";

/// Filter directive for a `-v` count.
pub fn directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "cloudgen=warn",
        1 => "cloudgen=info",
        2 => "cloudgen=debug",
        _ => "cloudgen=trace",
    }
}

/// Install the global subscriber. `CLOUDGEN_LOG` wins over `verbose`.
/// A second call is a no-op.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(directive(verbose)));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
