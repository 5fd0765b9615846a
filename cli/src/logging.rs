// Logging for the docflow binary, powered by tracing-subscriber.
//
// docflow-link logs through the `log` facade. `try_init` installs the
// tracing-log bridge (the subscriber's default `tracing-log` feature), so
// those records reach the subscriber installed here.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::{CLIError, Result};

/// Default directives: the base level plus quiet defaults for chatty
/// dependencies.
pub fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    let mut directives = vec![level.to_string()];

    let noisy: &[(&str, &str)] = &[
        ("tungstenite", "warn"),
        ("tokio_tungstenite", "warn"),
        ("hyper", "warn"),
        ("hyper_util", "warn"),
        ("reqwest", "warn"),
        ("rustls", "warn"),
    ];
    for (target, lvl) in noisy {
        directives.push(format!("{}={}", target, lvl));
    }

    directives.join(",")
}

/// `RUST_LOG`, when set, replaces the default directives.
pub fn build_env_filter(verbose: bool) -> Result<EnvFilter> {
    if let Ok(from_env) = EnvFilter::try_from_default_env() {
        return Ok(from_env);
    }

    let filter_str = default_directives(verbose);
    EnvFilter::try_new(&filter_str).map_err(|e| {
        CLIError::ConfigurationError(format!("Invalid tracing filter '{}': {}", filter_str, e))
    })
}

/// Install the global subscriber. Logs go to stderr so they never interleave
/// with notification output on stdout.
pub fn init_logging(verbose: bool, color: bool) -> Result<()> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(color)
        .with_target(verbose)
        .compact()
        .with_filter(build_env_filter(verbose)?);

    tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .map_err(|e| CLIError::ConfigurationError(format!("Failed to init logging: {}", e)))
}
