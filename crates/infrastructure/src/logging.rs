use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ConfigError, LogFormat, LogLevel};

/// Client-library targets capped at `warn` unless `RUST_LOG` says otherwise.
/// The watch streams and the control socket are chatty at debug.
const QUIET_TARGETS: &[&str] = &["kube_client", "kube_runtime", "hyper", "hyper_util", "tower", "rustls"];

/// Filter for `level`, with the client libraries held at `warn`.
pub fn default_filter(level: LogLevel) -> EnvFilter {
    let mut directives = vec![level.as_str().to_string()];
    if !matches!(level, LogLevel::Error | LogLevel::Warn) {
        directives.extend(QUIET_TARGETS.iter().map(|t| format!("{t}=warn")));
    }
    EnvFilter::new(directives.join(","))
}

/// Install the global subscriber writing to stdout.
///
/// `RUST_LOG` replaces the level-derived filter entirely. JSON output is
/// flattened and carries the enclosing span so the `service` root span
/// fields land on every line.
pub fn init_logging(level: LogLevel, format: LogFormat) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_ansi(false),
            )
            .try_init(),
        LogFormat::Text => registry.with(fmt::layer().compact().with_ansi(true)).try_init(),
    };

    installed.map_err(|e| ConfigError::Validation {
        field: "agent.log_format".to_string(),
        message: format!("logging already initialized: {e}"),
    })
}
