//! Logging setup shared by every host of the engine.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Configuration for the tracing subscriber. `RUST_LOG` always wins over
/// whatever is configured here.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "saucier_engine" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
        }
    }
}

/// Build the env-filter directive string for a config.
pub fn directive_string(config: &TelemetryConfig) -> String {
    let mut directives = vec![config.log_level.to_string().to_lowercase()];
    for (module, level) in &config.module_levels {
        directives.push(format!("{module}={}", level.to_string().to_lowercase()));
    }
    directives.join(",")
}

/// Install the global fmt subscriber. Call once at process start.
pub fn init(config: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive_string(config)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
