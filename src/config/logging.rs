use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// LoggingConfig controls how we initialize tracing/logging.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String, // e.g. "debug" (default), "info", "warn"
    #[serde(default = "default_format")]
    pub format: String, // "line" or "json"
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_level() -> String {
    "debug".to_string()
}

fn default_format() -> String {
    "line".to_string()
}

fn default_service_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_level(),
            format: default_format(),
            service_name: default_service_name(),
        }
    }
}
