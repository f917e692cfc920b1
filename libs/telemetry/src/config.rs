use std::env;

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub json_logs: bool,
    /// Filter used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
    /// Keeps stdout free for command output.
    pub log_to_stderr: bool,
}

impl TelemetryConfig {
    pub fn from_env(default_service_name: &str) -> Self {
        Self::from_lookup(default_service_name, |key| env::var(key).ok())
    }

    pub fn from_lookup<F>(default_service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let service_name =
            lookup("SERVICE_NAME").unwrap_or_else(|| default_service_name.to_string());
        let json_logs = lookup("LOG_FORMAT")
            .map(|v| !matches!(v.to_lowercase().as_str(), "text" | "pretty" | "plain"))
            .unwrap_or(true);
        Self {
            service_name,
            json_logs,
            default_filter: DEFAULT_FILTER.into(),
            log_to_stderr: false,
        }
    }
}
