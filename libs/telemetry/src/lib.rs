//! Logging setup shared by the civic messaging binaries.

use anyhow::Result;

mod config;
mod tracing_init;

pub use config::TelemetryConfig;
pub use tracing_init::init_tracing;

/// Installs the process-wide subscriber configured from `RUST_LOG` and
/// `LOG_FORMAT`. Later calls are no-ops.
pub fn install(service_name: &str) -> Result<()> {
    init_tracing(&TelemetryConfig::from_env(service_name))
}
