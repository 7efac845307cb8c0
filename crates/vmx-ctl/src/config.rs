//! Configuration for the request runner.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use std::time::Duration;
use vmx_driver::{DriverConfig, HostType};

/// Maximum size of a single JSON request in bytes (1 MB).
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Configuration for vmx-ctl.
#[derive(Debug, Clone, Default)]
pub struct CtlConfig {
    /// Driver configuration (tool paths, host type, retry budgets).
    pub driver: DriverConfig,

    /// Deadline applied to each request. `None` means no deadline.
    pub op_timeout: Option<Duration>,
}

impl CtlConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `VMX_HOST_TYPE` | `ws`; `fusion` switches to Fusion tool paths |
    /// | `VMX_VMRUN`, `VMX_VDISKMANAGER`, `VMX_PVN_STORE`, `VMX_TOOL_TIMEOUT_SECS` | see `DriverConfig::from_env_with` |
    /// | `VMX_OP_TIMEOUT_SECS` | unset (no deadline) |
    pub fn from_env() -> Self {
        let base = match std::env::var("VMX_HOST_TYPE").map(|v| HostType::parse(&v)) {
            Ok(HostType::Fusion) => DriverConfig::fusion(),
            _ => DriverConfig::workstation(),
        };
        Self {
            driver: DriverConfig::from_env_with(base),
            op_timeout: std::env::var("VMX_OP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),
        }
    }

    /// Log warnings for missing tools (development hosts).
    pub fn validate_warn(&self) {
        self.driver.validate_warn();
        if self.op_timeout == Some(Duration::ZERO) {
            tracing::warn!("VMX_OP_TIMEOUT_SECS is 0; every request will hit its deadline");
        }
    }
}
