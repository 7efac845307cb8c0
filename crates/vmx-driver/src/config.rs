//! Driver configuration.
//!
//! Configuration is plain data: tool locations, the host product flavour and
//! the retry budgets. It is loaded from environment variables with sensible
//! defaults and passed to the driver explicitly.

use crate::error::{DriverError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Host product flavour, passed to the control tool as `-T <type>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostType {
    /// Workstation
    #[default]
    Ws,
    /// Fusion
    Fusion,
    /// Player
    Player,
}

impl HostType {
    /// Parse from string (case-insensitive), falling back to Workstation.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "fusion" => Self::Fusion,
            "player" => Self::Player,
            _ => Self::Ws,
        }
    }

    /// The value passed after `-T`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ws => "ws",
            Self::Fusion => "fusion",
            Self::Player => "player",
        }
    }
}

/// Attempt cap and delay for one retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Sleep between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Retry budget for the "tools not running" sentinel: 20 attempts, 5 s apart.
    pub const TOOLS_NOT_RUNNING: RetryPolicy = RetryPolicy {
        max_attempts: 20,
        delay: Duration::from_secs(5),
    };

    /// Retry budget for the generic `Error: Unknown error` sentinel: 5 attempts, 1 s apart.
    pub const UNKNOWN_ERROR: RetryPolicy = RetryPolicy {
        max_attempts: 5,
        delay: Duration::from_secs(1),
    };
}

/// Configuration for the vmrun-backed driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Path to the control tool (`vmrun`).
    pub vmrun_path: PathBuf,
    /// Path to the disk-management tool (`vmware-vdiskmanager`).
    pub vdiskmanager_path: PathBuf,
    /// Host product flavour.
    pub host_type: HostType,
    /// JSON file caching PVN identifiers per private network name.
    pub pvn_store_path: PathBuf,
    /// Upper bound for a single control tool invocation (None = wait for exit).
    pub tool_timeout: Option<Duration>,
    /// Retry budget for the tools-not-running sentinel.
    pub tools_retry: RetryPolicy,
    /// Retry budget for the unknown-error sentinel around guest commands.
    pub unknown_error_retry: RetryPolicy,
    /// Poll interval used while waiting for guest tooling.
    pub readiness_poll_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::workstation()
    }
}

impl DriverConfig {
    /// Defaults for a Linux/Windows Workstation install.
    pub fn workstation() -> Self {
        Self {
            vmrun_path: PathBuf::from("/usr/bin/vmrun"),
            vdiskmanager_path: PathBuf::from("/usr/bin/vmware-vdiskmanager"),
            host_type: HostType::Ws,
            pvn_store_path: default_pvn_store(),
            tool_timeout: None,
            tools_retry: RetryPolicy::TOOLS_NOT_RUNNING,
            unknown_error_retry: RetryPolicy::UNKNOWN_ERROR,
            readiness_poll_interval: Duration::from_secs(1),
        }
    }

    /// Defaults for a macOS Fusion install.
    pub fn fusion() -> Self {
        let library = PathBuf::from("/Applications/VMware Fusion.app/Contents/Library");
        Self {
            vmrun_path: library.join("vmrun"),
            vdiskmanager_path: library.join("vmware-vdiskmanager"),
            host_type: HostType::Fusion,
            ..Self::workstation()
        }
    }

    /// Load configuration from environment variables on top of `base`.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `VMX_VMRUN` | `/usr/bin/vmrun` |
    /// | `VMX_VDISKMANAGER` | `/usr/bin/vmware-vdiskmanager` |
    /// | `VMX_HOST_TYPE` | `ws` (ws, fusion, player) |
    /// | `VMX_PVN_STORE` | `$HOME/.vmx/pvn.json` |
    /// | `VMX_TOOL_TIMEOUT_SECS` | unset (wait for exit) |
    pub fn from_env_with(base: Self) -> Self {
        Self {
            vmrun_path: std::env::var("VMX_VMRUN")
                .map(PathBuf::from)
                .unwrap_or(base.vmrun_path),
            vdiskmanager_path: std::env::var("VMX_VDISKMANAGER")
                .map(PathBuf::from)
                .unwrap_or(base.vdiskmanager_path),
            host_type: std::env::var("VMX_HOST_TYPE")
                .map(|v| HostType::parse(&v))
                .unwrap_or(base.host_type),
            pvn_store_path: std::env::var("VMX_PVN_STORE")
                .map(PathBuf::from)
                .unwrap_or(base.pvn_store_path),
            tool_timeout: std::env::var("VMX_TOOL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .or(base.tool_timeout),
            ..base
        }
    }

    /// Load configuration from environment variables over Workstation defaults.
    pub fn from_env() -> Self {
        Self::from_env_with(Self::workstation())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.vmrun_path.as_os_str().is_empty() {
            return Err(DriverError::Config("vmrun_path is required".into()));
        }
        if self.tools_retry.max_attempts == 0 {
            return Err(DriverError::Config(
                "tools_retry.max_attempts must be > 0".into(),
            ));
        }
        if self.unknown_error_retry.max_attempts == 0 {
            return Err(DriverError::Config(
                "unknown_error_retry.max_attempts must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Log warnings for tool paths that do not exist (development hosts).
    pub fn validate_warn(&self) {
        if !self.vmrun_path.exists() {
            tracing::warn!(path = %self.vmrun_path.display(), "vmrun not found");
        }
        if !self.vdiskmanager_path.exists() {
            tracing::warn!(
                path = %self.vdiskmanager_path.display(),
                "vmware-vdiskmanager not found; disk operations will fail"
            );
        }
    }
}

fn default_pvn_store() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir())
        .join(".vmx")
        .join("pvn.json")
}
