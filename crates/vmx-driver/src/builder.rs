//! Builder pattern for ergonomic VmrunDriver configuration.

use crate::config::{DriverConfig, HostType, RetryPolicy};
use crate::error::Result;
use crate::executor::{ProcessRunner, ToolRunner};
use crate::readiness::GuestAutomation;
use crate::vmrun::VmrunDriver;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Fluent builder for configuring and creating [`VmrunDriver`] instances.
///
/// # Example
///
/// ```no_run
/// use vmx_driver::{DriverBuilder, HostType};
///
/// # fn example() -> vmx_driver::Result<()> {
/// let driver = DriverBuilder::new()
///     .host_type(HostType::Ws)
///     .vmrun("/usr/bin/vmrun")
///     .pvn_store("/var/lib/vmx/pvn.json")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DriverBuilder {
    id: &'static str,
    config: DriverConfig,
    runner: Option<Arc<dyn ToolRunner>>,
    automation: Option<Arc<dyn GuestAutomation>>,
}

impl std::fmt::Debug for DriverBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverBuilder")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("custom_runner", &self.runner.is_some())
            .field("custom_automation", &self.automation.is_some())
            .finish()
    }
}

impl Default for DriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverBuilder {
    /// Create a new builder with Workstation defaults.
    pub fn new() -> Self {
        Self {
            id: crate::registry::WORKSTATION,
            config: DriverConfig::workstation(),
            runner: None,
            automation: None,
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: DriverConfig) -> Self {
        Self {
            config,
            ..Self::new()
        }
    }

    /// Set the registry identifier reported by the driver.
    pub fn id(mut self, id: &'static str) -> Self {
        self.id = id;
        self
    }

    /// Set the path to `vmrun`.
    pub fn vmrun(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.vmrun_path = path.into();
        self
    }

    /// Set the path to `vmware-vdiskmanager`.
    pub fn vdiskmanager(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.vdiskmanager_path = path.into();
        self
    }

    /// Set the host product flavour.
    pub fn host_type(mut self, host_type: HostType) -> Self {
        self.config.host_type = host_type;
        self
    }

    /// Set the PVN identifier store.
    pub fn pvn_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pvn_store_path = path.into();
        self
    }

    /// Bound every tool invocation.
    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.config.tool_timeout = Some(timeout);
        self
    }

    /// Override the tools-not-running retry budget.
    pub fn tools_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.tools_retry = policy;
        self
    }

    /// Override the unknown-error retry budget for guest commands.
    pub fn unknown_error_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.unknown_error_retry = policy;
        self
    }

    /// Set the poll interval used while waiting for guest tooling.
    pub fn readiness_poll_interval(mut self, interval: Duration) -> Self {
        self.config.readiness_poll_interval = interval;
        self
    }

    /// Spawn tools through `runner` instead of real processes.
    pub fn runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Wait for guest readiness through `automation`.
    pub fn automation(mut self, automation: Arc<dyn GuestAutomation>) -> Self {
        self.automation = Some(automation);
        self
    }

    /// Get the current configuration (for inspection).
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Validate the configuration and build the driver.
    pub fn build(self) -> Result<VmrunDriver> {
        self.config.validate()?;
        let runner = self
            .runner
            .unwrap_or_else(|| Arc::new(ProcessRunner) as Arc<dyn ToolRunner>);
        Ok(VmrunDriver::from_parts(
            self.id,
            self.config,
            runner,
            self.automation,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::HypervisorDriver;
    use crate::error::DriverError;

    #[test]
    fn test_builder_defaults() {
        let builder = DriverBuilder::new();
        assert_eq!(builder.config().host_type, HostType::Ws);
        assert_eq!(builder.config().tools_retry, RetryPolicy::TOOLS_NOT_RUNNING);
    }

    #[test]
    fn test_builder_chain() {
        let builder = DriverBuilder::new()
            .vmrun("/opt/vmrun")
            .host_type(HostType::Player)
            .tool_timeout(Duration::from_secs(30));
        assert_eq!(builder.config().vmrun_path, PathBuf::from("/opt/vmrun"));
        assert_eq!(builder.config().host_type, HostType::Player);
        assert_eq!(builder.config().tool_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_build_reports_id() {
        let driver = DriverBuilder::new().id("custom").build().unwrap();
        assert_eq!(driver.id(), "custom");
    }

    #[test]
    fn test_build_validates() {
        let result = DriverBuilder::new()
            .tools_retry(RetryPolicy {
                max_attempts: 0,
                delay: Duration::ZERO,
            })
            .build();
        assert!(matches!(result, Err(DriverError::Config(_))));
    }
}
