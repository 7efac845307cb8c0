//! Static registry of hypervisor drivers.
//!
//! Drivers are compiled in. Each entry carries an availability probe; the
//! first entry whose probe accepts the configuration is built.

use crate::builder::DriverBuilder;
use crate::config::{DriverConfig, HostType};
use crate::driver::HypervisorDriver;
use crate::error::{DriverError, Result};
use std::sync::Arc;

/// Identifier of the Workstation/Player driver.
pub const WORKSTATION: &str = "vmware-workstation";
/// Identifier of the Fusion driver.
pub const FUSION: &str = "vmware-fusion";

/// Whether a driver can run with a given configuration.
pub type ProbeFn = fn(&DriverConfig) -> bool;
/// Construct a driver from a configuration.
pub type BuildFn = fn(DriverConfig) -> Result<Arc<dyn HypervisorDriver>>;

/// One registered driver.
#[derive(Debug, Clone, Copy)]
pub struct DriverEntry {
    /// Stable identifier
    pub id: &'static str,
    /// Availability probe
    pub probe: ProbeFn,
    /// Constructor
    pub build: BuildFn,
}

/// Ordered set of drivers.
#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
    entries: Vec<DriverEntry>,
}

impl DriverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The drivers shipped with this crate, in preference order.
    pub fn builtin() -> Self {
        Self::new()
            .register(DriverEntry {
                id: WORKSTATION,
                probe: |config| config.host_type != HostType::Fusion && config.vmrun_path.is_file(),
                build: |config| build_vmrun(WORKSTATION, config),
            })
            .register(DriverEntry {
                id: FUSION,
                probe: |config| config.host_type == HostType::Fusion && config.vmrun_path.is_file(),
                build: |config| build_vmrun(FUSION, config),
            })
    }

    /// Append an entry.
    pub fn register(mut self, entry: DriverEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Registered identifiers, in preference order.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.id)
    }

    /// Look up an entry by identifier.
    pub fn get(&self, id: &str) -> Option<&DriverEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Build the first driver whose probe accepts `config`.
    ///
    /// # Errors
    /// `NoDriverAvailable` if no probe accepts; `Config` if the chosen driver
    /// rejects the configuration.
    pub fn select(&self, config: &DriverConfig) -> Result<Arc<dyn HypervisorDriver>> {
        for entry in &self.entries {
            if (entry.probe)(config) {
                tracing::info!(driver = entry.id, "Selected hypervisor driver");
                return (entry.build)(config.clone());
            }
            tracing::debug!(driver = entry.id, "Driver not available");
        }
        Err(DriverError::NoDriverAvailable)
    }
}

fn build_vmrun(id: &'static str, config: DriverConfig) -> Result<Arc<dyn HypervisorDriver>> {
    let driver = DriverBuilder::from_config(config).id(id).build()?;
    Ok(Arc::new(driver))
}
