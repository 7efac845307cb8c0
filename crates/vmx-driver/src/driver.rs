//! The driver contract consumed by provisioning layers.
//!
//! Every lifecycle operation is expressed on [`HypervisorDriver`]. Callers
//! hold an `Arc<dyn HypervisorDriver>` obtained from the
//! [`DriverRegistry`](crate::DriverRegistry) and pass it explicitly.

use crate::allocator::{Bus, DiskSlot};
use crate::context::OpContext;
use crate::credentials::{Credential, RunOptions};
use crate::disk::DiskAdapter;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How a clone's disks relate to the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloneMode {
    /// Independent copy of every disk
    Full,
    /// Copy-on-write delta against a template snapshot
    Linked,
}

impl CloneMode {
    /// Argument passed to `clone`.
    pub fn as_str(&self) -> &'static str {
        match self {
            CloneMode::Full => "full",
            CloneMode::Linked => "linked",
        }
    }
}

impl fmt::Display for CloneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network attachment for a new adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum NetworkKind {
    /// Bridged to the host's physical network
    Bridged,
    /// NAT through the host
    Nat,
    /// Host-only network
    HostOnly,
    /// A specific virtual switch, e.g. `vmnet3`
    Custom {
        /// Virtual switch name
        vnet: String,
    },
    /// A named private network (LAN segment), identified by a persisted PVN
    Private {
        /// Private network name
        name: String,
    },
}

/// Operations a hypervisor driver provides.
#[async_trait]
pub trait HypervisorDriver: Send + Sync {
    /// Registry identifier of this driver.
    fn id(&self) -> &'static str;

    /// Clone `template` (at `snapshot`) into a new VM at `target`.
    ///
    /// # Errors
    /// `DescriptorNotFound` if the template is missing, `DescriptorAlreadyExists`
    /// if the target exists (checked before the tool is invoked),
    /// `SnapshotNotFound` if the template has no such snapshot.
    async fn clone_vm(
        &self,
        ctx: &OpContext,
        template: &Path,
        target: &Path,
        snapshot: &str,
        mode: CloneMode,
    ) -> Result<()>;

    /// Power on.
    async fn start(&self, ctx: &OpContext, vmx: &Path, gui: bool) -> Result<()>;

    /// Power off; `force` pulls the plug instead of a guest shutdown.
    async fn stop(&self, ctx: &OpContext, vmx: &Path, force: bool) -> Result<()>;

    /// Reset; `force` is a hard reset instead of a guest reboot.
    async fn reset(&self, ctx: &OpContext, vmx: &Path, force: bool) -> Result<()>;

    /// Unregister and delete the VM, then remove its folder.
    async fn remove(&self, ctx: &OpContext, vmx: &Path) -> Result<()>;

    /// Descriptors of all running VMs.
    async fn list_running(&self, ctx: &OpContext) -> Result<Vec<PathBuf>>;

    /// Whether `vmx` is currently running.
    async fn is_running(&self, ctx: &OpContext, vmx: &Path) -> Result<bool>;

    /// Take a snapshot.
    async fn create_snapshot(&self, ctx: &OpContext, vmx: &Path, name: &str) -> Result<()>;

    /// Delete a snapshot.
    async fn remove_snapshot(&self, ctx: &OpContext, vmx: &Path, name: &str) -> Result<()>;

    /// Revert to a snapshot.
    async fn revert_to_snapshot(&self, ctx: &OpContext, vmx: &Path, name: &str) -> Result<()>;

    /// Snapshot names.
    async fn list_snapshots(&self, ctx: &OpContext, vmx: &Path) -> Result<Vec<String>>;

    /// Expand every disk beside the descriptor into a standalone image.
    async fn convert_to_full_disk(&self, ctx: &OpContext, vmx: &Path) -> Result<()>;

    /// Remove every CD-ROM device.
    async fn clear_cdrom(&self, ctx: &OpContext, vmx: &Path) -> Result<()>;

    /// Remove every network adapter.
    async fn clear_network_settings(&self, ctx: &OpContext, vmx: &Path) -> Result<()>;

    /// Remove every floppy device and leave `floppy0` explicitly absent.
    async fn clear_floppy(&self, ctx: &OpContext, vmx: &Path) -> Result<()>;

    /// Set vCPU count and/or memory size.
    async fn set_hardware(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        cpus: Option<u32>,
        memory_mb: Option<u64>,
    ) -> Result<()>;

    /// Add a network adapter, returning its `ethernet<N>` index.
    async fn add_network_adapter(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        kind: &NetworkKind,
    ) -> Result<u32>;

    /// Create and attach a new disk on `bus`.
    async fn add_disk(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        bus: Bus,
        size_mb: u64,
        adapter: DiskAdapter,
    ) -> Result<DiskSlot>;

    /// Attach an ISO image as a CD-ROM on `bus`.
    async fn attach_iso(&self, ctx: &OpContext, vmx: &Path, bus: Bus, iso: &Path)
        -> Result<DiskSlot>;

    /// Attach a floppy image, returning its `floppy<N>` index.
    async fn add_floppy(&self, ctx: &OpContext, vmx: &Path, image: &Path) -> Result<u32>;

    /// Turn shared folders on.
    async fn enable_shared_folders(&self, ctx: &OpContext, vmx: &Path) -> Result<()>;

    /// Turn shared folders off.
    async fn disable_shared_folders(&self, ctx: &OpContext, vmx: &Path) -> Result<()>;

    /// Share `host_path` with the guest as `name`.
    async fn add_shared_folder(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        name: &str,
        host_path: &Path,
    ) -> Result<()>;

    /// Stop sharing `name`.
    async fn remove_shared_folder(&self, ctx: &OpContext, vmx: &Path, name: &str) -> Result<()>;

    /// Whether a guest file exists.
    async fn guest_file_exists(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        path: &str,
        credentials: &[Credential],
    ) -> Result<bool>;

    /// Whether a guest directory exists.
    async fn guest_directory_exists(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        path: &str,
        credentials: &[Credential],
    ) -> Result<bool>;

    /// Run a program in the guest.
    async fn run_in_guest(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        program: &str,
        args: &[String],
        options: RunOptions,
        credentials: &[Credential],
    ) -> Result<String>;

    /// Copy a host file into the guest.
    async fn copy_to_guest(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        host_path: &Path,
        guest_path: &str,
        credentials: &[Credential],
    ) -> Result<()>;

    /// Copy a guest file to the host.
    async fn copy_from_guest(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        guest_path: &str,
        host_path: &Path,
        credentials: &[Credential],
    ) -> Result<()>;

    /// Create a guest directory.
    async fn create_guest_directory(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        path: &str,
        credentials: &[Credential],
    ) -> Result<()>;

    /// Delete a guest file.
    async fn delete_guest_file(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        path: &str,
        credentials: &[Credential],
    ) -> Result<()>;

    /// Delete a guest directory.
    async fn delete_guest_directory(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        path: &str,
        credentials: &[Credential],
    ) -> Result<()>;

    /// Block until guest tooling is ready or `timeout` elapses.
    async fn wait_for_guest_ready(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        timeout: Duration,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_kind_json() {
        let kind: NetworkKind = serde_json::from_str(r#"{"type":"private","name":"lab"}"#).unwrap();
        assert_eq!(kind, NetworkKind::Private { name: "lab".into() });

        let kind: NetworkKind = serde_json::from_str(r#"{"type":"hostonly"}"#).unwrap();
        assert_eq!(kind, NetworkKind::HostOnly);

        assert!(serde_json::from_str::<NetworkKind>(r#"{"type":"custom"}"#).is_err());
    }

    #[test]
    fn test_clone_mode_args() {
        assert_eq!(CloneMode::Full.to_string(), "full");
        assert_eq!(CloneMode::Linked.as_str(), "linked");
    }
}
