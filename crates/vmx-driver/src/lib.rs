//! # vmx-driver
//!
//! Hypervisor driver layer for VMware Workstation, Player and Fusion.
//! Edits `.vmx` descriptors directly and shells out to `vmrun` and
//! `vmware-vdiskmanager` for everything else.
//!
//! ## Quick Start
//!
//! ```no_run
//! use vmx_driver::{CloneMode, DriverConfig, DriverRegistry, HypervisorDriver, OpContext};
//! use std::path::Path;
//!
//! # async fn example() -> vmx_driver::Result<()> {
//! let driver = DriverRegistry::builtin().select(&DriverConfig::from_env())?;
//! let ctx = OpContext::new();
//!
//! let vmx = Path::new("/vms/web/web/web.vmx");
//! driver
//!     .clone_vm(&ctx, Path::new("/templates/base/base.vmx"), vmx, "clean", CloneMode::Linked)
//!     .await?;
//! driver.clear_cdrom(&ctx, vmx).await?;
//! driver.start(&ctx, vmx, false).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Descriptor Store**: line-preserving `key = "value"` edits
//! - **Slot Allocation**: NIC, floppy and disk identifiers from descriptor scans
//! - **Command Execution**: `vmrun` invocation with the tools-not-running retry
//! - **Credential Broker**: ordered guest logins with deterministic failures
//! - **Lifecycle**: clone, power, snapshots, disks, network, shared folders
//! - **Guest Readiness**: scoped sessions released on every exit path

mod allocator;
mod builder;
mod classifier;
mod config;
mod context;
mod credentials;
mod descriptor;
mod disk;
mod driver;
mod error;
mod executor;
mod pvn;
mod readiness;
mod registry;
mod request;
mod vmrun;

pub use allocator::{
    free_disk_slot, free_disk_slot_named, free_floppy_id, free_nic_id, Bus, DiskSlot,
};
pub use builder::DriverBuilder;
pub use classifier::{classify, strip_summary, CommandOutcome, Outcome};
pub use config::{DriverConfig, HostType, RetryPolicy};
pub use context::OpContext;
pub use credentials::{Credential, CredentialBroker, RunOptions};
pub use descriptor::{check_setting, setting_line, Descriptor, Lines, LINE_ENDING};
pub use disk::{DiskAdapter, DiskManager};
pub use driver::{CloneMode, HypervisorDriver, NetworkKind};
pub use error::{DriverError, Result};
pub use executor::{CommandExecutor, ProcessRunner, ToolCommand, ToolRunner, TOOLS_NOT_RUNNING};
pub use pvn::{generate_pvn_id, PvnStore};
pub use readiness::{
    wait_for_guest_ready, GuestAutomation, GuestSession, ScopedSession, ToolsStateAutomation,
};
pub use registry::{DriverEntry, DriverRegistry, FUSION, WORKSTATION};
pub use request::{
    AddDiskArgs, AttachIsoArgs, CloneArgs, CopyArgs, FloppyArgs, GuestPathArgs, HardwareArgs,
    NetworkArgs, PowerArgs, Request, RunInGuestArgs, SettingArgs, SharedFolderArgs, SnapshotArgs,
    StartArgs, VmArgs, WaitReadyArgs, WriteSettingArgs,
};
pub use vmrun::VmrunDriver;
