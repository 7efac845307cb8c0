//! Typed operation requests.
//!
//! Every operation has its own argument struct that rejects unknown fields,
//! so a misspelt option fails loudly instead of being ignored. On the wire a
//! request is `{"op": "<name>", "args": {...}}`.

use crate::allocator::Bus;
use crate::context::OpContext;
use crate::credentials::{Credential, RunOptions};
use crate::descriptor::Descriptor;
use crate::disk::DiskAdapter;
use crate::driver::{CloneMode, HypervisorDriver, NetworkKind};
use crate::error::{DriverError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;

/// Arguments naming a single VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VmArgs {
    /// Descriptor path
    pub vmx: PathBuf,
}

/// Arguments for `clone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloneArgs {
    /// Template descriptor
    pub template: PathBuf,
    /// New descriptor; must not exist
    pub target: PathBuf,
    /// Template snapshot to clone from
    pub snapshot: String,
    /// Full or linked
    pub mode: CloneMode,
}

/// Arguments for `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartArgs {
    /// Descriptor path
    pub vmx: PathBuf,
    /// Show the VM console window
    #[serde(default)]
    pub gui: bool,
}

/// Arguments for `stop` and `reset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerArgs {
    /// Descriptor path
    pub vmx: PathBuf,
    /// Hard power operation instead of a guest-initiated one
    #[serde(default)]
    pub force: bool,
}

/// Arguments for snapshot operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotArgs {
    /// Descriptor path
    pub vmx: PathBuf,
    /// Snapshot name
    pub name: String,
}

/// Arguments for reading or clearing a descriptor setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingArgs {
    /// Descriptor path
    pub vmx: PathBuf,
    /// Setting key
    pub name: String,
}

/// Arguments for writing a descriptor setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteSettingArgs {
    /// Descriptor path
    pub vmx: PathBuf,
    /// Setting key
    pub name: String,
    /// New value
    pub value: String,
}

/// Arguments for `set_hardware`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HardwareArgs {
    /// Descriptor path
    pub vmx: PathBuf,
    /// vCPU count
    #[serde(default)]
    pub cpus: Option<u32>,
    /// Memory in MB
    #[serde(default)]
    pub memory_mb: Option<u64>,
}

/// Arguments for `add_network_adapter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkArgs {
    /// Descriptor path
    pub vmx: PathBuf,
    /// Attachment
    pub network: NetworkKind,
}

/// Arguments for `add_disk`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddDiskArgs {
    /// Descriptor path
    pub vmx: PathBuf,
    /// `ide`, `sata` or `scsi`
    pub bus: String,
    /// Disk size in MB
    pub size_mb: u64,
    /// Adapter type recorded in the image
    #[serde(default)]
    pub adapter: DiskAdapter,
}

/// Arguments for `attach_iso`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttachIsoArgs {
    /// Descriptor path
    pub vmx: PathBuf,
    /// `ide`, `sata` or `scsi`
    pub bus: String,
    /// ISO image on the host
    pub iso: PathBuf,
}

/// Arguments for `add_floppy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FloppyArgs {
    /// Descriptor path
    pub vmx: PathBuf,
    /// Floppy image on the host
    pub image: PathBuf,
}

/// Arguments for `add_shared_folder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedFolderArgs {
    /// Descriptor path
    pub vmx: PathBuf,
    /// Share name seen by the guest
    pub name: String,
    /// Host directory
    pub host_path: PathBuf,
}

/// Arguments for guest operations on a single path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuestPathArgs {
    /// Descriptor path
    pub vmx: PathBuf,
    /// Path inside the guest
    pub path: String,
    /// Candidate guest logins, tried in order
    pub credentials: Vec<Credential>,
}

/// Arguments for `run_in_guest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunInGuestArgs {
    /// Descriptor path
    pub vmx: PathBuf,
    /// Program path inside the guest
    pub program: String,
    /// Program arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// `runProgramInGuest` flags
    #[serde(default)]
    pub options: RunOptions,
    /// Candidate guest logins, tried in order
    pub credentials: Vec<Credential>,
}

/// Arguments for copying files between host and guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyArgs {
    /// Descriptor path
    pub vmx: PathBuf,
    /// Host file
    pub host_path: PathBuf,
    /// Guest file
    pub guest_path: String,
    /// Candidate guest logins, tried in order
    pub credentials: Vec<Credential>,
}

/// Arguments for `wait_for_guest_ready`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitReadyArgs {
    /// Descriptor path
    pub vmx: PathBuf,
    /// Upper bound on the wait, in seconds
    pub timeout_secs: u64,
}

/// A driver operation with its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum Request {
    Clone(CloneArgs),
    Start(StartArgs),
    Stop(PowerArgs),
    Reset(PowerArgs),
    Remove(VmArgs),
    ListRunning,
    IsRunning(VmArgs),
    CreateSnapshot(SnapshotArgs),
    RemoveSnapshot(SnapshotArgs),
    RevertToSnapshot(SnapshotArgs),
    ListSnapshots(VmArgs),
    ConvertToFullDisk(VmArgs),
    ClearCdrom(VmArgs),
    ClearNetworkSettings(VmArgs),
    ClearFloppy(VmArgs),
    ReadSetting(SettingArgs),
    WriteSetting(WriteSettingArgs),
    ClearSetting(SettingArgs),
    SetHardware(HardwareArgs),
    AddNetworkAdapter(NetworkArgs),
    AddDisk(AddDiskArgs),
    AttachIso(AttachIsoArgs),
    AddFloppy(FloppyArgs),
    EnableSharedFolders(VmArgs),
    DisableSharedFolders(VmArgs),
    AddSharedFolder(SharedFolderArgs),
    RemoveSharedFolder(SettingArgs),
    GuestFileExists(GuestPathArgs),
    GuestDirectoryExists(GuestPathArgs),
    RunInGuest(RunInGuestArgs),
    CopyToGuest(CopyArgs),
    CopyFromGuest(CopyArgs),
    CreateGuestDirectory(GuestPathArgs),
    DeleteGuestFile(GuestPathArgs),
    DeleteGuestDirectory(GuestPathArgs),
    WaitForGuestReady(WaitReadyArgs),
}

impl Request {
    /// Parse a request from JSON.
    ///
    /// # Errors
    /// `InvalidRequest` for unknown operations, unknown or missing fields.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| DriverError::InvalidRequest(e.to_string()))
    }

    /// Wire name of the operation.
    pub fn op(&self) -> &'static str {
        match self {
            Request::Clone(_) => "clone",
            Request::Start(_) => "start",
            Request::Stop(_) => "stop",
            Request::Reset(_) => "reset",
            Request::Remove(_) => "remove",
            Request::ListRunning => "list_running",
            Request::IsRunning(_) => "is_running",
            Request::CreateSnapshot(_) => "create_snapshot",
            Request::RemoveSnapshot(_) => "remove_snapshot",
            Request::RevertToSnapshot(_) => "revert_to_snapshot",
            Request::ListSnapshots(_) => "list_snapshots",
            Request::ConvertToFullDisk(_) => "convert_to_full_disk",
            Request::ClearCdrom(_) => "clear_cdrom",
            Request::ClearNetworkSettings(_) => "clear_network_settings",
            Request::ClearFloppy(_) => "clear_floppy",
            Request::ReadSetting(_) => "read_setting",
            Request::WriteSetting(_) => "write_setting",
            Request::ClearSetting(_) => "clear_setting",
            Request::SetHardware(_) => "set_hardware",
            Request::AddNetworkAdapter(_) => "add_network_adapter",
            Request::AddDisk(_) => "add_disk",
            Request::AttachIso(_) => "attach_iso",
            Request::AddFloppy(_) => "add_floppy",
            Request::EnableSharedFolders(_) => "enable_shared_folders",
            Request::DisableSharedFolders(_) => "disable_shared_folders",
            Request::AddSharedFolder(_) => "add_shared_folder",
            Request::RemoveSharedFolder(_) => "remove_shared_folder",
            Request::GuestFileExists(_) => "guest_file_exists",
            Request::GuestDirectoryExists(_) => "guest_directory_exists",
            Request::RunInGuest(_) => "run_in_guest",
            Request::CopyToGuest(_) => "copy_to_guest",
            Request::CopyFromGuest(_) => "copy_from_guest",
            Request::CreateGuestDirectory(_) => "create_guest_directory",
            Request::DeleteGuestFile(_) => "delete_guest_file",
            Request::DeleteGuestDirectory(_) => "delete_guest_directory",
            Request::WaitForGuestReady(_) => "wait_for_guest_ready",
        }
    }

    /// Run the request against `driver`, returning a JSON result.
    ///
    /// Operations without a result return `null`.
    pub async fn dispatch(&self, driver: &dyn HypervisorDriver, ctx: &OpContext) -> Result<Value> {
        tracing::debug!(op = self.op(), driver = driver.id(), "Dispatching request");
        let value = match self {
            Request::Clone(a) => {
                driver
                    .clone_vm(ctx, &a.template, &a.target, &a.snapshot, a.mode)
                    .await?;
                Value::Null
            }
            Request::Start(a) => {
                driver.start(ctx, &a.vmx, a.gui).await?;
                Value::Null
            }
            Request::Stop(a) => {
                driver.stop(ctx, &a.vmx, a.force).await?;
                Value::Null
            }
            Request::Reset(a) => {
                driver.reset(ctx, &a.vmx, a.force).await?;
                Value::Null
            }
            Request::Remove(a) => {
                driver.remove(ctx, &a.vmx).await?;
                Value::Null
            }
            Request::ListRunning => json!(driver.list_running(ctx).await?),
            Request::IsRunning(a) => json!(driver.is_running(ctx, &a.vmx).await?),
            Request::CreateSnapshot(a) => {
                driver.create_snapshot(ctx, &a.vmx, &a.name).await?;
                Value::Null
            }
            Request::RemoveSnapshot(a) => {
                driver.remove_snapshot(ctx, &a.vmx, &a.name).await?;
                Value::Null
            }
            Request::RevertToSnapshot(a) => {
                driver.revert_to_snapshot(ctx, &a.vmx, &a.name).await?;
                Value::Null
            }
            Request::ListSnapshots(a) => json!(driver.list_snapshots(ctx, &a.vmx).await?),
            Request::ConvertToFullDisk(a) => {
                driver.convert_to_full_disk(ctx, &a.vmx).await?;
                Value::Null
            }
            Request::ClearCdrom(a) => {
                driver.clear_cdrom(ctx, &a.vmx).await?;
                Value::Null
            }
            Request::ClearNetworkSettings(a) => {
                driver.clear_network_settings(ctx, &a.vmx).await?;
                Value::Null
            }
            Request::ClearFloppy(a) => {
                driver.clear_floppy(ctx, &a.vmx).await?;
                Value::Null
            }
            Request::ReadSetting(a) => {
                ctx.check()?;
                json!(Descriptor::open(&a.vmx)?.read_setting(&a.name).await?)
            }
            Request::WriteSetting(a) => {
                ctx.check()?;
                Descriptor::open(&a.vmx)?
                    .write_setting(&a.name, &a.value)
                    .await?;
                Value::Null
            }
            Request::ClearSetting(a) => {
                ctx.check()?;
                json!(Descriptor::open(&a.vmx)?.clear_setting(&a.name).await?)
            }
            Request::SetHardware(a) => {
                driver
                    .set_hardware(ctx, &a.vmx, a.cpus, a.memory_mb)
                    .await?;
                Value::Null
            }
            Request::AddNetworkAdapter(a) => {
                json!(driver.add_network_adapter(ctx, &a.vmx, &a.network).await?)
            }
            Request::AddDisk(a) => {
                let bus: Bus = a.bus.parse()?;
                let slot = driver
                    .add_disk(ctx, &a.vmx, bus, a.size_mb, a.adapter)
                    .await?;
                json!(slot.key())
            }
            Request::AttachIso(a) => {
                let bus: Bus = a.bus.parse()?;
                let slot = driver.attach_iso(ctx, &a.vmx, bus, &a.iso).await?;
                json!(slot.key())
            }
            Request::AddFloppy(a) => json!(driver.add_floppy(ctx, &a.vmx, &a.image).await?),
            Request::EnableSharedFolders(a) => {
                driver.enable_shared_folders(ctx, &a.vmx).await?;
                Value::Null
            }
            Request::DisableSharedFolders(a) => {
                driver.disable_shared_folders(ctx, &a.vmx).await?;
                Value::Null
            }
            Request::AddSharedFolder(a) => {
                driver
                    .add_shared_folder(ctx, &a.vmx, &a.name, &a.host_path)
                    .await?;
                Value::Null
            }
            Request::RemoveSharedFolder(a) => {
                driver.remove_shared_folder(ctx, &a.vmx, &a.name).await?;
                Value::Null
            }
            Request::GuestFileExists(a) => json!(
                driver
                    .guest_file_exists(ctx, &a.vmx, &a.path, &a.credentials)
                    .await?
            ),
            Request::GuestDirectoryExists(a) => json!(
                driver
                    .guest_directory_exists(ctx, &a.vmx, &a.path, &a.credentials)
                    .await?
            ),
            Request::RunInGuest(a) => json!(
                driver
                    .run_in_guest(ctx, &a.vmx, &a.program, &a.args, a.options, &a.credentials)
                    .await?
            ),
            Request::CopyToGuest(a) => {
                driver
                    .copy_to_guest(ctx, &a.vmx, &a.host_path, &a.guest_path, &a.credentials)
                    .await?;
                Value::Null
            }
            Request::CopyFromGuest(a) => {
                driver
                    .copy_from_guest(ctx, &a.vmx, &a.guest_path, &a.host_path, &a.credentials)
                    .await?;
                Value::Null
            }
            Request::CreateGuestDirectory(a) => {
                driver
                    .create_guest_directory(ctx, &a.vmx, &a.path, &a.credentials)
                    .await?;
                Value::Null
            }
            Request::DeleteGuestFile(a) => {
                driver
                    .delete_guest_file(ctx, &a.vmx, &a.path, &a.credentials)
                    .await?;
                Value::Null
            }
            Request::DeleteGuestDirectory(a) => {
                driver
                    .delete_guest_directory(ctx, &a.vmx, &a.path, &a.credentials)
                    .await?;
                Value::Null
            }
            Request::WaitForGuestReady(a) => {
                driver
                    .wait_for_guest_ready(ctx, &a.vmx, Duration::from_secs(a.timeout_secs))
                    .await?;
                Value::Null
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clone() {
        let request = Request::from_json(
            r#"{"op":"clone","args":{"template":"/t/t.vmx","target":"/v/a/a.vmx","snapshot":"base","mode":"linked"}}"#,
        )
        .unwrap();
        assert_eq!(request.op(), "clone");
        match request {
            Request::Clone(args) => {
                assert_eq!(args.mode, CloneMode::Linked);
                assert_eq!(args.snapshot, "base");
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_unit_operation() {
        let request = Request::from_json(r#"{"op":"list_running"}"#).unwrap();
        assert_eq!(request, Request::ListRunning);
    }

    #[test]
    fn test_defaults_apply() {
        let request = Request::from_json(
            r#"{"op":"run_in_guest","args":{"vmx":"/v/a.vmx","program":"/bin/true","credentials":[{"username":"u","password":"p"}]}}"#,
        )
        .unwrap();
        let Request::RunInGuest(args) = request else {
            panic!("expected run_in_guest");
        };
        assert!(args.args.is_empty());
        assert_eq!(args.options, RunOptions::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = Request::from_json(r#"{"op":"start","args":{"vmx":"/v/a.vmx","headless":true}}"#);
        assert!(matches!(result, Err(DriverError::InvalidRequest(msg)) if msg.contains("headless")));
    }

    #[test]
    fn test_missing_field_rejected() {
        let result = Request::from_json(r#"{"op":"create_snapshot","args":{"vmx":"/v/a.vmx"}}"#);
        assert!(matches!(result, Err(DriverError::InvalidRequest(msg)) if msg.contains("name")));
    }

    #[test]
    fn test_unknown_operation_rejected() {
        assert!(Request::from_json(r#"{"op":"format_host","args":{}}"#).is_err());
    }

    #[test]
    fn test_op_name_matches_wire_tag() {
        let request = Request::ClearNetworkSettings(VmArgs {
            vmx: "/v/a.vmx".into(),
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["op"], request.op());
    }
}
