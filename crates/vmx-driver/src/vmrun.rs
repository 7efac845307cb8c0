//! [`HypervisorDriver`] backed by `vmrun`, `vmware-vdiskmanager` and direct
//! descriptor edits.

use crate::allocator::{free_disk_slot, free_floppy_id, free_nic_id, Bus, DiskSlot};
use crate::classifier::{strip_summary, CommandOutcome, RUNNING_VMS_SUMMARY, SNAPSHOTS_SUMMARY};
use crate::config::DriverConfig;
use crate::context::OpContext;
use crate::credentials::{Credential, CredentialBroker, RunOptions};
use crate::descriptor::{check_setting, setting_line, Descriptor, Lines};
use crate::disk::{DiskAdapter, DiskManager};
use crate::driver::{CloneMode, HypervisorDriver, NetworkKind};
use crate::error::{DriverError, Result};
use crate::executor::{CommandExecutor, ToolCommand, ToolRunner};
use crate::pvn::PvnStore;
use crate::readiness::{self, GuestAutomation, ToolsStateAutomation};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::instrument;

static CDROM_DEVICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^((?:ide|sata|scsi)\d+:\d+)\.deviceType = "(?:cdrom-raw|cdrom-image)""#)
        .expect("valid regex")
});

/// Driver for VMware Workstation, Player and Fusion hosts.
pub struct VmrunDriver {
    id: &'static str,
    config: DriverConfig,
    executor: CommandExecutor,
    broker: CredentialBroker,
    disks: DiskManager,
    pvn: PvnStore,
    automation: Arc<dyn GuestAutomation>,
}

impl std::fmt::Debug for VmrunDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmrunDriver")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VmrunDriver {
    /// Driver spawning real processes with `config`.
    ///
    /// # Errors
    /// Returns `Config` if the configuration is invalid.
    pub fn new(config: DriverConfig) -> Result<Self> {
        crate::builder::DriverBuilder::from_config(config).build()
    }

    pub(crate) fn from_parts(
        id: &'static str,
        config: DriverConfig,
        runner: Arc<dyn ToolRunner>,
        automation: Option<Arc<dyn GuestAutomation>>,
    ) -> Self {
        let executor = CommandExecutor::new(runner.clone(), &config);
        let broker = CredentialBroker::new(executor.clone(), &config);
        let disks = DiskManager::new(runner, &config);
        let pvn = PvnStore::new(&config.pvn_store_path);
        let automation = automation.unwrap_or_else(|| {
            Arc::new(ToolsStateAutomation::new(
                executor.clone(),
                config.readiness_poll_interval,
            ))
        });
        Self {
            id,
            config,
            executor,
            broker,
            disks,
            pvn,
            automation,
        }
    }

    /// The configuration this driver was built with.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    async fn run_host(&self, ctx: &OpContext, command: &ToolCommand) -> Result<String> {
        let output = self.executor.execute(ctx, command).await?;
        CommandOutcome::classify(output).into_result()
    }

    async fn run_snapshot(
        &self,
        ctx: &OpContext,
        command: &ToolCommand,
        snapshot: &str,
    ) -> Result<String> {
        let output = self.executor.execute(ctx, command).await?;
        CommandOutcome::classify(output).into_snapshot_result(snapshot)
    }

    async fn power(&self, ctx: &OpContext, verb: &str, vmx: &Path, force: bool) -> Result<()> {
        ctx.check()?;
        Descriptor::open(vmx)?;
        let mode = if force { "hard" } else { "soft" };
        self.run_host(ctx, &ToolCommand::new(verb).path(vmx).arg(mode))
            .await?;
        tracing::info!(vmx = %vmx.display(), verb, mode, "Power operation completed");
        Ok(())
    }

    async fn vm_command(&self, ctx: &OpContext, verb: &str, vmx: &Path) -> Result<()> {
        ctx.check()?;
        Descriptor::open(vmx)?;
        self.run_host(ctx, &ToolCommand::new(verb).path(vmx)).await?;
        tracing::info!(vmx = %vmx.display(), verb, "VM command completed");
        Ok(())
    }

    /// Expand `disk` into `temp`, then move `temp` over `disk`. The original
    /// stays in place until the rename replaces it.
    async fn replace_with_expanded(&self, disk: &Path, temp: &Path) -> Result<()> {
        self.disks.expand(disk, temp).await?;
        if !tokio::fs::try_exists(temp).await? {
            return Err(DriverError::DiskManagementFailure(format!(
                "expanded image {} was not created",
                temp.display()
            )));
        }
        tokio::fs::rename(temp, disk).await?;
        Ok(())
    }

    async fn disk_files(directory: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(directory).await?;
        let mut disks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_disk = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("vmdk"));
            if is_disk && entry.file_type().await?.is_file() {
                disks.push(path);
            }
        }
        disks.sort();
        Ok(disks)
    }
}

/// Descriptor settings that enable the controller behind `slot`, if the
/// descriptor does not enable it already. IDE controllers are implicit.
fn controller_settings(lines: &Lines, slot: &DiskSlot) -> Vec<(String, String)> {
    let controller = slot.controller_key();
    let present = format!("{controller}.present");
    if slot.bus == Bus::Ide || lines.read_setting(&present) == Some("TRUE") {
        return Vec::new();
    }
    let mut settings = vec![(present, "TRUE".to_string())];
    if slot.bus == Bus::Scsi {
        settings.push((format!("{controller}.virtualDev"), "lsilogic".to_string()));
    }
    settings
}

/// Best-effort removal of a file this driver created.
async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial disk image"),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => tracing::warn!(
            path = %path.display(),
            error = %error,
            "Failed to remove partial disk image"
        ),
    }
}

fn apply(lines: &mut Lines, settings: &[(String, String)]) {
    for (name, value) in settings {
        lines.write_setting(name, value);
    }
}

#[async_trait]
impl HypervisorDriver for VmrunDriver {
    fn id(&self) -> &'static str {
        self.id
    }

    #[instrument(skip_all, fields(template = %template.display(), target = %target.display(), snapshot = %snapshot))]
    async fn clone_vm(
        &self,
        ctx: &OpContext,
        template: &Path,
        target: &Path,
        snapshot: &str,
        mode: CloneMode,
    ) -> Result<()> {
        Descriptor::open(template)?;
        if Descriptor::new(target).exists() {
            return Err(DriverError::DescriptorAlreadyExists(target.to_path_buf()));
        }
        ctx.check()?;

        let command = ToolCommand::new("clone")
            .path(template)
            .path(target)
            .arg(mode.as_str())
            .arg(format!("-snapshot={snapshot}"));
        self.run_snapshot(ctx, &command, snapshot).await?;
        tracing::info!(%mode, snapshot, "VM cloned");
        Ok(())
    }

    #[instrument(skip_all, fields(vmx = %vmx.display()))]
    async fn start(&self, ctx: &OpContext, vmx: &Path, gui: bool) -> Result<()> {
        ctx.check()?;
        Descriptor::open(vmx)?;
        let mode = if gui { "gui" } else { "nogui" };
        self.run_host(ctx, &ToolCommand::new("start").path(vmx).arg(mode))
            .await?;
        tracing::info!(mode, "VM started");
        Ok(())
    }

    #[instrument(skip_all, fields(vmx = %vmx.display()))]
    async fn stop(&self, ctx: &OpContext, vmx: &Path, force: bool) -> Result<()> {
        self.power(ctx, "stop", vmx, force).await
    }

    #[instrument(skip_all, fields(vmx = %vmx.display()))]
    async fn reset(&self, ctx: &OpContext, vmx: &Path, force: bool) -> Result<()> {
        self.power(ctx, "reset", vmx, force).await
    }

    #[instrument(skip_all, fields(vmx = %vmx.display()))]
    async fn remove(&self, ctx: &OpContext, vmx: &Path) -> Result<()> {
        ctx.check()?;
        if Descriptor::new(vmx).exists() {
            self.run_host(ctx, &ToolCommand::new("deleteVM").path(vmx))
                .await?;
            tracing::info!("VM deleted by vmrun");
        }

        // The VM folder sits two levels above the descriptor.
        if let Some(folder) = vmx.parent().and_then(Path::parent) {
            if folder.parent().is_some() && folder.is_dir() {
                tokio::fs::remove_dir_all(folder).await?;
                tracing::info!(folder = %folder.display(), "VM folder removed");
            }
        }
        Ok(())
    }

    async fn list_running(&self, ctx: &OpContext) -> Result<Vec<PathBuf>> {
        ctx.check()?;
        let output = self.run_host(ctx, &ToolCommand::new("list")).await?;
        Ok(strip_summary(&output, RUNNING_VMS_SUMMARY)
            .into_iter()
            .map(PathBuf::from)
            .collect())
    }

    async fn is_running(&self, ctx: &OpContext, vmx: &Path) -> Result<bool> {
        let running = self.list_running(ctx).await?;
        Ok(running.iter().any(|path| path == vmx))
    }

    #[instrument(skip_all, fields(vmx = %vmx.display()))]
    async fn create_snapshot(&self, ctx: &OpContext, vmx: &Path, name: &str) -> Result<()> {
        ctx.check()?;
        Descriptor::open(vmx)?;
        self.run_host(ctx, &ToolCommand::new("snapshot").path(vmx).arg(name))
            .await?;
        tracing::info!(snapshot = name, "Snapshot created");
        Ok(())
    }

    #[instrument(skip_all, fields(vmx = %vmx.display()))]
    async fn remove_snapshot(&self, ctx: &OpContext, vmx: &Path, name: &str) -> Result<()> {
        ctx.check()?;
        Descriptor::open(vmx)?;
        let command = ToolCommand::new("deleteSnapshot").path(vmx).arg(name);
        self.run_snapshot(ctx, &command, name).await?;
        tracing::info!(snapshot = name, "Snapshot removed");
        Ok(())
    }

    #[instrument(skip_all, fields(vmx = %vmx.display()))]
    async fn revert_to_snapshot(&self, ctx: &OpContext, vmx: &Path, name: &str) -> Result<()> {
        ctx.check()?;
        Descriptor::open(vmx)?;
        let command = ToolCommand::new("revertToSnapshot").path(vmx).arg(name);
        self.run_snapshot(ctx, &command, name).await?;
        tracing::info!(snapshot = name, "Reverted to snapshot");
        Ok(())
    }

    async fn list_snapshots(&self, ctx: &OpContext, vmx: &Path) -> Result<Vec<String>> {
        ctx.check()?;
        Descriptor::open(vmx)?;
        let output = self
            .run_host(ctx, &ToolCommand::new("listSnapshots").path(vmx))
            .await?;
        Ok(strip_summary(&output, SNAPSHOTS_SUMMARY))
    }

    #[instrument(skip_all, fields(vmx = %vmx.display()))]
    async fn convert_to_full_disk(&self, ctx: &OpContext, vmx: &Path) -> Result<()> {
        let descriptor = Descriptor::open(vmx)?;
        let directory = descriptor
            .directory()
            .ok_or_else(|| DriverError::DescriptorNotFound(vmx.to_path_buf()))?;

        let disks = Self::disk_files(directory).await?;
        tracing::info!(count = disks.len(), "Converting disks to standalone images");

        for disk in &disks {
            ctx.check()?;
            let temp = directory.join(format!("{}.vmdk", uuid::Uuid::new_v4().simple()));
            if let Err(error) = self.replace_with_expanded(disk, &temp).await {
                discard(&temp).await;
                return Err(error);
            }
            tracing::debug!(disk = %disk.display(), "Disk converted");
        }
        Ok(())
    }

    #[instrument(skip_all, fields(vmx = %vmx.display()))]
    async fn clear_cdrom(&self, ctx: &OpContext, vmx: &Path) -> Result<()> {
        ctx.check()?;
        let descriptor = Descriptor::open(vmx)?;
        let removed = descriptor
            .update(|lines| {
                let prefixes: Vec<String> = lines
                    .iter()
                    .filter_map(|line| CDROM_DEVICE.captures(line))
                    .map(|caps| format!("{}.", &caps[1]))
                    .collect();
                lines.remove_lines(|line| prefixes.iter().any(|p| line.starts_with(p.as_str())))
            })
            .await?;
        tracing::info!(removed, "CD-ROM devices cleared");
        Ok(())
    }

    #[instrument(skip_all, fields(vmx = %vmx.display()))]
    async fn clear_network_settings(&self, ctx: &OpContext, vmx: &Path) -> Result<()> {
        ctx.check()?;
        let removed = Descriptor::open(vmx)?
            .remove_lines(|line| line.starts_with("ethernet"))
            .await?;
        tracing::info!(removed, "Network adapters cleared");
        Ok(())
    }

    #[instrument(skip_all, fields(vmx = %vmx.display()))]
    async fn clear_floppy(&self, ctx: &OpContext, vmx: &Path) -> Result<()> {
        ctx.check()?;
        let removed = Descriptor::open(vmx)?
            .update(|lines| {
                let removed = lines.remove_lines(|line| line.starts_with("floppy"));
                lines.push(setting_line("floppy0.present", "FALSE"));
                removed
            })
            .await?;
        tracing::info!(removed, "Floppy devices cleared");
        Ok(())
    }

    #[instrument(skip_all, fields(vmx = %vmx.display()))]
    async fn set_hardware(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        cpus: Option<u32>,
        memory_mb: Option<u64>,
    ) -> Result<()> {
        ctx.check()?;
        let descriptor = Descriptor::open(vmx)?;
        let mut settings = Vec::new();
        if let Some(cpus) = cpus {
            if cpus == 0 {
                return Err(DriverError::InvalidRequest("cpus must be > 0".into()));
            }
            settings.push(("numvcpus", cpus.to_string()));
        }
        if let Some(memory_mb) = memory_mb {
            if memory_mb == 0 || memory_mb % 4 != 0 {
                return Err(DriverError::InvalidRequest(
                    "memory_mb must be a positive multiple of 4".into(),
                ));
            }
            settings.push(("memsize", memory_mb.to_string()));
        }
        descriptor.write_settings(&settings).await?;
        tracing::info!(?cpus, ?memory_mb, "Hardware updated");
        Ok(())
    }

    #[instrument(skip_all, fields(vmx = %vmx.display()))]
    async fn add_network_adapter(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        kind: &NetworkKind,
    ) -> Result<u32> {
        ctx.check()?;
        let descriptor = Descriptor::open(vmx)?;

        let (connection, extra) = match kind {
            NetworkKind::Bridged => ("bridged", None),
            NetworkKind::Nat => ("nat", None),
            NetworkKind::HostOnly => ("hostonly", None),
            NetworkKind::Custom { vnet } => ("custom", Some(("vnet", vnet.clone()))),
            NetworkKind::Private { name } => {
                let id = self.pvn.get_or_create(name).await?;
                ("pvn", Some(("pvnID", id)))
            }
        };

        let id = descriptor
            .update(|lines| {
                let id = free_nic_id(lines.iter());
                let key = format!("ethernet{id}");
                lines.write_setting(&format!("{key}.present"), "TRUE");
                lines.write_setting(&format!("{key}.virtualDev"), "e1000");
                lines.write_setting(&format!("{key}.connectionType"), connection);
                lines.write_setting(&format!("{key}.addressType"), "generated");
                if let Some((name, value)) = &extra {
                    lines.write_setting(&format!("{key}.{name}"), value);
                }
                id
            })
            .await?;
        tracing::info!(nic = id, connection, "Network adapter added");
        Ok(id)
    }

    #[instrument(skip_all, fields(vmx = %vmx.display()))]
    async fn add_disk(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        bus: Bus,
        size_mb: u64,
        adapter: DiskAdapter,
    ) -> Result<DiskSlot> {
        ctx.check()?;
        let descriptor = Descriptor::open(vmx)?;
        let directory = descriptor
            .directory()
            .ok_or_else(|| DriverError::DescriptorNotFound(vmx.to_path_buf()))?;

        let lines = descriptor.load().await?;
        let slot = free_disk_slot(lines.iter(), bus);
        let stem = vmx
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "disk".to_string());
        let file_name = format!("{stem}-{}{}-{}.vmdk", bus, slot.bus_id, slot.node_id);
        let disk_path = directory.join(&file_name);
        if disk_path.exists() {
            return Err(DriverError::DiskManagementFailure(format!(
                "{} already exists",
                disk_path.display()
            )));
        }

        let adapter = if bus == Bus::Ide { DiskAdapter::Ide } else { adapter };
        self.disks.create(&disk_path, size_mb, adapter).await?;

        let key = slot.key();
        let mut settings = controller_settings(&lines, &slot);
        settings.push((format!("{key}.present"), "TRUE".to_string()));
        settings.push((format!("{key}.fileName"), file_name));
        if let Err(error) = descriptor.update(|lines| apply(lines, &settings)).await {
            discard(&disk_path).await;
            return Err(error);
        }

        tracing::info!(%slot, size_mb, "Disk added");
        Ok(slot)
    }

    #[instrument(skip_all, fields(vmx = %vmx.display(), iso = %iso.display()))]
    async fn attach_iso(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        bus: Bus,
        iso: &Path,
    ) -> Result<DiskSlot> {
        ctx.check()?;
        let descriptor = Descriptor::open(vmx)?;
        let file_name = iso.to_string_lossy().into_owned();
        check_setting("fileName", &file_name)?;
        let slot = descriptor
            .update(|lines| {
                let slot = free_disk_slot(lines.iter(), bus);
                let key = slot.key();
                let mut settings = controller_settings(lines, &slot);
                settings.extend([
                    (format!("{key}.present"), "TRUE".to_string()),
                    (format!("{key}.deviceType"), "cdrom-image".to_string()),
                    (format!("{key}.fileName"), file_name),
                    (format!("{key}.startConnected"), "TRUE".to_string()),
                ]);
                apply(lines, &settings);
                slot
            })
            .await?;
        tracing::info!(%slot, "ISO attached");
        Ok(slot)
    }

    #[instrument(skip_all, fields(vmx = %vmx.display(), image = %image.display()))]
    async fn add_floppy(&self, ctx: &OpContext, vmx: &Path, image: &Path) -> Result<u32> {
        ctx.check()?;
        let descriptor = Descriptor::open(vmx)?;
        let file_name = image.to_string_lossy();
        check_setting("fileName", &file_name)?;
        let id = descriptor
            .update(|lines| {
                let id = free_floppy_id(lines.iter());
                let key = format!("floppy{id}");
                lines.write_setting(&format!("{key}.present"), "TRUE");
                lines.write_setting(&format!("{key}.fileType"), "file");
                lines.write_setting(&format!("{key}.fileName"), &file_name);
                lines.write_setting(&format!("{key}.startConnected"), "TRUE");
                id
            })
            .await?;
        tracing::info!(floppy = id, "Floppy attached");
        Ok(id)
    }

    async fn enable_shared_folders(&self, ctx: &OpContext, vmx: &Path) -> Result<()> {
        self.vm_command(ctx, "enableSharedFolders", vmx).await
    }

    async fn disable_shared_folders(&self, ctx: &OpContext, vmx: &Path) -> Result<()> {
        self.vm_command(ctx, "disableSharedFolders", vmx).await
    }

    #[instrument(skip_all, fields(vmx = %vmx.display(), host_path = %host_path.display()))]
    async fn add_shared_folder(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        name: &str,
        host_path: &Path,
    ) -> Result<()> {
        ctx.check()?;
        Descriptor::open(vmx)?;
        let command = ToolCommand::new("addSharedFolder")
            .path(vmx)
            .arg(name)
            .path(host_path);
        self.run_host(ctx, &command).await?;
        tracing::info!(share = name, "Shared folder added");
        Ok(())
    }

    #[instrument(skip_all, fields(vmx = %vmx.display()))]
    async fn remove_shared_folder(&self, ctx: &OpContext, vmx: &Path, name: &str) -> Result<()> {
        ctx.check()?;
        Descriptor::open(vmx)?;
        let command = ToolCommand::new("removeSharedFolder").path(vmx).arg(name);
        self.run_host(ctx, &command).await?;
        tracing::info!(share = name, "Shared folder removed");
        Ok(())
    }

    async fn guest_file_exists(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        path: &str,
        credentials: &[Credential],
    ) -> Result<bool> {
        Descriptor::open(vmx)?;
        self.broker.file_exists(ctx, vmx, path, credentials).await
    }

    async fn guest_directory_exists(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        path: &str,
        credentials: &[Credential],
    ) -> Result<bool> {
        Descriptor::open(vmx)?;
        self.broker
            .directory_exists(ctx, vmx, path, credentials)
            .await
    }

    #[instrument(skip_all, fields(vmx = %vmx.display(), program = %program))]
    async fn run_in_guest(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        program: &str,
        args: &[String],
        options: RunOptions,
        credentials: &[Credential],
    ) -> Result<String> {
        Descriptor::open(vmx)?;
        self.broker
            .execute_command(ctx, vmx, program, args, options, credentials)
            .await
    }

    async fn copy_to_guest(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        host_path: &Path,
        guest_path: &str,
        credentials: &[Credential],
    ) -> Result<()> {
        Descriptor::open(vmx)?;
        self.broker
            .copy_to_guest(ctx, vmx, host_path, guest_path, credentials)
            .await
    }

    async fn copy_from_guest(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        guest_path: &str,
        host_path: &Path,
        credentials: &[Credential],
    ) -> Result<()> {
        Descriptor::open(vmx)?;
        self.broker
            .copy_from_guest(ctx, vmx, guest_path, host_path, credentials)
            .await
    }

    async fn create_guest_directory(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        path: &str,
        credentials: &[Credential],
    ) -> Result<()> {
        Descriptor::open(vmx)?;
        self.broker
            .create_directory(ctx, vmx, path, credentials)
            .await
    }

    async fn delete_guest_file(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        path: &str,
        credentials: &[Credential],
    ) -> Result<()> {
        Descriptor::open(vmx)?;
        self.broker.delete_file(ctx, vmx, path, credentials).await
    }

    async fn delete_guest_directory(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        path: &str,
        credentials: &[Credential],
    ) -> Result<()> {
        Descriptor::open(vmx)?;
        self.broker
            .delete_directory(ctx, vmx, path, credentials)
            .await
    }

    #[instrument(skip_all, fields(vmx = %vmx.display()))]
    async fn wait_for_guest_ready(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        timeout: Duration,
    ) -> Result<()> {
        ctx.check()?;
        Descriptor::open(vmx)?;
        let timeout = ctx.remaining().map_or(timeout, |left| left.min(timeout));
        readiness::wait_for_guest_ready(self.automation.as_ref(), ctx, vmx, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdrom_pattern() {
        let caps = CDROM_DEVICE
            .captures(r#"sata0:1.deviceType = "cdrom-image""#)
            .unwrap();
        assert_eq!(&caps[1], "sata0:1");
        assert!(CDROM_DEVICE.is_match(r#"ide1:0.deviceType = "cdrom-raw""#));
        assert!(!CDROM_DEVICE.is_match(r#"scsi0:0.deviceType = "scsi-hardDisk""#));
    }

    #[test]
    fn test_controller_settings() {
        let slot = DiskSlot {
            bus: Bus::Scsi,
            bus_id: 1,
            node_id: 0,
        };
        let settings = controller_settings(&Lines::default(), &slot);
        assert_eq!(
            settings,
            vec![
                ("scsi1.present".to_string(), "TRUE".to_string()),
                ("scsi1.virtualDev".to_string(), "lsilogic".to_string()),
            ]
        );

        let present = Lines::parse("scsi1.present = \"TRUE\"\n");
        assert!(controller_settings(&present, &slot).is_empty());

        let ide = DiskSlot {
            bus: Bus::Ide,
            ..slot
        };
        assert!(controller_settings(&Lines::default(), &ide).is_empty());
    }
}
