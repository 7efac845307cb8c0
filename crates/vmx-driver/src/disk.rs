//! Disk-management tool (`vmware-vdiskmanager`) invocations.

use crate::config::DriverConfig;
use crate::error::{DriverError, Result};
use crate::executor::ToolRunner;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Controller adapter type recorded in a new disk image (`-a`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskAdapter {
    /// IDE
    Ide,
    /// BusLogic SCSI
    Buslogic,
    /// LSI Logic SCSI
    #[default]
    Lsilogic,
}

impl DiskAdapter {
    /// Value passed after `-a`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiskAdapter::Ide => "ide",
            DiskAdapter::Buslogic => "buslogic",
            DiskAdapter::Lsilogic => "lsilogic",
        }
    }
}

/// Thin wrapper over the disk-management binary.
#[derive(Clone)]
pub struct DiskManager {
    runner: Arc<dyn ToolRunner>,
    binary: PathBuf,
}

impl std::fmt::Debug for DiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskManager")
            .field("binary", &self.binary)
            .finish_non_exhaustive()
    }
}

impl DiskManager {
    /// Use the binary configured in `config`.
    pub fn new(runner: Arc<dyn ToolRunner>, config: &DriverConfig) -> Self {
        Self {
            runner,
            binary: config.vdiskmanager_path.clone(),
        }
    }

    /// Create a growable single-file disk: `-c -s <N>MB -a <adapter> -t 0 <path>`.
    pub async fn create(&self, path: &Path, size_mb: u64, adapter: DiskAdapter) -> Result<()> {
        let args = vec![
            "-c".to_string(),
            "-s".to_string(),
            format!("{size_mb}MB"),
            "-a".to_string(),
            adapter.as_str().to_string(),
            "-t".to_string(),
            "0".to_string(),
            path.to_string_lossy().into_owned(),
        ];
        tracing::info!(path = %path.display(), size_mb, adapter = adapter.as_str(), "Creating disk");
        self.run(&args).await
    }

    /// Expand a (linked) disk into a standalone copy: `-r <path> <new_path>`.
    pub async fn expand(&self, path: &Path, new_path: &Path) -> Result<()> {
        let args = vec![
            "-r".to_string(),
            path.to_string_lossy().into_owned(),
            new_path.to_string_lossy().into_owned(),
        ];
        tracing::info!(path = %path.display(), target = %new_path.display(), "Expanding disk");
        self.run(&args).await
    }

    async fn run(&self, args: &[String]) -> Result<()> {
        let output = self.runner.run(&self.binary, args, None).await?;
        let output = output.trim();
        if output.starts_with("Error:") {
            tracing::warn!(output, "vdiskmanager failed");
            return Err(DriverError::DiskManagementFailure(output.to_string()));
        }
        tracing::trace!(output, "vdiskmanager output");
        Ok(())
    }
}
