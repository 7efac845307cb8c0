//! Persisted PVN identifiers for private networks.
//!
//! Every VM attached to the same private network name must carry the same
//! `pvnID`. Identifiers are kept in a small JSON object (name → id) that is
//! created on first use.

use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// JSON-file-backed map of network name to PVN identifier.
#[derive(Debug, Clone)]
pub struct PvnStore {
    path: PathBuf,
}

impl PvnStore {
    /// Store at `path`. Nothing is read or created until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The identifier for `network`, generating and persisting one if unseen.
    pub async fn get_or_create(&self, network: &str) -> Result<String> {
        let mut entries = self.load().await?;
        if let Some(id) = entries.get(network) {
            return Ok(id.clone());
        }

        let id = generate_pvn_id();
        tracing::info!(network, pvn = %id, "Assigned new PVN identifier");
        entries.insert(network.to_string(), id.clone());
        self.save(&entries).await?;
        Ok(id)
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// Random 16-octet identifier: `xx xx xx xx xx xx xx xx-xx xx xx xx xx xx xx xx`.
pub fn generate_pvn_id() -> String {
    let bytes: [u8; 16] = rand::random();
    let half = |octets: &[u8]| {
        octets
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ")
    };
    format!("{}-{}", half(&bytes[..8]), half(&bytes[8..]))
}
