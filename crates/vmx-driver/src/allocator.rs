//! Hardware identifier allocation by scanning descriptor lines.
//!
//! These scans reproduce the established numbering behaviour exactly,
//! including two order-dependent quirks:
//!
//! - the NIC scan only advances while ids appear contiguously (in file order)
//!   from the current count, so it is not a sorted lowest-gap search;
//! - the disk scan checks the per-bus node ceiling after every line, matching
//!   or not.

use crate::error::DriverError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static NIC_PRESENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"ethernet(\d+)\.present = "(TRUE|FALSE)""#).expect("valid regex"));

static FLOPPY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"floppy(\d+)").expect("valid regex"));

static IDE_SLOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ide(\d+):(\d+)").expect("valid regex"));
static SATA_SLOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sata(\d+):(\d+)").expect("valid regex"));
static SCSI_SLOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"scsi(\d+):(\d+)").expect("valid regex"));

/// Virtual storage bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bus {
    /// IDE, two nodes per bus
    Ide,
    /// SATA, thirty nodes per bus
    Sata,
    /// SCSI, fifteen nodes per bus
    Scsi,
}

impl Bus {
    /// Descriptor key prefix for this bus.
    pub fn as_str(&self) -> &'static str {
        match self {
            Bus::Ide => "ide",
            Bus::Sata => "sata",
            Bus::Scsi => "scsi",
        }
    }

    /// Highest valid node id on one bus.
    pub fn max_node_id(&self) -> u32 {
        match self {
            Bus::Ide => 1,
            Bus::Sata => 29,
            Bus::Scsi => 14,
        }
    }

    fn slot_pattern(&self) -> &'static Regex {
        match self {
            Bus::Ide => &*IDE_SLOT,
            Bus::Sata => &*SATA_SLOT,
            Bus::Scsi => &*SCSI_SLOT,
        }
    }
}

impl fmt::Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bus {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ide" => Ok(Bus::Ide),
            "sata" => Ok(Bus::Sata),
            "scsi" => Ok(Bus::Scsi),
            other => Err(DriverError::BadBusType(other.to_string())),
        }
    }
}

/// A storage controller port: `<bus><bus_id>:<node_id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSlot {
    /// Controller type
    pub bus: Bus,
    /// Controller index
    pub bus_id: u32,
    /// Port on the controller
    pub node_id: u32,
}

impl DiskSlot {
    /// Descriptor key prefix for settings on this slot, e.g. `scsi0:1`.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Descriptor key prefix for the controller, e.g. `scsi0`.
    pub fn controller_key(&self) -> String {
        format!("{}{}", self.bus, self.bus_id)
    }
}

impl fmt::Display for DiskSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:{}", self.bus, self.bus_id, self.node_id)
    }
}

/// Next NIC id: advances only while `ethernet<N>.present` lines are contiguous
/// from the running count, in file order.
pub fn free_nic_id<'a>(lines: impl IntoIterator<Item = &'a str>) -> u32 {
    let mut highcount = 0u32;
    for line in lines {
        let Some(caps) = NIC_PRESENT.captures(line) else {
            continue;
        };
        let Ok(n) = caps[1].parse::<u32>() else {
            continue;
        };
        if n <= highcount {
            highcount = n.saturating_add(1);
        }
    }
    highcount
}

/// Next floppy id: one past the highest `floppy<N>` seen, or 0.
pub fn free_floppy_id<'a>(lines: impl IntoIterator<Item = &'a str>) -> u32 {
    lines
        .into_iter()
        .filter_map(|line| FLOPPY.captures(line))
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .map(|n| n.saturating_add(1))
        .fold(0, u32::max)
}

/// Next free slot on `bus`, rolling over to the next controller once the
/// node ceiling is exceeded.
pub fn free_disk_slot<'a>(lines: impl IntoIterator<Item = &'a str>, bus: Bus) -> DiskSlot {
    let pattern = bus.slot_pattern();
    let mut bus_id = 0u32;
    let mut node_id = 0u32;

    for line in lines {
        if let Some(caps) = pattern.captures(line) {
            if let (Ok(b), Ok(n)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
                let next = n.saturating_add(1);
                if b > bus_id {
                    bus_id = b;
                    node_id = next;
                } else if b == bus_id && next > node_id {
                    node_id = next;
                }
            }
        }

        // Runs for every line, matched or not.
        if node_id > bus.max_node_id() {
            bus_id = bus_id.saturating_add(1);
            node_id = 0;
        }
    }

    DiskSlot {
        bus,
        bus_id,
        node_id,
    }
}

/// Like [`free_disk_slot`], taking the bus by name.
///
/// # Errors
/// Returns `BadBusType` for anything other than `ide`, `sata` or `scsi`.
pub fn free_disk_slot_named<'a>(
    lines: impl IntoIterator<Item = &'a str>,
    bus: &str,
) -> Result<DiskSlot, DriverError> {
    Ok(free_disk_slot(lines, bus.parse()?))
}
