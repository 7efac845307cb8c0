//! Classification of raw control-tool output.
//!
//! The tool reports everything as free text on stdout/stderr. Matching is on
//! literal, case-sensitive prefixes of the trimmed output.

use crate::error::{DriverError, Result};

/// Snapshot name unknown to the VM.
pub const SNAPSHOT_NOT_FOUND: &str = "Error: Invalid snapshot name";
/// Guest rejected the supplied user name/password.
pub const CREDENTIALS_REJECTED: &str = "Error: Invalid user name or password for the guest OS.";
/// Guest operation attempted on a VM that is off.
pub const POWERED_OFF: &str = "Error: The virtual machine is not powered on:";
/// Guest path missing.
pub const PATH_NOT_FOUND: &str = "Error: A file was not found";
/// Generic failure the tool emits for assorted transient problems.
pub const UNKNOWN_ERROR: &str = "Error: Unknown error";
/// Guest program ran but returned non-zero; the exit code is the guest's concern.
pub const NONZERO_EXIT: &str = "Guest program exited with non-zero exit code";
/// Failure text used when a credential loop ends without any failure text.
pub const NO_FAILURE_RESULT: &str = "no failure result";

const ERROR_PREFIX: &str = "Error:";

const EXISTS_TRUE: [&str; 2] = ["The file exists.", "The directory exists"];
const EXISTS_FALSE: [&str; 2] = ["The file does not exist.", "The directory does not exist."];

/// Summary line printed by `list`.
pub const RUNNING_VMS_SUMMARY: &str = "Total running VMs:";
/// Summary line printed by `listSnapshots`.
pub const SNAPSHOTS_SUMMARY: &str = "Total snapshots:";

/// What one tool invocation amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Empty output, or a guest program that ran to completion
    Success,
    /// Non-error text, e.g. a listing
    Output,
    /// Answer to an exists query
    Exists(bool),
    /// `Error: Invalid snapshot name`
    SnapshotNotFound,
    /// Guest credentials rejected; counted by the credential broker
    CredentialRejected,
    /// VM is powered off; fatal for guest operations
    GuestPoweredOff,
    /// Guest path missing
    GuestPathNotFound,
    /// Any other `Error:` output
    Failure,
}

/// Raw tool output paired with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    raw: String,
    outcome: Outcome,
}

impl CommandOutcome {
    /// Classify raw output.
    pub fn classify(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let outcome = classify(&raw);
        Self { raw, outcome }
    }

    /// The classification.
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Untouched output.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Output with surrounding whitespace removed.
    pub fn text(&self) -> &str {
        self.raw.trim()
    }

    /// Uniform mapping for host-side commands: error outcomes become
    /// `UnknownToolFailure` carrying the text, except a powered-off guest.
    pub fn into_result(self) -> Result<String> {
        match self.outcome {
            Outcome::Success | Outcome::Output | Outcome::Exists(_) => {
                Ok(self.text().to_string())
            }
            Outcome::GuestPoweredOff => Err(DriverError::GuestPoweredOff),
            Outcome::SnapshotNotFound
            | Outcome::CredentialRejected
            | Outcome::GuestPathNotFound
            | Outcome::Failure => Err(DriverError::UnknownToolFailure(self.text().to_string())),
        }
    }

    /// Like [`into_result`](Self::into_result), but maps an invalid snapshot
    /// name to `SnapshotNotFound(snapshot)`.
    pub fn into_snapshot_result(self, snapshot: &str) -> Result<String> {
        if self.outcome == Outcome::SnapshotNotFound {
            return Err(DriverError::SnapshotNotFound(snapshot.to_string()));
        }
        self.into_result()
    }
}

/// Classify raw tool output.
pub fn classify(raw: &str) -> Outcome {
    let text = raw.trim();

    if text.is_empty() {
        return Outcome::Success;
    }
    if text.starts_with(SNAPSHOT_NOT_FOUND) {
        return Outcome::SnapshotNotFound;
    }
    if text.starts_with(CREDENTIALS_REJECTED) {
        return Outcome::CredentialRejected;
    }
    if text.starts_with(POWERED_OFF) {
        return Outcome::GuestPoweredOff;
    }
    if text.starts_with(PATH_NOT_FOUND) {
        return Outcome::GuestPathNotFound;
    }
    if EXISTS_TRUE.iter().any(|p| text.starts_with(p)) {
        return Outcome::Exists(true);
    }
    if EXISTS_FALSE.iter().any(|p| text.starts_with(p)) {
        return Outcome::Exists(false);
    }
    if text.starts_with(NONZERO_EXIT) {
        return Outcome::Success;
    }
    if text.starts_with(ERROR_PREFIX) {
        return Outcome::Failure;
    }
    Outcome::Output
}

/// Lines of a listing with the leading `summary` line removed.
pub fn strip_summary(text: &str, summary: &str) -> Vec<String> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .peekable();
    if lines.next_if(|line| line.starts_with(summary)).is_some() {
        tracing::trace!(summary, "Dropped listing summary line");
    }
    lines.map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_success() {
        assert_eq!(classify(""), Outcome::Success);
        assert_eq!(classify("  \r\n"), Outcome::Success);
    }

    #[test]
    fn test_error_table() {
        assert_eq!(
            classify("Error: Invalid snapshot name 'base'\n"),
            Outcome::SnapshotNotFound
        );
        assert_eq!(
            classify("Error: Invalid user name or password for the guest OS.\n"),
            Outcome::CredentialRejected
        );
        assert_eq!(
            classify("Error: The virtual machine is not powered on: /vms/a.vmx"),
            Outcome::GuestPoweredOff
        );
        assert_eq!(
            classify("Error: A file was not found"),
            Outcome::GuestPathNotFound
        );
        assert_eq!(classify("Error: Unknown error"), Outcome::Failure);
        assert_eq!(classify("Error: Cannot open VM"), Outcome::Failure);
    }

    #[test]
    fn test_exists_answers() {
        assert_eq!(classify("The file exists.\n"), Outcome::Exists(true));
        assert_eq!(classify("The directory exists.\n"), Outcome::Exists(true));
        assert_eq!(classify("The file does not exist.\n"), Outcome::Exists(false));
        assert_eq!(
            classify("The directory does not exist.\n"),
            Outcome::Exists(false)
        );
    }

    #[test]
    fn test_nonzero_guest_exit_is_success() {
        assert_eq!(
            classify("Guest program exited with non-zero exit code: 3\n"),
            Outcome::Success
        );
    }

    #[test]
    fn test_case_sensitive() {
        assert_eq!(classify("error: lowercase"), Outcome::Output);
        assert_eq!(classify("Total running VMs: 0"), Outcome::Output);
    }

    #[test]
    fn test_uniform_mapping() {
        let ok = CommandOutcome::classify("Total snapshots: 1\nbase\n");
        assert_eq!(ok.into_result().unwrap(), "Total snapshots: 1\nbase");

        let err = CommandOutcome::classify("Error: Cannot open VM\n");
        assert!(matches!(
            err.into_result(),
            Err(DriverError::UnknownToolFailure(text)) if text == "Error: Cannot open VM"
        ));

        let off = CommandOutcome::classify("Error: The virtual machine is not powered on: x");
        assert!(matches!(off.into_result(), Err(DriverError::GuestPoweredOff)));
    }

    #[test]
    fn test_snapshot_mapping() {
        let missing = CommandOutcome::classify("Error: Invalid snapshot name 'gold'");
        assert!(matches!(
            missing.into_snapshot_result("gold"),
            Err(DriverError::SnapshotNotFound(name)) if name == "gold"
        ));
    }

    #[test]
    fn test_strip_summary() {
        let text = "Total running VMs: 2\n/vms/a/a.vmx\n/vms/b/b.vmx\n";
        assert_eq!(
            strip_summary(text, RUNNING_VMS_SUMMARY),
            vec!["/vms/a/a.vmx", "/vms/b/b.vmx"]
        );
        assert_eq!(strip_summary("base\n", SNAPSHOTS_SUMMARY), vec!["base"]);
        assert!(strip_summary("Total snapshots: 0\n", SNAPSHOTS_SUMMARY).is_empty());
    }
}
