//! Error types for vmx-driver.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for vmx-driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors that can occur while driving a virtual machine.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The VM descriptor does not exist on disk
    #[error("descriptor not found: {}", .0.display())]
    DescriptorNotFound(PathBuf),

    /// A descriptor already exists where a new VM was to be created
    #[error("descriptor already exists: {}", .0.display())]
    DescriptorAlreadyExists(PathBuf),

    /// The named snapshot is unknown to the VM
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    /// The guest is not powered on; guest operations cannot proceed
    #[error("virtual machine is not powered on")]
    GuestPoweredOff,

    /// Every supplied guest credential was rejected
    #[error("all guest credentials were rejected")]
    BadGuestCredentials,

    /// A guest path referenced by the operation does not exist
    #[error("guest path not found: {0}")]
    GuestPathNotFound(String),

    /// Storage bus name is not one of ide, sata, scsi
    #[error("unsupported bus type: {0}")]
    BadBusType(String),

    /// The guest tooling never became available within the retry budget
    #[error("tool command still failing after {attempts} attempts")]
    MaxRetryExceeded {
        /// Number of attempts made
        attempts: u32,
    },

    /// The control tool reported an error we do not classify further
    #[error("control tool failed: {0}")]
    UnknownToolFailure(String),

    /// The disk-management tool reported an error
    #[error("disk management failed: {0}")]
    DiskManagementFailure(String),

    /// The guest did not signal readiness
    #[error("guest not ready: {0}")]
    GuestNotReady(String),

    /// Waiting on the control tool took longer than allowed
    #[error("control tool did not finish within {0:?}")]
    ToolTimeout(Duration),

    /// The operation context was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// The operation context deadline passed
    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    /// No registered driver reported its tooling as available
    #[error("no hypervisor driver available")]
    NoDriverAvailable,

    /// A request was malformed or missing required data
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DriverError::DescriptorNotFound(_) => "descriptor_not_found",
            DriverError::DescriptorAlreadyExists(_) => "descriptor_already_exists",
            DriverError::SnapshotNotFound(_) => "snapshot_not_found",
            DriverError::GuestPoweredOff => "guest_powered_off",
            DriverError::BadGuestCredentials => "bad_guest_credentials",
            DriverError::GuestPathNotFound(_) => "guest_path_not_found",
            DriverError::BadBusType(_) => "bad_bus_type",
            DriverError::MaxRetryExceeded { .. } => "max_retry_exceeded",
            DriverError::UnknownToolFailure(_) => "unknown_tool_failure",
            DriverError::DiskManagementFailure(_) => "disk_management_failure",
            DriverError::GuestNotReady(_) => "guest_not_ready",
            DriverError::ToolTimeout(_) => "tool_timeout",
            DriverError::Cancelled => "cancelled",
            DriverError::DeadlineExceeded => "deadline_exceeded",
            DriverError::NoDriverAvailable => "no_driver_available",
            DriverError::InvalidRequest(_) => "invalid_request",
            DriverError::Config(_) => "config",
            DriverError::Json(_) => "json",
            DriverError::Io(_) => "io",
        }
    }

    /// Whether the error is the generic `Error: Unknown error` tool failure.
    pub fn is_unknown_error_sentinel(&self) -> bool {
        matches!(self, DriverError::UnknownToolFailure(text) if text == crate::classifier::UNKNOWN_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_error_sentinel() {
        assert!(DriverError::UnknownToolFailure("Error: Unknown error".into())
            .is_unknown_error_sentinel());
        assert!(!DriverError::UnknownToolFailure("Error: Unknown error 42".into())
            .is_unknown_error_sentinel());
        assert!(!DriverError::BadGuestCredentials.is_unknown_error_sentinel());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(
            DriverError::MaxRetryExceeded { attempts: 20 }.kind(),
            "max_retry_exceeded"
        );
        assert_eq!(DriverError::BadBusType("nvme".into()).kind(), "bad_bus_type");
    }
}
