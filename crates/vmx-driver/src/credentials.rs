//! Guest credential broker.
//!
//! Guest-targeted commands need a guest OS login. Callers supply an ordered
//! list of candidates; each is tried in turn until the tool gives an answer
//! that does not depend on which login was used.

use crate::classifier::{CommandOutcome, Outcome, NO_FAILURE_RESULT};
use crate::config::{DriverConfig, RetryPolicy};
use crate::context::OpContext;
use crate::error::{DriverError, Result};
use crate::executor::{CommandExecutor, ToolCommand};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A guest OS login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credential {
    /// Guest user name
    pub username: String,
    /// Guest password
    pub password: String,
}

impl Credential {
    /// Create a credential.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Flags for `runProgramInGuest`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunOptions {
    /// Return as soon as the program starts
    pub no_wait: bool,
    /// Bring the program window to the front (Windows guests)
    pub active_window: bool,
    /// Run in the interactive desktop session
    pub interactive: bool,
}

impl RunOptions {
    fn flags(&self) -> impl Iterator<Item = &'static str> {
        [
            (self.no_wait, "-noWait"),
            (self.active_window, "-activeWindow"),
            (self.interactive, "-interactive"),
        ]
        .into_iter()
        .filter_map(|(on, flag)| on.then_some(flag))
    }
}

/// Runs guest-targeted commands against an ordered credential list.
#[derive(Debug, Clone)]
pub struct CredentialBroker {
    executor: CommandExecutor,
    unknown_error_retry: RetryPolicy,
}

impl CredentialBroker {
    /// Create a broker on top of `executor`.
    pub fn new(executor: CommandExecutor, config: &DriverConfig) -> Self {
        Self {
            executor,
            unknown_error_retry: config.unknown_error_retry,
        }
    }

    /// Try `command` with each credential until a deterministic answer.
    ///
    /// Credential rejections are counted and the next credential is tried.
    /// Other failures are remembered and the next credential is tried.
    /// `subject` names the guest path for `GuestPathNotFound`.
    ///
    /// # Errors
    /// - `GuestPoweredOff` / `GuestPathNotFound`: immediately, no further credentials
    /// - `BadGuestCredentials`: every credential was rejected
    /// - `UnknownToolFailure`: exhausted otherwise, carrying the last failure text
    pub async fn try_credentials(
        &self,
        ctx: &OpContext,
        command: &ToolCommand,
        subject: &str,
        credentials: &[Credential],
    ) -> Result<CommandOutcome> {
        if credentials.is_empty() {
            return Err(DriverError::InvalidRequest(
                "no guest credentials supplied".into(),
            ));
        }

        let mut rejected = 0usize;
        let mut last_failure: Option<String> = None;

        for credential in credentials {
            ctx.check()?;
            let output = self
                .executor
                .execute_as(ctx, command, Some(credential))
                .await?;
            let outcome = CommandOutcome::classify(output);

            match outcome.outcome() {
                Outcome::CredentialRejected => {
                    rejected += 1;
                    tracing::debug!(
                        verb = command.verb(),
                        user = %credential.username,
                        "Guest credential rejected"
                    );
                }
                Outcome::GuestPoweredOff => return Err(DriverError::GuestPoweredOff),
                Outcome::GuestPathNotFound => {
                    return Err(DriverError::GuestPathNotFound(subject.to_string()))
                }
                Outcome::Failure | Outcome::SnapshotNotFound => {
                    tracing::debug!(
                        verb = command.verb(),
                        user = %credential.username,
                        output = outcome.text(),
                        "Guest command failed"
                    );
                    last_failure = Some(outcome.text().to_string());
                }
                Outcome::Success | Outcome::Output | Outcome::Exists(_) => {
                    tracing::debug!(
                        verb = command.verb(),
                        user = %credential.username,
                        "Guest command completed"
                    );
                    return Ok(outcome);
                }
            }
        }

        if rejected == credentials.len() {
            tracing::warn!(verb = command.verb(), tried = rejected, "All guest credentials rejected");
            return Err(DriverError::BadGuestCredentials);
        }
        Err(DriverError::UnknownToolFailure(
            last_failure.unwrap_or_else(|| NO_FAILURE_RESULT.to_string()),
        ))
    }

    /// Whether `path` is a file in the guest.
    pub async fn file_exists(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        path: &str,
        credentials: &[Credential],
    ) -> Result<bool> {
        let command = ToolCommand::new("fileExistsInGuest").path(vmx).arg(path);
        expect_exists(self.try_credentials(ctx, &command, path, credentials).await?)
    }

    /// Whether `path` is a directory in the guest.
    pub async fn directory_exists(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        path: &str,
        credentials: &[Credential],
    ) -> Result<bool> {
        let command = ToolCommand::new("directoryExistsInGuest")
            .path(vmx)
            .arg(path);
        expect_exists(self.try_credentials(ctx, &command, path, credentials).await?)
    }

    /// Run a program in the guest, returning the tool's output.
    ///
    /// The credential loop is retried (5 attempts, 1 s apart by default)
    /// while it ends in exactly `Error: Unknown error`.
    pub async fn execute_command(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        program: &str,
        args: &[String],
        options: RunOptions,
        credentials: &[Credential],
    ) -> Result<String> {
        let command = ToolCommand::new("runProgramInGuest")
            .path(vmx)
            .args(options.flags())
            .arg(program)
            .args(args.iter().cloned());

        let policy = self.unknown_error_retry;
        let mut attempt = 1;
        loop {
            match self.try_credentials(ctx, &command, program, credentials).await {
                Err(e) if e.is_unknown_error_sentinel() && attempt < policy.max_attempts => {
                    tracing::warn!(
                        program,
                        attempt,
                        max_attempts = policy.max_attempts,
                        "Guest command hit unknown error, retrying"
                    );
                    ctx.pause(policy.delay).await?;
                    attempt += 1;
                }
                result => return result.map(|outcome| outcome.text().to_string()),
            }
        }
    }

    /// Copy a host file into the guest.
    pub async fn copy_to_guest(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        host_path: &Path,
        guest_path: &str,
        credentials: &[Credential],
    ) -> Result<()> {
        let command = ToolCommand::new("copyFileFromHostToGuest")
            .path(vmx)
            .path(host_path)
            .arg(guest_path);
        self.run_guest_action(ctx, &command, guest_path, credentials)
            .await
    }

    /// Copy a guest file to the host.
    pub async fn copy_from_guest(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        guest_path: &str,
        host_path: &Path,
        credentials: &[Credential],
    ) -> Result<()> {
        let command = ToolCommand::new("copyFileFromGuestToHost")
            .path(vmx)
            .arg(guest_path)
            .path(host_path);
        self.run_guest_action(ctx, &command, guest_path, credentials)
            .await
    }

    /// Create a directory in the guest.
    pub async fn create_directory(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        path: &str,
        credentials: &[Credential],
    ) -> Result<()> {
        let command = ToolCommand::new("createDirectoryInGuest")
            .path(vmx)
            .arg(path);
        self.run_guest_action(ctx, &command, path, credentials).await
    }

    /// Delete a file in the guest.
    pub async fn delete_file(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        path: &str,
        credentials: &[Credential],
    ) -> Result<()> {
        let command = ToolCommand::new("deleteFileInGuest").path(vmx).arg(path);
        self.run_guest_action(ctx, &command, path, credentials).await
    }

    /// Delete a directory in the guest.
    pub async fn delete_directory(
        &self,
        ctx: &OpContext,
        vmx: &Path,
        path: &str,
        credentials: &[Credential],
    ) -> Result<()> {
        let command = ToolCommand::new("deleteDirectoryInGuest")
            .path(vmx)
            .arg(path);
        self.run_guest_action(ctx, &command, path, credentials).await
    }

    async fn run_guest_action(
        &self,
        ctx: &OpContext,
        command: &ToolCommand,
        subject: &str,
        credentials: &[Credential],
    ) -> Result<()> {
        self.try_credentials(ctx, command, subject, credentials)
            .await
            .map(|_| ())
    }
}

fn expect_exists(outcome: CommandOutcome) -> Result<bool> {
    match outcome.outcome() {
        Outcome::Exists(exists) => Ok(exists),
        _ => Err(DriverError::UnknownToolFailure(outcome.text().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let credential = Credential::new("admin", "hunter2");
        let debug = format!("{credential:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_run_option_flags() {
        let options = RunOptions {
            no_wait: true,
            interactive: true,
            ..Default::default()
        };
        assert_eq!(
            options.flags().collect::<Vec<_>>(),
            vec!["-noWait", "-interactive"]
        );
        assert_eq!(RunOptions::default().flags().count(), 0);
    }

    #[test]
    fn test_credential_rejects_unknown_fields() {
        let result: std::result::Result<Credential, _> =
            serde_json::from_str(r#"{"username":"a","password":"b","domain":"x"}"#);
        assert!(result.is_err());
    }
}
