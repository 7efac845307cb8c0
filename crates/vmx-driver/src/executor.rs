//! Command executor for the control tool.
//!
//! One process spawn per command. stdout and stderr are captured and
//! concatenated (stdout first). The only output interpreted here is the
//! "tools not running" sentinel, which is retried; everything else goes back
//! to the caller for classification.

use crate::config::{DriverConfig, HostType, RetryPolicy};
use crate::context::OpContext;
use crate::credentials::Credential;
use crate::error::{DriverError, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

/// Transient failure printed while guest tooling is still starting.
pub const TOOLS_NOT_RUNNING: &str = "Tools are not running in the guest";

/// Spawns an external program and returns its combined output.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `program` with `args`.
    ///
    /// A `timeout` bounds the wait but does not kill the process; an elapsed
    /// timeout is reported as `ToolTimeout`.
    async fn run(&self, program: &Path, args: &[String], timeout: Option<Duration>)
        -> Result<String>;
}

/// [`ToolRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<String> {
        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| DriverError::ToolTimeout(limit))??,
            None => command.output().await?,
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(combined)
    }
}

/// A control-tool command: a verb (`start`, `listSnapshots`, ...) and its
/// arguments. Host type and guest credentials are added by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    verb: String,
    args: Vec<String>,
}

impl ToolCommand {
    /// Start a command with the given verb.
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a host path argument.
    pub fn path(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The verb.
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Full argument vector: `-T <host> [-gu <user> -gp <password>] <verb> <args>`.
    pub fn argv(&self, host: HostType, credential: Option<&Credential>) -> Vec<String> {
        let mut argv = vec!["-T".to_string(), host.as_str().to_string()];
        if let Some(credential) = credential {
            argv.extend([
                "-gu".to_string(),
                credential.username.clone(),
                "-gp".to_string(),
                credential.password.clone(),
            ]);
        }
        argv.push(self.verb.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verb)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Runs control-tool commands, retrying while guest tooling is not up.
#[derive(Clone)]
pub struct CommandExecutor {
    runner: Arc<dyn ToolRunner>,
    vmrun_path: PathBuf,
    host_type: HostType,
    retry: RetryPolicy,
    timeout: Option<Duration>,
}

impl fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("vmrun_path", &self.vmrun_path)
            .field("host_type", &self.host_type)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl CommandExecutor {
    /// Create an executor for the tool described by `config`.
    pub fn new(runner: Arc<dyn ToolRunner>, config: &DriverConfig) -> Self {
        Self {
            runner,
            vmrun_path: config.vmrun_path.clone(),
            host_type: config.host_type,
            retry: config.tools_retry,
            timeout: config.tool_timeout,
        }
    }

    /// The process runner, shared with other tools.
    pub fn runner(&self) -> &Arc<dyn ToolRunner> {
        &self.runner
    }

    /// Run a host-side command.
    pub async fn execute(&self, ctx: &OpContext, command: &ToolCommand) -> Result<String> {
        self.execute_as(ctx, command, None).await
    }

    /// Run a command, authenticating to the guest with `credential` if given.
    ///
    /// # Errors
    /// `MaxRetryExceeded` when every attempt reports that guest tooling is not
    /// running; `Io`/`ToolTimeout` from the runner; context errors.
    pub async fn execute_as(
        &self,
        ctx: &OpContext,
        command: &ToolCommand,
        credential: Option<&Credential>,
    ) -> Result<String> {
        let argv = command.argv(self.host_type, credential);
        let max_attempts = self.retry.max_attempts;

        for attempt in 1..=max_attempts {
            ctx.check()?;
            tracing::debug!(
                command = %command,
                user = credential.map(|c| c.username.as_str()),
                attempt,
                "Invoking vmrun"
            );

            let output = self
                .runner
                .run(&self.vmrun_path, &argv, self.timeout)
                .await?;
            tracing::trace!(verb = command.verb(), output = %output.trim(), "vmrun output");

            if !output.contains(TOOLS_NOT_RUNNING) {
                return Ok(output);
            }

            tracing::warn!(
                verb = command.verb(),
                attempt,
                max_attempts,
                "Guest tools not running, retrying"
            );
            if attempt < max_attempts {
                ctx.pause(self.retry.delay).await?;
            }
        }

        Err(DriverError::MaxRetryExceeded {
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argv_layout() {
        let command = ToolCommand::new("fileExistsInGuest")
            .path(Path::new("/vms/a/a.vmx"))
            .arg("C:\\boot.ini");
        let credential = Credential::new("admin", "secret");

        assert_eq!(
            command.argv(HostType::Ws, Some(&credential)),
            vec![
                "-T",
                "ws",
                "-gu",
                "admin",
                "-gp",
                "secret",
                "fileExistsInGuest",
                "/vms/a/a.vmx",
                "C:\\boot.ini"
            ]
        );
        assert_eq!(
            command.argv(HostType::Fusion, None)[..3],
            ["-T", "fusion", "fileExistsInGuest"]
        );
    }

    #[test]
    fn test_display_never_contains_credentials() {
        let command = ToolCommand::new("start").path(Path::new("/vms/my vm/a.vmx"));
        assert_eq!(command.to_string(), "start \"/vms/my vm/a.vmx\"");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_concatenates_stdout_then_stderr() {
        let args = vec!["-c".to_string(), "printf out; printf err >&2".to_string()];
        let output = ProcessRunner
            .run(Path::new("/bin/sh"), &args, Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(output, "outerr");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_timeout() {
        let args = vec!["5".to_string()];
        let limit = Duration::from_millis(100);
        let result = ProcessRunner
            .run(Path::new("sleep"), &args, Some(limit))
            .await;
        assert!(matches!(result, Err(DriverError::ToolTimeout(elapsed)) if elapsed == limit));
    }

    #[tokio::test]
    async fn test_process_runner_missing_binary() {
        let result = ProcessRunner
            .run(Path::new("/nonexistent/vmrun"), &[], None)
            .await;
        assert!(matches!(result, Err(DriverError::Io(_))));
    }
}
