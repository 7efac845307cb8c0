//! Waiting for guest tooling through a session-oriented channel.
//!
//! A session is opened against a descriptor, asked to block until the guest
//! tooling reports ready (or a timeout elapses), and released. Release is tied
//! to [`ScopedSession`]'s `Drop`, so every exit path closes the session.
//!
//! The shipped channel, [`ToolsStateAutomation`], polls the control tool's
//! `checkToolsState` verb. It is not a separate automation connection: each
//! poll is one tool invocation subject to the caller's [`OpContext`]. Hosts
//! with a native automation API plug in through [`GuestAutomation`].

use crate::context::OpContext;
use crate::error::{DriverError, Result};
use crate::executor::{CommandExecutor, ToolCommand};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Opens sessions to a VM's guest.
#[async_trait]
pub trait GuestAutomation: Send + Sync {
    /// Connect to the VM described by `vmx`.
    async fn connect(&self, vmx: &Path) -> Result<Box<dyn GuestSession>>;
}

/// An open connection to one guest.
#[async_trait]
pub trait GuestSession: Send {
    /// Block until guest tooling is up or `timeout` elapses. Stops early
    /// once `ctx` is cancelled or past its deadline.
    async fn wait_for_tools(&mut self, ctx: &OpContext, timeout: Duration) -> Result<()>;

    /// Release the session. Called exactly once.
    fn close(&mut self);
}

/// A session that is closed when dropped.
pub struct ScopedSession {
    vmx: PathBuf,
    inner: Option<Box<dyn GuestSession>>,
}

impl ScopedSession {
    /// Open a session through `automation`.
    pub async fn open(automation: &dyn GuestAutomation, vmx: &Path) -> Result<Self> {
        let inner = automation.connect(vmx).await.map_err(not_ready)?;
        tracing::debug!(vmx = %vmx.display(), "Guest session opened");
        Ok(Self {
            vmx: vmx.to_path_buf(),
            inner: Some(inner),
        })
    }

    /// Block until guest tooling is up or `timeout` elapses.
    pub async fn wait_for_tools(&mut self, ctx: &OpContext, timeout: Duration) -> Result<()> {
        let session = self
            .inner
            .as_mut()
            .ok_or_else(|| DriverError::GuestNotReady("session already closed".into()))?;
        session.wait_for_tools(ctx, timeout).await.map_err(not_ready)
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if let Some(mut session) = self.inner.take() {
            session.close();
            tracing::debug!(vmx = %self.vmx.display(), "Guest session closed");
        }
    }
}

fn not_ready(error: DriverError) -> DriverError {
    match error {
        DriverError::GuestNotReady(_)
        | DriverError::Cancelled
        | DriverError::DeadlineExceeded => error,
        other => DriverError::GuestNotReady(other.to_string()),
    }
}

/// Open a session, wait for guest tooling, release the session.
pub async fn wait_for_guest_ready(
    automation: &dyn GuestAutomation,
    ctx: &OpContext,
    vmx: &Path,
    timeout: Duration,
) -> Result<()> {
    ctx.check()?;
    let started = std::time::Instant::now();
    let mut session = ScopedSession::open(automation, vmx).await?;
    session.wait_for_tools(ctx, timeout).await?;
    tracing::info!(
        vmx = %vmx.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Guest tools ready"
    );
    Ok(())
}

/// [`GuestAutomation`] that polls `checkToolsState` until it reports `running`.
#[derive(Debug, Clone)]
pub struct ToolsStateAutomation {
    executor: CommandExecutor,
    poll_interval: Duration,
}

impl ToolsStateAutomation {
    /// Poll through `executor` every `poll_interval`.
    pub fn new(executor: CommandExecutor, poll_interval: Duration) -> Self {
        Self {
            executor,
            poll_interval,
        }
    }
}

#[async_trait]
impl GuestAutomation for ToolsStateAutomation {
    async fn connect(&self, vmx: &Path) -> Result<Box<dyn GuestSession>> {
        if !vmx.is_file() {
            return Err(DriverError::DescriptorNotFound(vmx.to_path_buf()));
        }
        Ok(Box::new(ToolsStateSession {
            executor: self.executor.clone(),
            poll_interval: self.poll_interval,
            vmx: vmx.to_path_buf(),
        }))
    }
}

struct ToolsStateSession {
    executor: CommandExecutor,
    poll_interval: Duration,
    vmx: PathBuf,
}

impl ToolsStateSession {
    async fn poll_until_running(&self, ctx: &OpContext) -> Result<()> {
        let command = ToolCommand::new("checkToolsState").path(&self.vmx);
        loop {
            ctx.check()?;
            let state = self.executor.execute(ctx, &command).await?;
            let state = state.trim();
            if state == "running" {
                return Ok(());
            }
            tracing::trace!(vmx = %self.vmx.display(), state, "Guest tools not ready yet");
            ctx.pause(self.poll_interval).await?;
        }
    }
}

#[async_trait]
impl GuestSession for ToolsStateSession {
    async fn wait_for_tools(&mut self, ctx: &OpContext, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.poll_until_running(ctx))
            .await
            .map_err(|_| DriverError::GuestNotReady(format!("timed out after {timeout:?}")))?
    }

    // Polling holds no connection open.
    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingAutomation {
        closed: Arc<AtomicUsize>,
        ready: bool,
    }

    struct CountingSession {
        closed: Arc<AtomicUsize>,
        ready: bool,
    }

    #[async_trait]
    impl GuestAutomation for CountingAutomation {
        async fn connect(&self, _vmx: &Path) -> Result<Box<dyn GuestSession>> {
            Ok(Box::new(CountingSession {
                closed: self.closed.clone(),
                ready: self.ready,
            }))
        }
    }

    #[async_trait]
    impl GuestSession for CountingSession {
        async fn wait_for_tools(&mut self, _ctx: &OpContext, _timeout: Duration) -> Result<()> {
            if self.ready {
                Ok(())
            } else {
                Err(DriverError::UnknownToolFailure("job failed".into()))
            }
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_session_closed_on_success() {
        let closed = Arc::new(AtomicUsize::new(0));
        let automation = CountingAutomation {
            closed: closed.clone(),
            ready: true,
        };
        wait_for_guest_ready(
            &automation,
            &OpContext::new(),
            Path::new("/vms/a.vmx"),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_closed_on_failure() {
        let closed = Arc::new(AtomicUsize::new(0));
        let automation = CountingAutomation {
            closed: closed.clone(),
            ready: false,
        };
        let result = wait_for_guest_ready(
            &automation,
            &OpContext::new(),
            Path::new("/vms/a.vmx"),
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(DriverError::GuestNotReady(_))));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_context_opens_no_session() {
        let closed = Arc::new(AtomicUsize::new(0));
        let automation = CountingAutomation {
            closed: closed.clone(),
            ready: true,
        };
        let ctx = OpContext::new();
        ctx.cancel();
        let result = wait_for_guest_ready(
            &automation,
            &ctx,
            Path::new("/vms/a.vmx"),
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(DriverError::Cancelled)));
        assert_eq!(closed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_context_errors_pass_through() {
        assert!(matches!(not_ready(DriverError::Cancelled), DriverError::Cancelled));
        assert!(matches!(
            not_ready(DriverError::DeadlineExceeded),
            DriverError::DeadlineExceeded
        ));
        assert!(matches!(
            not_ready(DriverError::UnknownToolFailure("x".into())),
            DriverError::GuestNotReady(_)
        ));
    }
}
