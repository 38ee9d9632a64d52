//! Exclusive lifecycle controller for the tunneling agent process.
//!
//! [`ProcessController`] owns the only handle to the running agent. Both
//! [`launch`](ProcessController::launch) and
//! [`shutdown`](ProcessController::shutdown) take the same `tokio::sync::Mutex`
//! for their whole duration, so lifecycle transitions never interleave and
//! run in the order their lock acquisition succeeds (tokio's mutex is FIFO).
//!
//! ```text
//!            launch                    launch (kill + reap old, spawn new)
//!   Idle ─────────────▶ Running ◀──────────────┐
//!    ▲                     │ └─────────────────┘
//!    └──── shutdown ───────┘
//! ```
//!
//! A launch holds the lock across the settle delay and the status query.
//! Requests arriving in the meantime queue behind it.
//!
//! Termination is always "signal, then wait": the kill is sent without
//! blocking (it may fail if the process is already gone), then `wait()`
//! reaps the child before the lock is released. A handle is never dropped
//! while its process may still be alive.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::status::{format_report, StatusClient};
use crate::config::{Config, TunnelProfile};
use crate::error::LifecycleError;

/// Reply text for a clean shutdown.
pub const SHUTDOWN_OK: &str = "Shutdown successfully";

/// Controls at most one agent process.
///
/// Cloneable. All clones share the same handle and lock.
#[derive(Clone)]
pub struct ProcessController {
    inner: Arc<Inner>,
}

struct Inner {
    bin_path: String,
    settle_delay: Duration,
    status: StatusClient,
    verbose: bool,
    /// The running agent, if any. Only touched with the lock held.
    current: Mutex<Option<Child>>,
}

impl ProcessController {
    pub fn new(
        bin_path: impl Into<String>,
        settle_delay: Duration,
        status: StatusClient,
        verbose: bool,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                bin_path: bin_path.into(),
                settle_delay,
                status,
                verbose,
                current: Mutex::new(None),
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.agent.bin_path.clone(),
            config.settle_delay(),
            StatusClient::new(config.agent.status_url.clone(), config.logging.verbose),
            config.logging.verbose,
        )
    }

    /// Replace any running agent with a fresh one started from `profile`.
    ///
    /// On success returns the endpoint report. A status fetch failure is an
    /// error but leaves the new process running.
    pub async fn launch(&self, profile: &TunnelProfile) -> Result<String, LifecycleError> {
        let mut current = self.inner.current.lock().await;

        if let Some(child) = current.take() {
            if self.inner.verbose {
                info!("launch: killing process...");
            }
            let status = terminate(child).await;
            debug!("Previous agent exited: {}", describe_exit(status.as_ref()));
        }

        if self.inner.verbose {
            info!("launch: starting process for profile '{}'...", profile.label);
        }
        let child = Command::new(&self.inner.bin_path)
            .args(&profile.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                warn!("Failed to spawn {}: {e}", self.inner.bin_path);
                LifecycleError::SpawnFailed(e)
            })?;
        info!(
            "Agent started for profile '{}' (pid {:?})",
            profile.label,
            child.id()
        );
        *current = Some(child);

        tokio::time::sleep(self.inner.settle_delay).await;

        let endpoints = self
            .inner
            .status
            .fetch_status()
            .await
            .map_err(LifecycleError::StatusFetchFailed)?;
        Ok(format_report(&endpoints))
    }

    /// Stop the running agent and report how it exited.
    ///
    /// A non-clean exit (which is what a kill normally produces) is still a
    /// success; the exit description is appended as information.
    pub async fn shutdown(&self) -> Result<String, LifecycleError> {
        let mut current = self.inner.current.lock().await;
        let child = current.take().ok_or(LifecycleError::NoProcessRunning)?;

        if self.inner.verbose {
            info!("shutdown: killing process...");
        }
        let status = terminate(child).await;
        info!("Agent stopped: {}", describe_exit(status.as_ref()));

        Ok(match status {
            Ok(s) if s.success() => SHUTDOWN_OK.to_string(),
            other => format!("{SHUTDOWN_OK}: {}", describe_exit(other.as_ref())),
        })
    }

    /// PID of the running agent, if any.
    pub async fn running_pid(&self) -> Option<u32> {
        self.inner
            .current
            .lock()
            .await
            .as_ref()
            .and_then(Child::id)
    }

    pub async fn is_running(&self) -> bool {
        self.inner.current.lock().await.is_some()
    }
}

/// Send the kill without blocking, then reap. Consumes the handle so it can
/// never be reused after being signaled.
async fn terminate(mut child: Child) -> std::io::Result<ExitStatus> {
    if let Err(e) = child.start_kill() {
        // Already exited; wait() below still reaps it.
        debug!("Kill signal not delivered: {e}");
    }
    child.wait().await
}

fn describe_exit(status: Result<&ExitStatus, &std::io::Error>) -> String {
    match status {
        Ok(s) => s.to_string(),
        Err(e) => format!("wait failed: {e}"),
    }
}
