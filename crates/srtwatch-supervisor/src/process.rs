//! External process lifecycle — launch, poll, terminate, and the stdout
//! drain.
//!
//! Every workload we supervise (the SRT receiver, the capture analyzer)
//! shares one lifecycle: spawn with piped stdout, drain that pipe from a
//! background task so the child can never block on it, poll liveness
//! without blocking, and terminate with a bounded grace period.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

/// Where a workload's stdout goes while the process runs.
#[derive(Debug, Clone)]
pub enum DrainTarget {
    /// Accumulate lines in memory, readable via [`ProcessHandle::output`].
    Accumulate,
    /// Redirect lines to a results file, truncating it first.
    File(PathBuf),
}

/// A launchable external workload: command construction plus the drain
/// policy for its stdout.
///
/// The lifecycle (launch, poll, terminate) is shared; only the command
/// line and drain differ per workload.
pub trait Workload {
    /// Short name used in logs.
    fn name(&self) -> &'static str;
    fn command(&self) -> Command;
    fn drain(&self) -> DrainTarget;
}

/// One live or exited OS process, with its stdout drain.
pub struct ProcessHandle {
    child: Child,
    output: Arc<Mutex<Vec<String>>>,
    drain: Option<JoinHandle<()>>,
}

impl ProcessHandle {
    /// Spawn the workload and start its stdout drain immediately.
    ///
    /// A spawn failure is fatal to the session attempt and surfaced to the
    /// caller; there is no retry.
    pub fn launch(workload: &dyn Workload) -> anyhow::Result<Self> {
        let mut cmd = workload.command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn {} process", workload.name()))?;

        let stdout = child
            .stdout
            .take()
            .context("child stdout was not piped")?;

        let output = Arc::new(Mutex::new(Vec::new()));
        let drain = match workload.drain() {
            DrainTarget::Accumulate => {
                let sink = output.clone();
                tokio::spawn(async move {
                    let mut lines = BufReader::new(stdout).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        sink.lock().unwrap().push(line);
                    }
                })
            }
            DrainTarget::File(path) => tokio::spawn(drain_to_file(stdout, path)),
        };

        Ok(Self {
            child,
            output,
            drain: Some(drain),
        })
    }

    /// Non-blocking liveness poll. A probe error counts as still running.
    pub fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(_)) => false,
            Ok(None) => true,
            Err(_) => true,
        }
    }

    /// Send SIGTERM if the process is still alive. Idempotent; does not
    /// wait for the exit.
    pub fn terminate(&mut self) {
        if !self.is_alive() {
            return;
        }
        if let Some(pid) = self.child.id() {
            // SAFETY: pid is our child's OS process id. Worst case the
            // process already exited and kill returns ESRCH.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }
    }

    /// Block until the process exits on its own, then join the drain.
    pub async fn wait(&mut self) -> anyhow::Result<()> {
        self.child
            .wait()
            .await
            .context("failed waiting for process exit")?;
        if let Some(drain) = self.drain.take() {
            let _ = drain.await;
        }
        Ok(())
    }

    /// Terminate, wait up to `grace` for a clean exit, then SIGKILL.
    ///
    /// The drain task is joined with the same bound so it is never left
    /// orphaned past teardown.
    pub async fn shutdown(&mut self, grace: Duration) {
        self.terminate();
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => tracing::info!(?status, "process exited"),
            Ok(Err(e)) => tracing::warn!(error = %e, "error waiting for process exit"),
            Err(_) => {
                tracing::warn!("process did not exit within grace period, killing");
                let _ = self.child.start_kill();
                let _ = self.child.wait().await;
            }
        }
        if let Some(drain) = self.drain.take() {
            if tokio::time::timeout(grace, drain).await.is_err() {
                tracing::warn!("stdout drain did not finish within grace period");
            }
        }
    }

    /// Accumulated stdout so far. Empty for file-drained workloads.
    pub fn output(&self) -> String {
        self.output.lock().unwrap().join("\n")
    }
}

/// Drain stdout lines into a results file. If the file cannot be created
/// the pipe is still drained so the child cannot block on it.
async fn drain_to_file(stdout: ChildStdout, path: PathBuf) {
    let mut lines = BufReader::new(stdout).lines();

    let mut file = match tokio::fs::File::create(&path).await {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to create results file, discarding output");
            while let Ok(Some(_)) = lines.next_line().await {}
            return;
        }
    };

    while let Ok(Some(line)) = lines.next_line().await {
        if file.write_all(line.as_bytes()).await.is_err()
            || file.write_all(b"\n").await.is_err()
        {
            break;
        }
    }
    let _ = file.flush().await;
}
