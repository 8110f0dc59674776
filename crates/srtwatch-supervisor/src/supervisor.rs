//! Session supervision — owns one receiver process, its connection
//! monitor, and the log-derived session metadata.
//!
//! A supervisor runs exactly one session: `Idle -> Launching ->
//! Monitoring -> Terminated`, with the unconnected->connected flip
//! happening at most once. A new session means a new supervisor; the
//! overlap guard in [`SessionSupervisor::start`] refuses to launch while
//! a previous process of this instance is still alive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use srtwatch_common::artifacts::SessionArtifacts;
use srtwatch_common::config::SessionConfig;

use crate::inspect::{ProbePrograms, TransportStreamInspector, DEFAULT_FFPROBE};
use crate::logscrape;
use crate::netem;
use crate::process::{DrainTarget, ProcessHandle, Workload};

/// Grace before the first artifact poll, giving the receiver time to
/// create its statistics file.
const MONITOR_GRACE: Duration = Duration::from_secs(1);
/// Fixed artifact poll interval.
const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Bound on process and background-task teardown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The receiver workload — a fully-formed shell invocation of
/// `srt-live-transmit`, with the transport stream redirected to the
/// capture file.
struct ReceiverWorkload {
    bin: String,
    config: SessionConfig,
    artifacts: SessionArtifacts,
}

impl ReceiverWorkload {
    fn command_line(&self) -> String {
        format!(
            "{bin} -fullstats -statspf:csv -stats-report-frequency:100 \
             -statsout:{stats} -loglevel:info -logfile:{log} -to:{timeout} \
             srt://{ip}:{port}?mode={mode} file://con > {capture}",
            bin = self.bin,
            stats = self.artifacts.stats().display(),
            log = self.artifacts.log().display(),
            timeout = self.config.timeout_secs,
            ip = self.config.address,
            port = self.config.port,
            mode = self.config.mode,
            capture = self.artifacts.capture().display(),
        )
    }
}

impl Workload for ReceiverWorkload {
    fn name(&self) -> &'static str {
        "srt-receiver"
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(self.command_line());
        cmd
    }

    fn drain(&self) -> DrainTarget {
        DrainTarget::Accumulate
    }
}

/// Owns one session's process, connection monitor, and metadata.
pub struct SessionSupervisor {
    config: SessionConfig,
    artifacts: SessionArtifacts,
    receiver_bin: Option<String>,
    ffprobe_bin: String,
    handle: Option<Arc<Mutex<ProcessHandle>>>,
    connected: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    monitor: Option<JoinHandle<()>>,
    emulated_iface: Option<String>,
}

impl SessionSupervisor {
    pub fn new(config: SessionConfig, artifacts: SessionArtifacts) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            artifacts,
            receiver_bin: None,
            ffprobe_bin: DEFAULT_FFPROBE.into(),
            handle: None,
            connected: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            monitor: None,
            emulated_iface: None,
        }
    }

    /// Override the receiver binary (settings file, tests). The default is
    /// `srt-live-transmit-v<version>`.
    pub fn with_receiver_bin(mut self, bin: impl Into<String>) -> Self {
        self.receiver_bin = Some(bin.into());
        self
    }

    /// Override the ffprobe binary used for transport-stream inspection.
    pub fn with_ffprobe(mut self, bin: impl Into<String>) -> Self {
        self.ffprobe_bin = bin.into();
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn artifacts(&self) -> &SessionArtifacts {
        &self.artifacts
    }

    /// Launch the receiver and start the connection monitor.
    ///
    /// Refuses to overlap a still-running session (the shared artifact
    /// paths and the host interface admit one session at a time) and
    /// refuses reuse after a finished one: a new session gets a new
    /// supervisor.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        if self.handle.is_some() {
            if self.is_running().await {
                anyhow::bail!("a receiver session is already running");
            }
            anyhow::bail!("this supervisor already ran a session; construct a new one");
        }

        self.artifacts.ensure_dir()?;
        self.artifacts.remove_stale();

        let workload = ReceiverWorkload {
            bin: self.receiver_bin.clone().unwrap_or_else(|| {
                format!("srt-live-transmit-v{}", self.config.version.tag())
            }),
            config: self.config.clone(),
            artifacts: self.artifacts.clone(),
        };

        tracing::info!(
            mode = %self.config.mode,
            address = %self.config.address,
            port = self.config.port,
            timeout_secs = self.config.timeout_secs,
            command = %workload.command_line(),
            "starting receiver session"
        );

        let handle = Arc::new(Mutex::new(ProcessHandle::launch(&workload)?));
        self.handle = Some(handle.clone());

        let connected = self.connected.clone();
        let stats_path = self.artifacts.stats();
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.monitor = Some(tokio::spawn(monitor_connection(
            handle,
            stats_path,
            connected,
            shutdown_rx,
        )));

        Ok(())
    }

    /// Whether the receiver process is currently alive.
    pub async fn is_running(&self) -> bool {
        match &self.handle {
            Some(handle) => handle.lock().await.is_alive(),
            None => false,
        }
    }

    /// Current connection status. Non-blocking, no side effects.
    pub fn connection_established(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Return the flag to false ahead of the caller's next render. The
    /// monitor never does this itself; within a session the flip is
    /// one-way.
    pub fn reset_connection_flag(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// First peer `ip:port` found in the receiver log, or the sentinel
    /// string when the log is missing or carries no endpoint yet.
    ///
    /// Tolerates a still-growing log; repeated calls on an unchanged log
    /// return the same result.
    pub fn extract_connected_endpoint(&self) -> String {
        match std::fs::read_to_string(self.artifacts.log()) {
            Ok(content) => logscrape::first_endpoint(&content)
                .unwrap_or_else(|| logscrape::UNRESOLVED.to_string()),
            Err(_) => logscrape::UNRESOLVED.to_string(),
        }
    }

    /// Receiver stdout accumulated by the drain so far.
    pub async fn output(&self) -> String {
        match &self.handle {
            Some(handle) => handle.lock().await.output(),
            None => String::new(),
        }
    }

    /// Three-way transport-stream verdict for the captured file.
    pub fn is_valid_transport_stream(&self) -> Option<bool> {
        self.inspector().is_valid_transport_stream()
    }

    /// Program/stream enumeration for the captured file.
    pub fn programs(&self) -> Option<ProbePrograms> {
        self.inspector().programs()
    }

    fn inspector(&self) -> TransportStreamInspector {
        TransportStreamInspector::new(self.artifacts.capture()).with_ffprobe(&self.ffprobe_bin)
    }

    /// Apply a delay rule on `interface`, remembering it so teardown can
    /// clear it. The controller clears before applying, so rules never
    /// stack.
    pub fn add_network_emulation(&mut self, interface: &str, delay_ms: u32) {
        netem::apply(interface, delay_ms);
        self.emulated_iface = Some(interface.to_string());
    }

    /// Clear any delay rule on `interface`. Safe to call when none is
    /// installed.
    pub fn clear_network_emulation(&mut self, interface: &str) {
        netem::clear(interface);
        if self.emulated_iface.as_deref() == Some(interface) {
            self.emulated_iface = None;
        }
    }

    /// Stop monitoring and the receiver process, then clear network
    /// emulation when this session applied it.
    ///
    /// Background tasks are joined with a bounded grace so none outlive
    /// the supervisor into a following session.
    pub async fn teardown(&mut self) {
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.handle.take() {
            handle.lock().await.shutdown(SHUTDOWN_GRACE).await;
        }

        if let Some(monitor) = self.monitor.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, monitor).await.is_err() {
                tracing::warn!("connection monitor did not stop within grace period");
            }
        }

        if let Some(interface) = self.emulated_iface.take() {
            netem::clear(&interface);
        }

        tracing::info!("receiver session torn down");
    }
}

/// Poll the statistics artifact until it has content, the process exits,
/// or the supervisor shuts down.
///
/// The first non-zero size flips the shared flag and ends the monitor; a
/// missing or unreadable artifact means "not yet connected", never an
/// error. The loop cannot outlive the process, so it never hangs when no
/// peer ever connects.
async fn monitor_connection(
    handle: Arc<Mutex<ProcessHandle>>,
    stats_path: std::path::PathBuf,
    connected: Arc<AtomicBool>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::time::sleep(MONITOR_GRACE).await;

    loop {
        if *shutdown.borrow() {
            return;
        }

        {
            let mut handle = handle.lock().await;
            if !handle.is_alive() {
                tracing::debug!("receiver exited before a connection was detected");
                return;
            }
        }

        let ready = std::fs::metadata(&stats_path)
            .map(|meta| meta.len() > 0)
            .unwrap_or(false);
        if ready {
            connected.store(true, Ordering::Release);
            tracing::info!("connection established");
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            _ = shutdown_flagged(&mut shutdown) => return,
        }
    }
}

/// Completes when the shutdown flag flips to true. A supervisor dropped
/// without teardown closes the channel instead; the monitor then relies
/// on its process-exit check rather than spinning on a closed channel.
async fn shutdown_flagged(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
