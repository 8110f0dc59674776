//! Offline packet-capture analysis — supervises the external
//! traffic-stats tool over an uploaded pcap.
//!
//! Same launch/poll/terminate contract as the receiver workload; the
//! only differences are the command line and that stdout is drained to a
//! results file instead of memory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use tokio::process::Command;

use crate::process::{DrainTarget, ProcessHandle, Workload};

pub const DEFAULT_ANALYZER: &str = "get-traffic-stats";

/// Fixed name of the processed results file inside the pcap directory.
pub const RESULTS_FILE: &str = "result.processed";

/// Banner lines the analyzer prints before the actual results.
const HEADER_LINES: usize = 2;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

struct AnalyzerWorkload {
    bin: String,
    pcap: PathBuf,
    results: PathBuf,
}

impl Workload for AnalyzerWorkload {
    fn name(&self) -> &'static str {
        "capture-analysis"
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args(["--overwrite", "--side", "rcv"]).arg(&self.pcap);
        cmd
    }

    fn drain(&self) -> DrainTarget {
        DrainTarget::File(self.results.clone())
    }
}

/// Supervises one analysis run of the external traffic-stats tool.
pub struct CaptureAnalyzer {
    bin: String,
    results: PathBuf,
    handle: Option<ProcessHandle>,
}

impl CaptureAnalyzer {
    pub fn new(results: impl Into<PathBuf>) -> Self {
        Self {
            bin: DEFAULT_ANALYZER.into(),
            results: results.into(),
            handle: None,
        }
    }

    pub fn with_analyzer(mut self, bin: impl Into<String>) -> Self {
        self.bin = bin.into();
        self
    }

    /// Launch the analyzer over `pcap`. One run at a time.
    pub fn start(&mut self, pcap: &Path) -> anyhow::Result<()> {
        if self.is_running() {
            anyhow::bail!("a capture analysis is already running");
        }

        let workload = AnalyzerWorkload {
            bin: self.bin.clone(),
            pcap: pcap.to_path_buf(),
            results: self.results.clone(),
        };

        tracing::info!(pcap = %pcap.display(), "starting capture analysis");
        self.handle = Some(ProcessHandle::launch(&workload)?);
        Ok(())
    }

    pub fn is_running(&mut self) -> bool {
        self.handle.as_mut().map(|h| h.is_alive()).unwrap_or(false)
    }

    /// Block until the analysis run completes and its output is fully
    /// drained to the results file.
    pub async fn wait(&mut self) -> anyhow::Result<()> {
        if let Some(handle) = self.handle.as_mut() {
            handle.wait().await?;
        }
        Ok(())
    }

    /// Stop an in-flight run.
    pub async fn stop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.shutdown(SHUTDOWN_GRACE).await;
        }
    }

    /// Processed results minus the analyzer's banner lines.
    pub fn output(&self) -> anyhow::Result<String> {
        let text = std::fs::read_to_string(&self.results)
            .with_context(|| format!("failed to read {}", self.results.display()))?;
        Ok(text
            .lines()
            .skip(HEADER_LINES)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
