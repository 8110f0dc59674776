//! On-demand transport-stream inspection via ffprobe.
//!
//! Read-only and stateless: two independent JSON-producing invocations
//! against the captured output file. A probe that fails to run or returns
//! unparseable output is *indeterminate* (`None`), which callers must keep
//! distinct from a definite "not a transport stream" (`Some(false)`).

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

pub const DEFAULT_FFPROBE: &str = "ffprobe";

/// The container format name ffprobe reports for MPEG transport streams.
const MPEGTS_FORMAT: &str = "mpegts";

#[derive(Debug, Deserialize)]
struct FormatProbe {
    format: Option<FormatInfo>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    format_name: Option<String>,
}

/// Program enumeration as reported by `ffprobe -show_programs`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbePrograms {
    pub programs: Vec<Program>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub program_id: Option<u32>,
    #[serde(default)]
    pub program_num: Option<u32>,
    #[serde(default)]
    pub nb_streams: Option<u32>,
    #[serde(default)]
    pub pmt_pid: Option<u32>,
    #[serde(default)]
    pub streams: Vec<StreamInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamInfo {
    pub index: u32,
    #[serde(default)]
    pub codec_name: Option<String>,
    #[serde(default)]
    pub codec_long_name: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub display_aspect_ratio: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub bit_rate: Option<String>,
}

/// Probes one captured file.
#[derive(Debug, Clone)]
pub struct TransportStreamInspector {
    target: PathBuf,
    ffprobe: String,
}

impl TransportStreamInspector {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            ffprobe: DEFAULT_FFPROBE.into(),
        }
    }

    pub fn with_ffprobe(mut self, bin: impl Into<String>) -> Self {
        self.ffprobe = bin.into();
        self
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// `Some(true)` iff ffprobe reports an MPEG transport stream,
    /// `Some(false)` on a definite non-match, `None` when probing itself
    /// fails.
    pub fn is_valid_transport_stream(&self) -> Option<bool> {
        let stdout = self.probe("-show_format")?;
        parse_format_verdict(&stdout)
    }

    /// Program/stream enumeration, `None` on probe failure or when no
    /// programs array is present.
    pub fn programs(&self) -> Option<ProbePrograms> {
        let stdout = self.probe("-show_programs")?;
        parse_programs(&stdout)
    }

    fn probe(&self, selector: &str) -> Option<String> {
        let result = Command::new(&self.ffprobe)
            .args(["-v", "error", selector, "-of", "json"])
            .arg(&self.target)
            .output();

        match result {
            Ok(out) => Some(String::from_utf8_lossy(&out.stdout).into_owned()),
            Err(e) => {
                tracing::warn!(
                    target = %self.target.display(),
                    error = %e,
                    "failed to invoke ffprobe"
                );
                None
            }
        }
    }
}

fn parse_format_verdict(json: &str) -> Option<bool> {
    let probe: FormatProbe = match serde_json::from_str(json) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable ffprobe format output");
            return None;
        }
    };
    match probe.format.and_then(|f| f.format_name) {
        Some(name) => Some(name == MPEGTS_FORMAT),
        // A parseable reply with no format information is a definite
        // non-match, not an indeterminate probe.
        None => Some(false),
    }
}

fn parse_programs(json: &str) -> Option<ProbePrograms> {
    match serde_json::from_str::<ProbePrograms>(json) {
        Ok(programs) => Some(programs),
        Err(e) => {
            tracing::warn!(error = %e, "unparseable ffprobe programs output");
            None
        }
    }
}
