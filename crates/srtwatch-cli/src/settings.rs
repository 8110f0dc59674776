//! Optional TOML settings for the operator binary — working directories
//! and the names of the external tools we invoke.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory holding one session's artifacts.
    pub work_dir: PathBuf,
    /// Directory pcap uploads and processed results live in.
    pub pcap_dir: PathBuf,
    /// Full receiver binary override. When unset, the supervisor derives
    /// `srt-live-transmit-v<version>` from the session config.
    pub receiver_bin: Option<String>,
    pub ffprobe_bin: String,
    pub analyzer_bin: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("srt"),
            pcap_dir: PathBuf::from("pcaps"),
            receiver_bin: None,
            ffprobe_bin: srtwatch_supervisor::inspect::DEFAULT_FFPROBE.into(),
            analyzer_bin: srtwatch_supervisor::capture::DEFAULT_ANALYZER.into(),
        }
    }
}

pub fn load(path: Option<&Path>) -> anyhow::Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    toml::from_str(&text)
        .with_context(|| format!("failed to parse settings file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_a_file() {
        let settings = load(None).unwrap();
        assert_eq!(settings.work_dir, PathBuf::from("srt"));
        assert_eq!(settings.ffprobe_bin, "ffprobe");
        assert!(settings.receiver_bin.is_none());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("srtwatch.toml");
        std::fs::write(&path, "work_dir = \"/var/lib/srtwatch\"\nffprobe_bin = \"/opt/ffmpeg/ffprobe\"\n").unwrap();

        let settings = load(Some(&path)).unwrap();
        assert_eq!(settings.work_dir, PathBuf::from("/var/lib/srtwatch"));
        assert_eq!(settings.ffprobe_bin, "/opt/ffmpeg/ffprobe");
        assert_eq!(settings.pcap_dir, PathBuf::from("pcaps"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("srtwatch.toml");
        std::fs::write(&path, "no_such_field = 1\n").unwrap();
        assert!(load(Some(&path)).is_err());
    }
}
