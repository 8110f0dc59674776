//! Fixed on-disk layout for one session's artifacts.
//!
//! The receiver process writes three files as side effects of a session:
//! the captured transport stream, an incrementally-written CSV statistics
//! file, and a free-text log. All three live under one working directory
//! with fixed names; a new session overwrites the previous session's
//! state.

use std::io;
use std::path::{Path, PathBuf};

pub const CAPTURE_FILE: &str = "received.ts";
pub const STATS_FILE: &str = "received.ts.stats";
pub const LOG_FILE: &str = "received.ts.log";

#[derive(Debug, Clone)]
pub struct SessionArtifacts {
    dir: PathBuf,
}

impl SessionArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The captured transport stream.
    pub fn capture(&self) -> PathBuf {
        self.dir.join(CAPTURE_FILE)
    }

    /// The CSV statistics file; its first non-zero size is the
    /// connection-readiness signal.
    pub fn stats(&self) -> PathBuf {
        self.dir.join(STATS_FILE)
    }

    /// The receiver's free-text log.
    pub fn log(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    pub fn ensure_dir(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    /// Remove the previous session's files. A stale non-empty stats file
    /// must not satisfy the next session's readiness probe.
    pub fn remove_stale(&self) {
        for path in [self.capture(), self.stats(), self.log()] {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_use_fixed_names() {
        let artifacts = SessionArtifacts::new("/tmp/srt");
        assert_eq!(artifacts.capture(), PathBuf::from("/tmp/srt/received.ts"));
        assert_eq!(artifacts.stats(), PathBuf::from("/tmp/srt/received.ts.stats"));
        assert_eq!(artifacts.log(), PathBuf::from("/tmp/srt/received.ts.log"));
    }

    #[test]
    fn remove_stale_clears_previous_session() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = SessionArtifacts::new(dir.path());
        std::fs::write(artifacts.stats(), "stale").unwrap();
        std::fs::write(artifacts.log(), "stale").unwrap();

        artifacts.remove_stale();

        assert!(!artifacts.stats().exists());
        assert!(!artifacts.log().exists());
        // Removing nothing is fine too.
        artifacts.remove_stale();
    }
}
