//! The receiver's CSV statistics schema and the per-session summary
//! derived from it.
//!
//! The statistics file is written incrementally by the external receiver;
//! this module only ever reads it. The file carries more columns than we
//! model; unknown columns are ignored by the deserializer.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("statistics file not found: {0}")]
    NotFound(PathBuf),
    #[error("statistics file is empty")]
    Empty,
    #[error("malformed statistics file: {0}")]
    Malformed(#[from] csv::Error),
}

/// One row of the receiver's `-statspf:csv` output.
#[derive(Debug, Clone, Deserialize)]
pub struct StatsRecord {
    /// Milliseconds since the session started.
    #[serde(rename = "Time")]
    pub time_ms: u64,
    #[serde(rename = "Timepoint")]
    pub timepoint: String,
    #[serde(rename = "msRTT")]
    pub rtt_ms: f64,
    #[serde(rename = "mbpsRecvRate")]
    pub recv_rate_mbps: f64,
    #[serde(rename = "mbpsBandwidth")]
    pub bandwidth_mbps: f64,
    #[serde(rename = "byteAvailRcvBuf")]
    pub avail_rcv_buf_bytes: u64,
    #[serde(rename = "msRcvBuf")]
    pub rcv_buf_ms: f64,
    #[serde(rename = "pktRecv")]
    pub pkt_recv: u64,
    #[serde(rename = "pktRcvLoss")]
    pub pkt_rcv_loss: u64,
    #[serde(rename = "pktRcvDrop")]
    pub pkt_rcv_drop: u64,
    #[serde(rename = "pktRcvRetrans")]
    pub pkt_rcv_retrans: u64,
}

/// Load all statistics rows from a session's stats file.
///
/// A missing or empty file is an error here: this is the display path,
/// not the readiness monitor, and the caller surfaces it inline.
pub fn load_records(path: &Path) -> Result<Vec<StatsRecord>, StatsError> {
    let meta =
        std::fs::metadata(path).map_err(|_| StatsError::NotFound(path.to_path_buf()))?;
    if meta.len() == 0 {
        return Err(StatsError::Empty);
    }

    let file = std::fs::File::open(path).map_err(|_| StatsError::NotFound(path.to_path_buf()))?;
    parse_records(file)
}

/// Parse statistics rows from any CSV reader.
pub fn parse_records(reader: impl Read) -> Result<Vec<StatsRecord>, StatsError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for row in csv_reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// The headline numbers the dashboard showed for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_time_secs: f64,
    pub avg_recv_rate_mbps: f64,
    pub avg_rtt_ms: f64,
    /// Mean |delta| between consecutive RTT samples.
    pub avg_jitter_ms: f64,
    pub pkt_recv: u64,
    pub pkt_rcv_loss: u64,
    pub pkt_rcv_drop: u64,
    pub pkt_rcv_retrans: u64,
}

impl SessionSummary {
    /// `None` when there are no rows to summarize.
    pub fn from_records(records: &[StatsRecord]) -> Option<Self> {
        let last = records.last()?;
        let n = records.len() as f64;

        let avg_rtt_ms = records.iter().map(|r| r.rtt_ms).sum::<f64>() / n;
        let avg_recv_rate_mbps = records.iter().map(|r| r.recv_rate_mbps).sum::<f64>() / n;

        let jitter_samples: Vec<f64> = records
            .windows(2)
            .map(|pair| (pair[1].rtt_ms - pair[0].rtt_ms).abs())
            .collect();
        let avg_jitter_ms = if jitter_samples.is_empty() {
            0.0
        } else {
            jitter_samples.iter().sum::<f64>() / jitter_samples.len() as f64
        };

        Some(Self {
            session_time_secs: last.time_ms as f64 / 1000.0,
            avg_recv_rate_mbps,
            avg_rtt_ms,
            avg_jitter_ms,
            pkt_recv: last.pkt_recv,
            pkt_rcv_loss: last.pkt_rcv_loss,
            pkt_rcv_drop: last.pkt_rcv_drop,
            pkt_rcv_retrans: last.pkt_rcv_retrans,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Time,Timepoint,msRTT,mbpsRecvRate,mbpsBandwidth,byteAvailRcvBuf,msRcvBuf,pktRecv,pktRcvLoss,pktRcvDrop,pktRcvRetrans";

    fn fixture(rows: &[&str]) -> Vec<StatsRecord> {
        let csv = format!("{HEADER}\n{}\n", rows.join("\n"));
        parse_records(csv.as_bytes()).unwrap()
    }

    #[test]
    fn parses_known_columns_and_ignores_extras() {
        let csv = "Time,SocketID,msRTT,Timepoint,mbpsRecvRate,mbpsBandwidth,byteAvailRcvBuf,msRcvBuf,pktRecv,pktRcvLoss,pktRcvDrop,pktRcvRetrans\n\
                   1000,432,10.5,2024-01-01T00:00:01,4.2,95.0,8192000,120.0,1000,3,1,2\n";
        let records = parse_records(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time_ms, 1000);
        assert!((records[0].rtt_ms - 10.5).abs() < f64::EPSILON);
        assert_eq!(records[0].pkt_recv, 1000);
    }

    #[test]
    fn summary_computes_means_and_jitter() {
        let records = fixture(&[
            "10000,t1,10.0,4.0,90.0,8192000,120.0,100,0,0,0",
            "20000,t2,12.0,5.0,90.0,8192000,120.0,200,1,0,1",
            "30000,t3,11.0,6.0,90.0,8192000,120.0,300,2,1,1",
        ]);
        let summary = SessionSummary::from_records(&records).unwrap();

        assert!((summary.session_time_secs - 30.0).abs() < 1e-9);
        assert!((summary.avg_rtt_ms - 11.0).abs() < 1e-9);
        assert!((summary.avg_recv_rate_mbps - 5.0).abs() < 1e-9);
        // |12-10| = 2, |11-12| = 1 -> mean 1.5
        assert!((summary.avg_jitter_ms - 1.5).abs() < 1e-9);
        assert_eq!(summary.pkt_recv, 300);
        assert_eq!(summary.pkt_rcv_loss, 2);
    }

    #[test]
    fn summary_of_single_row_has_zero_jitter() {
        let records = fixture(&["5000,t1,10.0,4.0,90.0,8192000,120.0,100,0,0,0"]);
        let summary = SessionSummary::from_records(&records).unwrap();
        assert_eq!(summary.avg_jitter_ms, 0.0);
    }

    #[test]
    fn summary_of_no_rows_is_none() {
        assert!(SessionSummary::from_records(&[]).is_none());
    }

    #[test]
    fn load_rejects_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("received.ts.stats");
        assert!(matches!(
            load_records(&missing),
            Err(StatsError::NotFound(_))
        ));

        std::fs::write(&missing, "").unwrap();
        assert!(matches!(load_records(&missing), Err(StatsError::Empty)));
    }
}
