//! Session supervision for an SRT receiver and its offline analysis tools.
//!
//! This crate contains:
//! - **process** — external process lifecycle and the stdout drain
//! - **supervisor** — one live receiver session: launch, connection monitor, teardown
//! - **countdown** — the operator-facing cancellable per-second countdown
//! - **logscrape** — peer endpoint extraction from the receiver log
//! - **netem** — best-effort `tc netem` delay on a host interface
//! - **inspect** — ffprobe verdict and program enumeration for the captured stream
//! - **capture** — packet-capture analysis supervision

pub mod capture;
pub mod countdown;
pub mod inspect;
pub mod logscrape;
pub mod netem;
pub mod process;
pub mod supervisor;
