//! The cancellable per-second countdown driving one session from the
//! caller's side.
//!
//! The loop is cooperative: each tick renders the remaining time, sleeps,
//! and polls the session until the first connection is seen. Cancellation
//! arrives over a watch channel and is honored at worst at tick
//! granularity. Absence of a connection is a silent, expected outcome;
//! nothing here aborts the countdown early.

use std::time::Duration;

use tokio::sync::watch;

use crate::supervisor::SessionSupervisor;

const TICK: Duration = Duration::from_secs(1);

/// The countdown's two render slots: the per-tick remaining time and the
/// one-shot connection notice.
pub trait CountdownDisplay {
    fn remaining(&mut self, secs: u32);
    fn connected(&mut self, endpoint: &str);
}

/// Read side of a live session as seen by the countdown.
pub trait SessionStatus {
    fn connection_established(&self) -> bool;
    fn connected_endpoint(&self) -> String;
}

impl SessionStatus for SessionSupervisor {
    fn connection_established(&self) -> bool {
        SessionSupervisor::connection_established(self)
    }

    fn connected_endpoint(&self) -> String {
        self.extract_connected_endpoint()
    }
}

/// What the countdown ended with, for the caller's re-render.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CountdownOutcome {
    pub cancelled: bool,
    pub connected: bool,
    pub endpoint: Option<String>,
}

/// Completes when the cancel flag flips to true; never completes when the
/// sender is gone without cancelling.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Drive the per-second countdown until natural expiry or cancellation.
///
/// Per tick: render the remaining time, sleep, decrement, and (until the
/// first success) poll the connection status. The endpoint is extracted
/// at most once per session, on the first observed connection.
pub async fn run_countdown<S, D>(
    status: &S,
    timeout_secs: u32,
    display: &mut D,
    cancel: &mut watch::Receiver<bool>,
) -> CountdownOutcome
where
    S: SessionStatus,
    D: CountdownDisplay,
{
    let mut remaining = timeout_secs;
    let mut outcome = CountdownOutcome::default();

    while remaining > 0 {
        display.remaining(remaining);

        tokio::select! {
            _ = tokio::time::sleep(TICK) => {}
            _ = cancelled(cancel) => {
                outcome.cancelled = true;
                break;
            }
        }
        remaining -= 1;

        if outcome.connected {
            continue;
        }
        if status.connection_established() {
            outcome.connected = true;
            let endpoint = status.connected_endpoint();
            display.connected(&endpoint);
            outcome.endpoint = Some(endpoint);
        }
    }

    outcome
}

/// Run the countdown for a live session, then clean up: reset the
/// connection flag for the caller's next render and tear the session down
/// (teardown clears network emulation when this session applied it).
pub async fn run(
    supervisor: &mut SessionSupervisor,
    display: &mut impl CountdownDisplay,
    cancel: &mut watch::Receiver<bool>,
) -> CountdownOutcome {
    let timeout_secs = supervisor.config().timeout_secs;
    let outcome = run_countdown(supervisor, timeout_secs, display, cancel).await;

    if outcome.cancelled {
        tracing::info!("session terminated by operator, cleaning up");
    } else {
        tracing::info!("session timed out, cleaning up");
    }
    supervisor.reset_connection_flag();
    supervisor.teardown().await;

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Reports "connected" from the nth poll onwards.
    struct StubStatus {
        flips_on_poll: u32,
        polls: AtomicU32,
    }

    impl StubStatus {
        fn new(flips_on_poll: u32) -> Self {
            Self {
                flips_on_poll,
                polls: AtomicU32::new(0),
            }
        }
    }

    impl SessionStatus for StubStatus {
        fn connection_established(&self) -> bool {
            let poll = self.polls.fetch_add(1, Ordering::Relaxed) + 1;
            poll >= self.flips_on_poll
        }

        fn connected_endpoint(&self) -> String {
            "192.168.7.15:50042".to_string()
        }
    }

    #[derive(Default)]
    struct RecordingDisplay {
        ticks: Vec<u32>,
        connections: Vec<String>,
    }

    impl CountdownDisplay for RecordingDisplay {
        fn remaining(&mut self, secs: u32) {
            self.ticks.push(secs);
        }

        fn connected(&mut self, endpoint: &str) {
            self.connections.push(endpoint.to_string());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn connection_at_tick_two_renders_once() {
        let status = StubStatus::new(2);
        let mut display = RecordingDisplay::default();
        let (_tx, mut cancel) = watch::channel(false);

        let outcome = run_countdown(&status, 5, &mut display, &mut cancel).await;

        assert_eq!(display.ticks, vec![5, 4, 3, 2, 1]);
        assert_eq!(display.connections, vec!["192.168.7.15:50042"]);
        assert!(outcome.connected);
        assert!(!outcome.cancelled);
        assert_eq!(outcome.endpoint.as_deref(), Some("192.168.7.15:50042"));
        // Once latched, the status source is no longer polled.
        assert_eq!(status.polls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn never_connecting_is_a_silent_outcome() {
        let status = StubStatus::new(u32::MAX);
        let mut display = RecordingDisplay::default();
        let (_tx, mut cancel) = watch::channel(false);

        let outcome = run_countdown(&status, 3, &mut display, &mut cancel).await;

        assert_eq!(display.ticks, vec![3, 2, 1]);
        assert!(display.connections.is_empty());
        assert!(!outcome.connected);
        assert!(outcome.endpoint.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_unwinds_the_loop() {
        let status = StubStatus::new(u32::MAX);
        let mut display = RecordingDisplay::default();
        let (tx, mut cancel) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            let _ = tx.send(true);
        });

        let outcome = run_countdown(&status, 10, &mut display, &mut cancel).await;

        assert!(outcome.cancelled);
        assert!(!outcome.connected);
        // Cancelled mid-third tick: three renders happened, no more.
        assert_eq!(display.ticks, vec![10, 9, 8]);
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_before_the_first_tick() {
        let status = StubStatus::new(1);
        let mut display = RecordingDisplay::default();
        let (tx, mut cancel) = watch::channel(false);
        tx.send(true).unwrap();

        let outcome = run_countdown(&status, 5, &mut display, &mut cancel).await;

        assert!(outcome.cancelled);
        assert_eq!(display.ticks, vec![5]);
        assert!(display.connections.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_never_ticks() {
        let status = StubStatus::new(1);
        let mut display = RecordingDisplay::default();
        let (_tx, mut cancel) = watch::channel(false);

        let outcome = run_countdown(&status, 0, &mut display, &mut cancel).await;

        assert!(display.ticks.is_empty());
        assert!(!outcome.connected);
        assert!(!outcome.cancelled);
    }
}
