//! Best-effort network emulation on a host interface via `tc netem`.
//!
//! Emulation is instrumentation, not a session precondition: every failure
//! here is logged and swallowed, and a session proceeds regardless. The
//! underlying primitive happily stacks duplicate rules, so [`apply`]
//! always clears first; at most one delay rule is active per interface.

use std::process::Command;

/// Argument vector for installing a delay rule.
fn add_args(interface: &str, delay_ms: u32) -> Vec<String> {
    vec![
        "qdisc".into(),
        "add".into(),
        "dev".into(),
        interface.into(),
        "root".into(),
        "netem".into(),
        "delay".into(),
        format!("{delay_ms}ms"),
    ]
}

/// Argument vector for removing the delay rule.
fn del_args(interface: &str) -> Vec<String> {
    vec![
        "qdisc".into(),
        "del".into(),
        "dev".into(),
        interface.into(),
        "root".into(),
        "netem".into(),
    ]
}

/// Install a delay rule on `interface`, clearing any existing rule first.
pub fn apply(interface: &str, delay_ms: u32) {
    clear(interface);
    tracing::info!(interface, delay_ms, "applying network emulation");
    run_tc(&add_args(interface, delay_ms), "apply");
}

/// Remove the delay rule from `interface`.
///
/// `tc` errors when nothing is installed; that too is logged and
/// swallowed, so clearing is effectively idempotent.
pub fn clear(interface: &str) {
    run_tc(&del_args(interface), "clear");
}

fn run_tc(args: &[String], action: &str) {
    match Command::new("tc").args(args).output() {
        Ok(out) if out.status.success() => {
            tracing::debug!(action, "tc netem succeeded");
        }
        Ok(out) => {
            tracing::warn!(
                action,
                stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                "tc netem failed"
            );
        }
        Err(e) => {
            tracing::warn!(action, error = %e, "failed to invoke tc");
        }
    }
}
