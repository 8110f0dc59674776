//! Peer endpoint extraction from the receiver's log.
//!
//! The log is free text we do not control; the one contract with it is an
//! IPv4 `address:port` token identifying the connected peer. Keeping the
//! parsing here means a future structured log format only touches this
//! module, not the supervisor's contract.

use once_cell::sync::Lazy;
use regex::Regex;

/// Returned when the log carries no endpoint (yet).
pub const UNRESOLVED: &str = "error: unable to determine connected host";

static ENDPOINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\.\d+\.\d+\.\d+):(\d+)").expect("endpoint pattern"));

/// First `ip:port` token in `content`, formatted as `"ip:port"`.
///
/// Partial log content is fine: no match simply means the peer is not
/// resolvable yet, never an error.
pub fn first_endpoint(content: &str) -> Option<String> {
    ENDPOINT
        .captures(content)
        .map(|caps| format!("{}:{}", &caps[1], &caps[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
12:01:04.291 [I] SRT.ls: accepted connection\n\
12:01:04.293 [I] SRT.cn: @442559713: connected to peer 192.168.7.15:50042\n\
12:01:05.100 [I] SRT.cn: peer 10.0.0.9:9000 reported latency\n";

    #[test]
    fn extracts_first_endpoint() {
        assert_eq!(
            first_endpoint(LOG).as_deref(),
            Some("192.168.7.15:50042")
        );
    }

    #[test]
    fn no_match_is_none() {
        assert_eq!(first_endpoint("listener bound, waiting"), None);
        assert_eq!(first_endpoint(""), None);
    }

    #[test]
    fn repeated_calls_on_unchanged_content_agree() {
        let first = first_endpoint(LOG);
        let second = first_endpoint(LOG);
        assert_eq!(first, second);
    }
}
