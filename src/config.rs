//! Centralized runtime constants for portgen.
//!
//! All tunable intervals, scale factors, and token parameters are collected here
//! so they can be found and adjusted in a single place.

/// Interval at which the poller refreshes every port's counters (seconds).
pub const STATS_INTERVAL_SECS: u64 = 1;

/// Interval at which the reporter logs per-port rates (seconds).
pub const REPORT_INTERVAL_SECS: u64 = 5;

/// How often background threads check for shutdown (milliseconds).
pub const SHUTDOWN_POLL_MS: u64 = 100;

/// Minimum spacing between two samples that update a smoothed rate (milliseconds).
pub const MIN_SAMPLE_INTERVAL_MS: u64 = 1000;

/// Weight of the newest instantaneous rate in the smoothed estimate.
pub const SMOOTHING_ALPHA: f64 = 0.5;

/// Scale applied to byte deltas: bytes/sec -> bits/sec.
pub const BITS_PER_BYTE: f64 = 8.0;

/// Scale applied to packet deltas: packets/sec stays packets/sec.
pub const PACKETS_PER_PACKET: f64 = 1.0;

/// Length of a generated session handler.
pub const HANDLER_LEN: usize = 8;

/// Characters a session handler is drawn from.
pub const HANDLER_ALPHABET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Log filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "portgen=info,portgen_lib=info";

/// Speed string reported for interfaces discovered through sysinfo.
pub const DEFAULT_LINK_SPEED: &str = "unknown";
