//! Core logic: port state machine, statistics, rate estimation.
//!
//! - [`Port`]: per-port start/stop gating, ownership, and stats refresh
//! - [`PortStats`] / [`StatsSink`]: cumulative counters plus smoothed rates
//! - [`BandwidthEstimator`]: interval-gated exponential rate smoothing
//! - [`PortRegistry`]: managed ports keyed by id, with the stats poller

pub mod bandwidth;
pub mod port;
pub mod registry;
pub mod stats;

pub use bandwidth::BandwidthEstimator;
pub use port::{Port, PortOwner, PortState};
pub use registry::PortRegistry;
pub use stats::{PortStats, PortStatsSnapshot, StatsSink};
