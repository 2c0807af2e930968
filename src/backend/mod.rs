//! External collaborators a port depends on.
//!
//! - [`NicDriver`]: cumulative counters and driver properties for a port
//! - [`StreamTable`]: the configured workload, consumed only as a count
//! - [`TrafficEngine`]: told when transmission should begin or halt
//!
//! [`sysinfo_nic::SysinfoNic`] is the OS-backed driver used by the binary.

pub mod sysinfo_nic;

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

use crate::error::PortError;

/// Cumulative counters read from the NIC in one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortCounters {
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub tx_errors: u64,
    pub rx_errors: u64,
}

/// Human-readable driver description for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortProperties {
    pub driver: String,
    pub speed: String,
}

/// Counter and property source for managed ports.
pub trait NicDriver: Send + Sync {
    /// Read the current cumulative counters. Must be bounded and fast.
    fn read_counters(&self, port_id: u8) -> Result<PortCounters, PortError>;

    fn properties(&self, port_id: u8) -> PortProperties;
}

/// Externally owned stream collection.
pub trait StreamTable: Send + Sync {
    fn size(&self) -> usize;
}

/// A bare stream counter, for callers that track streams elsewhere.
impl StreamTable for AtomicUsize {
    fn size(&self) -> usize {
        self.load(Ordering::Acquire)
    }
}

/// Receives start/stop notifications on successful transitions.
pub trait TrafficEngine: Send + Sync {
    fn start(&self, port_id: u8);
    fn stop(&self, port_id: u8);
}

/// Engine that records transitions in the log and transmits nothing.
#[derive(Debug, Default)]
pub struct NoopTrafficEngine;

impl TrafficEngine for NoopTrafficEngine {
    fn start(&self, port_id: u8) {
        tracing::debug!("Traffic engine: start requested on port {port_id} (no-op)");
    }

    fn stop(&self, port_id: u8) {
        tracing::debug!("Traffic engine: stop requested on port {port_id} (no-op)");
    }
}
