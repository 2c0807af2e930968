//! OS network-interface counters via the `sysinfo` crate.
//!
//! Port ids are assigned in sorted interface-name order at discovery time.

use parking_lot::Mutex;
use sysinfo::Networks;

use super::{NicDriver, PortCounters, PortProperties};
use crate::config;
use crate::error::PortError;

pub struct SysinfoNic {
    interfaces: Vec<String>,
    networks: Mutex<Networks>,
}

impl SysinfoNic {
    /// Enumerate the host's interfaces and map them to port ids `0..n`.
    pub fn discover() -> Self {
        let networks = Networks::new_with_refreshed_list();
        let mut interfaces: Vec<String> = networks.list().keys().cloned().collect();
        interfaces.sort();
        interfaces.truncate(usize::from(u8::MAX) + 1);
        tracing::info!("Discovered {} network interfaces: {:?}", interfaces.len(), interfaces);
        Self {
            interfaces,
            networks: Mutex::new(networks),
        }
    }

    /// Manage an explicit list of interface names; index = port id.
    pub fn with_interfaces(interfaces: Vec<String>) -> Self {
        Self {
            interfaces,
            networks: Mutex::new(Networks::new_with_refreshed_list()),
        }
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    fn interface(&self, port_id: u8) -> Result<&str, PortError> {
        self.interfaces
            .get(usize::from(port_id))
            .map(String::as_str)
            .ok_or(PortError::UnknownPort(port_id))
    }
}

impl NicDriver for SysinfoNic {
    fn read_counters(&self, port_id: u8) -> Result<PortCounters, PortError> {
        let name = self.interface(port_id)?;
        let mut networks = self.networks.lock();
        networks.refresh();
        let data = networks.list().get(name).ok_or_else(|| {
            PortError::CounterSource(format!("interface {name} is no longer present"))
        })?;
        Ok(PortCounters {
            tx_bytes: data.total_transmitted(),
            rx_bytes: data.total_received(),
            tx_packets: data.total_packets_transmitted(),
            rx_packets: data.total_packets_received(),
            tx_errors: data.total_errors_on_transmitted(),
            rx_errors: data.total_errors_on_received(),
        })
    }

    fn properties(&self, port_id: u8) -> PortProperties {
        PortProperties {
            driver: self.interface(port_id).unwrap_or("unknown").to_string(),
            speed: config::DEFAULT_LINK_SPEED.to_string(),
        }
    }
}
