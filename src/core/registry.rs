//! Managed port set, keyed by port id.
//!
//! Ports stay fully independent; the map only provides lookup and a single
//! poller that refreshes each port's statistics in turn.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::core::port::Port;
use crate::error::PortError;

#[derive(Default)]
pub struct PortRegistry {
    ports: DashMap<u8, Arc<Port>>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self {
            ports: DashMap::new(),
        }
    }

    /// Register a port, replacing any previous port with the same id.
    pub fn insert(&self, port: Port) -> Arc<Port> {
        let port = Arc::new(port);
        if self.ports.insert(port.port_id(), Arc::clone(&port)).is_some() {
            tracing::warn!("Port {} re-registered; previous instance dropped", port.port_id());
        }
        port
    }

    pub fn get(&self, port_id: u8) -> Result<Arc<Port>, PortError> {
        self.ports
            .get(&port_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(PortError::UnknownPort(port_id))
    }

    /// Managed port ids in ascending order.
    pub fn ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.ports.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    fn ports(&self) -> Vec<Arc<Port>> {
        let mut ports: Vec<Arc<Port>> = self
            .ports
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        ports.sort_unstable_by_key(|p| p.port_id());
        ports
    }

    /// Refresh every port's statistics. Returns the number of failed refreshes.
    pub fn refresh_all(&self) -> usize {
        // Clone the handles out first so no shard lock is held across NIC reads.
        let mut failures = 0;
        for port in self.ports() {
            if let Err(e) = port.update_stats() {
                failures += 1;
                tracing::warn!("Port {}: stats refresh failed: {e}", port.port_id());
            }
        }
        failures
    }

    /// Encode every port's last statistics as `{ "<port_id>": { ...fields } }`.
    pub fn encode_all(&self) -> Value {
        let mut out = Map::new();
        for port in self.ports() {
            let mut fields = Map::new();
            port.encode_stats(&mut fields);
            out.insert(port.port_id().to_string(), Value::Object(fields));
        }
        Value::Object(out)
    }

    /// Spawn a stats poller that refreshes every port each `interval`.
    pub fn start_poller(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let failures = registry.refresh_all();
                if failures > 0 {
                    tracing::debug!("Stats poll: {failures} of {} ports failed", registry.len());
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    use super::*;
    use crate::backend::{NicDriver, NoopTrafficEngine, PortCounters, PortProperties};

    /// Reports `port_id * 1000` bytes; port 9 always fails.
    #[derive(Default)]
    struct ScaledNic {
        reads: AtomicU64,
    }

    impl NicDriver for ScaledNic {
        fn read_counters(&self, port_id: u8) -> Result<PortCounters, PortError> {
            self.reads.fetch_add(1, Ordering::Relaxed);
            if port_id == 9 {
                return Err(PortError::CounterSource("port 9 unplugged".into()));
            }
            Ok(PortCounters {
                tx_bytes: u64::from(port_id) * 1000,
                ..PortCounters::default()
            })
        }

        fn properties(&self, _port_id: u8) -> PortProperties {
            PortProperties {
                driver: "fake".into(),
                speed: "10 Gbps".into(),
            }
        }
    }

    fn registry_with(ids: &[u8], nic: &Arc<ScaledNic>) -> PortRegistry {
        let registry = PortRegistry::new();
        for &id in ids {
            registry.insert(Port::new(
                id,
                Arc::new(AtomicUsize::new(1)),
                nic.clone(),
                Arc::new(NoopTrafficEngine),
            ));
        }
        registry
    }

    #[test]
    fn test_get_unknown_port() {
        let registry = PortRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(registry.get(4), Err(PortError::UnknownPort(4))));
    }

    #[test]
    fn test_ids_are_sorted() {
        let nic = Arc::new(ScaledNic::default());
        let registry = registry_with(&[5, 1, 3], &nic);
        assert_eq!(registry.ids(), vec![1, 3, 5]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_ports_are_independent() {
        let nic = Arc::new(ScaledNic::default());
        let registry = registry_with(&[0, 1], &nic);
        registry.get(0).unwrap().start_traffic().unwrap();
        assert_eq!(registry.get(0).unwrap().get_state_as_string(), "transmitting");
        assert_eq!(registry.get(1).unwrap().get_state_as_string(), "idle");
    }

    #[test]
    fn test_refresh_all_counts_failures_and_updates_the_rest() {
        let nic = Arc::new(ScaledNic::default());
        let registry = registry_with(&[2, 9], &nic);
        assert_eq!(registry.refresh_all(), 1);
        assert_eq!(nic.reads.load(Ordering::Relaxed), 2);
        assert_eq!(registry.get(2).unwrap().get_stats().total_tx_bytes, 2000);
    }

    #[test]
    fn test_encode_all_keys_by_port_id() {
        let nic = Arc::new(ScaledNic::default());
        let registry = registry_with(&[1, 2], &nic);
        registry.refresh_all();

        let json = registry.encode_all();
        assert_eq!(json["1"]["total_tx_bytes"], 1000);
        assert_eq!(json["2"]["total_tx_bytes"], 2000);
        assert_eq!(json["2"].as_object().unwrap().len(), 9);
    }

    #[tokio::test]
    async fn test_poller_refreshes_ports() {
        let nic = Arc::new(ScaledNic::default());
        let registry = Arc::new(registry_with(&[4], &nic));
        let handle = registry.start_poller(Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert!(nic.reads.load(Ordering::Relaxed) >= 2);
        assert_eq!(registry.get(4).unwrap().get_stats().total_tx_bytes, 4000);
    }
}
