//! Per-port statistics record: raw cumulative counters plus smoothed rates.

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::backend::PortCounters;
use crate::config;
use crate::core::bandwidth::BandwidthEstimator;

/// Destination for encoded statistics, e.g. a JSON object being built for a reply.
pub trait StatsSink {
    fn put_f64(&mut self, name: &'static str, value: f64);
    fn put_u64(&mut self, name: &'static str, value: u64);
}

impl StatsSink for Map<String, Value> {
    fn put_f64(&mut self, name: &'static str, value: f64) {
        // NaN/inf have no JSON form; rates are finite unless the clock misbehaves.
        let value = serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number);
        self.insert(name.to_string(), value);
    }

    fn put_u64(&mut self, name: &'static str, value: u64) {
        self.insert(name.to_string(), Value::from(value));
    }
}

/// Point-in-time copy of a port's statistics.
///
/// Field names are a compatibility contract with external consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PortStatsSnapshot {
    /// Transmit rate in bits/sec.
    pub tx_bps: f64,
    /// Receive rate in bits/sec.
    pub rx_bps: f64,
    pub tx_pps: f64,
    pub rx_pps: f64,
    pub total_tx_pkts: u64,
    pub total_rx_pkts: u64,
    pub total_tx_bytes: u64,
    pub total_rx_bytes: u64,
    pub tx_rx_errors: u64,
}

impl PortStatsSnapshot {
    /// Write every field into `sink`, in contract order.
    pub fn encode<S: StatsSink + ?Sized>(&self, sink: &mut S) {
        sink.put_f64("tx_bps", self.tx_bps);
        sink.put_f64("rx_bps", self.rx_bps);

        sink.put_f64("tx_pps", self.tx_pps);
        sink.put_f64("rx_pps", self.rx_pps);

        sink.put_u64("total_tx_pkts", self.total_tx_pkts);
        sink.put_u64("total_rx_pkts", self.total_rx_pkts);

        sink.put_u64("total_tx_bytes", self.total_tx_bytes);
        sink.put_u64("total_rx_bytes", self.total_rx_bytes);

        sink.put_u64("tx_rx_errors", self.tx_rx_errors);
    }
}

/// Statistics record owned by a port.
#[derive(Debug, Clone)]
pub struct PortStats {
    current: PortStatsSnapshot,
    tx_bps: BandwidthEstimator,
    rx_bps: BandwidthEstimator,
    tx_pps: BandwidthEstimator,
    rx_pps: BandwidthEstimator,
}

impl Default for PortStats {
    fn default() -> Self {
        Self::with_interval(Duration::from_millis(config::MIN_SAMPLE_INTERVAL_MS))
    }
}

impl PortStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record whose estimators use a custom minimum sampling interval.
    pub fn with_interval(interval: Duration) -> Self {
        let bytes = BandwidthEstimator::with_interval(config::BITS_PER_BYTE, interval);
        let packets = BandwidthEstimator::with_interval(config::PACKETS_PER_PACKET, interval);
        Self {
            current: PortStatsSnapshot::default(),
            tx_bps: bytes.clone(),
            rx_bps: bytes,
            tx_pps: packets.clone(),
            rx_pps: packets,
        }
    }

    /// Overwrite totals with `counters` and fold them into the rate estimators.
    pub fn update(&mut self, counters: &PortCounters, now: Instant) {
        let s = &mut self.current;

        s.total_tx_bytes = counters.tx_bytes;
        s.total_rx_bytes = counters.rx_bytes;

        s.total_tx_pkts = counters.tx_packets;
        s.total_rx_pkts = counters.rx_packets;

        s.tx_rx_errors = counters.tx_errors.saturating_add(counters.rx_errors);

        s.tx_bps = self.tx_bps.add_at(now, counters.tx_bytes);
        s.rx_bps = self.rx_bps.add_at(now, counters.rx_bytes);

        s.tx_pps = self.tx_pps.add_at(now, counters.tx_packets);
        s.rx_pps = self.rx_pps.add_at(now, counters.rx_packets);
    }

    /// Copy of the values computed by the last `update`.
    pub fn snapshot(&self) -> PortStatsSnapshot {
        self.current
    }

    pub fn encode<S: StatsSink + ?Sized>(&self, sink: &mut S) {
        self.current.encode(sink);
    }

    /// Restart rate estimation after the counter source was reinitialized.
    pub fn reset_estimators(&mut self) {
        self.tx_bps.reset();
        self.rx_bps.reset();
        self.tx_pps.reset();
        self.rx_pps.reset();
        self.current.tx_bps = 0.0;
        self.current.rx_bps = 0.0;
        self.current.tx_pps = 0.0;
        self.current.rx_pps = 0.0;
    }
}

/// Format a bits/sec rate in a compact human-readable form.
pub fn format_rate(bps: f64) -> String {
    if bps < 1000.0 {
        format!("{:.0} bps", bps)
    } else if bps < 1_000_000.0 {
        format!("{:.1} Kbps", bps / 1000.0)
    } else if bps < 1_000_000_000.0 {
        format!("{:.2} Mbps", bps / 1_000_000.0)
    } else {
        format!("{:.2} Gbps", bps / 1_000_000_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: [&str; 9] = [
        "tx_bps",
        "rx_bps",
        "tx_pps",
        "rx_pps",
        "total_tx_pkts",
        "total_rx_pkts",
        "total_tx_bytes",
        "total_rx_bytes",
        "tx_rx_errors",
    ];

    fn counters(bytes: u64, packets: u64) -> PortCounters {
        PortCounters {
            tx_bytes: bytes,
            rx_bytes: bytes / 2,
            tx_packets: packets,
            rx_packets: packets / 2,
            tx_errors: 1,
            rx_errors: 2,
        }
    }

    #[test]
    fn test_new_record_is_zeroed() {
        assert_eq!(PortStats::new().snapshot(), PortStatsSnapshot::default());
    }

    #[test]
    fn test_update_copies_totals_verbatim() {
        let mut stats = PortStats::new();
        stats.update(&counters(5000, 50), Instant::now());
        let s = stats.snapshot();
        assert_eq!(s.total_tx_bytes, 5000);
        assert_eq!(s.total_rx_bytes, 2500);
        assert_eq!(s.total_tx_pkts, 50);
        assert_eq!(s.total_rx_pkts, 25);
        assert_eq!(s.tx_rx_errors, 3);
        assert_eq!(s.tx_bps, 0.0);
    }

    #[test]
    fn test_update_computes_bits_and_packets_per_second() {
        let t0 = Instant::now();
        let mut stats = PortStats::new();
        stats.update(&counters(0, 0), t0);
        stats.update(&counters(1_000_000, 1000), t0 + Duration::from_secs(1));

        let s = stats.snapshot();
        assert!((s.tx_bps - 4_000_000.0).abs() < 1e-6, "tx_bps {}", s.tx_bps);
        assert!((s.rx_bps - 2_000_000.0).abs() < 1e-6, "rx_bps {}", s.rx_bps);
        assert!((s.tx_pps - 500.0).abs() < 1e-9, "tx_pps {}", s.tx_pps);
        assert!((s.rx_pps - 250.0).abs() < 1e-9, "rx_pps {}", s.rx_pps);
    }

    #[test]
    fn test_encode_writes_exactly_the_contract_fields() {
        let t0 = Instant::now();
        let mut stats = PortStats::new();
        stats.update(&counters(0, 0), t0);
        stats.update(&counters(800, 8), t0 + Duration::from_secs(1));

        let mut out = Map::new();
        stats.encode(&mut out);
        assert_eq!(out.len(), FIELDS.len());
        for name in FIELDS {
            assert!(out.contains_key(name), "missing {name}");
        }
        for name in &FIELDS[..4] {
            assert!(out[*name].is_f64(), "{name} should be a float");
        }
        for name in &FIELDS[4..] {
            assert!(out[*name].is_u64(), "{name} should be an unsigned integer");
        }
        assert_eq!(out["total_tx_bytes"], 800);
        assert_eq!(out["tx_rx_errors"], 3);
    }

    #[test]
    fn test_zero_rates_still_encode_as_floats() {
        let mut out = Map::new();
        PortStats::new().encode(&mut out);
        assert!(out["tx_bps"].is_f64());
        assert!(out["total_rx_pkts"].is_u64());
    }

    #[test]
    fn test_snapshot_serializes_in_contract_order() {
        let json = serde_json::to_string(&PortStatsSnapshot::default()).unwrap();
        let mut last = 0;
        for name in FIELDS {
            let pos = json.find(&format!("\"{name}\"")).unwrap();
            assert!(pos >= last, "{name} out of order");
            last = pos;
        }
    }

    #[test]
    fn test_zero_interval_rates_encode_as_floats() {
        let t0 = Instant::now();
        let mut stats = PortStats::with_interval(Duration::ZERO);
        stats.update(&counters(0, 0), t0);
        stats.update(&counters(100, 1), t0);

        let mut out = Map::new();
        stats.encode(&mut out);
        for name in &FIELDS[..4] {
            assert!(out[*name].is_f64(), "{name} should be a float");
        }
    }

    #[test]
    fn test_reset_estimators_keeps_totals() {
        let t0 = Instant::now();
        let mut stats = PortStats::new();
        stats.update(&counters(0, 0), t0);
        stats.update(&counters(1000, 10), t0 + Duration::from_secs(1));
        stats.reset_estimators();

        let s = stats.snapshot();
        assert_eq!(s.tx_bps, 0.0);
        assert_eq!(s.rx_pps, 0.0);
        assert_eq!(s.total_tx_bytes, 1000);

        // Next update is a fresh first observation.
        stats.update(&counters(10, 1), t0 + Duration::from_secs(2));
        assert_eq!(stats.snapshot().tx_bps, 0.0);
    }

    #[test]
    fn test_format_rate_units() {
        assert_eq!(format_rate(0.0), "0 bps");
        assert_eq!(format_rate(999.0), "999 bps");
        assert_eq!(format_rate(1500.0), "1.5 Kbps");
        assert_eq!(format_rate(2_500_000.0), "2.50 Mbps");
        assert_eq!(format_rate(10_000_000_000.0), "10.00 Gbps");
    }
}
