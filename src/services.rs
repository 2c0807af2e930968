//! Background service lifecycle management.
//!
//! `BackgroundServices` owns the tasks spawned at startup:
//! 1. Stats poller (tokio task, refreshes every port each `STATS_INTERVAL_SECS`)
//! 2. Reporter (thread, logs per-port state and rates each `REPORT_INTERVAL_SECS`)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config;
use crate::core::stats::format_rate;
use crate::core::PortRegistry;

pub struct BackgroundServices {
    shutdown: Arc<AtomicBool>,
    poller: tokio::task::JoinHandle<()>,
    reporter: Option<std::thread::JoinHandle<()>>,
}

impl BackgroundServices {
    /// Start the poller and reporter. Must be called inside a tokio runtime.
    pub fn start(registry: &Arc<PortRegistry>) -> anyhow::Result<Self> {
        let poller = registry.start_poller(Duration::from_secs(config::STATS_INTERVAL_SECS));

        let shutdown = Arc::new(AtomicBool::new(false));
        let reporter = Self::start_reporter(Arc::clone(registry), Arc::clone(&shutdown))?;

        tracing::info!("Background services started for {} ports", registry.len());
        Ok(Self {
            shutdown,
            poller,
            reporter: Some(reporter),
        })
    }

    fn start_reporter(
        registry: Arc<PortRegistry>,
        shutdown: Arc<AtomicBool>,
    ) -> anyhow::Result<std::thread::JoinHandle<()>> {
        let handle = std::thread::Builder::new()
            .name("stats-reporter".into())
            .spawn(move || {
                let period = Duration::from_secs(config::REPORT_INTERVAL_SECS);
                let slice = Duration::from_millis(config::SHUTDOWN_POLL_MS);
                let mut waited = Duration::ZERO;
                while !shutdown.load(Ordering::Relaxed) {
                    std::thread::sleep(slice);
                    waited += slice;
                    if waited < period {
                        continue;
                    }
                    waited = Duration::ZERO;
                    for line in report_lines(&registry) {
                        tracing::info!("{line}");
                    }
                }
            })?;
        Ok(handle)
    }

    /// Signal both services to stop. The reporter exits within one poll slice.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.poller.abort();
    }
}

impl Drop for BackgroundServices {
    fn drop(&mut self) {
        self.stop();
        if let Some(reporter) = self.reporter.take() {
            if reporter.join().is_err() {
                tracing::warn!("Stats reporter thread panicked");
            }
        }
    }
}

/// One human-readable summary line per managed port.
pub fn report_lines(registry: &PortRegistry) -> Vec<String> {
    registry
        .ids()
        .into_iter()
        .filter_map(|id| registry.get(id).ok())
        .map(|port| {
            let s = port.get_stats();
            format!(
                "port {} [{}]: tx {} ({:.0} pps) rx {} ({:.0} pps) errors {}",
                port.port_id(),
                port.get_state_as_string(),
                format_rate(s.tx_bps),
                s.tx_pps,
                format_rate(s.rx_bps),
                s.rx_pps,
                s.tx_rx_errors
            )
        })
        .collect()
}
