//! Per-port traffic control: state machine, ownership, and statistics.
//!
//! A [`Port`] is shared between the control path (start/stop/ownership commands)
//! and the stats poller. The two sides use independent locks, so a stats refresh
//! never blocks a command and vice versa.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::backend::{NicDriver, PortProperties, StreamTable, TrafficEngine};
use crate::config;
use crate::core::stats::{PortStats, PortStatsSnapshot, StatsSink};
use crate::error::PortError;

/// Operational state of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum PortState {
    #[serde(rename = "down")]
    Down = 0,
    #[serde(rename = "idle")]
    UpIdle = 1,
    #[serde(rename = "transmitting")]
    Transmitting = 2,
}

impl PortState {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PortState::Down),
            1 => Some(PortState::UpIdle),
            2 => Some(PortState::Transmitting),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        Self::label_for_code(self.code())
    }

    /// Label for a raw state code, e.g. one received over the wire.
    /// Codes outside the enumeration map to `"unknown"`.
    pub fn label_for_code(code: u8) -> &'static str {
        match Self::from_code(code) {
            Some(PortState::Down) => "down",
            Some(PortState::UpIdle) => "idle",
            Some(PortState::Transmitting) => "transmitting",
            None => {
                tracing::warn!("Unmapped port state code {code}");
                "unknown"
            }
        }
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session currently controlling a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortOwner {
    pub name: String,
    pub handler: String,
}

/// State and owner move together under one lock.
#[derive(Debug)]
struct Control {
    state: PortState,
    owner: Option<PortOwner>,
}

/// Draw a session handler from the 62-character alphanumeric alphabet.
pub fn generate_handler<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..config::HANDLER_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..config::HANDLER_ALPHABET.len());
            char::from(config::HANDLER_ALPHABET[idx])
        })
        .collect()
}

/// One managed port.
pub struct Port {
    port_id: u8,
    control: Mutex<Control>,
    stats: RwLock<PortStats>,
    streams: Arc<dyn StreamTable>,
    nic: Arc<dyn NicDriver>,
    engine: Arc<dyn TrafficEngine>,
    rng: Mutex<StdRng>,
}

impl Port {
    /// Create a port in `UpIdle` with no owner and zeroed statistics.
    pub fn new(
        port_id: u8,
        streams: Arc<dyn StreamTable>,
        nic: Arc<dyn NicDriver>,
        engine: Arc<dyn TrafficEngine>,
    ) -> Self {
        Self {
            port_id,
            control: Mutex::new(Control {
                state: PortState::UpIdle,
                owner: None,
            }),
            stats: RwLock::new(PortStats::new()),
            streams,
            nic,
            engine,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the handler random source, e.g. with a seeded one in tests.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Replace the statistics record, e.g. one with a custom sampling interval.
    pub fn with_stats(mut self, stats: PortStats) -> Self {
        self.stats = RwLock::new(stats);
        self
    }

    pub fn port_id(&self) -> u8 {
        self.port_id
    }

    // ---- State machine ----

    /// Begin transmitting. Only valid from `UpIdle` with at least one stream.
    pub fn start_traffic(&self) -> Result<(), PortError> {
        let mut control = self.control.lock();

        if control.state != PortState::UpIdle {
            return Err(PortError::BadStateForOp {
                op: "start traffic",
                state: control.state,
            });
        }

        if self.streams.size() == 0 {
            return Err(PortError::NoStreams);
        }

        control.state = PortState::Transmitting;
        self.engine.start(self.port_id);
        tracing::info!("Port {}: traffic started", self.port_id);
        Ok(())
    }

    /// Halt transmission. A no-op unless the port is transmitting.
    pub fn stop_traffic(&self) {
        let mut control = self.control.lock();

        if control.state == PortState::Transmitting {
            control.state = PortState::UpIdle;
            self.engine.stop(self.port_id);
            tracing::info!("Port {}: traffic stopped", self.port_id);
        }
    }

    /// Current state. Takes the control lock; no side effects.
    pub fn get_state(&self) -> PortState {
        self.control.lock().state
    }

    /// Current state as `"down"`, `"idle"` or `"transmitting"`.
    pub fn get_state_as_string(&self) -> &'static str {
        self.get_state().as_str()
    }

    /// Link went down. Any transmission is halted.
    pub fn link_down(&self) {
        let mut control = self.control.lock();

        if control.state == PortState::Transmitting {
            self.engine.stop(self.port_id);
        }
        if control.state != PortState::Down {
            control.state = PortState::Down;
            tracing::warn!("Port {}: link down", self.port_id);
        }
    }

    /// Link came back. A downed port returns to `UpIdle`.
    pub fn link_up(&self) {
        let mut control = self.control.lock();

        if control.state == PortState::Down {
            control.state = PortState::UpIdle;
            tracing::info!("Port {}: link up", self.port_id);
        }
    }

    /// Driver name and link speed, straight from the NIC driver.
    pub fn get_properties(&self) -> PortProperties {
        self.nic.properties(self.port_id)
    }

    // ---- Ownership ----

    /// Fresh session handler from this port's random source.
    pub fn generate_handler(&self) -> String {
        generate_handler(&mut *self.rng.lock())
    }

    /// Take ownership for `owner`, returning the new session handler.
    ///
    /// Fails with `PortOwned` if another session holds the port, unless `force`.
    pub fn acquire(&self, owner: &str, force: bool) -> Result<String, PortError> {
        let mut control = self.control.lock();

        if let Some(current) = &control.owner {
            if !force {
                return Err(PortError::PortOwned {
                    owner: current.name.clone(),
                });
            }
            tracing::warn!(
                "Port {}: ownership forcibly taken from '{}' by '{owner}'",
                self.port_id,
                current.name
            );
        }

        let handler = self.generate_handler();
        control.owner = Some(PortOwner {
            name: owner.to_string(),
            handler: handler.clone(),
        });
        tracing::info!("Port {}: acquired by '{owner}'", self.port_id);
        Ok(handler)
    }

    /// Give up ownership. The handler must match the current owner's.
    pub fn release(&self, handler: &str) -> Result<(), PortError> {
        let mut control = self.control.lock();

        let matches = control
            .owner
            .as_ref()
            .is_some_and(|o| o.handler == handler);
        if !matches {
            return Err(PortError::NotOwner);
        }

        if let Some(owner) = control.owner.take() {
            tracing::info!("Port {}: released by '{}'", self.port_id, owner.name);
        }
        Ok(())
    }

    /// Drop ownership regardless of who holds it.
    pub fn clear_owner(&self) {
        self.control.lock().owner = None;
    }

    /// True if `handler` belongs to the current owner.
    pub fn verify_owner(&self, handler: &str) -> bool {
        self.control
            .lock()
            .owner
            .as_ref()
            .is_some_and(|o| o.handler == handler)
    }

    pub fn owner(&self) -> Option<PortOwner> {
        self.control.lock().owner.clone()
    }

    // ---- Statistics ----

    /// Pull counters from the NIC and refresh the statistics record.
    ///
    /// The counter read and the sample time are taken under the stats write
    /// lock, so overlapping refreshes apply in the order they read.
    pub fn update_stats(&self) -> Result<(), PortError> {
        self.refresh_stats(Instant::now)
    }

    /// Like [`Port::update_stats`], stamping the sample with `now`.
    pub fn update_stats_at(&self, now: Instant) -> Result<(), PortError> {
        self.refresh_stats(|| now)
    }

    fn refresh_stats(&self, clock: impl FnOnce() -> Instant) -> Result<(), PortError> {
        let mut stats = self.stats.write();
        let counters = self.nic.read_counters(self.port_id)?;
        stats.update(&counters, clock());
        drop(stats);
        tracing::debug!("Port {}: stats refreshed {:?}", self.port_id, counters);
        Ok(())
    }

    /// The record as of the last `update_stats`; does not refresh.
    pub fn get_stats(&self) -> PortStatsSnapshot {
        self.stats.read().snapshot()
    }

    /// Write the last computed statistics into `sink`.
    pub fn encode_stats<S: StatsSink + ?Sized>(&self, sink: &mut S) {
        self.stats.read().encode(sink);
    }

    /// Restart rate estimation, e.g. after the NIC was reinitialized.
    pub fn reset_rate_estimators(&self) {
        self.stats.write().reset_estimators();
        tracing::info!("Port {}: rate estimators reset", self.port_id);
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("port_id", &self.port_id)
            .field("state", &self.get_state())
            .finish_non_exhaustive()
    }
}
