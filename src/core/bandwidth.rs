//! Smoothed rate estimation over a monotonically increasing counter.
//!
//! Hardware counters are read often but only move meaningfully over coarser
//! intervals, so an update is accepted only once per sampling interval and the
//! instantaneous rate is folded into an exponential moving average.

use std::time::{Duration, Instant};

use crate::config;

const MIN_INTERVAL_FLOOR: Duration = Duration::from_millis(1);

/// Exponentially smoothed rate over one cumulative counter.
#[derive(Debug, Clone)]
pub struct BandwidthEstimator {
    /// Unit conversion applied to `delta / seconds`.
    scale: f64,
    interval: Duration,
    last_sample: Option<(Instant, u64)>,
    smoothed: f64,
}

impl BandwidthEstimator {
    /// Create an estimator with the default one-second sampling interval.
    pub fn new(scale: f64) -> Self {
        Self::with_interval(scale, Duration::from_millis(config::MIN_SAMPLE_INTERVAL_MS))
    }

    /// Create an estimator with a custom sampling interval, floored at 1 ms
    /// so two accepted samples are never zero time apart.
    pub fn with_interval(scale: f64, interval: Duration) -> Self {
        Self {
            scale,
            interval: interval.max(MIN_INTERVAL_FLOOR),
            last_sample: None,
            smoothed: 0.0,
        }
    }

    /// Feed the current counter value, sampled now.
    pub fn add(&mut self, value: u64) -> f64 {
        self.add_at(Instant::now(), value)
    }

    /// Feed a counter value observed at `now`. Returns the smoothed rate.
    ///
    /// Calls closer together than the sampling interval return the cached rate
    /// and leave the stored sample untouched, so the delta accumulated in
    /// between is folded into the next accepted sample's window.
    pub fn add_at(&mut self, now: Instant, value: u64) -> f64 {
        let Some((last_time, last_value)) = self.last_sample else {
            self.last_sample = Some((now, value));
            return 0.0;
        };

        let elapsed = now.saturating_duration_since(last_time);
        if elapsed < self.interval {
            return self.smoothed;
        }

        let Some(delta) = value.checked_sub(last_value) else {
            tracing::warn!(
                "Counter went backward ({last_value} -> {value}); resetting rate estimate"
            );
            self.reset();
            self.last_sample = Some((now, value));
            return 0.0;
        };

        let instant = self.scale * delta as f64 / elapsed.as_secs_f64();
        self.smoothed = config::SMOOTHING_ALPHA * instant
            + (1.0 - config::SMOOTHING_ALPHA) * self.smoothed;
        self.last_sample = Some((now, value));
        self.smoothed
    }

    /// Current smoothed rate without feeding a sample.
    pub fn rate(&self) -> f64 {
        self.smoothed
    }

    pub fn is_initialized(&self) -> bool {
        self.last_sample.is_some()
    }

    /// Forget all history; the next sample is treated as the first.
    pub fn reset(&mut self) {
        self.last_sample = None;
        self.smoothed = 0.0;
    }
}
