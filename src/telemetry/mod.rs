//! # Telemetry Module
//!
//! Cycle latency tracking for the assist loop.
//!
//! Each cycle's duration is recorded; once per reporting interval the
//! tracker logs a summary (cycle count, min/avg/max) and starts a new window.

use std::time::{Duration, Instant};

use tracing::info;

/// Default summary interval
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Latency statistics for one reporting window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySummary {
    pub cycles: u64,
    pub min: Duration,
    pub avg: Duration,
    pub max: Duration,
}

/// Rolling latency tracker
#[derive(Debug)]
pub struct LatencyTracker {
    label: &'static str,
    interval: Duration,
    window_start: Instant,
    cycles: u64,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl LatencyTracker {
    pub fn new(label: &'static str) -> Self {
        Self::with_interval(label, DEFAULT_REPORT_INTERVAL)
    }

    pub fn with_interval(label: &'static str, interval: Duration) -> Self {
        Self {
            label,
            interval,
            window_start: Instant::now(),
            cycles: 0,
            total: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
        }
    }

    /// Record one cycle; returns the summary when a window closes
    pub fn record(&mut self, elapsed: Duration) -> Option<LatencySummary> {
        self.record_at(elapsed, Instant::now())
    }

    /// Record one cycle as observed at `now`
    pub fn record_at(&mut self, elapsed: Duration, now: Instant) -> Option<LatencySummary> {
        self.cycles += 1;
        self.total += elapsed;
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);

        if now.saturating_duration_since(self.window_start) < self.interval {
            return None;
        }

        let summary = self.summary()?;
        info!(
            "{}: {} cycles, latency min {:?} avg {:?} max {:?}",
            self.label, summary.cycles, summary.min, summary.avg, summary.max
        );
        self.reset(now);
        Some(summary)
    }

    /// Statistics of the current window, `None` before the first cycle
    pub fn summary(&self) -> Option<LatencySummary> {
        if self.cycles == 0 {
            return None;
        }
        let avg = self.total / u32::try_from(self.cycles).unwrap_or(u32::MAX);
        Some(LatencySummary {
            cycles: self.cycles,
            min: self.min,
            avg,
            max: self.max,
        })
    }

    fn reset(&mut self, now: Instant) {
        self.window_start = now;
        self.cycles = 0;
        self.total = Duration::ZERO;
        self.min = Duration::MAX;
        self.max = Duration::ZERO;
    }
}
