//! Performance metrics collection for the simulation.
//!
//! Provides structured logging and metrics tracking for monitoring
//! simulation performance and health.

use crate::rules::StepReport;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How often [`Metrics::record_step`] emits an `info!` summary.
const SUMMARY_EVERY: u64 = 100;

/// Counters shared by a simulator and whoever observes it.
pub struct Metrics {
    step_count: AtomicU64,
    firing_count: AtomicU64,
    absorbed_count: AtomicU64,
    kill_count: AtomicU64,
    tile_count: AtomicU64,
    pub counters: Mutex<HashMap<String, AtomicU64>>,
    start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            step_count: AtomicU64::new(0),
            firing_count: AtomicU64::new(0),
            absorbed_count: AtomicU64::new(0),
            kill_count: AtomicU64::new(0),
            tile_count: AtomicU64::new(0),
            counters: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Records a completed step.
    pub fn record_step(&self, duration: Duration, report: &StepReport, kills: usize, tiles: usize) {
        let step = self.step_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.firing_count
            .fetch_add(report.fired.len() as u64, Ordering::Relaxed);
        self.absorbed_count
            .fetch_add(report.absorbed.len() as u64, Ordering::Relaxed);
        self.kill_count.fetch_add(kills as u64, Ordering::Relaxed);
        self.tile_count.store(tiles as u64, Ordering::Relaxed);
        for firing in &report.fired {
            self.increment_counter(&firing.rule_type.to_string());
        }

        if step % SUMMARY_EVERY == 0 {
            tracing::info!(
                step,
                tiles,
                firings = self.firing_count(),
                absorbed = self.absorbed_count.load(Ordering::Relaxed),
                duration_us = duration.as_micros() as u64,
                "Simulation progress"
            );
        }
    }

    pub fn increment_counter(&self, name: &str) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .get(name)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn firing_count(&self) -> u64 {
        self.firing_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn kill_count(&self) -> u64 {
        self.kill_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn tile_count(&self) -> u64 {
        self.tile_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Installs the global `tracing` subscriber; `RUST_LOG` overrides the `info` default.
///
/// Calling it again is a no-op.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .ok();
}
