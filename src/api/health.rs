//! Shared health state for the /health endpoint.
//! Updated by the snapshot refresher, read by the API.

use std::sync::atomic::{AtomicU64, Ordering};

/// Refresh-cycle counters. Timestamps are Unix seconds, 0 = never.
#[derive(Default)]
pub struct HealthState {
    pub last_success_at: AtomicU64,
    pub last_failure_at: AtomicU64,
    pub consecutive_failures: AtomicU64,
    /// Cycles that published a new snapshot.
    pub publishes: AtomicU64,
    /// Cycles where the content identifier was unchanged.
    pub cache_hits: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_publish(&self, now_secs: u64) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
        self.record_success(now_secs);
    }

    pub fn record_cache_hit(&self, now_secs: u64) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        self.record_success(now_secs);
    }

    pub fn record_failure(&self, now_secs: u64) {
        self.last_failure_at.store(now_secs, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_success(&self, now_secs: u64) {
        self.last_success_at.store(now_secs, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    pub fn last_success_at(&self) -> u64 {
        self.last_success_at.load(Ordering::Relaxed)
    }

    pub fn last_failure_at(&self) -> u64 {
        self.last_failure_at.load(Ordering::Relaxed)
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn publishes(&self) -> u64 {
        self.publishes.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }
}
