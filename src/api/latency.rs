//! How long snapshot refreshes take, including cycles that only confirmed the
//! remote content was unchanged. Reported on `/health`.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;

/// Longest refresh we expect to record: one hour, in milliseconds.
const MAX_CYCLE_MS: u64 = 3_600_000;

/// Refresh-cycle durations in whole milliseconds.
pub struct LatencyStats {
    cycles: Mutex<Histogram<u64>>,
}

impl LatencyStats {
    pub fn new() -> Self {
        let cycles = Histogram::new_with_bounds(1, MAX_CYCLE_MS, 3)
            .expect("valid histogram bounds");
        Self {
            cycles: Mutex::new(cycles),
        }
    }

    /// Sub-millisecond cycles count as 1 ms; anything past an hour as one hour.
    pub fn record(&self, elapsed: Duration) {
        let ms = elapsed.as_millis().clamp(1, u128::from(MAX_CYCLE_MS)) as u64;
        if let Ok(mut cycles) = self.cycles.lock() {
            let _ = cycles.record(ms);
        }
    }

    /// Median, p95 and p99 cycle time. All None until the first cycle finishes.
    pub fn percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        let Ok(cycles) = self.cycles.lock() else {
            return (None, None, None);
        };
        if cycles.is_empty() {
            return (None, None, None);
        }
        let at = |q| Some(cycles.value_at_quantile(q));
        (at(0.5), at(0.95), at(0.99))
    }

    /// Refresh cycles recorded so far.
    pub fn len(&self) -> u64 {
        self.cycles.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
