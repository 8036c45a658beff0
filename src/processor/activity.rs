use super::stats::RunningStats;

/// Splits a flow's packet timeline into active bursts and idle gaps.
///
/// Durations are recorded in microseconds. A gap strictly longer than the
/// threshold closes the running active period and is itself recorded as idle.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    threshold_us: u64,
    period_start: Option<u64>,
    last_seen: u64,
    active: RunningStats,
    idle: RunningStats,
}

impl ActivityTracker {
    pub fn new(threshold_us: u64) -> Self {
        Self {
            threshold_us,
            period_start: None,
            last_seen: 0,
            active: RunningStats::new(),
            idle: RunningStats::new(),
        }
    }

    pub fn observe(&mut self, timestamp: u64) {
        let Some(start) = self.period_start else {
            self.period_start = Some(timestamp);
            self.last_seen = timestamp;
            return;
        };

        let gap = timestamp.saturating_sub(self.last_seen);
        if gap > self.threshold_us {
            self.active.observe(self.last_seen.saturating_sub(start) as f64);
            self.idle.observe(gap as f64);
            self.period_start = Some(timestamp);
        }
        // Out-of-order timestamps never move the timeline backwards
        self.last_seen = self.last_seen.max(timestamp);
    }

    /// Closes the open active period at `last_timestamp`. Further calls are no-ops.
    pub fn finalize(&mut self, last_timestamp: u64) {
        if let Some(start) = self.period_start.take() {
            let end = last_timestamp.max(self.last_seen);
            self.active.observe(end.saturating_sub(start) as f64);
        }
    }

    pub fn active(&self) -> &RunningStats { &self.active }

    pub fn idle(&self) -> &RunningStats { &self.idle }
}
