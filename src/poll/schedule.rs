use std::time::Duration;

/// Adaptive delay between status lookups: short while a render is young,
/// longer as it ages, and a hard ceiling on the whole wait.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSchedule {
    pub early_delay: Duration,
    pub early_window: Duration,
    pub mid_delay: Duration,
    pub mid_window: Duration,
    pub late_delay: Duration,
    pub ceiling: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            early_delay: Duration::from_secs(2),
            early_window: Duration::from_secs(30),
            mid_delay: Duration::from_secs(5),
            mid_window: Duration::from_secs(120),
            late_delay: Duration::from_secs(12),
            ceiling: Duration::from_secs(10 * 60),
        }
    }
}

impl PollSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn with_delays(mut self, early: Duration, mid: Duration, late: Duration) -> Self {
        self.early_delay = early;
        self.mid_delay = mid;
        self.late_delay = late;
        self
    }

    pub fn delay_for(&self, elapsed: Duration) -> Duration {
        if elapsed < self.early_window {
            self.early_delay
        } else if elapsed < self.mid_window {
            self.mid_delay
        } else {
            self.late_delay
        }
    }

    pub fn is_expired(&self, elapsed: Duration) -> bool {
        elapsed >= self.ceiling
    }
}
