use std::time::Duration;

use crate::config::GcConfig;

/// Adapts the collection interval to how much each cycle frees: heavy churn
/// halves it, an empty cycle doubles it.
#[derive(Debug, Clone)]
pub struct GcSchedule {
    config: GcConfig,
    interval: Duration,
    cycles: u64,
    collected: u64,
}

impl GcSchedule {
    pub fn new(config: GcConfig) -> Self {
        let interval = config
            .initial_interval
            .clamp(config.min_interval, config.max_interval.max(config.min_interval));
        Self {
            config,
            interval,
            cycles: 0,
            collected: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn total_collected(&self) -> u64 {
        self.collected
    }

    /// Feeds back the result of one cycle; returns the next interval.
    pub fn record(&mut self, collected: usize) -> Duration {
        self.cycles += 1;
        self.collected += collected as u64;

        let next = if collected >= self.config.churn_threshold {
            self.interval / 2
        } else if collected == 0 {
            self.interval.saturating_mul(2)
        } else {
            self.interval
        };
        let max = self.config.max_interval.max(self.config.min_interval);
        self.interval = next.clamp(self.config.min_interval, max);
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GcConfig {
        GcConfig {
            initial_interval: Duration::from_secs(8),
            min_interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(32),
            churn_threshold: 100,
        }
    }

    #[test]
    fn interval_tracks_churn_within_bounds() {
        let mut schedule = GcSchedule::new(config());
        assert_eq!(schedule.record(500), Duration::from_secs(4));
        assert_eq!(schedule.record(500), Duration::from_secs(2));
        assert_eq!(schedule.record(500), Duration::from_secs(2));
        assert_eq!(schedule.record(10), Duration::from_secs(2));
        assert_eq!(schedule.record(0), Duration::from_secs(4));
        for _ in 0..10 {
            schedule.record(0);
        }
        assert_eq!(schedule.interval(), Duration::from_secs(32));
        assert_eq!(schedule.cycles(), 15);
        assert_eq!(schedule.total_collected(), 1510);
    }

    #[test]
    fn initial_interval_is_clamped() {
        let schedule = GcSchedule::new(GcConfig {
            initial_interval: Duration::from_secs(600),
            ..config()
        });
        assert_eq!(schedule.interval(), Duration::from_secs(32));
    }
}
