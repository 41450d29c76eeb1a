use std::time::Duration;

use crate::config::DiscoveryConfig;

/// Exponential backoff with a cap, reset after a success.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        let initial = initial.min(max);
        Self { initial, max, multiplier: multiplier.max(1.0), current: initial }
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new(config.initial_backoff(), config.max_backoff(), config.backoff_multiplier)
    }

    /// Delay to wait before the next attempt; grows the following one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        // Exponential backoff with max cap
        self.current =
            Duration::from_millis(((self.current.as_millis() as f64) * self.multiplier) as u64)
                .min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_to_cap_and_resets() {
        let mut backoff =
            Backoff::new(Duration::from_millis(100), Duration::from_millis(500), 2.0);
        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn initial_above_cap_is_clamped() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(1), 2.0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }
}
