use super::FrameLoopError;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

/// Fires once per display refresh
///
/// Ticks missed while the loop was busy are skipped, never bunched up.
pub struct FrameClock {
    interval: Interval,
}

impl FrameClock {
    pub fn new(refresh_rate: u32) -> Result<Self, FrameLoopError> {
        if refresh_rate == 0 {
            return Err(FrameLoopError::Scheduler(
                "refresh rate must be at least 1 Hz".to_string(),
            ));
        }

        // tokio timers panic outside a runtime
        tokio::runtime::Handle::try_current()
            .map_err(|e| FrameLoopError::Scheduler(e.to_string()))?;

        let period = Duration::from_secs_f64(1.0 / f64::from(refresh_rate));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Ok(Self { interval })
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_a_runtime() {
        assert!(matches!(FrameClock::new(60), Err(FrameLoopError::Scheduler(_))));
    }

    #[tokio::test]
    async fn zero_rate_is_rejected() {
        assert!(matches!(FrameClock::new(0), Err(FrameLoopError::Scheduler(_))));
    }

    #[tokio::test]
    async fn period_matches_refresh_rate() {
        let mut clock = FrameClock::new(50).unwrap();
        assert_eq!(clock.period(), Duration::from_millis(20));

        // first tick completes immediately
        clock.tick().await;
    }
}
