use std::time::Duration;

/// Most ticks a single frame may catch up on after a stall.
const MAX_CATCH_UP: u32 = 8;

const DEFAULT_RATE: f64 = 60.0;

/// Turns monotonic elapsed time into whole motion ticks at a fixed rate.
///
/// The loader was tuned for one step per ~16 ms frame; stepping from elapsed
/// time keeps that speed regardless of how fast frames are presented.
#[derive(Debug, Clone)]
pub struct FixedStep {
    interval: Duration,
    consumed: u64,
}

impl FixedStep {
    /// Creates a stepper ticking `rate` times per second. Rates that are not
    /// positive, or too small for a `Duration` interval, fall back to 60 Hz.
    pub fn new(rate: f32) -> Self {
        let interval = Some(rate)
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .and_then(|rate| Duration::try_from_secs_f64(1.0 / f64::from(rate)).ok())
            .unwrap_or_else(|| Duration::from_secs_f64(1.0 / DEFAULT_RATE));
        Self {
            interval,
            consumed: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Total ticks handed out so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Ticks due at `elapsed` since the previous call.
    pub fn ticks_due(&mut self, elapsed: Duration) -> u32 {
        let total = (elapsed.as_nanos() / self.interval.as_nanos().max(1)) as u64;
        if total <= self.consumed {
            return 0;
        }
        let due = total - self.consumed;
        if due > u64::from(MAX_CATCH_UP) {
            self.consumed = total;
            MAX_CATCH_UP
        } else {
            self.consumed = total;
            due as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hands_out_one_tick_per_interval() {
        let mut step = FixedStep::new(60.0);
        assert_eq!(step.ticks_due(Duration::ZERO), 0);
        assert_eq!(step.ticks_due(Duration::from_millis(17)), 1);
        assert_eq!(step.ticks_due(Duration::from_millis(20)), 0);
        assert_eq!(step.ticks_due(Duration::from_millis(51)), 2);
        assert_eq!(step.consumed(), 3);
    }

    #[test]
    fn caps_catch_up_after_a_stall() {
        let mut step = FixedStep::new(60.0);
        assert_eq!(step.ticks_due(Duration::from_secs(5)), MAX_CATCH_UP);
        assert_eq!(step.ticks_due(Duration::from_secs(5)), 0);
        assert_eq!(step.ticks_due(Duration::from_millis(5017)), 1);
    }

    #[test]
    fn invalid_rate_falls_back_to_sixty_hertz() {
        let step = FixedStep::new(0.0);
        assert_eq!(step.interval(), Duration::from_secs_f64(1.0 / 60.0));
    }

    #[test]
    fn tiny_rate_falls_back_instead_of_overflowing() {
        let mut step = FixedStep::new(1e-30);
        assert_eq!(step.interval(), Duration::from_secs_f64(1.0 / 60.0));
        assert_eq!(step.ticks_due(Duration::from_millis(17)), 1);
    }
}
