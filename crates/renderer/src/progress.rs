//! Sources for the percentage shown under the title.

use std::f64::consts::TAU;
use std::time::Duration;

use crossbeam_channel::Receiver;

/// What a feed gets to look at when polled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedSample {
    /// Seconds since the run started.
    pub seconds: f64,
    /// Phase accumulator of the first dot.
    pub lead_phase: f64,
}

/// Produces progress percentages. `None` means "no new value this frame".
pub trait ProgressFeed {
    fn poll(&mut self, sample: &FeedSample) -> Option<u8>;
}

/// Always reports the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedProgress(pub u8);

impl ProgressFeed for FixedProgress {
    fn poll(&mut self, _sample: &FeedSample) -> Option<u8> {
        Some(self.0)
    }
}

/// Climbs linearly from 0 to 100 over `duration`.
#[derive(Debug, Clone, Copy)]
pub struct TimedProgress {
    duration: Duration,
}

impl TimedProgress {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl ProgressFeed for TimedProgress {
    fn poll(&mut self, sample: &FeedSample) -> Option<u8> {
        let total = self.duration.as_secs_f64();
        if total <= 0.0 {
            return Some(100);
        }
        let fraction = (sample.seconds / total).clamp(0.0, 1.0);
        Some((fraction * 100.0).floor() as u8)
    }
}

/// One percent per completed revolution of the lead dot.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrbitProgress;

impl ProgressFeed for OrbitProgress {
    fn poll(&mut self, sample: &FeedSample) -> Option<u8> {
        let revolutions = (-sample.lead_phase / TAU).floor();
        Some(revolutions.clamp(0.0, 100.0) as u8)
    }
}

/// Drains values pushed from another thread, keeping the latest.
#[derive(Debug)]
pub struct ChannelProgress {
    receiver: Receiver<u8>,
}

impl ChannelProgress {
    pub fn new(receiver: Receiver<u8>) -> Self {
        Self { receiver }
    }
}

impl ProgressFeed for ChannelProgress {
    fn poll(&mut self, _sample: &FeedSample) -> Option<u8> {
        self.receiver.try_iter().last()
    }
}

/// Parses a progress line such as `42`, ` 42 ` or `42%`.
pub fn parse_progress_line(line: &str) -> Option<u8> {
    let trimmed = line.trim();
    let digits = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    let value: u32 = digits.parse().ok()?;
    u8::try_from(value.min(100)).ok()
}

/// Percentage shown on screen. Never decreases and never exceeds 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressState {
    percent: u8,
}

impl ProgressState {
    pub fn new(initial: u8) -> Self {
        Self {
            percent: initial.min(100),
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Folds a feed value in, returning whether the displayed value changed.
    pub fn fold(&mut self, value: u8) -> bool {
        let next = value.min(100).max(self.percent);
        let changed = next != self.percent;
        self.percent = next;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(seconds: f64, lead_phase: f64) -> FeedSample {
        FeedSample {
            seconds,
            lead_phase,
        }
    }

    #[test]
    fn state_is_monotonic_and_clamped() {
        let mut state = ProgressState::default();
        assert!(state.fold(10));
        assert!(!state.fold(5));
        assert_eq!(state.percent(), 10);
        assert!(state.fold(250));
        assert_eq!(state.percent(), 100);
        assert!(!state.fold(100));
    }

    #[test]
    fn initial_value_is_clamped() {
        assert_eq!(ProgressState::new(180).percent(), 100);
    }

    #[test]
    fn timed_progress_is_linear() {
        let mut feed = TimedProgress::new(Duration::from_secs(100));
        assert_eq!(feed.poll(&sample(0.0, 0.0)), Some(0));
        assert_eq!(feed.poll(&sample(42.5, 0.0)), Some(42));
        assert_eq!(feed.poll(&sample(500.0, 0.0)), Some(100));
    }

    #[test]
    fn orbit_progress_counts_revolutions() {
        let mut feed = OrbitProgress;
        assert_eq!(feed.poll(&sample(0.0, 0.0)), Some(0));
        assert_eq!(feed.poll(&sample(0.0, -TAU * 3.5)), Some(3));
        assert_eq!(feed.poll(&sample(0.0, -TAU * 1000.0)), Some(100));
    }

    #[test]
    fn channel_progress_keeps_latest_value() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut feed = ChannelProgress::new(rx);
        assert_eq!(feed.poll(&sample(0.0, 0.0)), None);
        tx.send(12).unwrap();
        tx.send(30).unwrap();
        assert_eq!(feed.poll(&sample(0.0, 0.0)), Some(30));
        assert_eq!(feed.poll(&sample(0.0, 0.0)), None);
    }

    #[test]
    fn parses_progress_lines() {
        assert_eq!(parse_progress_line("42"), Some(42));
        assert_eq!(parse_progress_line(" 7% \n"), Some(7));
        assert_eq!(parse_progress_line("140"), Some(100));
        assert_eq!(parse_progress_line("-3"), None);
        assert_eq!(parse_progress_line("almost"), None);
        assert_eq!(parse_progress_line(""), None);
    }
}
