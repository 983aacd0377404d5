use std::time::{Duration, Instant};

/// Snapshot of the clock handed to the frame driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Time since the run started.
    pub elapsed: Duration,
}

/// Abstraction over where time values originate from.
pub trait TimeSource {
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn sample(&mut self) -> TimeSample {
        TimeSample {
            elapsed: self.origin.elapsed(),
        }
    }
}

/// Time source that advances by a fixed step per sample, independent of the wall clock.
///
/// Used for headless snapshots so the output only depends on the number of
/// frames rendered.
#[derive(Debug, Clone, Copy)]
pub struct SteppedTimeSource {
    step: Duration,
    frame: u64,
}

impl SteppedTimeSource {
    pub fn new(step: Duration) -> Self {
        Self { step, frame: 0 }
    }
}

impl TimeSource for SteppedTimeSource {
    fn sample(&mut self) -> TimeSample {
        self.frame = self.frame.saturating_add(1);
        let factor = u32::try_from(self.frame).unwrap_or(u32::MAX);
        TimeSample {
            elapsed: self.step.saturating_mul(factor),
        }
    }
}

/// Decides when the window loop should request the next redraw.
///
/// Without a cap every `AboutToWait` requests a frame and the FIFO swapchain
/// paces presentation.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    interval: Option<Duration>,
    last_frame: Option<Instant>,
}

impl FrameScheduler {
    /// Caps that are not positive, or whose interval does not fit a
    /// `Duration`, leave the scheduler uncapped.
    pub fn new(target_fps: Option<f32>) -> Self {
        let interval = target_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .and_then(|fps| Duration::try_from_secs_f32(1.0 / fps).ok());
        Self {
            interval,
            last_frame: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => Some(last + interval),
            _ => None,
        }
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.last_frame = Some(now);
    }
}
