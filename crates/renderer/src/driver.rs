//! Backend independent frame loop body.
//!
//! `FrameDriver` owns everything that changes from frame to frame (dot
//! phases, the shown percentage, the cached text surface) and turns one tick
//! into a fixed sequence of [`Presenter`] calls.

use std::time::Duration;

use compositor::{status_lines, GlyphProvider, TextCompositor};
use motion::{DotField, DotPosition, FixedStep, Viewport};

use crate::present::{DotInstance, Palette, Presenter};
use crate::progress::{FeedSample, ProgressFeed, ProgressState};

/// Lifecycle of a run. There is no way back from `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Running,
    Terminated,
}

/// Something asking the screen to go away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    /// Window manager close request.
    CloseRequested,
    Escape,
    /// `Ctrl+Shift+Q`.
    KillSwitch,
}

/// Which exit triggers are honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClosePolicy {
    pub kiosk: bool,
}

impl ClosePolicy {
    pub fn allows(&self, trigger: ExitTrigger) -> bool {
        match trigger {
            ExitTrigger::KillSwitch => true,
            ExitTrigger::CloseRequested | ExitTrigger::Escape => !self.kiosk,
        }
    }
}

/// What a tick did, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub ticks: u32,
    pub percent: u8,
    pub text_rebuilt: bool,
}

/// Top-left corner of the text surface for a viewport.
///
/// Horizontally centred on the surface width; the top edge sits `height / 24`
/// below the viewport centre.
pub fn text_origin(viewport: Viewport, surface_width: u32) -> (f32, f32) {
    let width = viewport.width as f32;
    let height = viewport.height as f32;
    let x = (width / 2.0 - surface_width as f32 / 2.0).round();
    let y = (height / 2.0 + height / 24.0).round();
    (x, y)
}

pub struct FrameDriver<G> {
    field: DotField,
    step: FixedStep,
    compositor: TextCompositor<G>,
    feed: Box<dyn ProgressFeed>,
    progress: ProgressState,
    title: String,
    palette: Palette,
    policy: ClosePolicy,
    state: DriverState,
    positions: Vec<DotPosition>,
    instances: Vec<DotInstance>,
    frames: u64,
}

impl<G: GlyphProvider> FrameDriver<G> {
    pub fn new(
        field: DotField,
        step: FixedStep,
        compositor: TextCompositor<G>,
        feed: Box<dyn ProgressFeed>,
        title: impl Into<String>,
    ) -> Self {
        let dots = field.len();
        Self {
            field,
            step,
            compositor,
            feed,
            progress: ProgressState::default(),
            title: title.into(),
            palette: Palette::default(),
            policy: ClosePolicy::default(),
            state: DriverState::Running,
            positions: Vec::with_capacity(dots),
            instances: Vec::with_capacity(dots),
            frames: 0,
        }
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_close_policy(mut self, policy: ClosePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == DriverState::Terminated
    }

    pub fn field(&self) -> &DotField {
        &self.field
    }

    pub fn progress(&self) -> u8 {
        self.progress.percent()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn compositor(&self) -> &TextCompositor<G> {
        &self.compositor
    }

    pub fn close_policy(&self) -> ClosePolicy {
        self.policy
    }

    /// Ends the run unconditionally.
    pub fn request_close(&mut self) {
        if self.state == DriverState::Running {
            tracing::info!(frames = self.frames, "terminating");
            self.state = DriverState::Terminated;
        }
    }

    /// Ends the run if the close policy honours `trigger`. Returns whether the
    /// driver is now terminated.
    pub fn handle_exit(&mut self, trigger: ExitTrigger) -> bool {
        if self.policy.allows(trigger) {
            tracing::debug!(?trigger, "exit requested");
            self.request_close();
        } else {
            tracing::debug!(?trigger, "ignoring exit request in kiosk mode");
        }
        self.is_terminated()
    }

    /// Runs one frame against `presenter`, `elapsed` being time since start.
    ///
    /// Returns `Ok(None)` without touching the presenter once terminated.
    pub fn tick<P: Presenter>(
        &mut self,
        presenter: &mut P,
        elapsed: Duration,
    ) -> Result<Option<FrameReport>, P::Error> {
        if self.is_terminated() {
            return Ok(None);
        }

        let ticks = self.step.ticks_due(elapsed);
        self.field.advance(ticks);

        let sample = FeedSample {
            seconds: elapsed.as_secs_f64(),
            lead_phase: self.field.phase(0).unwrap_or(0.0),
        };
        if let Some(value) = self.feed.poll(&sample) {
            if self.progress.fold(value) {
                tracing::debug!(percent = self.progress.percent(), "progress advanced");
            }
        }

        let viewport = presenter.viewport();
        presenter.clear(self.palette.background);

        self.field.positions_into(viewport, &mut self.positions);
        let radius = self.field.layout(viewport).dot_radius as f32;
        self.instances.clear();
        self.instances.extend(self.positions.iter().map(|position| {
            let (x, y) = position.to_screen(viewport);
            DotInstance::new(x, y, radius)
        }));
        presenter.draw_dots(&self.instances, self.palette.foreground);

        let lines = status_lines(&self.title, self.progress.percent());
        let text_rebuilt = self.compositor.refresh(&lines);
        if let Some(surface) = self.compositor.surface() {
            if text_rebuilt {
                presenter.upload_text(surface);
            }
            presenter.draw_text(text_origin(viewport, surface.width()));
        }

        presenter.present()?;
        self.frames += 1;

        Ok(Some(FrameReport {
            ticks,
            percent: self.progress.percent(),
            text_rebuilt,
        }))
    }
}
