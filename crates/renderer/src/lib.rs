//! Frame loop and presentation backends for the update screen.
//!
//! ```text
//!   fakeupdate (CLI)
//!          │ RendererConfig + FrameDriver
//!          ▼
//!   Renderer::run ──▶ window (winit + wgpu) ──┐
//!                └──▶ software (minifb) ──────┤
//!                                             ▼
//!                         FrameDriver::tick ──▶ Presenter
//! ```
//!
//! [`FrameDriver`] is backend independent: it advances the dot field, folds
//! progress, refreshes the cached status text and issues [`Presenter`] calls.
//! The GPU and software backends only implement `Presenter` and own their
//! window loop.

mod compile;
mod driver;
mod export;
mod gpu;
mod present;
mod progress;
mod runtime;
mod software;
mod types;
mod window;

use anyhow::Result;
use compositor::GlyphProvider;

pub use driver::{text_origin, ClosePolicy, DriverState, ExitTrigger, FrameDriver, FrameReport};
pub use export::{write_snapshot, SnapshotRequest};
pub use present::{Color, DotInstance, Palette, Presenter};
pub use progress::{
    parse_progress_line, ChannelProgress, FeedSample, FixedProgress, OrbitProgress,
    ProgressFeed, ProgressState, TimedProgress,
};
pub use runtime::{FrameScheduler, SteppedTimeSource, SystemTimeSource, TimeSample, TimeSource};
pub use software::{Canvas, SoftwarePresenter};
pub use types::{Antialiasing, Backend, InitError, RendererConfig, WindowMode};

/// Entry point that owns the chosen configuration and picks a backend.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Runs `driver` until it terminates or the window goes away.
    ///
    /// Window, surface, adapter and shader failures are returned before the
    /// first frame is presented.
    pub fn run<G: GlyphProvider>(&self, driver: FrameDriver<G>) -> Result<()> {
        let driver = driver.with_close_policy(ClosePolicy {
            kiosk: self.config.kiosk,
        });
        tracing::info!(
            backend = ?self.config.backend,
            window = ?self.config.window,
            kiosk = self.config.kiosk,
            "starting renderer"
        );
        match self.config.backend {
            Backend::Gpu => window::run(&self.config, driver),
            Backend::Software => software::run(&self.config, driver),
        }
    }
}
