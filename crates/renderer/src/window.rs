use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use compositor::GlyphProvider;
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, KeyCode, ModifiersState, NamedKey, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowBuilder};

use crate::driver::{ExitTrigger, FrameDriver};
use crate::gpu::GpuPresenter;
use crate::runtime::{FrameScheduler, SystemTimeSource, TimeSource};
use crate::types::{InitError, RendererConfig, WindowMode};

/// Maps a key press to an exit trigger, given the current modifiers.
fn exit_trigger(event: &KeyEvent, modifiers: ModifiersState) -> Option<ExitTrigger> {
    if event.state != ElementState::Pressed || event.repeat {
        return None;
    }
    if event.physical_key == PhysicalKey::Code(KeyCode::KeyQ)
        && modifiers.control_key()
        && modifiers.shift_key()
    {
        return Some(ExitTrigger::KillSwitch);
    }
    if matches!(event.logical_key, Key::Named(NamedKey::Escape)) {
        return Some(ExitTrigger::Escape);
    }
    None
}

/// Presenter plus the window its surface was created from. Field order keeps
/// the surface dropped before the window.
struct GpuWindow {
    presenter: GpuPresenter,
    window: Arc<Window>,
}

/// Opens the window and drives `driver` until it terminates.
pub(crate) fn run<G: GlyphProvider>(config: &RendererConfig, mut driver: FrameDriver<G>) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| InitError::Window(err.to_string()))?;

    let mut builder = WindowBuilder::new().with_title(config.title.clone());
    builder = match config.window {
        WindowMode::Fullscreen => builder.with_fullscreen(Some(Fullscreen::Borderless(None))),
        WindowMode::Windowed { width, height } => {
            builder.with_inner_size(PhysicalSize::new(width, height))
        }
    };
    let window = builder
        .build(&event_loop)
        .map_err(|err| InitError::Window(err.to_string()))?;
    window.set_cursor_visible(false);
    let window = Arc::new(window);

    let presenter = GpuPresenter::new(window.as_ref(), window.inner_size(), config.antialiasing)?;
    let mut state = GpuWindow { presenter, window };
    info!(
        width = state.presenter.size().width,
        height = state.presenter.size().height,
        kiosk = driver.close_policy().kiosk,
        "gpu window ready"
    );

    let mut scheduler = FrameScheduler::new(config.target_fps);
    let mut clock = SystemTimeSource::new();
    let mut modifiers = ModifiersState::empty();
    let mut failure: Option<anyhow::Error> = None;

    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window.id() => match event {
            WindowEvent::CloseRequested => {
                if driver.handle_exit(ExitTrigger::CloseRequested) {
                    elwt.exit();
                }
            }
            WindowEvent::Destroyed => {
                driver.request_close();
                elwt.exit();
            }
            WindowEvent::ModifiersChanged(new_modifiers) => {
                modifiers = new_modifiers.state();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(trigger) = exit_trigger(&event, modifiers) {
                    if driver.handle_exit(trigger) {
                        elwt.exit();
                    }
                }
            }
            WindowEvent::Resized(new_size) => {
                debug!(width = new_size.width, height = new_size.height, "resized");
                state.presenter.resize(new_size);
            }
            WindowEvent::RedrawRequested => {
                let sample = clock.sample();
                match driver.tick(&mut state.presenter, sample.elapsed) {
                    Ok(Some(_)) => scheduler.mark_rendered(Instant::now()),
                    Ok(None) => elwt.exit(),
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        state.presenter.reconfigure();
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        warn!("surface timeout; skipping frame");
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        error!("surface out of memory; exiting");
                        failure = Some(anyhow!("GPU surface ran out of memory"));
                        driver.request_close();
                        elwt.exit();
                    }
                    Err(other) => {
                        warn!(error = ?other, "surface error; retrying next frame");
                    }
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            if driver.is_terminated() {
                elwt.exit();
                return;
            }
            let now = Instant::now();
            if scheduler.ready_for_frame(now) {
                state.window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = scheduler.next_deadline() {
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))?;
    info!(frames = driver.frames(), "gpu window closed");
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
