//! CPU rasterizer and the `minifb` window loop.

use std::convert::Infallible;

use anyhow::{anyhow, Result};
use compositor::{GlyphProvider, TextSurface};
use image::{RgbImage, RgbaImage};
use minifb::{Key, Window, WindowOptions};
use motion::Viewport;
use tracing::{debug, info, warn};
use winit::event_loop::EventLoop;

use crate::driver::{ExitTrigger, FrameDriver};
use crate::present::{Color, DotInstance, Presenter};
use crate::runtime::{SystemTimeSource, TimeSource};
use crate::types::{InitError, RendererConfig, WindowMode};

/// `0RGB` framebuffer in row-major order.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y * self.width + x).copied()
    }

    /// Resizes the buffer, discarding its contents when the size changes.
    pub fn resize(&mut self, width: usize, height: usize) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(width * height, 0);
    }

    pub fn fill(&mut self, color: Color) {
        self.pixels.fill(color.to_0rgb());
    }

    /// Filled circle with a one pixel anti-aliased rim.
    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color) {
        if radius <= 0.0 || self.width == 0 || self.height == 0 {
            return;
        }
        let reach = radius + 1.0;
        let min_x = (cx - reach).floor().max(0.0) as usize;
        let min_y = (cy - reach).floor().max(0.0) as usize;
        let max_x = ((cx + reach).ceil().max(0.0) as usize).min(self.width);
        let max_y = ((cy + reach).ceil().max(0.0) as usize).min(self.height);

        for y in min_y..max_y {
            let dy = y as f32 + 0.5 - cy;
            for x in min_x..max_x {
                let dx = x as f32 + 0.5 - cx;
                let distance = (dx * dx + dy * dy).sqrt();
                let coverage = (radius - distance + 0.5).clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                let index = y * self.width + x;
                self.pixels[index] = blend(self.pixels[index], color, coverage * color.a);
            }
        }
    }

    /// Alpha-composites a straight-alpha RGBA image with its top-left at `(x, y)`.
    pub fn blit(&mut self, image: &RgbaImage, x: i64, y: i64) {
        for (sx, sy, texel) in image.enumerate_pixels() {
            let alpha = texel[3];
            if alpha == 0 {
                continue;
            }
            let dx = x + i64::from(sx);
            let dy = y + i64::from(sy);
            if dx < 0 || dy < 0 || dx as usize >= self.width || dy as usize >= self.height {
                continue;
            }
            let index = dy as usize * self.width + dx as usize;
            let color = Color {
                r: f32::from(texel[0]) / 255.0,
                g: f32::from(texel[1]) / 255.0,
                b: f32::from(texel[2]) / 255.0,
                a: 1.0,
            };
            self.pixels[index] = blend(self.pixels[index], color, f32::from(alpha) / 255.0);
        }
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let value = self.pixels[y as usize * self.width + x as usize];
            image::Rgb([(value >> 16) as u8, (value >> 8) as u8, value as u8])
        })
    }
}

fn blend(dst: u32, color: Color, alpha: f32) -> u32 {
    let alpha = alpha.clamp(0.0, 1.0);
    let mix = |shift: u32, src: f32| {
        let prev = ((dst >> shift) & 0xFF) as f32;
        let value = src.clamp(0.0, 1.0) * 255.0 * alpha + prev * (1.0 - alpha);
        (value.round() as u32).min(255) << shift
    };
    mix(16, color.r) | mix(8, color.g) | mix(0, color.b)
}

/// [`Presenter`] drawing into a [`Canvas`].
pub struct SoftwarePresenter {
    canvas: Canvas,
    text: Option<RgbaImage>,
    presented: u64,
}

impl SoftwarePresenter {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            canvas: Canvas::new(width, height),
            text: None,
            presented: 0,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.canvas.resize(width, height);
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl Presenter for SoftwarePresenter {
    type Error = Infallible;

    fn viewport(&self) -> Viewport {
        Viewport::new(self.canvas.width() as u32, self.canvas.height() as u32)
    }

    fn clear(&mut self, color: Color) {
        self.canvas.fill(color);
    }

    fn draw_dots(&mut self, dots: &[DotInstance], color: Color) {
        for dot in dots {
            self.canvas
                .fill_circle(dot.center[0], dot.center[1], dot.radius, color);
        }
    }

    fn upload_text(&mut self, surface: &TextSurface) {
        self.text = Some(surface.image().clone());
    }

    fn draw_text(&mut self, origin: (f32, f32)) {
        if let Some(text) = self.text.as_ref() {
            self.canvas
                .blit(text, origin.0.round() as i64, origin.1.round() as i64);
        }
    }

    fn present(&mut self) -> Result<(), Infallible> {
        self.presented += 1;
        Ok(())
    }
}

fn kill_switch_down(window: &Window) -> bool {
    let ctrl = window.is_key_down(Key::LeftCtrl) || window.is_key_down(Key::RightCtrl);
    let shift = window.is_key_down(Key::LeftShift) || window.is_key_down(Key::RightShift);
    ctrl && shift && window.is_key_down(Key::Q)
}

/// Physical size of the primary monitor, asked of a short-lived `winit`
/// event loop since `minifb` cannot enumerate monitors.
fn primary_monitor_size() -> Option<(u32, u32)> {
    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            warn!(error = %err, "cannot query monitors; using configured size");
            return None;
        }
    };
    let monitor = event_loop
        .primary_monitor()
        .or_else(|| event_loop.available_monitors().next())?;
    let size = monitor.size();
    debug!(width = size.width, height = size.height, "primary monitor");
    Some((size.width, size.height))
}

/// Window size for software fullscreen: the monitor when known, otherwise
/// the configured fallback.
fn fullscreen_size(monitor: Option<(u32, u32)>, fallback: (u32, u32)) -> (u32, u32) {
    match monitor {
        Some((width, height)) if width > 0 && height > 0 => (width, height),
        _ => fallback,
    }
}

/// Runs `driver` in a `minifb` window until it terminates or the window closes.
pub(crate) fn run<G: GlyphProvider>(config: &RendererConfig, mut driver: FrameDriver<G>) -> Result<()> {
    let (width, height, options) = match config.window {
        WindowMode::Fullscreen => {
            let (width, height) = fullscreen_size(primary_monitor_size(), config.fallback_size);
            (
                width,
                height,
                WindowOptions {
                    borderless: true,
                    topmost: true,
                    resize: true,
                    ..WindowOptions::default()
                },
            )
        }
        WindowMode::Windowed { width, height } => (
            width,
            height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        ),
    };

    let mut window = Window::new(&config.title, width as usize, height as usize, options)
        .map_err(|err| InitError::Window(err.to_string()))?;
    let interval = config.software_frame_interval();
    window.limit_update_rate(Some(interval));
    window.set_cursor_visibility(false);
    info!(width, height, ?interval, "software window ready");

    let mut presenter = SoftwarePresenter::new(width as usize, height as usize);
    let mut clock = SystemTimeSource::new();

    while window.is_open() {
        if window.is_key_down(Key::Escape) && driver.handle_exit(ExitTrigger::Escape) {
            break;
        }
        if kill_switch_down(&window) && driver.handle_exit(ExitTrigger::KillSwitch) {
            break;
        }

        let (current_width, current_height) = window.get_size();
        if current_width == 0 || current_height == 0 {
            window.update();
            continue;
        }
        presenter.resize(current_width, current_height);

        let sample = clock.sample();
        match driver.tick(&mut presenter, sample.elapsed) {
            Ok(Some(report)) if report.text_rebuilt => {
                debug!(percent = report.percent, "status text changed");
            }
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(never) => match never {},
        }

        let canvas = presenter.canvas();
        window
            .update_with_buffer(canvas.pixels(), canvas.width(), canvas.height())
            .map_err(|err| anyhow!("failed to present software frame: {err}"))?;
    }

    // minifb offers no veto on window manager close requests.
    driver.request_close();
    info!(frames = presenter.presented(), "software window closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const BLUE: u32 = 0x005A9E;

    #[test]
    fn fullscreen_covers_the_monitor_when_known() {
        assert_eq!(fullscreen_size(Some((2560, 1440)), (800, 600)), (2560, 1440));
    }

    #[test]
    fn fullscreen_falls_back_without_a_usable_monitor() {
        assert_eq!(fullscreen_size(None, (800, 600)), (800, 600));
        assert_eq!(fullscreen_size(Some((0, 1080)), (800, 600)), (800, 600));
        assert_eq!(fullscreen_size(Some((1920, 0)), (800, 600)), (800, 600));
    }

    #[test]
    fn fill_uses_update_blue() {
        let mut canvas = Canvas::new(4, 3);
        canvas.fill(Color::UPDATE_BLUE);
        assert!(canvas.pixels().iter().all(|pixel| *pixel == BLUE));
    }

    #[test]
    fn circle_is_solid_in_centre_and_soft_on_rim() {
        let mut canvas = Canvas::new(20, 20);
        canvas.fill(Color::UPDATE_BLUE);
        canvas.fill_circle(10.0, 10.0, 4.0, Color::WHITE);
        assert_eq!(canvas.pixel(10, 10), Some(0xFFFFFF));
        assert_eq!(canvas.pixel(0, 0), Some(BLUE));
        // Pixel centre (13.5, 10.5) sits ~3.54 from the centre: partially covered.
        let rim = canvas.pixel(13, 10).expect("in bounds");
        assert_ne!(rim, BLUE);
        assert_ne!(rim, 0xFFFFFF);
    }

    #[test]
    fn circles_are_clipped_at_edges() {
        let mut canvas = Canvas::new(8, 8);
        canvas.fill_circle(-2.0, 7.5, 5.0, Color::WHITE);
        canvas.fill_circle(100.0, 100.0, 5.0, Color::WHITE);
        assert_eq!(canvas.pixel(0, 7), Some(0xFFFFFF));
    }

    #[test]
    fn blit_respects_alpha_and_bounds() {
        let mut canvas = Canvas::new(4, 4);
        canvas.fill(Color::rgb(0.0, 0.0, 0.0));
        let mut image = RgbaImage::new(3, 1);
        image.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        image.put_pixel(1, 0, Rgba([255, 255, 255, 0]));
        image.put_pixel(2, 0, Rgba([255, 0, 0, 255]));
        canvas.blit(&image, 2, 1);
        assert_eq!(canvas.pixel(2, 1), Some(0xFFFFFF));
        assert_eq!(canvas.pixel(3, 1), Some(0x000000));
        canvas.blit(&image, -1, -1);
        assert_eq!(canvas.pixel(0, 0), Some(0x000000));
    }

    #[test]
    fn half_alpha_blends_halfway() {
        let mixed = blend(0x000000, Color::WHITE, 0.5);
        assert_eq!(mixed, 0x808080);
    }

    #[test]
    fn presenter_follows_resizes() {
        let mut presenter = SoftwarePresenter::new(10, 10);
        presenter.resize(30, 20);
        assert_eq!(presenter.viewport(), Viewport::new(30, 20));
        assert_eq!(presenter.canvas().pixels().len(), 600);
    }

    #[test]
    fn rgb_export_unpacks_channels() {
        let mut canvas = Canvas::new(1, 1);
        canvas.fill(Color::UPDATE_BLUE);
        let image = canvas.to_rgb_image();
        assert_eq!(image.get_pixel(0, 0).0, [0x00, 0x5A, 0x9E]);
    }
}
