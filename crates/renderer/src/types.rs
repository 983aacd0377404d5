use std::time::Duration;

use compositor::GlyphError;

/// Presentation backend selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// `winit` window with a `wgpu` swapchain.
    #[default]
    Gpu,
    /// `minifb` window fed a CPU framebuffer.
    Software,
}

/// Anti-aliasing policy for the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the surface format.
    #[default]
    Auto,
    /// Disable MSAA and render directly into the swapchain.
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

/// How the window is placed on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// Borderless fullscreen on the current monitor.
    Fullscreen,
    /// Regular window of the given inner size.
    Windowed { width: u32, height: u32 },
}

impl Default for WindowMode {
    fn default() -> Self {
        Self::Fullscreen
    }
}

/// Immutable configuration passed to the renderer at start-up.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub backend: Backend,
    pub window: WindowMode,
    /// Size used when a backend cannot query the monitor (software fullscreen).
    pub fallback_size: (u32, u32),
    pub title: String,
    /// Ignore close requests and Escape; only the kill switch ends the run.
    pub kiosk: bool,
    /// Optional FPS cap; `None` presents every vsync.
    pub target_fps: Option<f32>,
    pub antialiasing: Antialiasing,
    /// Minimum time between software frames.
    pub software_interval: Duration,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            window: WindowMode::default(),
            fallback_size: (1280, 720),
            title: "fakeupdate".to_string(),
            kiosk: false,
            target_fps: None,
            antialiasing: Antialiasing::default(),
            software_interval: Duration::from_millis(16),
        }
    }
}

impl RendererConfig {
    /// Frame interval for the software loop, honouring the FPS cap when set.
    pub fn software_frame_interval(&self) -> Duration {
        self.target_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .and_then(|fps| Duration::try_from_secs_f32(1.0 / fps).ok())
            .unwrap_or(self.software_interval)
    }
}

/// Failures that abort start-up before the first frame.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("failed to create window: {0}")]
    Window(String),
    #[error("failed to create rendering surface: {0}")]
    Surface(String),
    #[error("no suitable GPU adapter: {0}")]
    Adapter(String),
    #[error("failed to create GPU device: {0}")]
    Device(String),
    #[error("failed to compile {label} shader: {log}\n{code}")]
    Shader {
        label: String,
        code: String,
        log: String,
    },
    #[error("failed to create texture: {0}")]
    Texture(String),
    #[error(transparent)]
    Font(#[from] GlyphError),
}
