use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use screenconfig::{parse_antialias, AntialiasSetting, BackendKind};

#[derive(Parser, Debug)]
#[command(
    name = "fakeupdate",
    author,
    version,
    about = "Full-screen fake system update screen",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Configuration file; defaults to `fakeupdate.toml` in the config directory.
    #[arg(long, value_name = "FILE", env = "FAKEUPDATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Presentation backend: `gpu` (wgpu) or `software` (CPU framebuffer).
    #[arg(long, value_name = "BACKEND", value_parser = parse_backend)]
    pub backend: Option<BackendKind>,

    /// Open a regular window instead of covering the screen.
    #[arg(long)]
    pub windowed: bool,

    /// Window size for windowed mode and snapshots (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<Size>,

    /// TrueType/OpenType font used for the status text.
    #[arg(long, value_name = "PATH")]
    pub font: Option<PathBuf>,

    /// First status line (defaults to "Working on updates").
    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,

    /// Ignore close requests and Escape; only Ctrl+Shift+Q exits.
    #[arg(long)]
    pub kiosk: bool,

    /// Optional FPS cap (0=uncapped, vsync only).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Anti-aliasing policy: `auto`, `off`, or an explicit MSAA sample count (e.g. `4`).
    #[arg(long, value_name = "MODE", value_parser = parse_antialias)]
    pub antialias: Option<AntialiasSetting>,

    /// Progress source: `fixed:N`, `timer:DURATION`, `orbit`, or `stdin`.
    #[arg(long, value_name = "SOURCE", value_parser = parse_progress)]
    pub progress: Option<ProgressSpec>,

    /// Render one frame headlessly to the provided PNG path then exit.
    #[arg(long, value_name = "PATH")]
    pub snapshot: Option<PathBuf>,

    /// Motion ticks to advance before the snapshot is captured.
    #[arg(long, value_name = "TICKS", default_value_t = 90)]
    pub snapshot_ticks: u32,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print resolved config, share and font directories.
    Where,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSpec {
    Fixed(u8),
    Timer(Duration),
    Orbit,
    Stdin,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_backend(value: &str) -> Result<BackendKind, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "gpu" | "wgpu" => Ok(BackendKind::Gpu),
        "software" | "cpu" | "minifb" => Ok(BackendKind::Software),
        other => Err(format!(
            "unknown backend '{other}'; expected gpu or software"
        )),
    }
}

pub fn parse_size(value: &str) -> Result<Size, String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{}'", w.trim()))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{}'", h.trim()))?;
    if width == 0 || height == 0 {
        return Err("size must be greater than zero".into());
    }
    Ok(Size { width, height })
}

pub fn parse_progress(value: &str) -> Result<ProgressSpec, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("progress source must not be empty".into());
    }

    let (mode, rest) = match trimmed.split_once([':', '=']) {
        Some((mode, rest)) => (mode.trim().to_ascii_lowercase(), Some(rest.trim())),
        None => (trimmed.to_ascii_lowercase(), None),
    };

    match (mode.as_str(), rest) {
        ("fixed", Some(rest)) => {
            let percent = rest
                .trim_end_matches('%')
                .parse::<u8>()
                .map_err(|_| format!("invalid percentage '{rest}'"))?;
            if percent > 100 {
                return Err(format!("percentage must be at most 100, got {percent}"));
            }
            Ok(ProgressSpec::Fixed(percent))
        }
        ("fixed", None) => Ok(ProgressSpec::Fixed(0)),
        ("timer", Some(rest)) => {
            let duration = humantime::parse_duration(rest)
                .map_err(|err| format!("invalid timer duration '{rest}': {err}"))?;
            if duration.is_zero() {
                return Err("timer duration must be greater than zero".into());
            }
            Ok(ProgressSpec::Timer(duration))
        }
        ("timer", None) => Err("timer requires a duration (e.g. timer:20m)".into()),
        ("orbit", None) => Ok(ProgressSpec::Orbit),
        ("stdin", None) => Ok(ProgressSpec::Stdin),
        (other, _) => Err(format!(
            "unknown progress source '{other}'; expected fixed:N, timer:DURATION, orbit, or stdin"
        )),
    }
}
