use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{bail, Context, Result};
use compositor::{FontdueGlyphs, TextCompositor, TextLayout, TextStyle, DEFAULT_TITLE};
use crossbeam_channel::Sender;
use motion::{DotField, FixedStep, MotionParams};
use renderer::{
    parse_progress_line, write_snapshot, Antialiasing, Backend, ChannelProgress, FixedProgress,
    FrameDriver, OrbitProgress, ProgressFeed, Renderer, RendererConfig, SnapshotRequest,
    TimedProgress, WindowMode,
};
use screenconfig::{
    AntialiasSetting, BackendKind, MotionSection, ProgressSection, ProgressSourceKind,
    ScreenConfig, TextLayoutKind, TextSection,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{ProgressSpec, RunArgs};
use crate::paths::AppPaths;

const WINDOW_TITLE: &str = "fakeupdate";
const FONT_EXTENSIONS: [&str; 2] = ["ttf", "otf"];
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/google-noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub fn initialise_tracing() {
    let default_filter =
        "info,naga=error,wgpu=error,wgpu_core=error,wgpu_hal=error,winit=error";
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    debug!(
        config = %paths.config_dir().display(),
        share = %paths.share_dir().display(),
        "resolved fakeupdate paths"
    );

    let LoadedConfig {
        mut config,
        base_dir,
    } = load_config(args.config.as_deref(), &paths)?;
    apply_overrides(&mut config, &args);
    config
        .validate()
        .context("command line overrides produced an invalid configuration")?;

    // Fonts load before any window exists so a bad font never flashes a screen.
    let font_path = resolve_font(
        args.font.as_deref(),
        &config.text,
        base_dir.as_deref(),
        &paths,
    )?;
    let style = text_style(&config.text);
    let glyphs = FontdueGlyphs::open(&font_path, style.pixel_size())
        .with_context(|| format!("failed to load font {}", font_path.display()))?;
    info!(font = %font_path.display(), pixel_size = style.pixel_size(), "loaded font");

    let compositor = TextCompositor::new(glyphs, style, text_layout(&config.text));
    let field = DotField::new(motion_params(&config.motion));
    let step = FixedStep::new(config.motion.tick_rate);
    let interval = step.interval();
    let feed = build_feed(&config.progress)?;
    let title = config
        .text
        .title
        .clone()
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let mut driver = FrameDriver::new(field, step, compositor, feed, title);

    if let Some(path) = args.snapshot.clone() {
        let request = SnapshotRequest {
            path,
            width: config.window.width,
            height: config.window.height,
            ticks: args.snapshot_ticks,
        };
        let written = write_snapshot(&mut driver, interval, &request)?;
        info!(
            path = %written.display(),
            ticks = request.ticks,
            percent = driver.progress(),
            "wrote snapshot"
        );
        return Ok(());
    }

    Renderer::new(renderer_config(&config)).run(driver)
}

struct LoadedConfig {
    config: ScreenConfig,
    /// Directory relative paths inside the file are resolved against.
    base_dir: Option<PathBuf>,
}

fn load_config(explicit: Option<&Path>, paths: &AppPaths) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = paths.config_file();
            if !default.is_file() {
                debug!(path = %default.display(), "no config file; using defaults");
                return Ok(LoadedConfig {
                    config: ScreenConfig::default(),
                    base_dir: None,
                });
            }
            default
        }
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = ScreenConfig::from_toml_str(&raw)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    info!(path = %path.display(), "loaded config");
    Ok(LoadedConfig {
        config,
        base_dir: path.parent().map(Path::to_path_buf),
    })
}

/// Folds command line flags over the file configuration.
fn apply_overrides(config: &mut ScreenConfig, args: &RunArgs) {
    let window = &mut config.window;
    if let Some(backend) = args.backend {
        window.backend = backend;
    }
    if args.windowed {
        window.fullscreen = false;
    }
    if let Some(size) = args.size {
        window.width = size.width;
        window.height = size.height;
    }
    if args.kiosk {
        window.kiosk = true;
    }
    if let Some(fps) = args.fps {
        window.fps = Some(fps);
    }
    if let Some(antialias) = args.antialias {
        window.antialias = Some(antialias);
    }

    if let Some(title) = &args.title {
        config.text.title = Some(title.clone());
    }

    let progress = &mut config.progress;
    match args.progress {
        Some(ProgressSpec::Fixed(value)) => {
            progress.source = ProgressSourceKind::Fixed;
            progress.value = value;
        }
        Some(ProgressSpec::Timer(duration)) => {
            progress.source = ProgressSourceKind::Timer;
            progress.duration = Some(duration);
        }
        Some(ProgressSpec::Orbit) => progress.source = ProgressSourceKind::Orbit,
        Some(ProgressSpec::Stdin) => progress.source = ProgressSourceKind::Stdin,
        None => {}
    }
}

/// Resolution order: command line, config file, bundled fonts, system fonts.
fn resolve_font(
    explicit: Option<&Path>,
    text: &TextSection,
    base_dir: Option<&Path>,
    paths: &AppPaths,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = &text.font {
        return Ok(match base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.clone(),
        });
    }

    let roots = paths.font_roots();
    if let Some(found) = roots.iter().find_map(|root| first_font_in(root)) {
        return Ok(found);
    }
    if let Some(found) = SYSTEM_FONTS
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.is_file())
    {
        return Ok(found);
    }

    let searched = roots
        .iter()
        .map(|root| root.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    bail!("no font found; pass --font or place a .ttf under one of: {searched}")
}

/// First font file in `dir`, by file name.
fn first_font_in(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut fonts: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file() && has_font_extension(path))
        .collect();
    fonts.sort();
    fonts.into_iter().next()
}

fn has_font_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            FONT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn text_style(text: &TextSection) -> TextStyle {
    TextStyle {
        point_size: text.point_size,
        dpi: text.dpi,
        line_spacing: text.line_spacing,
        ..TextStyle::default()
    }
}

fn text_layout(text: &TextSection) -> TextLayout {
    match text.layout {
        TextLayoutKind::Fit => TextLayout::Fit,
        TextLayoutKind::Canvas => TextLayout::Canvas {
            width: text.canvas_width,
            height: text.canvas_height,
        },
    }
}

fn motion_params(section: &MotionSection) -> MotionParams {
    MotionParams {
        dots: section.dots,
        distance: section.distance,
        fast_speed: section.fast_speed,
        slow_speed: section.slow_speed,
        threshold: section.threshold,
        radius_divisor: section.radius_divisor,
        offset_divisor: section.offset_divisor,
        dot_divisor: section.dot_divisor,
    }
}

fn build_feed(progress: &ProgressSection) -> Result<Box<dyn ProgressFeed>> {
    let feed: Box<dyn ProgressFeed> = match progress.source {
        ProgressSourceKind::Fixed => Box::new(FixedProgress(progress.value)),
        ProgressSourceKind::Timer => Box::new(TimedProgress::new(progress.timer_duration())),
        ProgressSourceKind::Orbit => Box::new(OrbitProgress),
        ProgressSourceKind::Stdin => {
            let (sender, receiver) = crossbeam_channel::unbounded();
            spawn_stdin_reader(sender)?;
            Box::new(ChannelProgress::new(receiver))
        }
    };
    debug!(source = ?progress.source, "progress feed ready");
    Ok(feed)
}

fn spawn_stdin_reader(sender: Sender<u8>) -> Result<()> {
    thread::Builder::new()
        .name("progress-stdin".into())
        .spawn(move || forward_progress_lines(io::stdin().lock(), &sender))
        .context("failed to spawn stdin progress reader")?;
    Ok(())
}

/// Sends every parseable percentage line to `sender` until the input ends,
/// a read fails, or the receiving feed is gone.
fn forward_progress_lines<R: BufRead>(reader: R, sender: &Sender<u8>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "stopped reading progress from stdin");
                break;
            }
        };
        match parse_progress_line(&line) {
            Some(value) => {
                if sender.send(value).is_err() {
                    break;
                }
            }
            None if line.trim().is_empty() => {}
            None => debug!(line = %line.trim(), "ignoring malformed progress line"),
        }
    }
}

fn renderer_config(config: &ScreenConfig) -> RendererConfig {
    let window = &config.window;
    RendererConfig {
        backend: match window.backend {
            BackendKind::Gpu => Backend::Gpu,
            BackendKind::Software => Backend::Software,
        },
        window: if window.fullscreen {
            WindowMode::Fullscreen
        } else {
            WindowMode::Windowed {
                width: window.width,
                height: window.height,
            }
        },
        fallback_size: (window.width, window.height),
        title: WINDOW_TITLE.to_string(),
        kiosk: window.kiosk,
        target_fps: window.fps.filter(|fps| *fps > 0.0),
        antialiasing: antialiasing(window.antialias),
        ..RendererConfig::default()
    }
}

fn antialiasing(setting: Option<AntialiasSetting>) -> Antialiasing {
    match setting {
        None | Some(AntialiasSetting::Auto) => Antialiasing::Auto,
        Some(AntialiasSetting::Off) => Antialiasing::Off,
        Some(other) => other
            .samples()
            .map(Antialiasing::Samples)
            .unwrap_or(Antialiasing::Auto),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Size;
    use std::time::Duration;
    use tempfile::TempDir;

    fn paths_in(root: &Path) -> AppPaths {
        AppPaths::for_roots(root.join("config"), root.join("share"))
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = ScreenConfig::default();
        let args = RunArgs {
            backend: Some(BackendKind::Software),
            windowed: true,
            size: Some(Size {
                width: 640,
                height: 480,
            }),
            kiosk: true,
            fps: Some(30.0),
            antialias: Some(AntialiasSetting::Off),
            title: Some("Installing".into()),
            progress: Some(ProgressSpec::Timer(Duration::from_secs(60))),
            ..RunArgs::default()
        };

        apply_overrides(&mut config, &args);
        config.validate().unwrap();

        assert_eq!(config.window.backend, BackendKind::Software);
        assert!(!config.window.fullscreen);
        assert_eq!((config.window.width, config.window.height), (640, 480));
        assert!(config.window.kiosk);
        assert_eq!(config.text.title.as_deref(), Some("Installing"));
        assert_eq!(config.progress.source, ProgressSourceKind::Timer);
        assert_eq!(config.progress.timer_duration(), Duration::from_secs(60));

        let renderer = renderer_config(&config);
        assert_eq!(renderer.backend, Backend::Software);
        assert_eq!(
            renderer.window,
            WindowMode::Windowed {
                width: 640,
                height: 480
            }
        );
        assert_eq!(renderer.target_fps, Some(30.0));
        assert_eq!(renderer.antialiasing, Antialiasing::Off);
        assert!(renderer.kiosk);
    }

    #[test]
    fn defaults_map_to_fullscreen_gpu() {
        let renderer = renderer_config(&ScreenConfig::default());
        assert_eq!(renderer.backend, Backend::Gpu);
        assert_eq!(renderer.window, WindowMode::Fullscreen);
        assert_eq!(renderer.target_fps, None);
        assert_eq!(renderer.antialiasing, Antialiasing::Auto);
        assert!(!renderer.kiosk);
        assert_eq!(renderer.title, "fakeupdate");
    }

    #[test]
    fn antialias_settings_map_to_sample_counts() {
        assert_eq!(
            antialiasing(Some(AntialiasSetting::Samples8)),
            Antialiasing::Samples(8)
        );
        assert_eq!(antialiasing(None), Antialiasing::Auto);
    }

    #[test]
    fn missing_default_config_falls_back_to_defaults() {
        let root = TempDir::new().unwrap();
        let loaded = load_config(None, &paths_in(root.path())).unwrap();
        assert!(loaded.base_dir.is_none());
        assert_eq!(loaded.config.motion.dots, 5);
    }

    #[test]
    fn explicit_config_must_exist() {
        let root = TempDir::new().unwrap();
        let missing = root.path().join("absent.toml");
        assert!(load_config(Some(&missing), &paths_in(root.path())).is_err());
    }

    #[test]
    fn default_config_file_is_read_and_validated() {
        let root = TempDir::new().unwrap();
        let paths = paths_in(root.path());
        fs::create_dir_all(paths.config_dir()).unwrap();
        fs::write(
            paths.config_file(),
            "version = 1\n[text]\nfont = \"fonts/Custom.ttf\"\n",
        )
        .unwrap();

        let loaded = load_config(None, &paths).unwrap();
        assert_eq!(loaded.base_dir.as_deref(), Some(paths.config_dir()));

        let font = resolve_font(
            None,
            &loaded.config.text,
            loaded.base_dir.as_deref(),
            &paths,
        )
        .unwrap();
        assert_eq!(font, paths.config_dir().join("fonts/Custom.ttf"));

        fs::write(paths.config_file(), "version = 2\n").unwrap();
        assert!(load_config(None, &paths).is_err());
    }

    #[test]
    fn command_line_font_wins() {
        let root = TempDir::new().unwrap();
        let text = TextSection {
            font: Some(PathBuf::from("/from/config.ttf")),
            ..TextSection::default()
        };
        let font = resolve_font(
            Some(Path::new("/from/cli.ttf")),
            &text,
            None,
            &paths_in(root.path()),
        )
        .unwrap();
        assert_eq!(font, PathBuf::from("/from/cli.ttf"));
    }

    #[test]
    fn bundled_fonts_are_found_by_name_order() {
        let root = TempDir::new().unwrap();
        let paths = paths_in(root.path());
        let fonts = paths.share_dir().join("fonts");
        fs::create_dir_all(&fonts).unwrap();
        fs::write(fonts.join("README.txt"), "not a font").unwrap();
        fs::write(fonts.join("Zeta.ttf"), b"z").unwrap();
        fs::write(fonts.join("Alpha.OTF"), b"a").unwrap();

        let font = resolve_font(None, &TextSection::default(), None, &paths).unwrap();
        assert_eq!(font, fonts.join("Alpha.OTF"));
    }

    #[test]
    fn progress_lines_are_forwarded_until_input_ends() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        forward_progress_lines(io::Cursor::new("12\noops\n\n 40% \n"), &sender);
        assert_eq!(receiver.try_iter().collect::<Vec<_>>(), vec![12, 40]);
    }

    #[test]
    fn forwarding_stops_once_the_feed_is_dropped() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        drop(receiver);
        forward_progress_lines(io::Cursor::new("10\n20\n"), &sender);
    }

    #[test]
    fn motion_section_divisors_reach_motion_params() {
        let section = MotionSection {
            radius_divisor: 20.0,
            offset_divisor: 10.0,
            dot_divisor: 100.0,
            ..MotionSection::default()
        };
        let params = motion_params(&section);
        assert_eq!(params.radius_divisor, 20.0);
        assert_eq!(params.offset_divisor, 10.0);
        assert_eq!(params.dot_divisor, 100.0);
        assert_eq!(params.dots, 5);
    }

    #[test]
    fn stdin_lines_reach_the_channel_feed() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        forward_progress_lines(io::Cursor::new("12\noops\n40%\n"), &sender);
        let mut feed = ChannelProgress::new(receiver);
        let sample = renderer::FeedSample {
            seconds: 0.0,
            lead_phase: 0.0,
        };
        assert_eq!(feed.poll(&sample), Some(40));
        assert_eq!(feed.poll(&sample), None);
    }
}
