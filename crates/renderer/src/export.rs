use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use compositor::GlyphProvider;

use crate::driver::FrameDriver;
use crate::runtime::{SteppedTimeSource, TimeSource};
use crate::software::SoftwarePresenter;

/// Headless still-frame request.
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Motion ticks to run before capturing.
    pub ticks: u32,
}

/// Renders `request.ticks` frames off-screen and writes the last one as PNG.
pub fn write_snapshot<G: GlyphProvider>(
    driver: &mut FrameDriver<G>,
    step: std::time::Duration,
    request: &SnapshotRequest,
) -> Result<PathBuf> {
    ensure_png(&request.path)?;
    if request.width == 0 || request.height == 0 {
        bail!(
            "snapshot size must be non-zero, got {}x{}",
            request.width,
            request.height
        );
    }

    let mut presenter = SoftwarePresenter::new(request.width as usize, request.height as usize);
    let mut clock = SteppedTimeSource::new(step);
    // Frame zero renders the initial state; each following frame adds one tick.
    let mut elapsed = std::time::Duration::ZERO;
    for frame in 0..=request.ticks {
        if frame > 0 {
            elapsed = clock.sample().elapsed;
        }
        match driver.tick(&mut presenter, elapsed) {
            Ok(_) => {}
            Err(never) => match never {},
        }
    }

    let image = presenter.canvas().to_rgb_image();
    if let Some(parent) = request.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    image
        .save_with_format(&request.path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write snapshot {}", request.path.display()))?;
    tracing::info!(
        path = %request.path.display(),
        ticks = request.ticks,
        "snapshot written"
    );
    Ok(request.path.clone())
}

fn ensure_png(path: &Path) -> Result<()> {
    let is_png = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
    if !is_png {
        bail!("snapshot path {} must end in .png", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use compositor::{TextCompositor, TextLayout, TextStyle};
    use image::{Rgba, RgbaImage};
    use motion::{DotField, FixedStep, MotionParams};

    use crate::progress::FixedProgress;

    struct NoGlyphs;

    impl GlyphProvider for NoGlyphs {
        fn pixel_size(&self) -> f32 {
            10.0
        }
        fn ascent(&self) -> f32 {
            8.0
        }
        fn descent(&self) -> f32 {
            2.0
        }
        fn measure(&self, text: &str) -> f32 {
            text.len() as f32 * 5.0
        }
        fn draw(&self, _: &mut RgbaImage, _: &str, _: f32, _: f32, _: Rgba<u8>) {}
    }

    fn driver() -> FrameDriver<NoGlyphs> {
        FrameDriver::new(
            DotField::new(MotionParams::default()),
            FixedStep::new(60.0),
            TextCompositor::new(NoGlyphs, TextStyle::default(), TextLayout::Fit),
            Box::new(FixedProgress(0)),
            "Working on updates",
        )
    }

    #[test]
    fn rejects_non_png_paths() {
        assert!(ensure_png(Path::new("out.jpg")).is_err());
        assert!(ensure_png(Path::new("out")).is_err());
        assert!(ensure_png(Path::new("out.PNG")).is_ok());
    }

    #[test]
    fn writes_png_after_requested_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("frame.png");
        let mut driver = driver();
        let step = FixedStep::new(60.0).interval();
        let request = SnapshotRequest {
            path: path.clone(),
            width: 320,
            height: 240,
            ticks: 3,
        };
        let written = write_snapshot(&mut driver, step, &request).unwrap();
        assert_eq!(written, path);
        assert_eq!(driver.frames(), 4);
        assert!((driver.field().phase(0).unwrap() + 0.18).abs() < 1e-12);

        let image = image::open(&path).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (320, 240));
        assert_eq!(image.get_pixel(0, 0).0, [0x00, 0x5A, 0x9E]);
    }
}
