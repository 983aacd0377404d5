use std::fs;
use std::path::{Path, PathBuf};

use fontdue::{Font, FontSettings, LineMetrics};
use image::{Rgba, RgbaImage};

/// Errors raised while loading a font face.
#[derive(Debug, thiserror::Error)]
pub enum GlyphError {
    #[error("failed to read font at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse font data: {0}")]
    Parse(String),
    #[error("font pixel size must be positive, got {0}")]
    InvalidSize(f32),
}

/// Source of glyph metrics and coverage bitmaps.
///
/// The compositor only ever measures and draws whole lines, so this is all a
/// backend needs to provide.
pub trait GlyphProvider {
    /// Em size in pixels the provider rasterizes at.
    fn pixel_size(&self) -> f32;

    /// Distance from the baseline to the top of the tallest glyph.
    fn ascent(&self) -> f32;

    /// Distance from the baseline to the bottom of the lowest glyph (positive).
    fn descent(&self) -> f32;

    /// Horizontal advance of `text` in pixels.
    fn measure(&self, text: &str) -> f32;

    /// Draws `text` with its pen starting at `x` on the given `baseline`.
    fn draw(&self, canvas: &mut RgbaImage, text: &str, x: f32, baseline: f32, color: Rgba<u8>);

    /// Rasterizes `text` onto a transparent surface sized to the text.
    fn rasterize(&self, text: &str, color: Rgba<u8>) -> RgbaImage {
        let width = self.measure(text).ceil().max(1.0) as u32;
        let ascent = self.ascent().ceil();
        let height = (ascent + self.descent().ceil()).max(1.0) as u32;
        let mut canvas = RgbaImage::new(width, height);
        self.draw(&mut canvas, text, 0.0, ascent, color);
        canvas
    }
}

/// [`GlyphProvider`] backed by a `fontdue` face.
pub struct FontdueGlyphs {
    font: Font,
    pixel_size: f32,
    line: Option<LineMetrics>,
}

impl FontdueGlyphs {
    /// Loads a TrueType/OpenType face from disk.
    pub fn open(path: &Path, pixel_size: f32) -> Result<Self, GlyphError> {
        let bytes = fs::read(path).map_err(|source| GlyphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let glyphs = Self::from_bytes(&bytes, pixel_size)?;
        tracing::debug!(path = %path.display(), pixel_size, "loaded font face");
        Ok(glyphs)
    }

    pub fn from_bytes(bytes: &[u8], pixel_size: f32) -> Result<Self, GlyphError> {
        if !(pixel_size.is_finite() && pixel_size > 0.0) {
            return Err(GlyphError::InvalidSize(pixel_size));
        }
        let settings = FontSettings {
            scale: pixel_size,
            ..FontSettings::default()
        };
        let font =
            Font::from_bytes(bytes, settings).map_err(|err| GlyphError::Parse(err.to_string()))?;
        let line = font.horizontal_line_metrics(pixel_size);
        Ok(Self {
            font,
            pixel_size,
            line,
        })
    }
}

impl GlyphProvider for FontdueGlyphs {
    fn pixel_size(&self) -> f32 {
        self.pixel_size
    }

    fn ascent(&self) -> f32 {
        self.line
            .map(|line| line.ascent)
            .unwrap_or(self.pixel_size * 0.8)
    }

    fn descent(&self) -> f32 {
        self.line
            .map(|line| -line.descent)
            .unwrap_or(self.pixel_size * 0.2)
    }

    fn measure(&self, text: &str) -> f32 {
        let mut width = 0.0;
        let mut previous = None;
        for ch in text.chars() {
            if let Some(prev) = previous {
                width += self
                    .font
                    .horizontal_kern(prev, ch, self.pixel_size)
                    .unwrap_or(0.0);
            }
            width += self.font.metrics(ch, self.pixel_size).advance_width;
            previous = Some(ch);
        }
        width
    }

    fn draw(&self, canvas: &mut RgbaImage, text: &str, x: f32, baseline: f32, color: Rgba<u8>) {
        let mut pen = x;
        let mut previous = None;
        for ch in text.chars() {
            if let Some(prev) = previous {
                pen += self
                    .font
                    .horizontal_kern(prev, ch, self.pixel_size)
                    .unwrap_or(0.0);
            }
            let (metrics, coverage) = self.font.rasterize(ch, self.pixel_size);
            let left = pen.round() as i32 + metrics.xmin;
            let top = baseline.round() as i32 - metrics.height as i32 - metrics.ymin;
            for row in 0..metrics.height {
                for col in 0..metrics.width {
                    let value = coverage[row * metrics.width + col];
                    if value == 0 {
                        continue;
                    }
                    let px = left + col as i32;
                    let py = top + row as i32;
                    if px < 0 || py < 0 {
                        continue;
                    }
                    let (px, py) = (px as u32, py as u32);
                    if px >= canvas.width() || py >= canvas.height() {
                        continue;
                    }
                    blend_coverage(canvas.get_pixel_mut(px, py), color, value);
                }
            }
            pen += metrics.advance_width;
            previous = Some(ch);
        }
    }
}

/// Composites `color` scaled by `coverage` over `dst` (straight alpha).
pub fn blend_coverage(dst: &mut Rgba<u8>, color: Rgba<u8>, coverage: u8) {
    let src_a = f32::from(coverage) / 255.0 * f32::from(color[3]) / 255.0;
    if src_a <= 0.0 {
        return;
    }
    let dst_a = f32::from(dst[3]) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    for channel in 0..3 {
        let src = f32::from(color[channel]);
        let prev = f32::from(dst[channel]);
        let value = (src * src_a + prev * dst_a * (1.0 - src_a)) / out_a;
        dst[channel] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_font_data() {
        let err = FontdueGlyphs::from_bytes(b"definitely not a font", 24.0)
            .err()
            .expect("garbage should not parse");
        assert!(matches!(err, GlyphError::Parse(_)));
    }

    #[test]
    fn reports_missing_font_file() {
        let err = FontdueGlyphs::open(Path::new("/nonexistent/fakeupdate/font.ttf"), 24.0)
            .err()
            .expect("missing file");
        match err {
            GlyphError::Io { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/fakeupdate/font.ttf"))
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_non_positive_sizes() {
        let err = FontdueGlyphs::from_bytes(&[], 0.0).err().expect("size");
        assert!(matches!(err, GlyphError::InvalidSize(_)));
    }

    #[test]
    fn full_coverage_over_transparent_yields_source_color() {
        let mut pixel = Rgba([0, 0, 0, 0]);
        blend_coverage(&mut pixel, Rgba([255, 255, 255, 255]), 255);
        assert_eq!(pixel, Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn partial_coverage_keeps_color_and_scales_alpha() {
        let mut pixel = Rgba([0, 0, 0, 0]);
        blend_coverage(&mut pixel, Rgba([255, 255, 255, 255]), 128);
        assert_eq!(pixel, Rgba([255, 255, 255, 128]));
    }
}
