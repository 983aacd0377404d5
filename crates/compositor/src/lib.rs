//! Status text compositing.
//!
//! Lines of text are laid out onto an RGBA surface that a presenter can upload
//! as a texture or blit directly. Re-rasterizing is only worth doing when the
//! text changes, so [`TextCompositor`] keeps the last lines it drew and hands
//! back the cached surface until they differ.

mod glyphs;

use image::{Rgba, RgbaImage};

pub use glyphs::{blend_coverage, FontdueGlyphs, GlyphError, GlyphProvider};

/// Title shown above the percentage line.
pub const DEFAULT_TITLE: &str = "Working on updates";

/// Padding around a fitted surface so anti-aliased edges are not clipped.
const FIT_PADDING: u32 = 2;
/// Top margin used by the fixed canvas layout.
const CANVAS_TOP_MARGIN: f32 = 10.0;

/// Builds the two status lines for a percentage value.
pub fn status_lines(title: &str, percent: u8) -> [String; 2] {
    [title.to_string(), format!("{percent}% complete.")]
}

/// Font sizing and colour for the status text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub point_size: f32,
    pub dpi: f32,
    pub line_spacing: f32,
    pub color: Rgba<u8>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            point_size: 18.0,
            dpi: 96.0,
            line_spacing: 1.5,
            color: Rgba([255, 255, 255, 255]),
        }
    }
}

impl TextStyle {
    /// Em size in pixels at the configured DPI.
    pub fn pixel_size(&self) -> f32 {
        self.point_size * self.dpi / 72.0
    }

    /// Distance between consecutive baselines.
    pub fn line_height(&self) -> f32 {
        (self.point_size * self.line_spacing * self.dpi / 72.0).ceil()
    }
}

/// How lines are placed on the output surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextLayout {
    /// Surface sized to the text; the caller centres it by half its size.
    #[default]
    Fit,
    /// Fixed canvas with every line centred horizontally inside it.
    Canvas { width: u32, height: u32 },
}

/// Rasterized status text.
#[derive(Debug, Clone)]
pub struct TextSurface {
    pixels: RgbaImage,
}

impl TextSurface {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Tightly packed RGBA8 rows.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }
}

/// Lays out `lines` with `glyphs` according to `style` and `layout`.
pub fn compose<G, S>(glyphs: &G, style: &TextStyle, layout: TextLayout, lines: &[S]) -> TextSurface
where
    G: GlyphProvider + ?Sized,
    S: AsRef<str>,
{
    let line_height = style.line_height();
    let widths: Vec<f32> = lines
        .iter()
        .map(|line| glyphs.measure(line.as_ref()))
        .collect();

    let (width, height, first_baseline) = match layout {
        TextLayout::Fit => {
            let widest = widths.iter().copied().fold(0.0_f32, f32::max);
            let ascent = glyphs.ascent().ceil();
            let stacked = line_height * lines.len().saturating_sub(1) as f32;
            let extent = ascent + glyphs.descent().ceil() + stacked;
            (
                widest.ceil() as u32 + FIT_PADDING * 2,
                extent.max(1.0) as u32 + FIT_PADDING * 2,
                FIT_PADDING as f32 + ascent,
            )
        }
        TextLayout::Canvas { width, height } => (
            width,
            height,
            CANVAS_TOP_MARGIN + glyphs.pixel_size().ceil(),
        ),
    };

    let mut pixels = RgbaImage::new(width.max(1), height.max(1));
    let mut baseline = first_baseline;
    for (line, line_width) in lines.iter().zip(&widths) {
        let x = (pixels.width() as f32 - line_width) / 2.0;
        glyphs.draw(&mut pixels, line.as_ref(), x, baseline, style.color);
        baseline += line_height;
    }

    TextSurface { pixels }
}

/// Caches the last composed surface and rebuilds it only when the text changes.
pub struct TextCompositor<G> {
    glyphs: G,
    style: TextStyle,
    layout: TextLayout,
    last_lines: Option<Vec<String>>,
    surface: Option<TextSurface>,
    rasterizations: u64,
}

impl<G: GlyphProvider> TextCompositor<G> {
    pub fn new(glyphs: G, style: TextStyle, layout: TextLayout) -> Self {
        Self {
            glyphs,
            style,
            layout,
            last_lines: None,
            surface: None,
            rasterizations: 0,
        }
    }

    /// Rasterizes `lines` unless they match the last rasterized lines.
    ///
    /// Returns `true` when a new surface was produced.
    pub fn refresh<S: AsRef<str>>(&mut self, lines: &[S]) -> bool {
        let unchanged = self.last_lines.as_ref().is_some_and(|last| {
            last.len() == lines.len()
                && last
                    .iter()
                    .zip(lines)
                    .all(|(previous, line)| previous == line.as_ref())
        });
        if unchanged {
            return false;
        }

        let surface = compose(&self.glyphs, &self.style, self.layout, lines);
        tracing::debug!(
            width = surface.width(),
            height = surface.height(),
            lines = lines.len(),
            "rasterized status text"
        );
        self.surface = Some(surface);
        self.last_lines = Some(lines.iter().map(|line| line.as_ref().to_string()).collect());
        self.rasterizations += 1;
        true
    }

    /// Surface from the most recent rasterization.
    pub fn surface(&self) -> Option<&TextSurface> {
        self.surface.as_ref()
    }

    pub fn rasterizations(&self) -> u64 {
        self.rasterizations
    }

    pub fn style(&self) -> &TextStyle {
        &self.style
    }

    pub fn layout(&self) -> TextLayout {
        self.layout
    }

    pub fn glyphs(&self) -> &G {
        &self.glyphs
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Monospace provider drawing solid blocks, one per non-space character.
    pub struct BlockGlyphs {
        pub size: f32,
    }

    impl GlyphProvider for BlockGlyphs {
        fn pixel_size(&self) -> f32 {
            self.size
        }

        fn ascent(&self) -> f32 {
            self.size * 0.75
        }

        fn descent(&self) -> f32 {
            self.size * 0.25
        }

        fn measure(&self, text: &str) -> f32 {
            text.chars().count() as f32 * self.size * 0.5
        }

        fn draw(
            &self,
            canvas: &mut RgbaImage,
            text: &str,
            x: f32,
            baseline: f32,
            color: Rgba<u8>,
        ) {
            let advance = self.size * 0.5;
            let top = (baseline - self.ascent()).round() as i64;
            for (index, ch) in text.chars().enumerate() {
                if ch == ' ' {
                    continue;
                }
                let left = (x + advance * index as f32).round() as i64;
                for py in top..top + self.ascent() as i64 {
                    for px in left..left + (advance as i64 - 1).max(1) {
                        if px >= 0
                            && py >= 0
                            && (px as u32) < canvas.width()
                            && (py as u32) < canvas.height()
                        {
                            canvas.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::BlockGlyphs;
    use super::*;

    fn compositor(layout: TextLayout) -> TextCompositor<BlockGlyphs> {
        let style = TextStyle {
            point_size: 12.0,
            dpi: 72.0,
            line_spacing: 1.5,
            color: Rgba([255, 255, 255, 255]),
        };
        TextCompositor::new(BlockGlyphs { size: 12.0 }, style, layout)
    }

    #[test]
    fn identical_text_rasterizes_once() {
        let mut compositor = compositor(TextLayout::Fit);
        assert!(compositor.refresh(&["50% complete"]));
        assert!(!compositor.refresh(&["50% complete"]));
        assert_eq!(compositor.rasterizations(), 1);
    }

    #[test]
    fn changed_text_rebuilds_surface() {
        let mut compositor = compositor(TextLayout::Fit);
        compositor.refresh(&status_lines(DEFAULT_TITLE, 1));
        compositor.refresh(&status_lines(DEFAULT_TITLE, 1));
        compositor.refresh(&status_lines(DEFAULT_TITLE, 2));
        compositor.refresh(&status_lines(DEFAULT_TITLE, 1));
        assert_eq!(compositor.rasterizations(), 3);
    }

    #[test]
    fn status_lines_match_reference_wording() {
        let [title, progress] = status_lines(DEFAULT_TITLE, 0);
        assert_eq!(title, "Working on updates");
        assert_eq!(progress, "0% complete.");
    }

    #[test]
    fn style_derives_pixel_and_line_sizes() {
        let style = TextStyle {
            point_size: 8.0,
            dpi: 500.0,
            line_spacing: 1.5,
            ..TextStyle::default()
        };
        assert!((style.pixel_size() - 8.0 * 500.0 / 72.0).abs() < 1e-4);
        assert_eq!(style.line_height(), (8.0_f32 * 1.5 * 500.0 / 72.0).ceil());
    }

    #[test]
    fn fit_layout_sizes_surface_to_widest_line() {
        let mut compositor = compositor(TextLayout::Fit);
        compositor.refresh(&["abcd", "ab"]);
        let surface = compositor.surface().expect("surface");
        // 4 chars * 6px + padding on both sides.
        assert_eq!(surface.width(), 24 + FIT_PADDING * 2);
        // ascent 9 + descent 3 + one line gap of 18 + padding.
        assert_eq!(surface.height(), 9 + 3 + 18 + FIT_PADDING * 2);
    }

    #[test]
    fn lines_are_centred_horizontally() {
        let mut compositor = compositor(TextLayout::Canvas {
            width: 100,
            height: 60,
        });
        compositor.refresh(&["ab"]);
        let surface = compositor.surface().expect("surface");
        assert_eq!((surface.width(), surface.height()), (100, 60));

        let image = surface.image();
        let lit: Vec<u32> = (0..image.width())
            .filter(|x| (0..image.height()).any(|y| image.get_pixel(*x, y)[3] > 0))
            .collect();
        let first = *lit.first().expect("some ink");
        let last = *lit.last().expect("some ink");
        // Text is 12px wide, so it starts at 44 and its last block ends before 56.
        assert_eq!(first, 44);
        assert!(last < 56);
    }

    #[test]
    fn canvas_layout_places_first_baseline_below_margin() {
        let mut compositor = compositor(TextLayout::Canvas {
            width: 64,
            height: 64,
        });
        compositor.refresh(&["a"]);
        let image = compositor.surface().expect("surface").image();
        let top = (0..image.height())
            .find(|y| (0..image.width()).any(|x| image.get_pixel(x, *y)[3] > 0))
            .expect("ink");
        // Baseline at 10 + 12 = 22, block ascent 9.
        assert_eq!(top, 13);
    }
}
