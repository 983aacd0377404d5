use bytemuck::{Pod, Zeroable};
use compositor::TextSurface;
use motion::Viewport;

/// RGBA colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    /// The update screen blue, `#005A9E`.
    pub const UPDATE_BLUE: Color = Color::rgb(0.0, 0.352, 0.619);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Packs into minifb's `0RGB` layout.
    pub fn to_0rgb(self) -> u32 {
        let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }

    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: f64::from(self.r),
            g: f64::from(self.g),
            b: f64::from(self.b),
            a: f64::from(self.a),
        }
    }
}

/// Background and foreground colours of the screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub background: Color,
    pub foreground: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Color::UPDATE_BLUE,
            foreground: Color::WHITE,
        }
    }
}

/// One dot in absolute pixel coordinates, laid out for direct upload as a
/// per-instance vertex.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DotInstance {
    pub center: [f32; 2],
    pub radius: f32,
    pub _padding: f32,
}

impl DotInstance {
    pub fn new(x: f32, y: f32, radius: f32) -> Self {
        Self {
            center: [x, y],
            radius,
            _padding: 0.0,
        }
    }
}

/// Capabilities a backend offers the frame driver.
///
/// Calls arrive once per frame in a fixed order: `clear`, `draw_dots`,
/// optionally `upload_text`, `draw_text`, then `present`.
pub trait Presenter {
    type Error;

    /// Current drawable size in physical pixels.
    fn viewport(&self) -> Viewport;

    fn clear(&mut self, color: Color);

    fn draw_dots(&mut self, dots: &[DotInstance], color: Color);

    /// Replaces the text texture. Only called when the text changed.
    fn upload_text(&mut self, surface: &TextSurface);

    /// Draws the last uploaded text with its top-left corner at `origin`.
    fn draw_text(&mut self, origin: (f32, f32));

    fn present(&mut self) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_blue_packs_to_reference_hex() {
        assert_eq!(Color::UPDATE_BLUE.to_0rgb(), 0x005A9E);
        assert_eq!(Color::WHITE.to_0rgb(), 0xFFFFFF);
    }

    #[test]
    fn dot_instance_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<DotInstance>(), 16);
        let dot = DotInstance::new(3.0, 4.0, 2.5);
        let bytes: &[u8] = bytemuck::bytes_of(&dot);
        assert_eq!(bytes.len(), 16);
    }
}
