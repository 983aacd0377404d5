use bytemuck::{Pod, Zeroable};

use crate::present::Color;

/// Mirrors the `Scene` std140 block declared in every shader stage.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct SceneUniforms {
    /// Viewport width and height in pixels; `zw` unused.
    pub viewport: [f32; 4],
    pub dot_color: [f32; 4],
    /// Text quad as `x, y, width, height` in pixels.
    pub text_rect: [f32; 4],
}

impl SceneUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: [width.max(1) as f32, height.max(1) as f32, 0.0, 0.0],
            dot_color: Color::WHITE.to_array(),
            text_rect: [0.0; 4],
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport[0] = width.max(1) as f32;
        self.viewport[1] = height.max(1) as f32;
    }

    pub fn set_dot_color(&mut self, color: Color) {
        self.dot_color = color.to_array();
    }

    pub fn set_text_rect(&mut self, origin: (f32, f32), size: (u32, u32)) {
        self.text_rect = [origin.0, origin.1, size.0 as f32, size.1 as f32];
    }
}
