//! Dot-field motion for the update screen loader.
//!
//! Every dot carries a single phase accumulator. Each tick the phase is
//! decremented by one of two speeds, picked by where the dot currently sits on
//! its orbit, and the on-screen position is derived from the phase with a
//! plain `sin`/`cos` pair:
//!
//! ```text
//!   angle_i = p_i + distance * i
//!   p_i    -= fast_speed   if cos(angle_i) > threshold
//!             slow_speed   otherwise
//!   x_i     = R * sin(angle_i)
//!   y_i     = R * cos(angle_i) - vertical_offset
//! ```
//!
//! `R` and `vertical_offset` are derived from the viewport height on every
//! call, so a resize is picked up on the next frame without touching the
//! phases. Positions are expressed in pixels relative to the viewport centre
//! with y growing downwards.

mod step;

pub use step::FixedStep;

/// Default number of dots in the loader.
pub const DEFAULT_DOTS: usize = 5;

/// Tunables for the dot field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionParams {
    /// Number of dots; fixed for the lifetime of a [`DotField`].
    pub dots: usize,
    /// Angular spacing between consecutive dots (radians).
    pub distance: f64,
    /// Phase decrement applied while `cos(angle) > threshold`.
    pub fast_speed: f64,
    /// Phase decrement applied everywhere else on the orbit.
    pub slow_speed: f64,
    /// Cosine threshold separating the fast and slow arcs.
    pub threshold: f64,
    /// Orbit radius is `height / radius_divisor`.
    pub radius_divisor: f64,
    /// Orbit centre sits `height / offset_divisor` above the viewport centre.
    pub offset_divisor: f64,
    /// Drawn dot radius is `height / dot_divisor`.
    pub dot_divisor: f64,
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            dots: DEFAULT_DOTS,
            distance: 0.55,
            fast_speed: 0.06,
            slow_speed: 0.025,
            threshold: -0.6,
            radius_divisor: 27.0,
            offset_divisor: 15.0,
            dot_divisor: 200.0,
        }
    }
}

/// Viewport dimensions in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Centre of the viewport in pixel coordinates.
    pub fn center(&self) -> (f32, f32) {
        (self.width as f32 * 0.5, self.height as f32 * 0.5)
    }
}

/// Orbit geometry for one viewport size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitLayout {
    pub radius: f64,
    pub vertical_offset: f64,
    pub dot_radius: f64,
}

const MIN_DOT_RADIUS: f64 = 1.5;

impl OrbitLayout {
    pub fn for_viewport(viewport: Viewport, params: &MotionParams) -> Self {
        let height = f64::from(viewport.height);
        if viewport.height == 0 {
            return Self {
                radius: 0.0,
                vertical_offset: 0.0,
                dot_radius: 0.0,
            };
        }
        Self {
            radius: height / params.radius_divisor,
            vertical_offset: height / params.offset_divisor,
            dot_radius: (height / params.dot_divisor).max(MIN_DOT_RADIUS),
        }
    }
}

/// Screen-space offset of a dot from the viewport centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DotPosition {
    pub x: f64,
    pub y: f64,
}

impl DotPosition {
    /// Absolute pixel coordinates inside `viewport`.
    pub fn to_screen(self, viewport: Viewport) -> (f32, f32) {
        let (cx, cy) = viewport.center();
        (cx + self.x as f32, cy + self.y as f32)
    }
}

/// Phase decrement for a dot currently at `angle`.
pub fn speed_for(angle: f64, params: &MotionParams) -> f64 {
    if angle.cos() > params.threshold {
        params.fast_speed
    } else {
        params.slow_speed
    }
}

/// Position of dot `index` for the given phase and layout.
pub fn dot_position(phase: f64, index: usize, distance: f64, layout: &OrbitLayout) -> DotPosition {
    let angle = phase + distance * index as f64;
    DotPosition {
        x: layout.radius * angle.sin(),
        y: layout.radius * angle.cos() - layout.vertical_offset,
    }
}

/// Fixed-size set of dots and their phase accumulators.
#[derive(Debug, Clone)]
pub struct DotField {
    params: MotionParams,
    phases: Box<[f64]>,
}

impl DotField {
    pub fn new(params: MotionParams) -> Self {
        Self {
            phases: vec![0.0; params.dots].into_boxed_slice(),
            params,
        }
    }

    pub fn params(&self) -> &MotionParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn phases(&self) -> &[f64] {
        &self.phases
    }

    pub fn phase(&self, index: usize) -> Option<f64> {
        self.phases.get(index).copied()
    }

    /// Advances every dot by one step.
    pub fn tick(&mut self) {
        let params = self.params;
        for (index, phase) in self.phases.iter_mut().enumerate() {
            let angle = *phase + params.distance * index as f64;
            *phase -= speed_for(angle, &params);
        }
    }

    pub fn advance(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    pub fn layout(&self, viewport: Viewport) -> OrbitLayout {
        OrbitLayout::for_viewport(viewport, &self.params)
    }

    pub fn positions(&self, viewport: Viewport) -> Vec<DotPosition> {
        let mut out = Vec::with_capacity(self.len());
        self.positions_into(viewport, &mut out);
        out
    }

    /// Same as [`positions`](Self::positions) but reuses `out`.
    pub fn positions_into(&self, viewport: Viewport, out: &mut Vec<DotPosition>) {
        let layout = self.layout(viewport);
        out.clear();
        out.extend(
            self.phases
                .iter()
                .enumerate()
                .map(|(index, phase)| dot_position(*phase, index, self.params.distance, &layout)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_moves_lead_dot_by_fast_speed() {
        let mut field = DotField::new(MotionParams::default());
        assert_eq!(field.phase(0), Some(0.0));
        field.tick();
        assert_eq!(field.phase(0), Some(-0.06));
    }

    #[test]
    fn speed_is_selected_only_by_threshold() {
        let params = MotionParams::default();
        for step in 0..720 {
            let angle = step as f64 * 0.01 - 3.6;
            let speed = speed_for(angle, &params);
            if angle.cos() > params.threshold {
                assert_eq!(speed, 0.06);
            } else {
                assert_eq!(speed, 0.025);
            }
        }
        assert_eq!(speed_for(std::f64::consts::PI, &params), 0.025);
        assert_eq!(speed_for(0.0, &params), 0.06);
    }

    #[test]
    fn phases_strictly_decrease() {
        let mut field = DotField::new(MotionParams::default());
        let mut previous = field.phases().to_vec();
        for _ in 0..500 {
            field.tick();
            for (before, after) in previous.iter().zip(field.phases()) {
                assert!(after < before);
            }
            previous = field.phases().to_vec();
        }
    }

    #[test]
    fn dot_count_is_fixed_by_params() {
        let params = MotionParams {
            dots: 6,
            ..MotionParams::default()
        };
        let mut field = DotField::new(params);
        field.advance(100);
        assert_eq!(field.len(), 6);
        assert_eq!(field.positions(Viewport::new(800, 600)).len(), 6);
    }

    #[test]
    fn positions_are_reproducible() {
        let mut a = DotField::new(MotionParams::default());
        let mut b = DotField::new(MotionParams::default());
        a.advance(321);
        b.advance(321);
        let viewport = Viewport::new(1920, 1080);
        let left = a.positions(viewport);
        let right = b.positions(viewport);
        for (l, r) in left.iter().zip(&right) {
            assert_eq!(l.x.to_bits(), r.x.to_bits());
            assert_eq!(l.y.to_bits(), r.y.to_bits());
        }
    }

    #[test]
    fn initial_positions_follow_formula() {
        let field = DotField::new(MotionParams::default());
        let viewport = Viewport::new(800, 600);
        let positions = field.positions(viewport);
        let radius = 600.0 / 27.0;
        let offset = 600.0 / 15.0;
        assert_eq!(positions[0].x, 0.0);
        assert!((positions[0].y - (radius - offset)).abs() < 1e-12);
        let angle: f64 = 0.55 * 2.0;
        assert!((positions[2].x - radius * angle.sin()).abs() < 1e-12);
        assert!((positions[2].y - (radius * angle.cos() - offset)).abs() < 1e-12);
    }

    #[test]
    fn resize_scales_layout_and_positions() {
        let mut field = DotField::new(MotionParams::default());
        field.advance(42);
        let small = Viewport::new(800, 600);
        let large = Viewport::new(1600, 1200);

        let small_layout = field.layout(small);
        let large_layout = field.layout(large);
        assert!((large_layout.radius - small_layout.radius * 2.0).abs() < 1e-9);
        assert!(
            (large_layout.vertical_offset - small_layout.vertical_offset * 2.0).abs() < 1e-9
        );

        let before = field.positions(small);
        let after = field.positions(large);
        for (s, l) in before.iter().zip(&after) {
            assert!((l.x - s.x * 2.0).abs() < 1e-9);
            assert!((l.y - s.y * 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_height_viewport_collapses_layout() {
        let layout = OrbitLayout::for_viewport(Viewport::new(640, 0), &MotionParams::default());
        assert_eq!(layout.radius, 0.0);
        assert_eq!(layout.vertical_offset, 0.0);
        assert_eq!(layout.dot_radius, 0.0);
    }

    #[test]
    fn screen_coordinates_are_centre_relative() {
        let viewport = Viewport::new(200, 100);
        let (x, y) = DotPosition { x: 10.0, y: -5.0 }.to_screen(viewport);
        assert_eq!((x, y), (110.0, 45.0));
    }
}
