//! Screen-space layout: viewport size, pixel rectangles, cover scaling and
//! the frame→screen view transform.

use panopticon_core::FrameSize;

/// Size of the display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Integer pixel rectangle used for clipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Scale that makes a `source` fill a `target_w`×`target_h` rectangle with
/// no empty margins, cropping the excess instead of letterboxing.
pub fn cover_scale(target_w: f32, target_h: f32, source: FrameSize) -> f32 {
    (target_w / source.width_f32()).max(target_h / source.height_f32())
}

/// Maps frame coordinates to screen coordinates:
/// `screen = origin + scale · (frame − center)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub origin: (f32, f32),
    pub scale: f32,
    pub center: (f32, f32),
}

impl ViewTransform {
    pub fn new(origin: (f32, f32), scale: f32, center: (f32, f32)) -> Self {
        Self { origin, scale, center }
    }

    pub fn to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.origin.0 + self.scale * (x - self.center.0),
            self.origin.1 + self.scale * (y - self.center.1),
        )
    }
}
