//! Colour grade and scanline overlay applied over the composed frame.

use crate::raster;
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

/// Per-channel multipliers applied to the pixel luminance.
pub const TINT: [f64; 3] = [0.4, 0.9, 0.4];
/// Row spacing of the scanline grid.
pub const SCANLINE_SPACING: u32 = 4;
pub const SCANLINE_COLOR: Rgba<u8> = Rgba([0, 0, 0, 90]);

/// Map one RGB triple to the green palette: unweighted luminance times the
/// fixed per-channel multipliers, quantised toward zero.
pub fn tint_pixel(rgb: [u8; 3]) -> [u8; 3] {
    let g = (rgb[0] as f64 + rgb[1] as f64 + rgb[2] as f64) / 3.0;
    TINT.map(|m| (g * m).clamp(0.0, 255.0) as u8)
}

/// Regrade the whole canvas in place. Alpha is untouched.
pub fn green_tint(canvas: &mut RgbaImage) {
    for pixel in canvas.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let [r, g, b] = tint_pixel([r, g, b]);
        *pixel = Rgba([r, g, b, a]);
    }
}

/// Rows that carry a scanline on a canvas `height` pixels tall.
pub fn scanline_rows(height: u32, spacing: u32) -> impl Iterator<Item = u32> {
    (0..height).step_by(spacing.max(1) as usize)
}

/// Darken one full-width row every `spacing` rows.
pub fn draw_scanlines(canvas: &mut RgbaImage, spacing: u32) {
    let (width, height) = canvas.dimensions();
    if width == 0 {
        return;
    }
    raster::blended(canvas, |layer| {
        for y in scanline_rows(height, spacing) {
            draw_filled_rect_mut(layer, Rect::at(0, y as i32).of_size(width, 1), SCANLINE_COLOR);
        }
    });
}
