//! Drawing on the RGBA canvas through `imageproc`.
//!
//! The canvas is always opaque; translucent colours blend source-over onto it.

use crate::geometry::ViewTransform;
use image::buffer::ConvertBuffer;
use image::{Rgba, RgbImage, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, Blend};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::rect::Rect;

/// Screen coordinates beyond this are clamped before snapping to pixels.
const COORD_LIMIT: f32 = 1.0e6;

/// Snap a coordinate to the nearest pixel edge.
fn px(v: f32) -> i32 {
    (v + 0.5).floor().clamp(-COORD_LIMIT, COORD_LIMIT) as i32
}

/// The pixel span `[x0, x1) × [y0, y1)`, or `None` when it is empty.
fn pixel_rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Option<Rect> {
    let (left, top) = (px(x0), px(y0));
    let (width, height) = (px(x1) - left, px(y1) - top);
    (width > 0 && height > 0).then(|| Rect::at(left, top).of_size(width as u32, height as u32))
}

/// Run `draw` against the canvas with source-over blending.
pub fn blended(canvas: &mut RgbaImage, draw: impl FnOnce(&mut Blend<RgbaImage>)) {
    let mut layer = Blend(std::mem::replace(canvas, RgbaImage::new(0, 0)));
    draw(&mut layer);
    *canvas = layer.0;
}

/// Outline the rectangle with corners `(x0, y0)`–`(x1, y1)`. The stroke is
/// centred on the edges, `thickness` pixels wide.
pub fn stroke_rect(canvas: &mut RgbaImage, x0: f32, y0: f32, x1: f32, y1: f32, thickness: f32, color: Rgba<u8>) {
    let h = thickness.max(1.0) / 2.0;
    // Top and bottom span the corners; sides fill between them without overlap.
    let bands = [
        pixel_rect(x0 - h, y0 - h, x1 + h, y0 + h),
        pixel_rect(x0 - h, y1 - h, x1 + h, y1 + h),
        pixel_rect(x0 - h, y0 + h, x0 + h, y1 - h),
        pixel_rect(x1 - h, y0 + h, x1 + h, y1 - h),
    ];
    blended(canvas, |layer| {
        for band in bands.into_iter().flatten() {
            draw_filled_rect_mut(layer, band, color);
        }
    });
}

/// Projection equivalent of `transform` on pixel indices, sampling at pixel
/// centres.
fn projection(transform: &ViewTransform) -> Option<Projection> {
    let s = transform.scale;
    if !(s.is_finite() && s > 0.0) {
        return None;
    }
    let (ox, oy) = transform.origin;
    let (cx, cy) = transform.center;
    Some(
        Projection::translate(ox - 0.5, oy - 0.5)
            * Projection::scale(s, s)
            * Projection::translate(0.5 - cx, 0.5 - cy),
    )
}

/// Draw `frame` through `transform` with nearest-neighbour sampling,
/// overwriting the whole canvas. Pixels mapping outside the frame get
/// `background`.
pub fn draw_frame(canvas: &mut RgbaImage, frame: &RgbImage, transform: &ViewTransform, background: Rgba<u8>) {
    let Some(projection) = projection(transform) else {
        return;
    };
    let source: RgbaImage = frame.convert();
    warp_into(&source, &projection, Interpolation::Nearest, background, canvas);
}
