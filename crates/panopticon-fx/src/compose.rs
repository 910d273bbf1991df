//! Single-view composition through the smoothed virtual camera.

use crate::camera::CameraState;
use crate::geometry::{cover_scale, ViewTransform, Viewport};
use crate::raster;
use image::{Rgba, RgbImage, RgbaImage};
use panopticon_core::{BoundingBox, Detection, FrameSize};

pub const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const BOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 160]);
/// Box stroke width in frame units at zoom 1.
pub const BOX_STROKE: f32 = 2.0;

/// Transform that centres the camera in `viewport` and covers it with the
/// frame at the camera's zoom.
pub fn single_view_transform(camera: &CameraState, frame: FrameSize, viewport: Viewport) -> ViewTransform {
    let (vw, vh) = (viewport.width as f32, viewport.height as f32);
    let cover = cover_scale(vw, vh, frame);
    ViewTransform::new(
        (vw / 2.0, vh / 2.0),
        cover * camera.zoom,
        (camera.center_x, camera.center_y),
    )
}

/// Stroke a frame-space box. `stroke` is in frame units, so the on-screen
/// width is `stroke · transform.scale`.
pub fn stroke_box(canvas: &mut RgbaImage, bbox: &BoundingBox, transform: &ViewTransform, stroke: f32) {
    let (x0, y0) = transform.to_screen(bbox.x_min, bbox.y_min);
    let (x1, y1) = transform.to_screen(bbox.x_max, bbox.y_max);
    raster::stroke_rect(canvas, x0, y0, x1, y1, stroke * transform.scale, BOX_COLOR);
}

/// Draw the video frame through the virtual camera and outline every face.
/// A missing frame (source not ready) leaves the background showing.
pub fn render_single_view(
    canvas: &mut RgbaImage,
    frame: Option<&RgbImage>,
    detections: &[Detection],
    camera: &CameraState,
    frame_size: FrameSize,
) {
    let viewport = Viewport::new(canvas.width(), canvas.height());
    let transform = single_view_transform(camera, frame_size, viewport);

    if let Some(frame) = frame {
        raster::draw_frame(canvas, frame, &transform, BACKGROUND);
    }
    // Divide by zoom so the stroke stays constant in screen space.
    let stroke = BOX_STROKE / camera.zoom;
    for det in detections {
        stroke_box(canvas, &det.bbox, &transform, stroke);
    }
}
