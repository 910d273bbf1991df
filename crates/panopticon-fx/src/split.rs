//! Split view: one column per face, each tracked immediately with no easing.

use crate::camera::fit_zoom;
use crate::compose::{stroke_box, BACKGROUND, BOX_STROKE};
use crate::geometry::{cover_scale, ScreenRect, ViewTransform, Viewport};
use crate::raster;
use image::imageops;
use image::{RgbImage, RgbaImage};
use panopticon_core::{BoundingBox, Detection, FrameSize};

/// Layout and view of one split column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnView {
    /// Left edge in screen pixels (fractional).
    pub x: f32,
    pub width: f32,
    pub height: f32,
    pub bbox: BoundingBox,
    pub zoom: f32,
    /// Cover scale against this column's own size.
    pub cover: f32,
}

impl ColumnView {
    pub fn transform(&self) -> ViewTransform {
        ViewTransform::new(
            (self.x + self.width / 2.0, self.height / 2.0),
            self.cover * self.zoom,
            self.bbox.center(),
        )
    }

    /// Pixel columns owned by this view; edges are rounded down so adjacent
    /// columns tile the viewport without gaps.
    pub fn clip(&self) -> ScreenRect {
        let left = self.x.floor() as u32;
        let right = (self.x + self.width).floor() as u32;
        ScreenRect::new(left, 0, right.saturating_sub(left), self.height as u32)
    }
}

/// Column layout for split view, or `None` when split view is inactive
/// (`split_count <= 1` or no detections). The first
/// `min(detections, split_count)` detections each get a column.
pub fn split_layout(
    viewport: Viewport,
    detections: &[Detection],
    split_count: usize,
    frame: FrameSize,
    margin: f32,
) -> Option<Vec<ColumnView>> {
    if split_count <= 1 || detections.is_empty() {
        return None;
    }

    let count = detections.len().min(split_count);
    let width = viewport.width as f32 / count as f32;
    let height = viewport.height as f32;
    let cover = cover_scale(width, height, frame);

    let columns = detections
        .iter()
        .take(count)
        .enumerate()
        .map(|(i, det)| ColumnView {
            x: i as f32 * width,
            width,
            height,
            bbox: det.bbox,
            zoom: fit_zoom(&det.bbox, frame, margin),
            cover,
        })
        .collect();
    Some(columns)
}

/// Draw each column's crop of the frame, then that column's own face box.
/// Columns render into their own tile, so nothing spills into a neighbour.
pub fn render_columns(canvas: &mut RgbaImage, frame: Option<&RgbImage>, columns: &[ColumnView]) {
    for column in columns {
        let clip = column.clip();
        if clip.width == 0 || clip.height == 0 {
            continue;
        }
        let mut tile = RgbaImage::from_pixel(clip.width, clip.height, BACKGROUND);
        let full = column.transform();
        let transform = ViewTransform::new((full.origin.0 - clip.x as f32, full.origin.1), full.scale, full.center);

        if let Some(frame) = frame {
            raster::draw_frame(&mut tile, frame, &transform, BACKGROUND);
        }
        stroke_box(&mut tile, &column.bbox, &transform, BOX_STROKE / column.zoom);
        imageops::replace(canvas, &tile, i64::from(clip.x), i64::from(clip.y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::BBOX_MARGIN;
    use image::{Rgb, Rgba};

    const FRAME: FrameSize = FrameSize::new(640, 480);

    fn dets(n: usize) -> Vec<Detection> {
        (0..n)
            .map(|i| {
                let x = 20.0 + i as f32 * 120.0;
                Detection::from_box(BoundingBox::new(x, 100.0, x + 100.0, 220.0))
            })
            .collect()
    }

    #[test]
    fn test_split_inactive_for_single_split() {
        assert!(split_layout(Viewport::new(1280, 720), &dets(3), 1, FRAME, BBOX_MARGIN).is_none());
        assert!(split_layout(Viewport::new(1280, 720), &dets(3), 0, FRAME, BBOX_MARGIN).is_none());
    }

    #[test]
    fn test_split_inactive_without_detections() {
        assert!(split_layout(Viewport::new(1280, 720), &[], 4, FRAME, BBOX_MARGIN).is_none());
    }

    #[test]
    fn test_split_column_count_is_min() {
        for (faces, splits) in [(1, 3), (2, 3), (3, 3), (5, 3), (4, 2)] {
            let cols = split_layout(Viewport::new(1200, 600), &dets(faces), splits, FRAME, BBOX_MARGIN).unwrap();
            assert_eq!(cols.len(), faces.min(splits));
        }
    }

    #[test]
    fn test_three_splits_two_faces_gives_half_width_columns() {
        let cols = split_layout(Viewport::new(1280, 720), &dets(2), 3, FRAME, BBOX_MARGIN).unwrap();
        assert_eq!(cols.len(), 2);
        for (i, col) in cols.iter().enumerate() {
            assert_eq!(col.width, 640.0);
            assert_eq!(col.x, i as f32 * 640.0);
            assert_eq!(col.clip().width, 640);
        }
    }

    #[test]
    fn test_column_view_tracks_its_own_face() {
        let faces = dets(2);
        let cols = split_layout(Viewport::new(1280, 720), &faces, 2, FRAME, BBOX_MARGIN).unwrap();
        for (col, face) in cols.iter().zip(&faces) {
            assert_eq!(col.bbox, face.bbox);
            assert_eq!(col.zoom, fit_zoom(&face.bbox, FRAME, BBOX_MARGIN));
            // cover against the 640x720 column, not the full viewport
            assert!((col.cover - 1.5).abs() < 1e-6);
            let (cx, cy) = face.bbox.center();
            let (sx, sy) = col.transform().to_screen(cx, cy);
            assert!((sx - (col.x + 320.0)).abs() < 1e-3 && (sy - 360.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_uneven_columns_tile_without_gaps() {
        let cols = split_layout(Viewport::new(1000, 300), &dets(3), 3, FRAME, BBOX_MARGIN).unwrap();
        let total: u32 = cols.iter().map(|c| c.clip().width).sum();
        assert_eq!(total, 1000);
        assert_eq!(cols[1].clip().x, cols[0].clip().x + cols[0].clip().width);
    }

    #[test]
    fn test_render_columns_fills_each_column() {
        let mut frame = RgbImage::from_pixel(640, 480, Rgb([10, 10, 10]));
        // Paint each face region a distinct colour
        for (i, face) in dets(2).iter().enumerate() {
            let b = face.bbox;
            for y in b.y_min as u32..b.y_max as u32 {
                for x in b.x_min as u32..b.x_max as u32 {
                    frame.put_pixel(x, y, Rgb([100 + i as u8 * 100, 0, 0]));
                }
            }
        }
        let mut canvas = RgbaImage::from_pixel(400, 300, Rgba([0, 0, 0, 255]));
        let cols = split_layout(Viewport::new(400, 300), &dets(2), 2, FRAME, BBOX_MARGIN).unwrap();
        render_columns(&mut canvas, Some(&frame), &cols);
        // Column centres show their own face
        assert_eq!(canvas.get_pixel(100, 150).0[0], 100);
        assert_eq!(canvas.get_pixel(300, 150).0[0], 200);
    }

    #[test]
    fn test_column_box_stays_inside_its_column() {
        // A face wider than its column: the outline would cross into the
        // neighbour if columns were not clipped.
        let wide = Detection::from_box(BoundingBox::new(0.0, 0.0, 640.0, 480.0));
        let faces = vec![wide.clone(), wide];
        let cols = split_layout(Viewport::new(400, 300), &faces, 2, FRAME, BBOX_MARGIN).unwrap();
        let mut canvas = RgbaImage::from_pixel(400, 300, Rgba([0, 0, 0, 255]));
        render_columns(&mut canvas, None, &cols[..1]);
        assert!((200..400).all(|x| (0..300).all(|y| canvas.get_pixel(x, y).0 == [0, 0, 0, 255])));
        // The top edge lies on row 0 and is cut off at the column boundary
        assert!((0..200).all(|x| canvas.get_pixel(x, 0).0[1] > 0));
    }
}
