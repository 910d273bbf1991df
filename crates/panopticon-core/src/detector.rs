//! Face detection with an SCRFD ONNX model.
//!
//! Frames are letterboxed into the square network input, the three stride
//! heads (8, 16, 32) are decoded anchor by anchor, overlapping boxes are
//! suppressed, and the survivors are mapped back to frame pixels.

use crate::types::{BoundingBox, Detection};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use thiserror::Error;

const INPUT_SIZE: usize = 640;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 128.0;
const SCORE_THRESHOLD: f32 = 0.5;
const IOU_THRESHOLD: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
/// SCRFD places two anchors on every grid cell.
const ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("detection model missing at {0} (det_10g.onnx from insightface)")]
    MissingModel(PathBuf),
    #[error("unexpected model layout: {0}")]
    BadModel(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("onnx runtime: {0}")]
    Ort(#[from] ort::Error),
}

/// Detector configuration, fixed for the lifetime of the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorOptions {
    /// Maximum number of faces reported per frame (highest confidence first).
    pub max_faces: usize,
    /// Keep the five-point landmarks; when false they are dropped.
    pub refine_landmarks: bool,
    /// Mirror reported boxes about the frame's vertical axis.
    pub flip_horizontal: bool,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            max_faces: 5,
            refine_landmarks: false,
            flip_horizontal: false,
        }
    }
}

/// How a frame was fitted into the network input.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Output tensor positions of one stride head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StrideHead {
    stride: usize,
    score: usize,
    bbox: usize,
    kps: usize,
}

pub struct FaceDetector {
    session: Session,
    options: DetectorOptions,
    heads: [StrideHead; 3],
}

impl FaceDetector {
    pub fn load(model_path: &str, options: DetectorOptions) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::MissingModel(PathBuf::from(model_path)));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        if names.len() < 9 {
            return Err(DetectorError::BadModel(format!(
                "expected 9 outputs (score, bbox and kps per stride), found {}",
                names.len()
            )));
        }
        let heads = output_layout(&names);
        tracing::info!(path = model_path, ?options, ?heads, "face detector ready");

        Ok(Self { session, options, heads })
    }

    /// Faces in `frame`, in frame pixels, best first, at most `max_faces`.
    pub fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
        let (input, letterbox) = preprocess(frame);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let tensor = |index: usize, what: &str, stride: usize| {
            outputs[index]
                .try_extract_tensor::<f32>()
                .map(|(_, data)| data)
                .map_err(|e| DetectorError::Inference(format!("{what} at stride {stride}: {e}")))
        };

        let mut candidates = Vec::new();
        for head in &self.heads {
            let scores = tensor(head.score, "scores", head.stride)?;
            let boxes = tensor(head.bbox, "boxes", head.stride)?;
            let kps = tensor(head.kps, "landmarks", head.stride)?;
            candidates.extend(decode_stride(scores, boxes, kps, head.stride, &letterbox, SCORE_THRESHOLD));
        }

        let faces = nms(candidates, IOU_THRESHOLD);
        Ok(apply_options(faces, &self.options, frame.width() as f32))
    }
}

fn by_confidence(a: &Detection, b: &Detection) -> Ordering {
    b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal)
}

/// Scale `frame` to fit the square input, centre it, and normalise to NCHW.
fn preprocess(frame: &RgbImage) -> (Array4<f32>, Letterbox) {
    let side = INPUT_SIZE as f32;
    let scale = (side / frame.width() as f32).min(side / frame.height() as f32);
    let fit_w = ((frame.width() as f32 * scale).round() as u32).clamp(1, INPUT_SIZE as u32);
    let fit_h = ((frame.height() as f32 * scale).round() as u32).clamp(1, INPUT_SIZE as u32);
    let letterbox = Letterbox {
        scale,
        pad_x: (side - fit_w as f32) / 2.0,
        pad_y: (side - fit_h as f32) / 2.0,
    };

    let fitted = imageops::resize(frame, fit_w, fit_h, FilterType::Triangle);
    let (left, top) = (letterbox.pad_x as usize, letterbox.pad_y as usize);

    // Zero is the mean colour once normalised, so the border needs no fill.
    let mut input = Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for (x, y, px) in fitted.enumerate_pixels() {
        for (c, &v) in px.0.iter().enumerate() {
            input[[0, c, top + y as usize, left + x as usize]] = (v as f32 - PIXEL_MEAN) / PIXEL_STD;
        }
    }
    (input, letterbox)
}

/// Sort by confidence, cap the count, then apply landmark and mirroring options.
fn apply_options(mut faces: Vec<Detection>, options: &DetectorOptions, frame_width: f32) -> Vec<Detection> {
    faces.sort_by(by_confidence);
    faces.truncate(options.max_faces);

    for face in &mut faces {
        if !options.refine_landmarks {
            face.landmarks = None;
        }
        if options.flip_horizontal {
            face.bbox = face.bbox.flip_horizontal(frame_width);
            for (x, _) in face.landmarks.iter_mut().flatten() {
                *x = frame_width - *x;
            }
        }
    }
    faces
}

/// Match output tensors to stride heads by their `score_8`/`bbox_16`/`kps_32`
/// names. Exports with anonymous outputs use the usual positional order:
/// scores, then boxes, then landmarks, each by ascending stride.
fn output_layout(names: &[String]) -> [StrideHead; 3] {
    let positional = std::array::from_fn(|i| StrideHead {
        stride: STRIDES[i],
        score: i,
        bbox: i + 3,
        kps: i + 6,
    });

    let find = |kind: &str, stride: usize| {
        let wanted = format!("{kind}_{stride}");
        names.iter().position(|n| *n == wanted)
    };
    let named: Option<Vec<StrideHead>> = STRIDES
        .iter()
        .map(|&stride| {
            Some(StrideHead {
                stride,
                score: find("score", stride)?,
                bbox: find("bbox", stride)?,
                kps: find("kps", stride)?,
            })
        })
        .collect();

    match named {
        Some(heads) => [heads[0], heads[1], heads[2]],
        None => {
            tracing::info!(?names, "unrecognised output names, assuming positional layout");
            positional
        }
    }
}

/// Decode one stride head into frame-space candidates above `threshold`.
///
/// Box and landmark outputs are distances from the anchor point in units of
/// the stride.
fn decode_stride(
    scores: &[f32],
    boxes: &[f32],
    kps: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<Detection> {
    let cells = INPUT_SIZE / stride;
    let s = stride as f32;

    (0..cells * cells * ANCHORS_PER_CELL)
        .filter_map(|anchor| {
            let score = *scores.get(anchor)?;
            if score <= threshold {
                return None;
            }
            let cell = anchor / ANCHORS_PER_CELL;
            let (ax, ay) = ((cell % cells) as f32 * s, (cell / cells) as f32 * s);

            let d = boxes.get(anchor * 4..anchor * 4 + 4)?;
            let (x_min, y_min) = letterbox.to_frame(ax - d[0] * s, ay - d[1] * s);
            let (x_max, y_max) = letterbox.to_frame(ax + d[2] * s, ay + d[3] * s);

            let landmarks = kps.get(anchor * 10..anchor * 10 + 10).map(|p| {
                std::array::from_fn(|i| letterbox.to_frame(ax + p[2 * i] * s, ay + p[2 * i + 1] * s))
            });

            Some(Detection {
                bbox: BoundingBox::new(x_min, y_min, x_max, y_max),
                confidence: score,
                landmarks,
            })
        })
        .collect()
}

/// Greedy non-maximum suppression, best first.
fn nms(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(by_confidence);
    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
    for face in candidates {
        if kept.iter().all(|k| k.bbox.iou(&face.bbox) <= iou_threshold) {
            kept.push(face);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: f32, y: f32, size: f32, confidence: f32) -> Detection {
        Detection {
            bbox: BoundingBox::new(x, y, x + size, y + size),
            confidence,
            landmarks: Some([(x, y); 5]),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping_pair() {
        let kept = nms(
            vec![face(4.0, 4.0, 100.0, 0.8), face(0.0, 0.0, 100.0, 0.9), face(300.0, 300.0, 40.0, 0.6)],
            IOU_THRESHOLD,
        );
        let confidences: Vec<f32> = kept.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.6]);
    }

    #[test]
    fn test_nms_disjoint_and_empty() {
        let disjoint = vec![face(0.0, 0.0, 10.0, 0.9), face(100.0, 0.0, 10.0, 0.8)];
        assert_eq!(nms(disjoint, IOU_THRESHOLD).len(), 2);
        assert!(nms(Vec::new(), IOU_THRESHOLD).is_empty());
    }

    #[test]
    fn test_apply_options_caps_by_confidence() {
        let faces = vec![face(0.0, 0.0, 10.0, 0.6), face(20.0, 0.0, 10.0, 0.95), face(40.0, 0.0, 10.0, 0.8)];
        let options = DetectorOptions { max_faces: 2, ..Default::default() };
        let result = apply_options(faces, &options, 640.0);
        assert_eq!(result.len(), 2);
        assert!((result[0].confidence - 0.95).abs() < 1e-6);
        assert!((result[1].confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_apply_options_drops_landmarks_unless_refined() {
        let faces = vec![face(0.0, 0.0, 10.0, 0.9)];
        let plain = apply_options(faces.clone(), &DetectorOptions::default(), 640.0);
        assert!(plain[0].landmarks.is_none());

        let refined = DetectorOptions { refine_landmarks: true, ..Default::default() };
        assert!(apply_options(faces, &refined, 640.0)[0].landmarks.is_some());
    }

    #[test]
    fn test_apply_options_flip_mirrors_boxes_and_landmarks() {
        let options = DetectorOptions {
            flip_horizontal: true,
            refine_landmarks: true,
            ..Default::default()
        };
        let result = apply_options(vec![face(100.0, 20.0, 50.0, 0.9)], &options, 640.0);
        assert_eq!(result[0].bbox, BoundingBox::new(490.0, 20.0, 540.0, 70.0));
        assert_eq!(result[0].landmarks.unwrap()[0], (540.0, 20.0));
    }

    #[test]
    fn test_preprocess_centres_landscape_frame() {
        let frame = RgbImage::from_pixel(640, 480, image::Rgb([255, 255, 255]));
        let (input, letterbox) = preprocess(&frame);
        assert_eq!(input.shape(), &[1, 3, 640, 640]);
        assert!((letterbox.scale - 1.0).abs() < 1e-6);
        assert_eq!((letterbox.pad_x, letterbox.pad_y), (0.0, 80.0));
        // Border rows stay at the normalised mean
        assert_eq!(input[[0, 0, 10, 10]], 0.0);
        assert!((input[[0, 1, 300, 300]] - 127.5 / 128.0).abs() < 1e-4);
    }

    #[test]
    fn test_letterbox_to_frame() {
        let lb = Letterbox { scale: 0.5, pad_x: 0.0, pad_y: 80.0 };
        assert_eq!(lb.to_frame(100.0, 180.0), (200.0, 200.0));
    }

    #[test]
    fn test_decode_stride_maps_back_to_frame() {
        let anchors = (INPUT_SIZE / 32).pow(2) * ANCHORS_PER_CELL;
        let mut scores = vec![0.0f32; anchors];
        let mut boxes = vec![0.0f32; anchors * 4];
        // Third anchor sits on cell (1, 0): anchor point (32, 0)
        scores[2] = 0.9;
        boxes[8..12].copy_from_slice(&[0.5, 0.0, 0.5, 1.0]);
        let kps = vec![0.0f32; anchors * 10];

        let lb = Letterbox { scale: 2.0, pad_x: 0.0, pad_y: 0.0 };
        let found = decode_stride(&scores, &boxes, &kps, 32, &lb, SCORE_THRESHOLD);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bbox, BoundingBox::new(8.0, 0.0, 24.0, 16.0));
        assert_eq!(found[0].landmarks.unwrap()[0], (16.0, 0.0));
    }

    #[test]
    fn test_decode_stride_without_landmark_tensor() {
        let anchors = (INPUT_SIZE / 32).pow(2) * ANCHORS_PER_CELL;
        let mut scores = vec![0.0f32; anchors];
        scores[0] = 0.7;
        let boxes = vec![1.0f32; anchors * 4];
        let lb = Letterbox { scale: 1.0, pad_x: 0.0, pad_y: 0.0 };
        let found = decode_stride(&scores, &boxes, &[], 32, &lb, SCORE_THRESHOLD);
        assert_eq!(found.len(), 1);
        assert!(found[0].landmarks.is_none());
    }

    #[test]
    fn test_output_layout_by_name() {
        let heads = output_layout(&names(&[
            "kps_8", "bbox_8", "score_8", "kps_16", "bbox_16", "score_16", "kps_32", "bbox_32", "score_32",
        ]));
        assert_eq!(heads[0], StrideHead { stride: 8, score: 2, bbox: 1, kps: 0 });
        assert_eq!(heads[2], StrideHead { stride: 32, score: 8, bbox: 7, kps: 6 });
    }

    #[test]
    fn test_output_layout_positional() {
        let anonymous: Vec<String> = (400..409).map(|i: usize| i.to_string()).collect();
        let heads = output_layout(&anonymous);
        assert_eq!(heads[1], StrideHead { stride: 16, score: 1, bbox: 4, kps: 7 });
    }

    #[test]
    fn test_load_missing_model() {
        let result = FaceDetector::load("/nonexistent/det_10g.onnx", DetectorOptions::default());
        assert!(matches!(result, Err(DetectorError::MissingModel(_))));
    }
}
