//! Worker threads feeding the render loop: one produces frames, one runs the
//! face detector on the newest frame it has not yet seen.
//!
//! Both publish through `watch` channels, so the render loop only ever sees
//! the latest value and a slow detector never queues up stale work.

use panopticon_core::{Detection, DetectorError, DetectorOptions, FaceDetector, FrameSize};
use panopticon_hw::{frame, Camera, Frame, StillSource};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;

/// Latest camera frame, `None` until the source produces one.
pub type FrameRx = watch::Receiver<Option<Arc<Frame>>>;

/// Where frames come from.
#[derive(Debug, Clone)]
pub enum FrameSourceKind {
    Camera { device: String },
    Still { path: PathBuf, interval: Duration },
}

/// One published detector result.
#[derive(Debug, Clone, Default)]
pub struct DetectionUpdate {
    /// Increments with every successful detection pass.
    pub sequence: u64,
    /// Sequence number of the frame the detections came from.
    pub frame_sequence: u32,
    pub detections: Arc<Vec<Detection>>,
}

/// Spawn the frame source on a dedicated OS thread.
///
/// Failing to open the source is logged, not fatal: the receiver simply
/// never yields a frame and the view keeps rendering its background.
pub fn spawn_frame_source(source: FrameSourceKind, size: FrameSize) -> std::io::Result<FrameRx> {
    let (tx, rx) = watch::channel(None);

    std::thread::Builder::new()
        .name("panopticon-capture".into())
        .spawn(move || {
            tracing::info!(?source, "capture thread started");
            match source {
                FrameSourceKind::Camera { device } => run_camera(&device, size, &tx),
                FrameSourceKind::Still { path, interval } => {
                    match StillSource::open(&path, size.width, size.height) {
                        Ok(mut still) => {
                            while tx.send(Some(Arc::new(still.next_frame()))).is_ok() {
                                std::thread::sleep(interval);
                            }
                        }
                        Err(err) => {
                            tracing::error!(path = %path.display(), error = %err, "failed to load still image");
                        }
                    }
                }
            }
            tracing::info!("capture thread exiting");
        })?;

    Ok(rx)
}

fn run_camera(device: &str, size: FrameSize, tx: &watch::Sender<Option<Arc<Frame>>>) {
    let camera = match Camera::open(device, size.width, size.height) {
        Ok(camera) => camera,
        Err(err) => {
            tracing::error!(device, error = %err, "failed to open camera; continuing without video");
            return;
        }
    };
    tracing::info!(
        device,
        width = camera.width,
        height = camera.height,
        format = ?camera.pixel_format(),
        "camera streaming"
    );

    let result = camera.stream(|mut captured| {
        if captured.width() != size.width || captured.height() != size.height {
            captured.image = frame::normalize_size(captured.image, size.width, size.height);
        }
        // Stop once the render loop has dropped its receiver.
        tx.send(Some(Arc::new(captured))).is_ok()
    });

    if let Err(err) = result {
        tracing::error!(device, error = %err, "camera stream ended");
    }
}

/// Spawn the detector on a dedicated OS thread.
///
/// The model is loaded on the thread. If loading fails the error is logged
/// and the receiver stays at its default (no faces) for the whole session.
pub fn spawn_detector(
    model_path: String,
    options: DetectorOptions,
    mut frames: FrameRx,
    handle: Handle,
) -> std::io::Result<watch::Receiver<DetectionUpdate>> {
    let (tx, rx) = watch::channel(DetectionUpdate::default());

    std::thread::Builder::new()
        .name("panopticon-detect".into())
        .spawn(move || {
            let mut detector = match FaceDetector::load(&model_path, options) {
                Ok(detector) => detector,
                Err(err) => {
                    tracing::error!(path = %model_path, error = %err, "failed to load face detector; faces will not be tracked");
                    return;
                }
            };
            tracing::info!(path = %model_path, ?options, "detector thread started");

            let mut sequence = 0u64;
            // Wait for a frame newer than the last one processed.
            while handle.block_on(frames.changed()).is_ok() {
                let Some(frame) = frames.borrow_and_update().clone() else {
                    continue;
                };
                let result = detector.detect(&frame.image);
                if !publish(&tx, &mut sequence, frame.sequence, result) {
                    break;
                }
            }
            tracing::info!("detector thread exiting");
        })?;

    Ok(rx)
}

/// Publish one detection result. A failed pass is logged and the previous
/// result stays current. Returns `false` once nobody is listening.
fn publish(
    tx: &watch::Sender<DetectionUpdate>,
    sequence: &mut u64,
    frame_sequence: u32,
    result: Result<Vec<Detection>, DetectorError>,
) -> bool {
    match result {
        Ok(detections) => {
            *sequence += 1;
            tracing::trace!(frame = frame_sequence, faces = detections.len(), "detection pass");
            tx.send(DetectionUpdate {
                sequence: *sequence,
                frame_sequence,
                detections: Arc::new(detections),
            })
            .is_ok()
        }
        Err(err) => {
            tracing::warn!(frame = frame_sequence, error = %err, "detection failed; keeping previous result");
            !tx.is_closed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use panopticon_core::BoundingBox;

    #[test]
    fn test_publish_success_bumps_sequence() {
        let (tx, rx) = watch::channel(DetectionUpdate::default());
        let mut seq = 0;
        let det = Detection::from_box(BoundingBox::new(0.0, 0.0, 10.0, 10.0));

        assert!(publish(&tx, &mut seq, 7, Ok(vec![det])));
        let update = rx.borrow().clone();
        assert_eq!(update.sequence, 1);
        assert_eq!(update.frame_sequence, 7);
        assert_eq!(update.detections.len(), 1);
    }

    #[test]
    fn test_publish_failure_keeps_previous() {
        let (tx, rx) = watch::channel(DetectionUpdate::default());
        let mut seq = 0;
        let det = Detection::from_box(BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        publish(&tx, &mut seq, 1, Ok(vec![det]));

        let failed = Err(DetectorError::Inference("boom".into()));
        assert!(publish(&tx, &mut seq, 2, failed));
        let update = rx.borrow().clone();
        assert_eq!(update.sequence, 1);
        assert_eq!(update.frame_sequence, 1);
        assert_eq!(update.detections.len(), 1);
    }

    #[test]
    fn test_publish_reports_closed_channel() {
        let (tx, rx) = watch::channel(DetectionUpdate::default());
        drop(rx);
        let mut seq = 0;
        assert!(!publish(&tx, &mut seq, 0, Ok(Vec::new())));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_still_source_publishes_normalized_frames() {
        let path = std::env::temp_dir().join(format!("panopticon-still-{}.png", std::process::id()));
        RgbImage::from_pixel(320, 240, Rgb([1, 2, 3])).save(&path).unwrap();

        let source = FrameSourceKind::Still { path: path.clone(), interval: Duration::from_millis(5) };
        let mut rx = spawn_frame_source(source, FrameSize::default()).unwrap();
        rx.wait_for(|f| f.is_some()).await.unwrap();
        let frame = rx.borrow().clone().unwrap();
        assert_eq!((frame.width(), frame.height()), (640, 480));

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_detector_without_model_stays_empty() {
        let (_frames_tx, frames) = watch::channel(None);
        let rx = spawn_detector(
            "/nonexistent/det_10g.onnx".into(),
            DetectorOptions::default(),
            frames,
            Handle::current(),
        )
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rx.borrow().sequence, 0);
        assert!(rx.borrow().detections.is_empty());
    }
}
