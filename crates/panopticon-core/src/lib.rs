//! panopticon-core: Face detection for the surveillance view.
//!
//! Runs the SCRFD detector through ONNX Runtime on RGB webcam frames and
//! exposes the bounding-box types the renderer works with.

pub mod detector;
pub mod types;

pub use detector::{DetectorError, DetectorOptions, FaceDetector};
pub use types::{BoundingBox, Detection, FrameSize};
