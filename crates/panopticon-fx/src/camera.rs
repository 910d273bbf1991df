//! Virtual camera that eases toward the detected faces.

use panopticon_core::{BoundingBox, Detection, FrameSize};

/// Fraction of the remaining distance covered per tick.
pub const SMOOTHING: f32 = 0.06;
/// Loosens the fit so faces are not flush against the edges (1 = exact fit).
pub const BBOX_MARGIN: f32 = 1.4;
pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 5.0;

/// Centre (frame coordinates) and zoom of the virtual camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub center_x: f32,
    pub center_y: f32,
    pub zoom: f32,
}

impl CameraState {
    pub fn new(center_x: f32, center_y: f32, zoom: f32) -> Self {
        Self { center_x, center_y, zoom }
    }

    /// Frame centre at zoom 1.
    pub fn home(frame: FrameSize) -> Self {
        let (cx, cy) = frame.center();
        Self::new(cx, cy, MIN_ZOOM)
    }
}

/// Zoom that fits `bbox` (loosened by `margin`) into the frame, in [1, 5].
pub fn fit_zoom(bbox: &BoundingBox, frame: FrameSize, margin: f32) -> f32 {
    let s = (frame.width_f32() / (bbox.width() * margin))
        .min(frame.height_f32() / (bbox.height() * margin));
    if s.is_nan() {
        MIN_ZOOM
    } else {
        s.clamp(MIN_ZOOM, MAX_ZOOM)
    }
}

/// Camera target for a detection set: the union box of all faces, or the
/// frame centre at zoom 1 when there are none.
pub fn target_for(detections: &[Detection], frame: FrameSize, margin: f32) -> CameraState {
    match BoundingBox::union(detections.iter().map(|d| &d.bbox)) {
        None => CameraState::home(frame),
        Some(union) => {
            let (cx, cy) = union.center();
            CameraState::new(cx, cy, fit_zoom(&union, frame, margin))
        }
    }
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

/// First-order smoothed camera: every tick the current state covers a fixed
/// fraction of the way to the target, per axis. No velocity, no overshoot.
#[derive(Debug, Clone)]
pub struct CameraController {
    frame: FrameSize,
    smoothing: f32,
    margin: f32,
    current: CameraState,
    target: CameraState,
}

impl CameraController {
    pub fn new(frame: FrameSize) -> Self {
        Self::with_params(frame, SMOOTHING, BBOX_MARGIN)
    }

    /// The camera starts at the frame origin and pans in toward the centre.
    pub fn with_params(frame: FrameSize, smoothing: f32, margin: f32) -> Self {
        Self {
            frame,
            smoothing,
            margin,
            current: CameraState::new(0.0, 0.0, MIN_ZOOM),
            target: CameraState::home(frame),
        }
    }

    pub fn current(&self) -> CameraState {
        self.current
    }

    pub fn target(&self) -> CameraState {
        self.target
    }

    pub fn retarget(&mut self, detections: &[Detection]) {
        self.target = target_for(detections, self.frame, self.margin);
    }

    pub fn tick(&mut self) {
        let t = self.smoothing;
        self.current = CameraState {
            center_x: lerp(self.current.center_x, self.target.center_x, t),
            center_y: lerp(self.current.center_y, self.target.center_y, t),
            zoom: lerp(self.current.zoom, self.target.zoom, t),
        };
    }
}
