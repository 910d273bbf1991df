//! panopticon-hw: Frame sources for the surveillance view.
//!
//! Provides V4L2-based webcam capture producing RGB frames, plus a still
//! image source for running without a camera.

pub mod camera;
pub mod frame;
pub mod still;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::{Frame, FrameError};
pub use still::StillSource;
