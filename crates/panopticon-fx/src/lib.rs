//! panopticon-fx: The surveillance-camera look.
//!
//! Everything here is pure CPU work on `image` buffers: a smoothed virtual
//! camera that zooms onto detected faces, a green colour grade with
//! scanlines and a HUD, an alternate split view with one column per face,
//! and a filmstrip of periodic screenshots. All mutable state lives in
//! [`Session`], so the whole pipeline runs without a display.

pub mod camera;
pub mod compose;
pub mod filmstrip;
pub mod geometry;
pub mod grade;
pub mod hud;
pub mod raster;
pub mod session;
pub mod split;

pub use camera::{CameraController, CameraState};
pub use filmstrip::{FilmstripConfig, Thumbnail, ThumbnailRecorder};
pub use geometry::{ScreenRect, ViewTransform, Viewport};
pub use session::{HostEvent, Session, SessionConfig};
pub use split::ColumnView;
