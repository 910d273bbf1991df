//! Display surfaces the composed view is presented on.

use anyhow::Result;
use image::RgbaImage;
use panopticon_fx::{HostEvent, Viewport};

/// Somewhere to show composed frames, and the source of host input.
pub trait Surface {
    /// Current drawable size.
    fn viewport(&self) -> Viewport;

    /// Show one composed frame and return the input gathered since the last
    /// call.
    fn present(&mut self, image: &RgbaImage, fullscreen: bool) -> Result<Vec<HostEvent>>;

    /// False once the user has closed the surface.
    fn is_open(&self) -> bool;
}

/// Fixed-size surface that discards frames.
#[derive(Debug)]
pub struct HeadlessSurface {
    viewport: Viewport,
    presented: u64,
}

impl HeadlessSurface {
    pub fn new(viewport: Viewport) -> Self {
        Self { viewport, presented: 0 }
    }
}

impl Drop for HeadlessSurface {
    fn drop(&mut self) {
        tracing::debug!(frames = self.presented, "headless surface closed");
    }
}

impl Surface for HeadlessSurface {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn present(&mut self, _image: &RgbaImage, _fullscreen: bool) -> Result<Vec<HostEvent>> {
        self.presented += 1;
        Ok(Vec::new())
    }

    fn is_open(&self) -> bool {
        true
    }
}

/// Open the display surface. A window that fails to open falls back to
/// headless rendering; a build without the `window` feature only runs
/// headless when asked to.
pub fn open(viewport: Viewport, headless: bool) -> Result<Box<dyn Surface>> {
    if headless {
        tracing::info!(width = viewport.width, height = viewport.height, "running headless");
        return Ok(Box::new(HeadlessSurface::new(viewport)));
    }
    open_window(viewport)
}

#[cfg(feature = "window")]
fn open_window(viewport: Viewport) -> Result<Box<dyn Surface>> {
    match window::WindowSurface::open("panopticon", viewport) {
        Ok(surface) => Ok(Box::new(surface)),
        Err(err) => {
            tracing::warn!(error = %err, "failed to open display window; running headless");
            Ok(Box::new(HeadlessSurface::new(viewport)))
        }
    }
}

#[cfg(not(feature = "window"))]
fn open_window(_viewport: Viewport) -> Result<Box<dyn Surface>> {
    anyhow::bail!("built without the `window` feature; rebuild with --features window or pass --headless")
}

#[cfg(feature = "window")]
mod window {
    use super::Surface;
    use anyhow::Result;
    use image::RgbaImage;
    use opencv::core::{Mat, Scalar, CV_8UC3};
    use opencv::highgui;
    use opencv::prelude::*;
    use panopticon_fx::{HostEvent, Viewport};

    const KEY_ESC: i32 = 27;

    /// OpenCV highgui window.
    pub struct WindowSurface {
        name: String,
        viewport: Viewport,
        fullscreen: bool,
        open: bool,
    }

    impl WindowSurface {
        pub fn open(name: &str, viewport: Viewport) -> Result<Self> {
            highgui::named_window(name, highgui::WINDOW_NORMAL)?;
            highgui::resize_window(name, viewport.width as i32, viewport.height as i32)?;
            tracing::info!(name, width = viewport.width, height = viewport.height, "opened display window");
            Ok(Self {
                name: name.to_string(),
                viewport,
                fullscreen: false,
                open: true,
            })
        }

        fn to_bgr(image: &RgbaImage) -> Result<Mat> {
            let mut mat = Mat::new_rows_cols_with_default(
                image.height() as i32,
                image.width() as i32,
                CV_8UC3,
                Scalar::all(0.0),
            )?;
            let data = mat.data_bytes_mut()?;
            for (dst, src) in data.chunks_exact_mut(3).zip(image.pixels()) {
                dst[0] = src[2];
                dst[1] = src[1];
                dst[2] = src[0];
            }
            Ok(mat)
        }
    }

    impl Surface for WindowSurface {
        fn viewport(&self) -> Viewport {
            self.viewport
        }

        fn present(&mut self, image: &RgbaImage, fullscreen: bool) -> Result<Vec<HostEvent>> {
            let mut events = Vec::new();

            if fullscreen != self.fullscreen {
                let mode = if fullscreen { highgui::WINDOW_FULLSCREEN } else { highgui::WINDOW_NORMAL };
                highgui::set_window_property(&self.name, highgui::WND_PROP_FULLSCREEN, mode as f64)?;
                self.fullscreen = fullscreen;
            }

            highgui::imshow(&self.name, &Self::to_bgr(image)?)?;

            let key = highgui::wait_key(1)?;
            if key == KEY_ESC || key == i32::from(b'q') {
                tracing::info!("exit requested by user");
                self.open = false;
                return Ok(events);
            }
            if key >= 0 {
                if let Some(c) = char::from_u32((key & 0xff) as u32) {
                    events.push(HostEvent::Key(c));
                }
            }

            if highgui::get_window_property(&self.name, highgui::WND_PROP_VISIBLE)? < 1.0 {
                self.open = false;
                return Ok(events);
            }

            let rect = highgui::get_window_image_rect(&self.name)?;
            if rect.width > 0 && rect.height > 0 {
                let viewport = Viewport::new(rect.width as u32, rect.height as u32);
                if viewport != self.viewport {
                    self.viewport = viewport;
                    events.push(HostEvent::Resize { width: viewport.width, height: viewport.height });
                }
            }

            Ok(events)
        }

        fn is_open(&self) -> bool {
            self.open
        }
    }

    impl Drop for WindowSurface {
        fn drop(&mut self) {
            let _ = highgui::destroy_window(&self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_counts_frames_and_never_closes() {
        let mut surface = HeadlessSurface::new(Viewport::new(320, 200));
        let image = RgbaImage::new(320, 200);
        for _ in 0..3 {
            assert!(surface.present(&image, false).unwrap().is_empty());
        }
        assert_eq!(surface.presented, 3);
        assert!(surface.is_open());
        assert_eq!(surface.viewport(), Viewport::new(320, 200));
    }

    #[test]
    fn test_open_headless() {
        let surface = open(Viewport::new(640, 360), true).unwrap();
        assert!(surface.is_open());
        assert_eq!(surface.viewport(), Viewport::new(640, 360));
    }

    #[cfg(not(feature = "window"))]
    #[test]
    fn test_windowless_build_requires_headless() {
        let err = open(Viewport::new(640, 360), false).err().unwrap();
        assert!(err.to_string().contains("--headless"));
    }
}
