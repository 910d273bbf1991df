//! V4L2 webcam capture via the `v4l` crate.

use crate::frame::{self, Frame, FrameError};
use image::RgbImage;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::capability::Flags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

/// Mmap buffers queued with the driver while streaming.
const STREAM_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("no capture device at {0}")]
    Missing(PathBuf),
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} is not a video capture device")]
    NotCapture(PathBuf),
    #[error("format negotiation failed: {0}")]
    Format(String),
    #[error("stream error: {0}")]
    Stream(#[source] io::Error),
}

/// A V4L2 capture node found on the system.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub card: String,
    pub driver: String,
    pub bus: String,
}

/// Pixel layouts the capture path can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel, shared chroma per pixel pair).
    Yuyv,
    /// Packed 24-bit RGB (3 bytes/pixel).
    Rgb3,
    /// Motion-JPEG, one JPEG image per buffer.
    Mjpg,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(Self::Yuyv),
            b"RGB3" => Some(Self::Rgb3),
            b"MJPG" => Some(Self::Mjpg),
            _ => None,
        }
    }

    /// Decode one driver buffer of `width`×`height` pixels.
    fn decode(self, buf: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
        let bad_dims = || FrameError::BadDimensions { width, height };
        match self {
            Self::Yuyv => {
                let rgb = frame::yuyv_to_rgb(buf, width, height)?;
                RgbImage::from_raw(width, height, rgb).ok_or_else(bad_dims)
            }
            Self::Rgb3 => {
                let len = width as usize * height as usize * 3;
                let pixels = buf.get(..len).ok_or_else(bad_dims)?;
                RgbImage::from_raw(width, height, pixels.to_vec()).ok_or_else(bad_dims)
            }
            Self::Mjpg => Ok(image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg)?.to_rgb8()),
        }
    }
}

/// An open webcam with a negotiated capture format.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open `device_path` (e.g. "/dev/video0") and ask for `width`×`height`.
    /// The driver may settle on another size; frames come out at whatever
    /// was negotiated.
    pub fn open(device_path: &str, width: u32, height: u32) -> Result<Self, CameraError> {
        let path = PathBuf::from(device_path);
        if !path.exists() {
            return Err(CameraError::Missing(path));
        }

        let device = Device::with_path(&path).map_err(|source| CameraError::Open {
            path: path.clone(),
            source,
        })?;
        let caps = device.query_caps().map_err(|source| CameraError::Open {
            path: path.clone(),
            source,
        })?;
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            return Err(CameraError::NotCapture(path));
        }
        tracing::info!(path = %path.display(), card = %caps.card, driver = %caps.driver, "opened camera");

        let (width, height, pixel_format) = negotiate(&device, width, height)?;
        Ok(Self {
            device,
            width,
            height,
            pixel_format,
        })
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Stream frames into `on_frame` until it returns `false` or the driver
    /// fails. Buffers that fail to decode are skipped.
    pub fn stream<F>(&self, mut on_frame: F) -> Result<(), CameraError>
    where
        F: FnMut(Frame) -> bool,
    {
        let mut stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(CameraError::Stream)?;

        loop {
            let (buf, meta) = stream.next().map_err(CameraError::Stream)?;
            let image = match self.pixel_format.decode(buf, self.width, self.height) {
                Ok(image) => image,
                Err(err) => {
                    tracing::debug!(seq = meta.sequence, error = %err, "skipping undecodable buffer");
                    continue;
                }
            };

            let keep_going = on_frame(Frame {
                image,
                sequence: meta.sequence,
            });
            if !keep_going {
                return Ok(());
            }
        }
    }

    /// Capture-capable V4L2 nodes, in index order.
    pub fn list_devices() -> Vec<DeviceInfo> {
        v4l::context::enum_devices()
            .into_iter()
            .filter_map(|node| {
                let caps = Device::new(node.index()).ok()?.query_caps().ok()?;
                caps.capabilities.contains(Flags::VIDEO_CAPTURE).then(|| DeviceInfo {
                    path: node.path().to_path_buf(),
                    card: caps.card,
                    driver: caps.driver,
                    bus: caps.bus,
                })
            })
            .collect()
    }
}

/// Prefer YUYV at the requested size; accept RGB3 or MJPG if that is what
/// the driver hands back.
fn negotiate(device: &Device, width: u32, height: u32) -> Result<(u32, u32, PixelFormat), CameraError> {
    let mut fmt = device
        .format()
        .map_err(|e| CameraError::Format(format!("query: {e}")))?;
    fmt.fourcc = FourCC::new(b"YUYV");
    fmt.width = width;
    fmt.height = height;

    let got = device
        .set_format(&fmt)
        .map_err(|e| CameraError::Format(format!("set: {e}")))?;
    let pixel_format = PixelFormat::from_fourcc(got.fourcc)
        .ok_or_else(|| CameraError::Format(format!("unsupported fourcc {}", got.fourcc)))?;

    tracing::info!(
        width = got.width,
        height = got.height,
        format = ?pixel_format,
        "negotiated capture format"
    );
    Ok((got.width, got.height, pixel_format))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_from_fourcc() {
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"YUYV")), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"RGB3")), Some(PixelFormat::Rgb3));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"MJPG")), Some(PixelFormat::Mjpg));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"GREY")), None);
    }

    #[test]
    fn test_decode_rgb3_trims_padding() {
        let mut buf = vec![9u8; 2 * 2 * 3];
        buf.extend_from_slice(&[0; 5]);
        let img = PixelFormat::Rgb3.decode(&buf, 2, 2).unwrap();
        assert_eq!(img.dimensions(), (2, 2));
        assert!(img.pixels().all(|p| p.0 == [9, 9, 9]));
    }

    #[test]
    fn test_decode_short_buffer_fails() {
        assert!(PixelFormat::Rgb3.decode(&[0; 5], 2, 2).is_err());
        assert!(PixelFormat::Yuyv.decode(&[0; 5], 2, 2).is_err());
    }

    #[test]
    fn test_open_missing_device() {
        let result = Camera::open("/dev/panopticon-does-not-exist", 640, 480);
        assert!(matches!(result, Err(CameraError::Missing(_))));
    }
}
