//! Still-image frame source.
//!
//! Decodes one image from disk and hands it out as a frame on demand, so the
//! effect can be previewed without a webcam.

use crate::frame::{self, Frame, FrameError};
use image::RgbImage;
use std::path::Path;

pub struct StillSource {
    image: RgbImage,
    sequence: u32,
}

impl StillSource {
    /// Decode `path` and normalise it to the session frame size.
    pub fn open(path: &Path, width: u32, height: u32) -> Result<Self, FrameError> {
        let decoded = image::open(path)?.to_rgb8();
        tracing::info!(
            path = %path.display(),
            width = decoded.width(),
            height = decoded.height(),
            "loaded still frame source"
        );
        Ok(Self::from_image(decoded, width, height))
    }

    pub fn from_image(image: RgbImage, width: u32, height: u32) -> Self {
        Self {
            image: frame::normalize_size(image, width, height),
            sequence: 0,
        }
    }

    /// Produce the next frame. The pixels never change; only the sequence
    /// number advances.
    pub fn next_frame(&mut self) -> Frame {
        let frame = Frame {
            image: self.image.clone(),
            sequence: self.sequence,
        };
        self.sequence = self.sequence.wrapping_add(1);
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_still_source_sequence_advances() {
        let img = RgbImage::from_pixel(4, 3, image::Rgb([10, 20, 30]));
        let mut source = StillSource::from_image(img, 4, 3);
        let a = source.next_frame();
        let b = source.next_frame();
        assert_eq!(a.sequence, 0);
        assert_eq!(b.sequence, 1);
        assert_eq!(a.image, b.image);
        assert_eq!((b.width(), b.height()), (4, 3));
    }

    #[test]
    fn test_still_source_normalises_size() {
        let img = RgbImage::from_pixel(32, 24, image::Rgb([0, 0, 0]));
        let mut source = StillSource::from_image(img, 8, 6);
        assert_eq!(source.next_frame().image.dimensions(), (8, 6));
    }

    #[test]
    fn test_still_source_missing_file() {
        let result = StillSource::open(Path::new("/nonexistent/panopticon.png"), 8, 6);
        assert!(matches!(result, Err(FrameError::Decode(_))));
    }
}
