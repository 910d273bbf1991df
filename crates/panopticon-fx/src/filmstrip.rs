//! Periodic screenshots of the composed view, kept in a bounded FIFO strip
//! along the bottom edge.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const BORDER_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilmstripConfig {
    /// Minimum time between captures while faces stay in view.
    pub interval: Duration,
    pub thumb_width: u32,
    pub thumb_height: u32,
    /// Gap between thumbnails and around the strip.
    pub spacing: u32,
}

impl Default for FilmstripConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            thumb_width: 120,
            // Same aspect as the 640x480 capture
            thumb_height: 90,
            spacing: 10,
        }
    }
}

impl FilmstripConfig {
    /// How many thumbnails fit across a viewport `viewport_width` wide.
    pub fn capacity(&self, viewport_width: u32) -> usize {
        (viewport_width.saturating_sub(self.spacing) / (self.thumb_width + self.spacing)) as usize
    }
}

/// An immutable snapshot of one composed frame, already at thumbnail size.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    image: Arc<RgbaImage>,
}

impl Thumbnail {
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Capture timer plus the filmstrip itself.
///
/// The timer is armed the moment faces appear and disarmed the moment they
/// disappear; while armed, a capture happens once the interval has passed.
#[derive(Debug)]
pub struct ThumbnailRecorder {
    config: FilmstripConfig,
    thumbnails: VecDeque<Thumbnail>,
    last_capture: Option<Instant>,
    capacity: usize,
}

impl ThumbnailRecorder {
    pub fn new(config: FilmstripConfig, viewport_width: u32) -> Self {
        Self {
            config,
            thumbnails: VecDeque::new(),
            last_capture: None,
            capacity: config.capacity(viewport_width),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.thumbnails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thumbnails.is_empty()
    }

    pub fn is_armed(&self) -> bool {
        self.last_capture.is_some()
    }

    /// Oldest first.
    pub fn thumbnails(&self) -> impl Iterator<Item = &Thumbnail> {
        self.thumbnails.iter()
    }

    /// Feed a detector result: arm on the first face, disarm on none.
    pub fn observe(&mut self, has_faces: bool, now: Instant) {
        if !has_faces {
            self.last_capture = None;
        } else if self.last_capture.is_none() {
            self.last_capture = Some(now);
        }
    }

    pub fn should_capture(&self, has_faces: bool, now: Instant) -> bool {
        has_faces
            && self
                .last_capture
                .is_some_and(|last| now.saturating_duration_since(last) > self.config.interval)
    }

    /// Snapshot `composed`, append it and restart the interval.
    pub fn capture(&mut self, composed: &RgbaImage, now: Instant) {
        let thumb = imageops::resize(
            composed,
            self.config.thumb_width,
            self.config.thumb_height,
            FilterType::Triangle,
        );
        self.thumbnails.push_back(Thumbnail { image: Arc::new(thumb) });
        self.last_capture = Some(now);
        self.evict();
    }

    pub fn set_viewport_width(&mut self, viewport_width: u32) {
        self.capacity = self.config.capacity(viewport_width);
        self.evict();
    }

    fn evict(&mut self) {
        while self.thumbnails.len() > self.capacity {
            self.thumbnails.pop_front();
        }
    }

    /// Lay the strip out left to right along the bottom edge, each thumbnail
    /// with a plain border.
    pub fn draw(&self, canvas: &mut RgbaImage) {
        let FilmstripConfig { thumb_width: tw, thumb_height: th, spacing, .. } = self.config;
        if tw == 0 || th == 0 {
            return;
        }
        let y = canvas.height() as i64 - th as i64 - spacing as i64;

        for (i, thumb) in self.thumbnails.iter().enumerate() {
            let x = spacing as i64 + i as i64 * (tw + spacing) as i64;
            imageops::replace(canvas, thumb.image(), x, y);
            draw_hollow_rect_mut(canvas, Rect::at(x as i32, y as i32).of_size(tw, th), BORDER_COLOR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(value: u8) -> RgbaImage {
        RgbaImage::from_pixel(64, 48, Rgba([value, value, value, 255]))
    }

    fn first_pixel(thumb: &Thumbnail) -> u8 {
        thumb.image().get_pixel(0, 0).0[0]
    }

    #[test]
    fn test_capacity_formula() {
        let config = FilmstripConfig::default();
        assert_eq!(config.capacity(1280), 9); // (1270) / 130
        assert_eq!(config.capacity(140), 1);
        assert_eq!(config.capacity(139), 0);
        assert_eq!(config.capacity(5), 0);
    }

    #[test]
    fn test_not_armed_until_faces() {
        let mut rec = ThumbnailRecorder::new(FilmstripConfig::default(), 1280);
        let t0 = Instant::now();
        assert!(!rec.is_armed());
        assert!(!rec.should_capture(true, t0 + Duration::from_secs(60)));

        rec.observe(true, t0);
        assert!(rec.is_armed());
        assert!(!rec.should_capture(true, t0 + Duration::from_millis(2000)));
        assert!(rec.should_capture(true, t0 + Duration::from_millis(2001)));
    }

    #[test]
    fn test_rearming_does_not_restart_timer() {
        let mut rec = ThumbnailRecorder::new(FilmstripConfig::default(), 1280);
        let t0 = Instant::now();
        rec.observe(true, t0);
        rec.observe(true, t0 + Duration::from_millis(1500));
        assert!(rec.should_capture(true, t0 + Duration::from_millis(2100)));
    }

    #[test]
    fn test_empty_detections_disarm() {
        let mut rec = ThumbnailRecorder::new(FilmstripConfig::default(), 1280);
        let t0 = Instant::now();
        rec.observe(true, t0);
        for i in 1..=5 {
            rec.observe(false, t0 + Duration::from_millis(i * 100));
        }
        assert!(!rec.is_armed());
        assert!(!rec.should_capture(false, t0 + Duration::from_secs(100)));
        assert!(!rec.should_capture(true, t0 + Duration::from_secs(100)));
    }

    #[test]
    fn test_no_capture_without_faces_even_when_armed() {
        let mut rec = ThumbnailRecorder::new(FilmstripConfig::default(), 1280);
        let t0 = Instant::now();
        rec.observe(true, t0);
        assert!(!rec.should_capture(false, t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_capture_resets_interval() {
        let mut rec = ThumbnailRecorder::new(FilmstripConfig::default(), 1280);
        let t0 = Instant::now();
        rec.observe(true, t0);
        let t1 = t0 + Duration::from_millis(2500);
        rec.capture(&solid(1), t1);
        assert_eq!(rec.len(), 1);
        assert!(!rec.should_capture(true, t1 + Duration::from_millis(1000)));
        assert!(rec.should_capture(true, t1 + Duration::from_millis(2001)));
    }

    #[test]
    fn test_capture_downscales() {
        let mut rec = ThumbnailRecorder::new(FilmstripConfig::default(), 1280);
        rec.capture(&RgbaImage::from_pixel(1280, 720, Rgba([7, 7, 7, 255])), Instant::now());
        let thumb = rec.thumbnails().next().unwrap();
        assert_eq!(thumb.image().dimensions(), (120, 90));
    }

    #[test]
    fn test_fifo_eviction_at_capacity() {
        // 400 px wide: (390) / 130 = 3 thumbnails
        let mut rec = ThumbnailRecorder::new(FilmstripConfig::default(), 400);
        assert_eq!(rec.capacity(), 3);
        let t0 = Instant::now();
        for i in 0..7u8 {
            rec.capture(&solid(i * 10), t0 + Duration::from_secs(3 * i as u64));
            assert!(rec.len() <= rec.capacity());
        }
        let kept: Vec<u8> = rec.thumbnails().map(first_pixel).collect();
        assert_eq!(kept, vec![40, 50, 60]);
    }

    #[test]
    fn test_shrinking_viewport_evicts_oldest() {
        let mut rec = ThumbnailRecorder::new(FilmstripConfig::default(), 1280);
        let t0 = Instant::now();
        for i in 0..5u8 {
            rec.capture(&solid(i), t0);
        }
        rec.set_viewport_width(270); // capacity 2
        let kept: Vec<u8> = rec.thumbnails().map(first_pixel).collect();
        assert_eq!(kept, vec![3, 4]);
        rec.set_viewport_width(0);
        assert!(rec.is_empty());
    }

    #[test]
    fn test_draw_places_strip_along_bottom() {
        let mut rec = ThumbnailRecorder::new(FilmstripConfig::default(), 400);
        rec.capture(&solid(77), Instant::now());
        rec.capture(&solid(99), Instant::now());
        let mut canvas = RgbaImage::from_pixel(400, 300, Rgba([0, 0, 0, 255]));
        rec.draw(&mut canvas);
        // y = 300 - 90 - 10 = 200; first at x = 10, second at x = 140
        assert_eq!(canvas.get_pixel(60, 250).0[0], 77);
        assert_eq!(canvas.get_pixel(190, 250).0[0], 99);
        assert_eq!(*canvas.get_pixel(10, 200), BORDER_COLOR);
        assert_eq!(*canvas.get_pixel(129, 289), BORDER_COLOR);
        assert_eq!(*canvas.get_pixel(60, 200), BORDER_COLOR);
        assert_eq!(*canvas.get_pixel(60, 150), Rgba([0, 0, 0, 255]));
    }
}
