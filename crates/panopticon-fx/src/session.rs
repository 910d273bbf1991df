//! Session state and the per-tick render pipeline.

use crate::camera::{CameraController, BBOX_MARGIN, SMOOTHING};
use crate::compose::{self, BACKGROUND};
use crate::filmstrip::{FilmstripConfig, ThumbnailRecorder};
use crate::geometry::Viewport;
use crate::grade::{self, SCANLINE_SPACING};
use crate::hud;
use crate::split;
use chrono::NaiveTime;
use image::{RgbImage, RgbaImage};
use panopticon_core::{Detection, FrameSize};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub frame_size: FrameSize,
    /// Requested split-view column count; values <= 1 disable split view.
    pub split_count: usize,
    pub smoothing: f32,
    pub margin: f32,
    pub filmstrip: FilmstripConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_size: FrameSize::default(),
            split_count: 1,
            smoothing: SMOOTHING,
            margin: BBOX_MARGIN,
            filmstrip: FilmstripConfig::default(),
        }
    }
}

/// Input from the host surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Resize { width: u32, height: u32 },
    Key(char),
}

/// Key that toggles fullscreen.
pub const FULLSCREEN_KEY: char = 'f';

/// All mutable state of one viewing session.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    viewport: Viewport,
    camera: CameraController,
    recorder: ThumbnailRecorder,
    detections: Vec<Detection>,
    frame_count: u64,
    fullscreen: bool,
}

impl Session {
    pub fn new(config: SessionConfig, viewport: Viewport) -> Self {
        Self {
            camera: CameraController::with_params(config.frame_size, config.smoothing, config.margin),
            recorder: ThumbnailRecorder::new(config.filmstrip, viewport.width),
            config,
            viewport,
            detections: Vec::new(),
            frame_count: 0,
            fullscreen: false,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    pub fn recorder(&self) -> &ThumbnailRecorder {
        &self.recorder
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Replace the detection set with the latest detector result.
    pub fn apply_detections(&mut self, detections: Vec<Detection>, now: Instant) {
        self.recorder.observe(!detections.is_empty(), now);
        self.detections = detections;
    }

    pub fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Resize { width, height } => {
                let viewport = Viewport::new(width.max(1), height.max(1));
                if viewport != self.viewport {
                    tracing::debug!(width = viewport.width, height = viewport.height, "viewport resized");
                    self.viewport = viewport;
                    self.recorder.set_viewport_width(viewport.width);
                }
            }
            HostEvent::Key(c) if c.eq_ignore_ascii_case(&FULLSCREEN_KEY) => {
                self.fullscreen = !self.fullscreen;
                tracing::info!(fullscreen = self.fullscreen, "toggled fullscreen");
            }
            HostEvent::Key(_) => {}
        }
    }

    /// Whether this tick will render split view.
    pub fn split_active(&self) -> bool {
        self.config.split_count > 1 && !self.detections.is_empty()
    }

    /// Compose one frame: camera or split view, grade, scanlines, HUD, then
    /// the filmstrip (captures see everything except the filmstrip itself).
    pub fn render(&mut self, frame: Option<&RgbImage>, now: Instant, clock: NaiveTime) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(self.viewport.width, self.viewport.height, BACKGROUND);
        let frame_size = self.config.frame_size;

        match split::split_layout(
            self.viewport,
            &self.detections,
            self.config.split_count,
            frame_size,
            self.config.margin,
        ) {
            Some(columns) => split::render_columns(&mut canvas, frame, &columns),
            None => {
                self.camera.retarget(&self.detections);
                self.camera.tick();
                compose::render_single_view(
                    &mut canvas,
                    frame,
                    &self.detections,
                    &self.camera.current(),
                    frame_size,
                );
            }
        }

        grade::green_tint(&mut canvas);
        grade::draw_scanlines(&mut canvas, SCANLINE_SPACING);
        hud::draw_hud(&mut canvas, clock, self.frame_count);

        if self.recorder.should_capture(!self.detections.is_empty(), now) {
            self.recorder.capture(&canvas, now);
            tracing::debug!(
                thumbnails = self.recorder.len(),
                capacity = self.recorder.capacity(),
                "captured thumbnail"
            );
        }
        self.recorder.draw(&mut canvas);

        self.frame_count += 1;
        canvas
    }
}
