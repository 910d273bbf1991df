//! The render loop: one composed frame per tick until the surface closes or
//! the process is interrupted.

use crate::engine::{DetectionUpdate, FrameRx};
use crate::surface::Surface;
use anyhow::{Context, Result};
use image::{DynamicImage, RgbaImage};
use panopticon_fx::{HostEvent, Session};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

const SUMMARY_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub fps: u32,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
    /// Write the last composed frame here on exit.
    pub save_last_frame: Option<PathBuf>,
}

/// Drive `session` until the surface closes, Ctrl-C arrives, or
/// `max_frames` is reached. Returns the number of frames rendered.
pub async fn run(
    session: &mut Session,
    surface: &mut dyn Surface,
    frames: FrameRx,
    mut detections: watch::Receiver<DetectionUpdate>,
    options: RunOptions,
) -> Result<u64> {
    let period = Duration::from_secs_f64(1.0 / f64::from(options.fps.max(1)));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let initial = surface.viewport();
    session.handle_event(HostEvent::Resize { width: initial.width, height: initial.height });

    let mut rendered = 0u64;
    let mut last_frame: Option<RgbaImage> = None;
    let mut last_summary = Instant::now();
    let mut last_sequence = 0u64;

    tracing::info!(fps = options.fps, "render loop started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                tracing::info!("interrupted, shutting down");
                break;
            }
        }

        let now = Instant::now();
        if detections.has_changed().unwrap_or(false) {
            let update = detections.borrow_and_update().clone();
            last_sequence = update.sequence;
            tracing::trace!(
                pass = update.sequence,
                frame = update.frame_sequence,
                faces = update.detections.len(),
                "applying detections"
            );
            session.apply_detections(update.detections.as_ref().clone(), now);
        }

        let frame = frames.borrow().clone();
        let composed = session.render(
            frame.as_deref().map(|f| &f.image),
            now,
            chrono::Local::now().time(),
        );

        for event in surface.present(&composed, session.is_fullscreen())? {
            session.handle_event(event);
        }
        last_frame = Some(composed);
        rendered += 1;

        if last_summary.elapsed() >= SUMMARY_INTERVAL {
            tracing::debug!(
                frames = rendered,
                detection_passes = last_sequence,
                faces = session.detections().len(),
                split = session.split_active(),
                zoom = session.camera().current().zoom,
                thumbnails = session.recorder().len(),
                "render summary"
            );
            last_summary = Instant::now();
        }

        if !surface.is_open() {
            tracing::info!("surface closed");
            break;
        }
        if options.max_frames.is_some_and(|max| rendered >= max) {
            break;
        }
    }

    if let (Some(path), Some(image)) = (options.save_last_frame.as_ref(), last_frame) {
        // Flatten alpha so any format the extension picks can encode it.
        DynamicImage::ImageRgba8(image)
            .to_rgb8()
            .save(path)
            .with_context(|| format!("failed to save last frame to {}", path.display()))?;
        tracing::info!(path = %path.display(), "saved last frame");
    }

    tracing::info!(frames = rendered, "render loop finished");
    Ok(rendered)
}
