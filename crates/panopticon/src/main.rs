use anyhow::{Context, Result};
use clap::Parser;
use panopticon_fx::Session;
use panopticon_hw::Camera;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod engine;
mod surface;

use config::Config;
use engine::FrameSourceKind;

#[derive(Parser)]
#[command(name = "panopticon", about = "Live webcam view styled as a surveillance camera, zooming onto faces")]
struct Cli {
    /// Split-view column count; 1 keeps the single zooming view
    #[arg(long)]
    splits: Option<String>,
    /// V4L2 capture device (e.g., /dev/video0)
    #[arg(long)]
    device: Option<String>,
    /// Directory containing det_10g.onnx
    #[arg(long)]
    model_dir: Option<PathBuf>,
    /// Use a still image instead of the camera
    #[arg(long, conflicts_with = "device")]
    still: Option<PathBuf>,
    /// Render without opening a window
    #[arg(long)]
    headless: bool,
    /// Render ticks per second
    #[arg(long)]
    fps: Option<u32>,
    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,
    /// Save the last composed frame to this path on exit
    #[arg(long)]
    save_last_frame: Option<PathBuf>,
    /// List V4L2 capture devices and exit
    #[arg(long)]
    list_devices: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(raw) = &self.splits {
            config.split_count = config::parse_split_count(raw);
        }
        if let Some(device) = &self.device {
            config.camera_device = device.clone();
        }
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if let Some(fps) = self.fps {
            config.fps = fps.max(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.list_devices {
        let devices = Camera::list_devices();
        if devices.is_empty() {
            println!("No V4L2 capture devices found");
        }
        for dev in devices {
            println!("{}  {} ({}, {})", dev.path.display(), dev.card, dev.driver, dev.bus);
        }
        return Ok(());
    }

    let mut config = Config::from_env();
    cli.apply(&mut config);

    tracing::info!(
        device = %config.camera_device,
        model = %config.scrfd_model_path(),
        splits = config.split_count,
        fps = config.fps,
        "panopticon starting"
    );

    let mut surface = surface::open(config.viewport, cli.headless)?;

    let source = match &cli.still {
        Some(path) => FrameSourceKind::Still {
            path: path.clone(),
            interval: Duration::from_millis(100),
        },
        None => FrameSourceKind::Camera {
            device: config.camera_device.clone(),
        },
    };

    let frames = engine::spawn_frame_source(source, config.frame_size)
        .context("failed to spawn capture thread")?;
    let detections = engine::spawn_detector(
        config.scrfd_model_path(),
        config.detector_options(),
        frames.clone(),
        tokio::runtime::Handle::current(),
    )
    .context("failed to spawn detector thread")?;

    let mut session = Session::new(config.session_config(), surface.viewport());

    let options = app::RunOptions {
        fps: config.fps,
        max_frames: cli.frames,
        save_last_frame: cli.save_last_frame.clone(),
    };
    app::run(&mut session, surface.as_mut(), frames, detections, options).await?;

    tracing::info!("panopticon exiting");
    Ok(())
}
