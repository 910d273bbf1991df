use panopticon_core::{DetectorOptions, FrameSize};
use panopticon_fx::{SessionConfig, Viewport};
use std::path::PathBuf;

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the SCRFD ONNX model.
    pub model_dir: PathBuf,
    /// Capture resolution requested from the camera.
    pub frame_size: FrameSize,
    pub max_faces: usize,
    pub refine_landmarks: bool,
    pub flip_horizontal: bool,
    /// Render ticks per second.
    pub fps: u32,
    /// Initial window size, and the fixed size when headless.
    pub viewport: Viewport,
    /// Requested split-view column count; 1 disables split view.
    pub split_count: usize,
}

impl Config {
    /// Load configuration from `PANOPTICON_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_dir = lookup("PANOPTICON_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                lookup("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| {
                        let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                        PathBuf::from(home).join(".local/share")
                    })
                    .join("panopticon/models")
            });

        let parsed = |key: &str, default| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let flag = |key: &str| lookup(key).map(|v| v != "0").unwrap_or(false);

        Self {
            camera_device: lookup("PANOPTICON_CAMERA_DEVICE")
                .unwrap_or_else(|| "/dev/video0".to_string()),
            model_dir,
            frame_size: FrameSize::default(),
            max_faces: parsed("PANOPTICON_MAX_FACES", 5),
            refine_landmarks: flag("PANOPTICON_REFINE_LANDMARKS"),
            flip_horizontal: flag("PANOPTICON_FLIP_HORIZONTAL"),
            fps: (parsed("PANOPTICON_FPS", 60) as u32).max(1),
            viewport: lookup("PANOPTICON_VIEWPORT")
                .and_then(|v| parse_viewport(&v))
                .unwrap_or(Viewport::new(1280, 720)),
            split_count: lookup("PANOPTICON_SPLITS")
                .map(|v| parse_split_count(&v))
                .unwrap_or(1),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir
            .join("det_10g.onnx")
            .to_string_lossy()
            .into_owned()
    }

    pub fn detector_options(&self) -> DetectorOptions {
        DetectorOptions {
            max_faces: self.max_faces,
            refine_landmarks: self.refine_landmarks,
            flip_horizontal: self.flip_horizontal,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            frame_size: self.frame_size,
            split_count: self.split_count,
            ..Default::default()
        }
    }
}

/// Parse a requested split count the way a lenient integer parser would:
/// leading whitespace and sign, then digits, trailing junk ignored. Anything
/// unparsable or below 1 becomes 1.
pub fn parse_split_count(raw: &str) -> usize {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    match digits[..end].parse::<usize>() {
        Ok(n) if !negative && n >= 1 => n,
        _ => 1,
    }
}

/// Parse `WIDTHxHEIGHT` (e.g. `1280x720`).
pub fn parse_viewport(raw: &str) -> Option<Viewport> {
    let (w, h) = raw.trim().split_once(['x', 'X'])?;
    let width: u32 = w.trim().parse().ok()?;
    let height: u32 = h.trim().parse().ok()?;
    (width > 0 && height > 0).then_some(Viewport::new(width, height))
}
