//! Heads-up display: camera label, wall clock and blinking REC indicator,
//! set in the bundled DejaVu Sans Mono.

use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use chrono::{NaiveTime, Timelike};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use std::sync::OnceLock;

pub const HUD_LABEL: &str = "CAM 01";
pub const HUD_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const REC_ON_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
/// Frames per full on/off cycle of the REC indicator.
pub const REC_BLINK_PERIOD: u64 = 30;

const HUD_MARGIN_X: f32 = 10.0;
const HUD_BASELINE_Y: f32 = 20.0;
/// Distance of the REC text from the right edge.
const REC_OFFSET_X: f32 = 46.0;
/// Text height in pixels.
const HUD_TEXT_SIZE: f32 = 14.0;

static FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

fn font() -> Option<&'static FontRef<'static>> {
    static FONT: OnceLock<Option<FontRef<'static>>> = OnceLock::new();
    FONT.get_or_init(|| match FontRef::try_from_slice(FONT_DATA) {
        Ok(font) => Some(font),
        Err(err) => {
            tracing::error!(error = ?err, "HUD font unreadable; text disabled");
            None
        }
    })
    .as_ref()
}

/// `HH:MM:SS`, zero-padded.
pub fn format_clock(time: NaiveTime) -> String {
    format!("{:02}:{:02}:{:02}", time.hour(), time.minute(), time.second())
}

/// REC colour for a given frame: red for the first half of each blink
/// period, green for the second.
pub fn rec_indicator_color(frame_count: u64) -> Rgba<u8> {
    if frame_count % REC_BLINK_PERIOD < REC_BLINK_PERIOD / 2 {
        REC_ON_COLOR
    } else {
        HUD_COLOR
    }
}

/// Draw `text` with its baseline at `baseline_y`.
pub fn draw_text(canvas: &mut RgbaImage, text: &str, x: f32, baseline_y: f32, color: Rgba<u8>) {
    let Some(font) = font() else {
        return;
    };
    let scale = PxScale::from(HUD_TEXT_SIZE);
    let top = baseline_y - font.as_scaled(scale).ascent();
    draw_text_mut(canvas, color, x.round() as i32, top.round() as i32, scale, font, text);
}

pub fn draw_hud(canvas: &mut RgbaImage, clock: NaiveTime, frame_count: u64) {
    let label = format!("{HUD_LABEL}  {}", format_clock(clock));
    draw_text(canvas, &label, HUD_MARGIN_X, HUD_BASELINE_Y, HUD_COLOR);

    let rec_x = canvas.width() as f32 - REC_OFFSET_X;
    draw_text(canvas, "REC", rec_x, HUD_BASELINE_Y, rec_indicator_color(frame_count));
}
