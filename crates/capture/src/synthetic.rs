//! Synthetic frame generator
//!
//! Draws a green bar sliding left to right plus the local time, so a
//! viewer can tell the feed is live without a camera attached.

use chrono::{NaiveTime, Timelike};
use image::{Rgb, RgbImage};

use crate::glyphs::draw_text;

/// Horizontal travel per tick in pixels
pub const BAR_STEP: i64 = 10;
/// Bar width in pixels
pub const BAR_WIDTH: i64 = 100;
/// Bar height in pixels
pub const BAR_HEIGHT: u32 = 40;

const BAR_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const TEXT_ORIGIN: (u32, u32) = (10, 12);
const TEXT_SCALE: u32 = 2;

/// Left edge of the bar for a tick; may be negative or past the right edge
pub fn bar_position(tick: u64, width: u32) -> i64 {
    let span = width as u64 + BAR_WIDTH as u64;
    // Reduce first so the product cannot overflow
    let offset = (tick % span) * BAR_STEP as u64 % span;
    offset as i64 - BAR_WIDTH / 2
}

/// Label drawn on every synthetic frame
pub fn synthetic_label(clock: NaiveTime) -> String {
    format!(
        "SYNTHETIC {:02}:{:02}:{:02}",
        clock.hour(),
        clock.minute(),
        clock.second()
    )
}

/// Render the synthetic frame for a tick at the given local time
///
/// Pure: the same tick and clock always give the same pixels.
pub fn synthetic_frame(width: u32, height: u32, tick: u64, clock: NaiveTime) -> RgbImage {
    let mut image = RgbImage::new(width, height);

    let x = bar_position(tick, width);
    let left = x.max(0);
    let right = (x + BAR_WIDTH).min(width as i64);
    let top = (height / 2).saturating_sub(BAR_HEIGHT / 2);
    let bottom = (top + BAR_HEIGHT).min(height);

    if left < right {
        for py in top..bottom {
            for px in left as u32..right as u32 {
                image.put_pixel(px, py, BAR_COLOR);
            }
        }
    }

    draw_text(
        &mut image,
        &synthetic_label(clock),
        TEXT_ORIGIN.0,
        TEXT_ORIGIN.1,
        TEXT_SCALE,
        TEXT_COLOR,
    );

    image
}
