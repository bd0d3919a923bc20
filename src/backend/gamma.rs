//! Gamma table generation for wlr-gamma-control.
//!
//! The protocol takes three consecutive `u16` ramps (red, green, blue), each
//! `size` entries long, in native byte order. Every channel ramps linearly from
//! the black point to the white point, so swapping the two inverts the display.

use anyhow::Result;

use crate::core::ramp::Rgb;

/// Build the raw bytes handed to the compositor.
pub fn create_gamma_tables(size: usize, white: Rgb, black: Rgb) -> Result<Vec<u8>> {
    if size < 2 {
        anyhow::bail!("gamma ramp size {size} is too small");
    }

    let mut data = Vec::with_capacity(size * 3 * 2);
    for (from, to) in [(black.r, white.r), (black.g, white.g), (black.b, white.b)] {
        for value in channel_ramp(size, from, to) {
            data.extend_from_slice(&value.to_ne_bytes());
        }
    }
    Ok(data)
}

fn channel_ramp(size: usize, from: f32, to: f32) -> impl Iterator<Item = u16> {
    let last = (size - 1) as f32;
    (0..size).map(move |i| {
        let level = from + (to - from) * (i as f32 / last);
        to_u16(level)
    })
}

fn to_u16(level: f32) -> u16 {
    (level.clamp(0.0, 1.0) * f32::from(u16::MAX)).round() as u16
}
