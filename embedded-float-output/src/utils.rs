use crate::{LEVEL_MAX, LEVEL_MIN};

/// Quantize a normalized level onto `0..=full_scale` taps.
///
/// Levels outside `[0.0, 1.0]` are clamped, `NaN` maps to zero.
/// The result is rounded to the nearest tap.
pub fn level_to_taps(level: f32, full_scale: u16) -> u16 {
    if level.is_nan() {
        return 0;
    }
    let level = level.clamp(LEVEL_MIN, LEVEL_MAX);
    (level * full_scale as f32 + 0.5) as u16
}

/// Convert a tap count on a `0..=full_scale` range back to a normalized level.
///
/// Tap counts above `full_scale` saturate at [`LEVEL_MAX`].
pub fn taps_to_level(taps: u16, full_scale: u16) -> f32 {
    if full_scale == 0 {
        return LEVEL_MIN;
    }
    (taps.min(full_scale) as f32) / (full_scale as f32)
}
