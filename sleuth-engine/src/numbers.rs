//! Numeric conversion helpers centralizing the engine's lossy casts.

use num_traits::cast::cast;

/// Convert a pixel count or index to f64, allowing precision loss in one place.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Floor a f64 into a usize, returning 0 for negative or non-finite values.
#[must_use]
pub fn floor_f64_to_usize(value: f64) -> usize {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    cast::<f64, usize>(value.floor()).unwrap_or(usize::MAX)
}

/// Truncate a coefficient to its integer form, clamping into `u32`.
#[must_use]
pub fn truncate_f64_to_u32(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let max = cast::<u32, f64>(u32::MAX).unwrap_or(f64::MAX);
    cast::<f64, u32>(value.min(max).trunc()).unwrap_or(0)
}

/// Round a f64 into the u8 raster range, saturating at the bounds.
#[must_use]
pub fn round_f64_to_u8(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    cast::<f64, u8>(value.round().clamp(0.0, 255.0)).unwrap_or(0)
}
