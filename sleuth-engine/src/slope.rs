//! Slope acceptance lookup table.
use crate::constants::{MAX_SLOPE_RESISTANCE, SLOPE_TABLE_LEN};
use crate::numbers::usize_to_f64;

/// Per-slope rejection thresholds, rebuilt whenever slope resistance changes.
///
/// An urbanization attempt on a pixel of slope `s` is rejected when a uniform
/// draw is at or below `weights[s]`; everything at or above the critical slope
/// has weight 1.0 and is always rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct SlopeWeightTable {
    weights: [f64; SLOPE_TABLE_LEN],
}

impl SlopeWeightTable {
    /// Build the table for one year.
    #[must_use]
    pub fn rebuild(slope_resistance: f64, critical_slope: f64) -> Self {
        let exponent = slope_resistance / (MAX_SLOPE_RESISTANCE / 2.0);
        // The base does not vary with the slope index; calibration output
        // depends on exactly this form.
        let base = (critical_slope - 1.0 / critical_slope).max(0.0);
        let below = 1.0 - base.powf(exponent);

        let mut weights = [1.0; SLOPE_TABLE_LEN];
        for (i, weight) in weights.iter_mut().enumerate() {
            if usize_to_f64(i) < critical_slope {
                *weight = below;
            }
        }
        Self { weights }
    }

    /// Threshold for a slope value.
    #[inline]
    #[must_use]
    pub fn weight(&self, slope: u8) -> f64 {
        self.weights[usize::from(slope)]
    }

    #[must_use]
    pub const fn as_slice(&self) -> &[f64; SLOPE_TABLE_LEN] {
        &self.weights
    }
}
