//! Boom/bust self-modification of the growth coefficients.
use log::debug;

use crate::coefficients::CoefficientState;
use crate::constants::{
    LOG_COEFF, MAX_BREED, MAX_DIFFUSION, MAX_ROAD_GRAVITY, MAX_SLOPE_RESISTANCE, MAX_SPREAD,
    MIN_BREED, MIN_DIFFUSION, MIN_ROAD_GRAVITY, MIN_SLOPE_RESISTANCE, MIN_SPREAD,
};
use crate::scenario::Scenario;

/// Thresholds and multipliers driving self-modification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelfModification {
    pub critical_high: f64,
    pub critical_low: f64,
    pub boom: f64,
    pub bust: f64,
    pub slope_sensitivity: f64,
    pub road_grav_sensitivity: f64,
    pub log_changes: bool,
}

impl SelfModification {
    #[must_use]
    pub const fn from_scenario(scenario: &Scenario) -> Self {
        Self {
            critical_high: scenario.critical_high,
            critical_low: scenario.critical_low,
            boom: scenario.boom,
            bust: scenario.bust,
            slope_sensitivity: scenario.slope_sensitivity,
            road_grav_sensitivity: scenario.road_grav_sensitivity,
            log_changes: scenario.logging.log_self_modification,
        }
    }

    /// Adjust `coeffs` for the next year from this year's growth rate and
    /// percent urban.
    ///
    /// The boom and bust tests are independent; both fire when both hold.
    pub fn apply(&self, coeffs: &mut CoefficientState, growth_rate: f64, percent_urban: f64) {
        let before = *coeffs.current();

        if growth_rate > self.critical_high {
            let current = *coeffs.current();
            let slope = (current.slope_resistance - percent_urban * self.slope_sensitivity)
                .min(MAX_SLOPE_RESISTANCE);
            coeffs.set_slope_resistance(floor_to_one(slope, MIN_SLOPE_RESISTANCE));

            let road = (current.road_gravity + percent_urban * self.road_grav_sensitivity)
                .min(MAX_ROAD_GRAVITY);
            coeffs.set_road_gravity(floor_to_one(road, MIN_ROAD_GRAVITY));

            if current.diffusion < MAX_DIFFUSION {
                coeffs.set_diffusion((current.diffusion * self.boom).min(MAX_DIFFUSION));
                coeffs.set_breed((current.breed * self.boom).min(MAX_BREED));
                coeffs.set_spread((current.spread * self.boom).min(MAX_SPREAD));
            }
        }

        if growth_rate < self.critical_low {
            let current = *coeffs.current();
            let slope = (current.slope_resistance + percent_urban * self.slope_sensitivity)
                .min(MAX_SLOPE_RESISTANCE);
            coeffs.set_slope_resistance(floor_to_one(slope, MIN_SLOPE_RESISTANCE));

            let road = (current.road_gravity - percent_urban * self.road_grav_sensitivity)
                .min(MAX_ROAD_GRAVITY);
            coeffs.set_road_gravity(floor_to_one(road, MIN_ROAD_GRAVITY));

            if growth_rate < self.critical_low && current.diffusion > 0.0 {
                coeffs.set_diffusion(floor_to_one(current.diffusion * self.bust, MIN_DIFFUSION));
                coeffs.set_spread(floor_to_one(current.spread * self.bust, MIN_SPREAD));
                coeffs.set_breed(floor_to_one(current.breed * self.bust, MIN_BREED));
            }
        }

        if self.log_changes && before != *coeffs.current() {
            debug!(
                target: LOG_COEFF,
                "self-modify growth_rate={growth_rate:.3} percent_urban={percent_urban:.3}: {before:?} -> {:?}",
                coeffs.current()
            );
        }
    }
}

fn floor_to_one(value: f64, min: f64) -> f64 {
    if value <= min { 1.0 } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::SavedCoefficients;

    fn state(d: u32, b: u32, s: u32, sr: u32, rg: u32) -> CoefficientState {
        CoefficientState::from_start(SavedCoefficients {
            diffusion: d,
            breed: b,
            spread: s,
            slope_resistance: sr,
            road_gravity: rg,
        })
    }

    fn rule() -> SelfModification {
        SelfModification::from_scenario(&Scenario {
            critical_high: 1.3,
            critical_low: 0.97,
            boom: 1.5,
            bust: 0.5,
            slope_sensitivity: 0.1,
            road_grav_sensitivity: 0.01,
            ..Scenario::default()
        })
    }

    #[test]
    fn boom_year_scales_up_growth_coefficients() {
        let mut coeffs = state(20, 30, 40, 50, 50);
        rule().apply(&mut coeffs, 5.0, 20.0);
        let c = coeffs.current();
        assert!((c.diffusion - 30.0).abs() < 1e-9);
        assert!((c.breed - 45.0).abs() < 1e-9);
        assert!((c.spread - 60.0).abs() < 1e-9);
        assert!((c.slope_resistance - 48.0).abs() < 1e-9);
        assert!((c.road_gravity - 50.2).abs() < 1e-9);
    }

    #[test]
    fn boom_caps_at_maximum_and_skips_when_diffusion_maxed() {
        let mut coeffs = state(90, 90, 90, 2, 100);
        rule().apply(&mut coeffs, 5.0, 50.0);
        let c = *coeffs.current();
        assert!((c.diffusion - 100.0).abs() < 1e-9);
        assert!((c.breed - 100.0).abs() < 1e-9);
        assert!((c.road_gravity - 100.0).abs() < 1e-9);
        assert!((c.slope_resistance - 1.0).abs() < 1e-9);

        let spread_before = c.spread;
        rule().apply(&mut coeffs, 5.0, 0.0);
        assert!((coeffs.current().spread - spread_before).abs() < 1e-9);
    }

    #[test]
    fn bust_year_scales_down_and_floors_to_one() {
        let mut coeffs = state(3, 40, 1, 99, 2);
        rule().apply(&mut coeffs, 0.1, 50.0);
        let c = coeffs.current();
        assert!((c.diffusion - 1.5).abs() < 1e-9);
        assert!((c.breed - 20.0).abs() < 1e-9);
        assert!((c.spread - 1.0).abs() < 1e-9);
        assert!((c.slope_resistance - 100.0).abs() < 1e-9);
        assert!((c.road_gravity - 1.5).abs() < 1e-9);
    }

    #[test]
    fn neutral_year_leaves_coefficients_untouched() {
        let mut coeffs = state(20, 30, 40, 50, 60);
        let before = *coeffs.current();
        rule().apply(&mut coeffs, 1.0, 30.0);
        assert_eq!(*coeffs.current(), before);
    }

    #[test]
    fn inverted_thresholds_fire_both_branches() {
        let inverted = SelfModification {
            critical_high: 1.0,
            critical_low: 3.0,
            ..rule()
        };
        let mut coeffs = state(20, 20, 20, 50, 50);
        inverted.apply(&mut coeffs, 2.0, 10.0);
        let c = coeffs.current();
        // boom: 20 * 1.5 = 30, then bust: 30 * 0.5 = 15
        assert!((c.diffusion - 15.0).abs() < 1e-9);
        // boom: 50 - 1 = 49, then bust: 49 + 1 = 50
        assert!((c.slope_resistance - 50.0).abs() < 1e-9);
    }

    #[test]
    fn negative_sensitivities_cannot_push_coefficients_out_of_bounds() {
        let reversed = SelfModification {
            slope_sensitivity: -1.0,
            road_grav_sensitivity: -1.0,
            ..rule()
        };
        let mut coeffs = state(20, 20, 20, 50, 50);
        for _ in 0..5 {
            reversed.apply(&mut coeffs, 5.0, 40.0);
            assert!(coeffs.current().within_bounds(), "{:?}", coeffs.current());
        }
        let c = coeffs.current();
        assert!((c.slope_resistance - 100.0).abs() < 1e-9);
        assert!((c.road_gravity - 1.0).abs() < 1e-9);

        for _ in 0..5 {
            reversed.apply(&mut coeffs, 0.1, 40.0);
            assert!(coeffs.current().within_bounds(), "{:?}", coeffs.current());
        }
        let c = coeffs.current();
        assert!((c.slope_resistance - 1.0).abs() < 1e-9);
        assert!((c.road_gravity - 100.0).abs() < 1e-9);
    }

    #[test]
    fn saved_copy_tracks_modified_values() {
        let mut coeffs = state(20, 30, 40, 50, 50);
        rule().apply(&mut coeffs, 5.0, 20.0);
        assert_eq!(coeffs.saved().diffusion, 30);
        assert_eq!(coeffs.saved().slope_resistance, 48);
    }
}
