//! Scenario parameters consumed by the growth engine.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coefficients::{CoefficientRange, CoefficientSweep};
use crate::constants::SLOPE_TABLE_LEN;
use crate::numbers::usize_to_f64;

/// Errors raised when scenario invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ScenarioError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} must be finite (got {value})")]
    NonFinite { field: &'static str, value: f64 },
    #[error("critical_low {low} exceeds critical_high {high}")]
    CriticalBounds { low: f64, high: f64 },
    #[error("prediction start {start} is after prediction stop {stop}")]
    PredictionWindow { start: u32, stop: u32 },
    #[error("coefficient {field}: start {start} exceeds stop {stop}")]
    SweepBounds {
        field: &'static str,
        start: u32,
        stop: u32,
    },
    #[error("monte_carlo_iterations must be at least 1")]
    NoIterations,
}

/// Flags gating verbose per-year diagnostic logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingFlags {
    #[serde(default)]
    pub log_urbanization_attempts: bool,
    #[serde(default)]
    pub log_self_modification: bool,
    #[serde(default)]
    pub log_year_stats: bool,
}

/// Read-only scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub coefficients: CoefficientSweep,
    #[serde(default = "Scenario::default_critical_slope")]
    pub critical_slope: f64,
    #[serde(default = "Scenario::default_critical_high")]
    pub critical_high: f64,
    #[serde(default = "Scenario::default_critical_low")]
    pub critical_low: f64,
    #[serde(default = "Scenario::default_boom")]
    pub boom: f64,
    #[serde(default = "Scenario::default_bust")]
    pub bust: f64,
    #[serde(default = "Scenario::default_slope_sensitivity")]
    pub slope_sensitivity: f64,
    #[serde(default = "Scenario::default_road_grav_sensitivity")]
    pub road_grav_sensitivity: f64,
    #[serde(default = "Scenario::default_monte_carlo_iterations")]
    pub monte_carlo_iterations: usize,
    #[serde(default)]
    pub prediction_start_date: Option<u32>,
    #[serde(default)]
    pub prediction_stop_date: Option<u32>,
    #[serde(default = "Scenario::default_random_seed")]
    pub random_seed: u64,
    #[serde(default)]
    pub logging: LoggingFlags,
}

impl Scenario {
    const fn default_critical_slope() -> f64 {
        21.0
    }

    const fn default_critical_high() -> f64 {
        1.3
    }

    const fn default_critical_low() -> f64 {
        0.97
    }

    const fn default_boom() -> f64 {
        1.01
    }

    const fn default_bust() -> f64 {
        0.09
    }

    const fn default_slope_sensitivity() -> f64 {
        0.1
    }

    const fn default_road_grav_sensitivity() -> f64 {
        0.01
    }

    const fn default_monte_carlo_iterations() -> usize {
        10
    }

    const fn default_random_seed() -> u64 {
        1
    }

    /// Load a scenario from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a scenario.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Critical slope clamped to the slope table range.
    #[must_use]
    pub fn clamped_critical_slope(&self) -> f64 {
        let max = usize_to_f64(SLOPE_TABLE_LEN);
        if self.critical_slope.is_nan() {
            return 0.0;
        }
        self.critical_slope.clamp(0.0, max)
    }

    /// Check scenario invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let finite = [
            ("critical_slope", self.critical_slope),
            ("critical_high", self.critical_high),
            ("critical_low", self.critical_low),
            ("slope_sensitivity", self.slope_sensitivity),
            ("road_grav_sensitivity", self.road_grav_sensitivity),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(ScenarioError::NonFinite { field, value });
            }
        }
        Self::ensure_range("slope_sensitivity", self.slope_sensitivity, 0.0, f64::MAX)?;
        Self::ensure_range(
            "road_grav_sensitivity",
            self.road_grav_sensitivity,
            0.0,
            f64::MAX,
        )?;
        Self::ensure_range("boom", self.boom, 1.0, 100.0)?;
        Self::ensure_range("bust", self.bust, 0.0, 1.0)?;
        if self.critical_low > self.critical_high {
            return Err(ScenarioError::CriticalBounds {
                low: self.critical_low,
                high: self.critical_high,
            });
        }
        if self.monte_carlo_iterations == 0 {
            return Err(ScenarioError::NoIterations);
        }
        if let (Some(start), Some(stop)) = (self.prediction_start_date, self.prediction_stop_date)
            && start > stop
        {
            return Err(ScenarioError::PredictionWindow { start, stop });
        }
        self.coefficients.validate()
    }

    fn ensure_range(
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    ) -> Result<(), ScenarioError> {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(ScenarioError::RangeViolation {
                field,
                min,
                max,
                value,
            })
        }
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            coefficients: CoefficientSweep::default(),
            critical_slope: Self::default_critical_slope(),
            critical_high: Self::default_critical_high(),
            critical_low: Self::default_critical_low(),
            boom: Self::default_boom(),
            bust: Self::default_bust(),
            slope_sensitivity: Self::default_slope_sensitivity(),
            road_grav_sensitivity: Self::default_road_grav_sensitivity(),
            monte_carlo_iterations: Self::default_monte_carlo_iterations(),
            prediction_start_date: None,
            prediction_stop_date: None,
            random_seed: Self::default_random_seed(),
            logging: LoggingFlags::default(),
        }
    }
}

impl CoefficientSweep {
    pub(crate) fn validate(&self) -> Result<(), ScenarioError> {
        for (field, range) in self.named_ranges() {
            Self::validate_range(field, range)?;
        }
        Ok(())
    }

    fn validate_range(field: &'static str, range: &CoefficientRange) -> Result<(), ScenarioError> {
        if range.start > range.stop {
            return Err(ScenarioError::SweepBounds {
                field,
                start: range.start,
                stop: range.stop,
            });
        }
        for value in [range.start, range.stop] {
            if !(1..=100).contains(&value) {
                return Err(ScenarioError::RangeViolation {
                    field,
                    min: 1.0,
                    max: 100.0,
                    value: f64::from(value),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_uses_defaults() {
        let scenario = Scenario::from_json("{}").unwrap();
        assert_eq!(scenario, Scenario::default());
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn json_overrides_named_fields() {
        let json = r#"{
            "critical_slope": 15.0,
            "boom": 1.2,
            "monte_carlo_iterations": 3,
            "prediction_start_date": 2000,
            "prediction_stop_date": 2030,
            "coefficients": {
                "diffusion": { "start": 1, "stop": 51, "step": 25 }
            },
            "logging": { "log_year_stats": true }
        }"#;
        let scenario = Scenario::from_json(json).unwrap();
        assert!((scenario.critical_slope - 15.0).abs() < f64::EPSILON);
        assert!((scenario.boom - 1.2).abs() < f64::EPSILON);
        assert_eq!(scenario.monte_carlo_iterations, 3);
        assert_eq!(scenario.coefficients.diffusion.stop, 51);
        assert!(scenario.logging.log_year_stats);
        assert!(!scenario.logging.log_self_modification);
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn validate_flags_bad_values() {
        let scenario = Scenario {
            critical_low: 2.0,
            critical_high: 1.0,
            ..Scenario::default()
        };
        assert_eq!(
            scenario.validate(),
            Err(ScenarioError::CriticalBounds {
                low: 2.0,
                high: 1.0
            })
        );

        let scenario = Scenario {
            monte_carlo_iterations: 0,
            ..Scenario::default()
        };
        assert_eq!(scenario.validate(), Err(ScenarioError::NoIterations));

        let scenario = Scenario {
            prediction_start_date: Some(2020),
            prediction_stop_date: Some(2010),
            ..Scenario::default()
        };
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::PredictionWindow { .. })
        ));

        let mut scenario = Scenario::default();
        scenario.coefficients.breed = CoefficientRange::new(60, 10, 5);
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::SweepBounds { field: "breed", .. })
        ));
    }

    #[test]
    fn negative_sensitivities_are_rejected() {
        let scenario = Scenario {
            slope_sensitivity: -1.0,
            ..Scenario::default()
        };
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::RangeViolation {
                field: "slope_sensitivity",
                ..
            })
        ));

        let scenario = Scenario {
            road_grav_sensitivity: -0.5,
            ..Scenario::default()
        };
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::RangeViolation {
                field: "road_grav_sensitivity",
                ..
            })
        ));

        let scenario = Scenario {
            slope_sensitivity: 0.0,
            road_grav_sensitivity: 0.0,
            ..Scenario::default()
        };
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn critical_slope_is_clamped() {
        let scenario = Scenario {
            critical_slope: 400.0,
            ..Scenario::default()
        };
        assert!((scenario.clamped_critical_slope() - 256.0).abs() < f64::EPSILON);
        let scenario = Scenario {
            critical_slope: -3.0,
            ..Scenario::default()
        };
        assert!(scenario.clamped_critical_slope().abs() < f64::EPSILON);
    }
}
