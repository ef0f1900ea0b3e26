//! Growth coefficients, their bounds and the sweep ranges that enumerate them.
use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_BREED, MAX_DIFFUSION, MAX_ROAD_GRAVITY, MAX_SLOPE_RESISTANCE, MAX_SPREAD, MIN_BREED,
    MIN_DIFFUSION, MIN_ROAD_GRAVITY, MIN_SLOPE_RESISTANCE, MIN_SPREAD,
};
use crate::numbers::truncate_f64_to_u32;

/// Live coefficient values. Self-modification scales them continuously, so
/// they are held as floats between yearly updates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoefficientValues {
    pub diffusion: f64,
    pub breed: f64,
    pub spread: f64,
    pub slope_resistance: f64,
    pub road_gravity: f64,
}

impl CoefficientValues {
    #[must_use]
    pub const fn new(
        diffusion: f64,
        breed: f64,
        spread: f64,
        slope_resistance: f64,
        road_gravity: f64,
    ) -> Self {
        Self {
            diffusion,
            breed,
            spread,
            slope_resistance,
            road_gravity,
        }
    }

    /// Whether every coefficient sits within its global bounds.
    #[must_use]
    pub fn within_bounds(&self) -> bool {
        (MIN_DIFFUSION..=MAX_DIFFUSION).contains(&self.diffusion)
            && (MIN_BREED..=MAX_BREED).contains(&self.breed)
            && (MIN_SPREAD..=MAX_SPREAD).contains(&self.spread)
            && (MIN_SLOPE_RESISTANCE..=MAX_SLOPE_RESISTANCE).contains(&self.slope_resistance)
            && (MIN_ROAD_GRAVITY..=MAX_ROAD_GRAVITY).contains(&self.road_gravity)
    }
}

impl From<SavedCoefficients> for CoefficientValues {
    fn from(value: SavedCoefficients) -> Self {
        Self {
            diffusion: f64::from(value.diffusion),
            breed: f64::from(value.breed),
            spread: f64::from(value.spread),
            slope_resistance: f64::from(value.slope_resistance),
            road_gravity: f64::from(value.road_gravity),
        }
    }
}

/// Integer coefficients as recorded against each simulated year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SavedCoefficients {
    pub diffusion: u32,
    pub breed: u32,
    pub spread: u32,
    pub slope_resistance: u32,
    pub road_gravity: u32,
}

impl From<CoefficientValues> for SavedCoefficients {
    fn from(value: CoefficientValues) -> Self {
        Self {
            diffusion: truncate_f64_to_u32(value.diffusion),
            breed: truncate_f64_to_u32(value.breed),
            spread: truncate_f64_to_u32(value.spread),
            slope_resistance: truncate_f64_to_u32(value.slope_resistance),
            road_gravity: truncate_f64_to_u32(value.road_gravity),
        }
    }
}

/// Owned coefficient state for one simulation.
///
/// `saved` mirrors `current` every time a value is set, so the record for a
/// year carries the coefficients actually used before self-modification
/// rewrites `current` for the next year.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientState {
    current: CoefficientValues,
    saved: SavedCoefficients,
    start: SavedCoefficients,
}

impl CoefficientState {
    /// Initialize from a sweep point's start values.
    #[must_use]
    pub fn from_start(start: SavedCoefficients) -> Self {
        Self {
            current: start.into(),
            saved: start,
            start,
        }
    }

    #[must_use]
    pub const fn current(&self) -> &CoefficientValues {
        &self.current
    }

    #[must_use]
    pub const fn saved(&self) -> SavedCoefficients {
        self.saved
    }

    #[must_use]
    pub const fn start(&self) -> SavedCoefficients {
        self.start
    }

    /// Replace every current value, refreshing the saved mirror.
    pub fn set_current(&mut self, values: CoefficientValues) {
        self.current = values;
        self.saved = values.into();
    }

    /// Restore the start values (beginning of a new Monte Carlo iteration).
    pub fn reset(&mut self) {
        self.set_current(self.start.into());
    }

    pub fn set_diffusion(&mut self, value: f64) {
        self.current.diffusion = value;
        self.saved.diffusion = truncate_f64_to_u32(value);
    }

    pub fn set_breed(&mut self, value: f64) {
        self.current.breed = value;
        self.saved.breed = truncate_f64_to_u32(value);
    }

    pub fn set_spread(&mut self, value: f64) {
        self.current.spread = value;
        self.saved.spread = truncate_f64_to_u32(value);
    }

    pub fn set_slope_resistance(&mut self, value: f64) {
        self.current.slope_resistance = value;
        self.saved.slope_resistance = truncate_f64_to_u32(value);
    }

    pub fn set_road_gravity(&mut self, value: f64) {
        self.current.road_gravity = value;
        self.saved.road_gravity = truncate_f64_to_u32(value);
    }
}

/// Inclusive `start..=stop` range walked in `step` increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoefficientRange {
    pub start: u32,
    pub stop: u32,
    #[serde(default)]
    pub step: u32,
}

impl CoefficientRange {
    #[must_use]
    pub const fn new(start: u32, stop: u32, step: u32) -> Self {
        Self { start, stop, step }
    }

    /// A range holding a single value.
    #[must_use]
    pub const fn fixed(value: u32) -> Self {
        Self::new(value, value, 0)
    }

    /// Values visited by the sweep. A zero step visits `start` only.
    #[must_use]
    pub fn values(&self) -> Vec<u32> {
        if self.step == 0 || self.stop <= self.start {
            return vec![self.start];
        }
        (self.start..=self.stop)
            .step_by(self.step as usize)
            .collect()
    }
}

impl Default for CoefficientRange {
    fn default() -> Self {
        Self::fixed(50)
    }
}

/// Per-coefficient sweep ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoefficientSweep {
    #[serde(default)]
    pub diffusion: CoefficientRange,
    #[serde(default)]
    pub breed: CoefficientRange,
    #[serde(default)]
    pub spread: CoefficientRange,
    #[serde(default)]
    pub slope_resistance: CoefficientRange,
    #[serde(default)]
    pub road_gravity: CoefficientRange,
}

impl CoefficientSweep {
    /// Sweep holding one fixed point.
    #[must_use]
    pub const fn single(point: SavedCoefficients) -> Self {
        Self {
            diffusion: CoefficientRange::fixed(point.diffusion),
            breed: CoefficientRange::fixed(point.breed),
            spread: CoefficientRange::fixed(point.spread),
            slope_resistance: CoefficientRange::fixed(point.slope_resistance),
            road_gravity: CoefficientRange::fixed(point.road_gravity),
        }
    }

    pub(crate) const fn named_ranges(&self) -> [(&'static str, &CoefficientRange); 5] {
        [
            ("diffusion", &self.diffusion),
            ("breed", &self.breed),
            ("spread", &self.spread),
            ("slope_resistance", &self.slope_resistance),
            ("road_gravity", &self.road_gravity),
        ]
    }

    /// Number of combinations the sweep visits.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.named_ranges()
            .iter()
            .map(|(_, range)| range.values().len())
            .product()
    }

    /// Start points of every combination, diffusion outermost and
    /// road gravity innermost.
    #[must_use]
    pub fn points(&self) -> Vec<SavedCoefficients> {
        let mut points = Vec::with_capacity(self.point_count());
        for diffusion in self.diffusion.values() {
            for breed in self.breed.values() {
                for spread in self.spread.values() {
                    for slope_resistance in self.slope_resistance.values() {
                        for road_gravity in self.road_gravity.values() {
                            points.push(SavedCoefficients {
                                diffusion,
                                breed,
                                spread,
                                slope_resistance,
                                road_gravity,
                            });
                        }
                    }
                }
            }
        }
        points
    }
}
