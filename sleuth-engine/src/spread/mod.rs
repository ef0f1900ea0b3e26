//! One simulated year of SLEUTH growth.
//!
//! The five growth rules run in a fixed order against a shared Delta buffer:
//! spontaneous growth with new spreading centres (phases 1 and 3), organic
//! edge growth (phase 4) and road-influenced growth (phase 5). Phases read
//! the committed grid Z and never see each other's tentative growth except
//! through Delta, which is filtered and merged into Z once all phases ran.
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::coefficients::CoefficientValues;
use crate::constants::{
    DIFFUSION_SCALE, FULLY_EXCLUDED, LOG_SPREAD, MIN_NEIGHBORS_TO_SPREAD,
    ORGANIC_MAX_URBAN_NEIGHBORS, ORGANIC_MIN_URBAN_NEIGHBORS, ORGANIC_TAG, ROAD_NEIGHBOR_ROUNDS,
    ROAD_TAG, SPONTANEOUS_TAG, SPREADING_CENTER_ATTEMPTS, SPREADING_CENTER_TAG, URBAN_THRESHOLD,
};
use crate::grid::{NEIGHBOR_OFFSETS, Raster};
use crate::numbers::{floor_f64_to_usize, usize_to_f64};
use crate::random::RandomStream;
use crate::slope::SlopeWeightTable;

pub mod road;

/// Tally of urbanization attempts and why they failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrbanizationAttempts {
    pub successes: u64,
    pub z_failures: u64,
    pub delta_failures: u64,
    pub slope_failures: u64,
    pub excluded_failures: u64,
}

impl UrbanizationAttempts {
    /// Attempts of every outcome.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.successes
            + self.z_failures
            + self.delta_failures
            + self.slope_failures
            + self.excluded_failures
    }

    /// Fold another tally into this one.
    pub fn accumulate(&mut self, other: &Self) {
        self.successes += other.successes;
        self.z_failures += other.z_failures;
        self.delta_failures += other.delta_failures;
        self.slope_failures += other.slope_failures;
        self.excluded_failures += other.excluded_failures;
    }
}

/// Counters produced by one year of spread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct YearGrowth {
    /// Mean slope under the pixels newly urbanized this year.
    pub avg_slope: f64,
    /// Pixels that turned urban in Z this year.
    pub growth_pixels: usize,
    /// Pixels claimed by spontaneous growth.
    pub spontaneous: usize,
    /// Pixels claimed around new spreading centres.
    pub spreading_centers: usize,
    /// Pixels claimed by organic edge growth.
    pub organic: usize,
    /// Pixels claimed by road-influenced growth.
    pub road_trips: usize,
    /// Urban pixels in Z after the merge.
    pub population: usize,
    pub attempts: UrbanizationAttempts,
}

/// Read-only rasters consulted during spread.
#[derive(Debug, Clone, Copy)]
pub struct SpreadLayers<'a> {
    pub roads: &'a Raster,
    pub slope: &'a Raster,
    pub excluded: &'a Raster,
}

/// Owns the Delta scratch buffer and runs the yearly growth phases.
#[derive(Debug, Clone)]
pub struct SpreadEngine {
    delta: Raster,
    log_attempts: bool,
}

impl SpreadEngine {
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            delta: Raster::zeroed(rows, cols),
            log_attempts: false,
        }
    }

    /// Emit the per-year attempt tally at debug level.
    #[must_use]
    pub const fn with_attempt_logging(mut self, enabled: bool) -> Self {
        self.log_attempts = enabled;
        self
    }

    /// Delta buffer as left by the last `spread` call.
    #[must_use]
    pub const fn delta(&self) -> &Raster {
        &self.delta
    }

    /// Run every growth phase for one year and merge the result into `z`.
    pub fn spread(
        &mut self,
        z: &mut Raster,
        layers: SpreadLayers<'_>,
        coeffs: &CoefficientValues,
        weights: &SlopeWeightTable,
        rng: &mut RandomStream,
    ) -> YearGrowth {
        if self.delta.rows() != z.rows() || self.delta.cols() != z.cols() {
            self.delta = Raster::zeroed(z.rows(), z.cols());
        } else {
            self.delta.clear();
        }

        let mut growth = YearGrowth::default();
        {
            let mut pass = YearPass {
                z: &*z,
                layers,
                weights,
                delta: &mut self.delta,
                rng,
                attempts: UrbanizationAttempts::default(),
            };
            let (spontaneous, spreading_centers) = pass.spontaneous_and_spreading_centers(coeffs);
            growth.spontaneous = spontaneous;
            growth.spreading_centers = spreading_centers;
            growth.organic = pass.organic(coeffs);
            growth.road_trips = pass.road_influenced(coeffs);
            growth.attempts = pass.attempts;
        }
        trace!(
            target: LOG_SPREAD,
            "phases: spontaneous={} centers={} organic={} road={}",
            growth.spontaneous,
            growth.spreading_centers,
            growth.organic,
            growth.road_trips
        );

        self.filter_delta(layers.excluded);
        let (growth_pixels, slope_total) = self.merge_into(z, layers.slope);
        growth.growth_pixels = growth_pixels;
        growth.avg_slope = if growth_pixels > 0 {
            slope_total / usize_to_f64(growth_pixels)
        } else {
            0.0
        };
        growth.population = z.count_at_least(URBAN_THRESHOLD);

        if self.log_attempts {
            let a = growth.attempts;
            debug!(
                target: LOG_SPREAD,
                "urbanize attempts={} ok={} z_fail={} delta_fail={} slope_fail={} excl_fail={}",
                a.total(),
                a.successes,
                a.z_failures,
                a.delta_failures,
                a.slope_failures,
                a.excluded_failures
            );
        }
        growth
    }

    fn filter_delta(&mut self, excluded: &Raster) {
        for (cell, &protection) in self
            .delta
            .cells_mut()
            .iter_mut()
            .zip(excluded.cells().iter())
        {
            if *cell > ROAD_TAG {
                *cell = 0;
            }
            if protection >= FULLY_EXCLUDED {
                *cell = 0;
            }
        }
    }

    fn merge_into(&self, z: &mut Raster, slope: &Raster) -> (usize, f64) {
        let mut count = 0usize;
        let mut slope_total = 0.0;
        for ((target, &tag), &pixel_slope) in z
            .cells_mut()
            .iter_mut()
            .zip(self.delta.cells().iter())
            .zip(slope.cells().iter())
        {
            if *target == 0 && tag != 0 {
                *target = tag;
                slope_total += f64::from(pixel_slope);
                count += 1;
            }
        }
        (count, slope_total)
    }
}

/// Borrowed state for the phases of one year.
struct YearPass<'a> {
    z: &'a Raster,
    layers: SpreadLayers<'a>,
    weights: &'a SlopeWeightTable,
    delta: &'a mut Raster,
    rng: &'a mut RandomStream,
    attempts: UrbanizationAttempts,
}

impl YearPass<'_> {
    /// Acceptance test for one pixel. Rejections are tallied, not errors.
    fn urbanize(&mut self, row: usize, col: usize, tag: u8) -> bool {
        let offset = self.z.offset(row, col);
        if self.z.cells()[offset] != 0 {
            self.attempts.z_failures += 1;
            return false;
        }
        if self.delta.cells()[offset] != 0 {
            self.attempts.delta_failures += 1;
            return false;
        }
        let draw = self.rng.uniform_float();
        if draw <= self.weights.weight(self.layers.slope.cells()[offset]) {
            self.attempts.slope_failures += 1;
            return false;
        }
        let protection_draw = self.rng.uniform_int(0, 99);
        if usize::from(self.layers.excluded.cells()[offset]) >= protection_draw {
            self.attempts.excluded_failures += 1;
            return false;
        }
        self.delta.cells_mut()[offset] = tag;
        self.attempts.successes += 1;
        true
    }

    /// Urbanize the first in-bounds neighbour found from a random offset.
    fn urbanize_neighbor(
        &mut self,
        row: usize,
        col: usize,
        tag: u8,
    ) -> Option<((usize, usize), bool)> {
        let first = self.rng.uniform_int(0, NEIGHBOR_OFFSETS.len() - 1);
        let target = (0..NEIGHBOR_OFFSETS.len()).find_map(|step| {
            self.z
                .shifted(row, col, NEIGHBOR_OFFSETS[(first + step) % NEIGHBOR_OFFSETS.len()])
        })?;
        let urbanized = self.urbanize(target.0, target.1, tag);
        Some((target, urbanized))
    }

    /// Phases 1 and 3. Returns `(spontaneous, spreading_centers)` pixel counts.
    fn spontaneous_and_spreading_centers(&mut self, coeffs: &CoefficientValues) -> (usize, usize) {
        let rows = self.z.rows();
        let cols = self.z.cols();
        if rows < 3 || cols < 3 {
            return (0, 0);
        }
        let diagonal = usize_to_f64(rows * rows + cols * cols).sqrt();
        let diffusion_value = coeffs.diffusion * DIFFUSION_SCALE * diagonal;
        let tries = 1 + floor_f64_to_usize(diffusion_value);

        let mut spontaneous = 0;
        let mut spreading_centers = 0;
        for _ in 0..tries {
            let row = self.rng.uniform_int(1, rows - 2);
            let col = self.rng.uniform_int(1, cols - 2);
            if !self.urbanize(row, col, SPONTANEOUS_TAG) {
                continue;
            }
            spontaneous += 1;

            if usize_to_f64(self.rng.uniform_int(0, 99)) < coeffs.breed {
                let mut grown = 0;
                for _ in 0..SPREADING_CENTER_ATTEMPTS {
                    if let Some((_, true)) = self.urbanize_neighbor(row, col, SPREADING_CENTER_TAG) {
                        grown += 1;
                        if grown >= MIN_NEIGHBORS_TO_SPREAD {
                            break;
                        }
                    }
                }
                spreading_centers += grown;
            }
        }
        (spontaneous, spreading_centers)
    }

    /// Phase 4: edge growth from partially surrounded urban pixels.
    fn organic(&mut self, coeffs: &CoefficientValues) -> usize {
        let rows = self.z.rows();
        let cols = self.z.cols();
        let mut organic = 0;
        for row in 1..rows.saturating_sub(1) {
            for col in 1..cols.saturating_sub(1) {
                if self.z.get(row, col) == 0 {
                    continue;
                }
                if usize_to_f64(self.rng.uniform_int(0, 99)) >= coeffs.spread {
                    continue;
                }
                let urban_neighbors = NEIGHBOR_OFFSETS
                    .iter()
                    .filter_map(|&delta| self.z.shifted(row, col, delta))
                    .filter(|&(r, c)| self.z.get(r, c) != 0)
                    .count();
                if !(ORGANIC_MIN_URBAN_NEIGHBORS..=ORGANIC_MAX_URBAN_NEIGHBORS)
                    .contains(&urban_neighbors)
                {
                    continue;
                }
                let delta = NEIGHBOR_OFFSETS[self.rng.uniform_int(0, NEIGHBOR_OFFSETS.len() - 1)];
                if let Some((r, c)) = self.z.shifted(row, col, delta)
                    && self.urbanize(r, c, ORGANIC_TAG)
                {
                    organic += 1;
                }
            }
        }
        organic
    }

    /// Phase 5: growth pulled along the road network from this year's
    /// growth centres.
    fn road_influenced(&mut self, coeffs: &CoefficientValues) -> usize {
        let rows = self.z.rows();
        let cols = self.z.cols();
        let centers: Vec<(usize, usize)> = self
            .delta
            .cells()
            .iter()
            .enumerate()
            .filter(|&(_, &tag)| tag != 0)
            .map(|(offset, _)| (offset / cols, offset % cols))
            .collect();
        if centers.is_empty() {
            return 0;
        }

        let trips = 1 + floor_f64_to_usize(coeffs.breed);
        let search_budget = road::max_search_index(coeffs.road_gravity, rows, cols);
        let roads = self.layers.roads;
        let mut urbanized = 0;
        for _ in 0..trips {
            let Some(&(row, col)) = self.rng.choice(&centers) else {
                break;
            };
            let Some(road_start) = road::search(roads, row, col, search_budget) else {
                continue;
            };
            let Some((end_row, end_col)) =
                road::walk(roads, road_start, coeffs.diffusion, self.rng)
            else {
                continue;
            };
            let Some((mut anchor, true)) = self.urbanize_neighbor(end_row, end_col, ROAD_TAG)
            else {
                continue;
            };
            urbanized += 1;
            for _ in 0..ROAD_NEIGHBOR_ROUNDS {
                if let Some((cell, true)) = self.urbanize_neighbor(anchor.0, anchor.1, ROAD_TAG) {
                    anchor = cell;
                    urbanized += 1;
                }
            }
        }
        urbanized
    }
}
