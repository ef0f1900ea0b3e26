//! One Monte Carlo iteration stepped year by year.
use log::debug;

use crate::coefficients::{CoefficientState, SavedCoefficients};
use crate::constants::{LOG_RUN, SEED_TAG};
use crate::controller::SelfModification;
use crate::error::SimulationError;
use crate::grid::{GridError, GridSource, Raster};
use crate::random::RandomStream;
use crate::record::YearRecord;
use crate::scenario::Scenario;
use crate::slope::SlopeWeightTable;
use crate::spread::{SpreadEngine, SpreadLayers, UrbanizationAttempts, YearGrowth};
use crate::stats::{StatisticsEngine, YearContext, leesalee};

/// Live state of one iteration: the urban grid Z, the coefficients it is
/// growing under and the engines that advance it.
#[derive(Debug)]
pub struct GrowthRun<'g, G: GridSource> {
    grids: &'g G,
    run: usize,
    iteration: usize,
    year: u32,
    z: Raster,
    coefficients: CoefficientState,
    controller: SelfModification,
    critical_slope: f64,
    spread: SpreadEngine,
    stats: StatisticsEngine,
    rng: RandomStream,
    attempts: UrbanizationAttempts,
}

impl<'g, G: GridSource> GrowthRun<'g, G> {
    /// Start from the first urban-history snapshot with a stream seeded by
    /// `seed`.
    ///
    /// # Errors
    ///
    /// Returns an error when the grid set has no urban history.
    pub fn new(
        grids: &'g G,
        scenario: &Scenario,
        coefficients: SavedCoefficients,
        seed: u64,
    ) -> Result<Self, SimulationError> {
        let year = grids
            .urban_years()
            .first()
            .copied()
            .ok_or(GridError::MissingUrbanHistory)?;
        Self::from_snapshot(grids, scenario, coefficients, year, RandomStream::new(seed))
    }

    /// Start iteration `iteration` of sweep point `run`, drawing from the
    /// stream derived from the scenario seed.
    ///
    /// # Errors
    ///
    /// Returns an error when the grid set has no urban history.
    pub fn for_iteration(
        grids: &'g G,
        scenario: &Scenario,
        coefficients: SavedCoefficients,
        run: usize,
        iteration: usize,
    ) -> Result<Self, SimulationError> {
        let year = grids
            .urban_years()
            .first()
            .copied()
            .ok_or(GridError::MissingUrbanHistory)?;
        let rng = RandomStream::for_iteration(scenario.random_seed, run, iteration);
        Ok(Self::from_snapshot(grids, scenario, coefficients, year, rng)?.with_labels(run, iteration))
    }

    /// Start from the urban snapshot of `year`. Every urban pixel of the
    /// snapshot is seeded into Z with the seed tag.
    ///
    /// # Errors
    ///
    /// Returns an error when no snapshot exists for `year`.
    pub fn from_snapshot(
        grids: &'g G,
        scenario: &Scenario,
        coefficients: SavedCoefficients,
        year: u32,
        rng: RandomStream,
    ) -> Result<Self, SimulationError> {
        let snapshot = grids
            .historical_urban_for_year(year)
            .ok_or(SimulationError::NoSnapshot { year })?;
        let mut z = Raster::zeroed(snapshot.rows(), snapshot.cols());
        for (cell, &urban) in z.cells_mut().iter_mut().zip(snapshot.cells()) {
            if urban != 0 {
                *cell = SEED_TAG;
            }
        }
        let (rows, cols) = grids.dimensions();
        Ok(Self {
            grids,
            run: 0,
            iteration: 0,
            year,
            z,
            coefficients: CoefficientState::from_start(coefficients),
            controller: SelfModification::from_scenario(scenario),
            critical_slope: scenario.clamped_critical_slope(),
            spread: SpreadEngine::new(rows, cols)
                .with_attempt_logging(scenario.logging.log_urbanization_attempts),
            stats: StatisticsEngine::new(scenario.logging.log_year_stats),
            rng,
            attempts: UrbanizationAttempts::default(),
        })
    }

    /// Label emitted records with a run and iteration.
    #[must_use]
    pub const fn with_labels(mut self, run: usize, iteration: usize) -> Self {
        self.run = run;
        self.iteration = iteration;
        self
    }

    /// Statistics of the starting grid, recorded under the snapshot year.
    ///
    /// # Errors
    ///
    /// Returns an error when the starting grid cannot be measured.
    pub fn seed_record(&mut self) -> Result<YearRecord, SimulationError> {
        let year = self.year;
        let mut stats = self
            .stats
            .compute_with_rates(&self.z, self.grids.slope(), self.context(year, 0))?;
        stats.leesalee = self
            .grids
            .historical_urban_for_year(year)
            .map(|history| leesalee(&self.z, history));
        Ok(YearRecord {
            run: self.run,
            iteration: self.iteration,
            year,
            coefficients: self.coefficients.saved(),
            growth: YearGrowth {
                population: stats.population,
                ..YearGrowth::default()
            },
            stats,
        })
    }

    /// Grow one year.
    ///
    /// Rebuilds the slope table from the current slope resistance, spreads
    /// with the road raster for `year`, measures the result and finally lets
    /// the growth rate retune the coefficients for the next year. The record
    /// carries the coefficients the year grew under.
    ///
    /// # Errors
    ///
    /// Returns an error when the grown grid cannot be measured.
    pub fn advance_year(&mut self, year: u32) -> Result<YearRecord, SimulationError> {
        let current = *self.coefficients.current();
        let weights = SlopeWeightTable::rebuild(current.slope_resistance, self.critical_slope);
        let layers = SpreadLayers {
            roads: self.grids.road_for_year(year),
            slope: self.grids.slope(),
            excluded: self.grids.excluded(),
        };
        let growth = self
            .spread
            .spread(&mut self.z, layers, &current, &weights, &mut self.rng);
        self.attempts.accumulate(&growth.attempts);

        let ctx = self.context(year, growth.growth_pixels);
        let mut stats = self
            .stats
            .compute_with_rates(&self.z, self.grids.slope(), ctx)?;
        stats.leesalee = self
            .grids
            .historical_urban_for_year(year)
            .map(|history| leesalee(&self.z, history));

        let saved = self.coefficients.saved();
        self.controller
            .apply(&mut self.coefficients, stats.growth_rate, stats.percent_urban);
        self.year = year;

        debug!(
            target: LOG_RUN,
            "run {} iteration {} year {}: +{} pixels, population {}",
            self.run,
            self.iteration,
            year,
            growth.growth_pixels,
            growth.population
        );

        Ok(YearRecord {
            run: self.run,
            iteration: self.iteration,
            year,
            coefficients: saved,
            growth,
            stats,
        })
    }

    fn context(&self, year: u32, growth_pixels: usize) -> YearContext {
        YearContext {
            growth_pixels,
            road_pixels: self.grids.road_pixel_count(year),
            excluded_pixels: self.grids.excluded_pixel_count(),
            total_pixels: self.grids.total_pixels(),
        }
    }

    /// Urban grid Z.
    #[must_use]
    pub const fn urban(&self) -> &Raster {
        &self.z
    }

    #[must_use]
    pub const fn coefficients(&self) -> &CoefficientState {
        &self.coefficients
    }

    /// Last year grown, or the snapshot year before the first step.
    #[must_use]
    pub const fn year(&self) -> u32 {
        self.year
    }

    /// Urbanization attempts summed over every year since the last reset.
    #[must_use]
    pub const fn attempts(&self) -> UrbanizationAttempts {
        self.attempts
    }

    pub fn reset_attempts(&mut self) {
        self.attempts = UrbanizationAttempts::default();
    }

    #[must_use]
    pub const fn rng(&self) -> &RandomStream {
        &self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::InMemoryGrids;
    use std::collections::BTreeMap;

    fn grids() -> InMemoryGrids {
        let mut urban = Raster::zeroed(12, 12);
        for row in 5..7 {
            for col in 5..7 {
                urban.set(row, col, 255);
            }
        }
        let mut roads = Raster::zeroed(12, 12);
        for col in 0..12 {
            roads.set(3, col, 100);
        }
        InMemoryGrids::new(
            Raster::filled(12, 12, 2),
            Raster::zeroed(12, 12),
            BTreeMap::from([(1990, roads)]),
            BTreeMap::from([(1990, urban)]),
        )
        .unwrap()
    }

    fn point() -> SavedCoefficients {
        SavedCoefficients {
            diffusion: 40,
            breed: 40,
            spread: 60,
            slope_resistance: 10,
            road_gravity: 30,
        }
    }

    #[test]
    fn seeding_tags_snapshot_pixels() {
        let grids = grids();
        let run = GrowthRun::new(&grids, &Scenario::default(), point(), 7).unwrap();
        assert_eq!(run.year(), 1990);
        assert_eq!(run.urban().count_nonzero(), 4);
        assert!(run.urban().cells().iter().all(|&c| c == 0 || c == SEED_TAG));
    }

    #[test]
    fn seed_record_matches_snapshot() {
        let grids = grids();
        let mut run = GrowthRun::new(&grids, &Scenario::default(), point(), 7).unwrap();
        let record = run.seed_record().unwrap();
        assert_eq!(record.year, 1990);
        assert_eq!(record.stats.area, 4);
        assert_eq!(record.stats.leesalee, Some(1.0));
        assert_eq!(record.growth.growth_pixels, 0);
    }

    #[test]
    fn advance_year_records_pre_modification_coefficients() {
        let grids = grids();
        let mut run = GrowthRun::new(&grids, &Scenario::default(), point(), 7).unwrap();
        let before = run.coefficients().saved();
        let record = run.advance_year(1991).unwrap();
        assert_eq!(record.coefficients, before);
        assert_eq!(record.year, 1991);
        assert_eq!(run.year(), 1991);
        assert!(record.stats.leesalee.is_none());
        assert_eq!(record.stats.population, run.urban().count_nonzero());
        assert!(record.stats.population >= 4);
    }

    #[test]
    fn attempts_accumulate_until_reset() {
        let grids = grids();
        let mut run = GrowthRun::new(&grids, &Scenario::default(), point(), 3).unwrap();
        let first = run.advance_year(1991).unwrap().growth.attempts;
        let second = run.advance_year(1992).unwrap().growth.attempts;
        assert_eq!(run.attempts().total(), first.total() + second.total());
        run.reset_attempts();
        assert_eq!(run.attempts().total(), 0);
    }

    #[test]
    fn missing_snapshot_is_an_error() {
        let grids = grids();
        let err = GrowthRun::from_snapshot(
            &grids,
            &Scenario::default(),
            point(),
            2005,
            RandomStream::new(1),
        )
        .unwrap_err();
        assert!(matches!(err, SimulationError::NoSnapshot { year: 2005 }));
    }

    #[test]
    fn iteration_streams_are_labelled_and_distinct() {
        let grids = grids();
        let scenario = Scenario::default();
        let a = GrowthRun::for_iteration(&grids, &scenario, point(), 2, 0).unwrap();
        let b = GrowthRun::for_iteration(&grids, &scenario, point(), 2, 1).unwrap();
        assert_ne!(a.rng().current_seed(), b.rng().current_seed());
        let record = GrowthRun::for_iteration(&grids, &scenario, point(), 2, 1)
            .unwrap()
            .seed_record()
            .unwrap();
        assert_eq!((record.run, record.iteration), (2, 1));
    }
}
