//! Monte Carlo evaluation of sweep points and forward prediction.
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::coefficients::SavedCoefficients;
use crate::constants::LOG_RUN;
use crate::error::SimulationError;
use crate::grid::{GridError, GridSource, Raster};
use crate::numbers::{round_f64_to_u8, usize_to_f64};
use crate::random::RandomStream;
use crate::record::RecordSink;
use crate::run::GrowthRun;
use crate::scenario::Scenario;
use crate::spread::UrbanizationAttempts;
use crate::stats::{
    CalibrationScore, RunningAggregates, StatisticsEngine, StatsInfo, YearContext, YearSummary,
};

/// Outcome of running every Monte Carlo iteration of one sweep point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointEvaluation {
    pub run: usize,
    pub coefficients: SavedCoefficients,
    pub score: CalibrationScore,
    pub years: Vec<YearSummary>,
    pub attempts: UrbanizationAttempts,
}

/// Measure every historical snapshot as the calibration actuals.
///
/// # Errors
///
/// Returns an error when a snapshot cannot be measured.
pub fn actual_statistics<G: GridSource>(
    grids: &G,
) -> Result<BTreeMap<u32, StatsInfo>, SimulationError> {
    let mut engine = StatisticsEngine::default();
    let mut actuals = BTreeMap::new();
    for year in grids.urban_years() {
        let Some(history) = grids.historical_urban_for_year(year) else {
            continue;
        };
        let ctx = YearContext {
            growth_pixels: 0,
            road_pixels: grids.road_pixel_count(year),
            excluded_pixels: grids.excluded_pixel_count(),
            total_pixels: grids.total_pixels(),
        };
        actuals.insert(year, engine.compute_with_rates(history, grids.slope(), ctx)?);
    }
    Ok(actuals)
}

/// Run every iteration of one sweep point from the seed year to the last
/// control year and score it against the historical actuals.
///
/// Every year record goes to `sink` and into the running aggregates, which
/// start empty for each point.
///
/// # Errors
///
/// Returns an error when a grid cannot be measured, when the point cannot
/// be scored or when the sink rejects a record.
pub fn evaluate_point<G, S>(
    grids: &G,
    scenario: &Scenario,
    actuals: &BTreeMap<u32, StatsInfo>,
    coefficients: SavedCoefficients,
    run: usize,
    sink: &mut S,
) -> Result<PointEvaluation, SimulationError>
where
    G: GridSource,
    S: RecordSink,
{
    let years = grids.urban_years();
    let (Some(&seed_year), Some(&last_year)) = (years.first(), years.last()) else {
        return Err(GridError::MissingUrbanHistory.into());
    };

    let mut aggregates = RunningAggregates::new();
    let mut attempts = UrbanizationAttempts::default();
    for iteration in 0..scenario.monte_carlo_iterations {
        let mut growth = GrowthRun::for_iteration(grids, scenario, coefficients, run, iteration)?;
        let seed = growth.seed_record()?;
        aggregates.record(seed.year, &seed.stats);
        sink.accept(&seed).map_err(SimulationError::sink)?;
        for year in seed_year + 1..=last_year {
            let record = growth.advance_year(year)?;
            aggregates.record(year, &record.stats);
            sink.accept(&record).map_err(SimulationError::sink)?;
        }
        attempts.accumulate(&growth.attempts());
    }

    let score = CalibrationScore::evaluate(actuals, &aggregates, seed_year, None)?;
    debug!(
        target: LOG_RUN,
        "run {run} {coefficients:?}: product={:.5} osm={:.5}",
        score.product,
        score.osm
    );
    Ok(PointEvaluation {
        run,
        coefficients,
        score,
        years: aggregates.summaries(),
        attempts,
    })
}

/// Evaluate every point of the scenario's sweep in order.
///
/// # Errors
///
/// Returns the first point's error.
pub fn calibrate<G, S>(
    grids: &G,
    scenario: &Scenario,
    sink: &mut S,
) -> Result<Vec<PointEvaluation>, SimulationError>
where
    G: GridSource,
    S: RecordSink,
{
    scenario.validate()?;
    let actuals = actual_statistics(grids)?;
    let points = scenario.coefficients.points();
    info!(target: LOG_RUN, "calibrating {} sweep points", points.len());
    points
        .into_iter()
        .enumerate()
        .map(|(run, point)| evaluate_point(grids, scenario, &actuals, point, run, &mut *sink))
        .collect()
}

/// Fraction of iterations in which each pixel ended urban.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityGrid {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl ProbabilityGrid {
    fn from_counts(rows: usize, cols: usize, counts: &[usize], iterations: usize) -> Self {
        let n = usize_to_f64(iterations.max(1));
        Self {
            rows,
            cols,
            values: counts.iter().map(|&c| usize_to_f64(c) / n).collect(),
        }
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Probabilities as whole percentages.
    #[must_use]
    pub fn to_percent_raster(&self) -> Raster {
        let mut raster = Raster::zeroed(self.rows, self.cols);
        for (cell, value) in raster.cells_mut().iter_mut().zip(&self.values) {
            *cell = round_f64_to_u8(value * 100.0);
        }
        raster
    }
}

/// Result of a forward prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub start_year: u32,
    pub stop_year: u32,
    pub coefficients: SavedCoefficients,
    pub years: Vec<YearSummary>,
    pub probability: ProbabilityGrid,
    pub attempts: UrbanizationAttempts,
}

/// Grow forward from the latest snapshot at or before the prediction start
/// date (the last snapshot when no start is given) to the stop date.
///
/// # Errors
///
/// Returns an error when the scenario has no stop date, when no snapshot
/// precedes the start or when a grown grid cannot be measured.
pub fn predict<G, S>(
    grids: &G,
    scenario: &Scenario,
    coefficients: SavedCoefficients,
    sink: &mut S,
) -> Result<Prediction, SimulationError>
where
    G: GridSource,
    S: RecordSink,
{
    scenario.validate()?;
    let stop_year = scenario
        .prediction_stop_date
        .ok_or(SimulationError::MissingPredictionStop)?;
    let years = grids.urban_years();
    let start_year = match scenario.prediction_start_date {
        Some(start) => years
            .iter()
            .rev()
            .find(|&&year| year <= start)
            .copied()
            .ok_or(SimulationError::NoSnapshot { year: start })?,
        None => years
            .last()
            .copied()
            .ok_or(GridError::MissingUrbanHistory)?,
    };

    let (rows, cols) = grids.dimensions();
    let mut urban_counts = vec![0usize; rows * cols];
    let mut aggregates = RunningAggregates::new();
    let mut attempts = UrbanizationAttempts::default();
    for iteration in 0..scenario.monte_carlo_iterations {
        let rng = RandomStream::for_iteration(scenario.random_seed, 0, iteration);
        let mut growth =
            GrowthRun::from_snapshot(grids, scenario, coefficients, start_year, rng)?
                .with_labels(0, iteration);
        for year in start_year + 1..=stop_year {
            let record = growth.advance_year(year)?;
            aggregates.record(year, &record.stats);
            sink.accept(&record).map_err(SimulationError::sink)?;
        }
        for (count, &cell) in urban_counts.iter_mut().zip(growth.urban().cells()) {
            if cell != 0 {
                *count += 1;
            }
        }
        attempts.accumulate(&growth.attempts());
    }

    info!(
        target: LOG_RUN,
        "predicted {start_year}..={stop_year} over {} iterations",
        scenario.monte_carlo_iterations
    );
    Ok(Prediction {
        start_year,
        stop_year,
        coefficients,
        years: aggregates.summaries(),
        probability: ProbabilityGrid::from_counts(
            rows,
            cols,
            &urban_counts,
            scenario.monte_carlo_iterations,
        ),
        attempts,
    })
}
