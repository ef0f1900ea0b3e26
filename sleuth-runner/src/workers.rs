use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use sleuth_engine::{
    DiscardSink, InMemoryGrids, MemorySink, PointEvaluation, SavedCoefficients, Scenario,
    StatsInfo, YearRecord, actual_statistics, evaluate_point,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// One finished sweep point with the records it produced, if kept.
#[derive(Debug, Clone)]
pub struct PointOutcome {
    pub evaluation: PointEvaluation,
    pub records: Vec<YearRecord>,
}

/// A sweep point that aborted.
#[derive(Debug, Clone, Serialize)]
pub struct PointFailure {
    pub run: usize,
    pub coefficients: SavedCoefficients,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct SweepOutcome {
    pub points: Vec<PointOutcome>,
    pub failures: Vec<PointFailure>,
}

/// Evaluate every sweep point on blocking workers, at most `jobs` at a time.
/// Results come back in sweep order regardless of completion order.
pub async fn run_sweep(
    grids: Arc<InMemoryGrids>,
    scenario: Arc<Scenario>,
    jobs: usize,
    keep_records: bool,
) -> Result<SweepOutcome> {
    let actuals = Arc::new(
        actual_statistics(grids.as_ref()).context("failed to measure historical snapshots")?,
    );
    let points = scenario.coefficients.points();
    info!("sweeping {} points on {} workers", points.len(), jobs.max(1));

    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let mut handles = Vec::with_capacity(points.len());
    for (run, point) in points.into_iter().enumerate() {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .context("worker pool closed")?;
        let grids = Arc::clone(&grids);
        let scenario = Arc::clone(&scenario);
        let actuals = Arc::clone(&actuals);
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            evaluate(&grids, &scenario, &actuals, point, run, keep_records)
        });
        handles.push((run, point, handle));
    }

    let mut outcome = SweepOutcome::default();
    for (run, coefficients, handle) in handles {
        match handle.await.context("sweep worker panicked")? {
            Ok(point) => outcome.points.push(point),
            Err(err) => {
                let message = format!("{err:#}");
                warn!("{message}");
                outcome.failures.push(PointFailure {
                    run,
                    coefficients,
                    message,
                });
            }
        }
    }
    Ok(outcome)
}

fn evaluate(
    grids: &InMemoryGrids,
    scenario: &Scenario,
    actuals: &BTreeMap<u32, StatsInfo>,
    point: SavedCoefficients,
    run: usize,
    keep_records: bool,
) -> Result<PointOutcome> {
    let context = || format!("sweep point {run} ({})", describe(point));
    if keep_records {
        let mut sink = MemorySink::new();
        let evaluation =
            evaluate_point(grids, scenario, actuals, point, run, &mut sink).with_context(context)?;
        Ok(PointOutcome {
            evaluation,
            records: sink.into_records(),
        })
    } else {
        let evaluation = evaluate_point(grids, scenario, actuals, point, run, &mut DiscardSink)
            .with_context(context)?;
        Ok(PointOutcome {
            evaluation,
            records: Vec::new(),
        })
    }
}

/// `diffusion/breed/spread/slope/road` shorthand for a coefficient set.
pub fn describe(point: SavedCoefficients) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        point.diffusion, point.breed, point.spread, point.slope_resistance, point.road_gravity
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::demo_bundle;
    use sleuth_engine::{CoefficientRange, CoefficientSweep, calibrate};

    fn sweep_scenario() -> Scenario {
        Scenario {
            monte_carlo_iterations: 2,
            coefficients: CoefficientSweep {
                diffusion: CoefficientRange::new(10, 50, 40),
                breed: CoefficientRange::new(10, 50, 40),
                spread: CoefficientRange::fixed(40),
                slope_resistance: CoefficientRange::fixed(20),
                road_gravity: CoefficientRange::fixed(30),
            },
            ..Scenario::default()
        }
    }

    #[tokio::test]
    async fn parallel_sweep_matches_sequential_calibration() {
        let grids = Arc::new(demo_bundle().into_grids().unwrap());
        let scenario = Arc::new(sweep_scenario());
        let parallel = run_sweep(Arc::clone(&grids), Arc::clone(&scenario), 3, false)
            .await
            .unwrap();
        let sequential = calibrate(grids.as_ref(), &scenario, &mut DiscardSink).unwrap();
        assert!(parallel.failures.is_empty());
        let evaluations: Vec<PointEvaluation> =
            parallel.points.into_iter().map(|p| p.evaluation).collect();
        assert_eq!(evaluations, sequential);
    }

    #[tokio::test]
    async fn kept_records_cover_every_iteration_year() {
        let grids = Arc::new(demo_bundle().into_grids().unwrap());
        let scenario = Arc::new(sweep_scenario());
        let outcome = run_sweep(grids, scenario, 1, true).await.unwrap();
        assert_eq!(outcome.points.len(), 4);
        for point in &outcome.points {
            // 1990..=2000 for each of two iterations
            assert_eq!(point.records.len(), 22);
            assert!(point.records.iter().all(|r| r.run == point.evaluation.run));
        }
    }

    #[test]
    fn describe_lists_coefficients_in_sweep_order() {
        let point = SavedCoefficients {
            diffusion: 1,
            breed: 2,
            spread: 3,
            slope_resistance: 4,
            road_gravity: 5,
        };
        assert_eq!(describe(point), "1/2/3/4/5");
    }
}
