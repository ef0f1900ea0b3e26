//! SLEUTH Growth Engine
//!
//! Platform-agnostic core of the SLEUTH urban growth cellular automaton.
//! This crate grows an urban raster year by year under the five growth
//! rules, retunes its coefficients from the observed growth rate and scores
//! simulated growth against historical snapshots. It performs no file I/O;
//! grids arrive through [`GridSource`] and year records leave through
//! [`RecordSink`].

pub mod coefficients;
pub mod constants;
pub mod controller;
pub mod error;
pub mod grid;
pub mod numbers;
pub mod random;
pub mod record;
pub mod run;
pub mod scenario;
pub mod slope;
pub mod spread;
pub mod stats;
pub mod sweep;

// Re-export commonly used types
pub use coefficients::{
    CoefficientRange, CoefficientState, CoefficientSweep, CoefficientValues, SavedCoefficients,
};
pub use controller::SelfModification;
pub use error::SimulationError;
pub use grid::{GridError, GridSource, InMemoryGrids, NEIGHBOR_OFFSETS, Raster};
pub use random::RandomStream;
pub use record::{DiscardSink, MemorySink, RecordSink, YearRecord};
pub use run::GrowthRun;
pub use scenario::{LoggingFlags, Scenario, ScenarioError};
pub use slope::SlopeWeightTable;
pub use spread::{SpreadEngine, SpreadLayers, UrbanizationAttempts, YearGrowth};
pub use stats::{
    CalibrationScore, Metric, MetricSummary, RankBy, RunningAggregates, StatisticsEngine,
    StatsError, StatsInfo, YearContext, YearSummary, growth_rate, leesalee, percent_urban,
};
pub use sweep::{
    PointEvaluation, Prediction, ProbabilityGrid, actual_statistics, calibrate, evaluate_point,
    predict,
};

/// Order sweep evaluations best first by the chosen score. Ties keep their
/// sweep order.
pub fn rank_evaluations(evaluations: &mut [PointEvaluation], rank: RankBy) {
    evaluations.sort_by(|a, b| b.score.ranking(rank).total_cmp(&a.score.ranking(rank)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn evaluation(run: usize, product: f64, osm: f64) -> PointEvaluation {
        PointEvaluation {
            run,
            coefficients: SavedCoefficients {
                diffusion: 1,
                breed: 1,
                spread: 1,
                slope_resistance: 1,
                road_gravity: 1,
            },
            score: CalibrationScore {
                compare: 1.0,
                leesalee: 1.0,
                fmatch: 1.0,
                r_squared: BTreeMap::new(),
                product,
                osm,
            },
            years: Vec::new(),
            attempts: UrbanizationAttempts::default(),
        }
    }

    #[test]
    fn ranking_orders_by_selected_score() {
        let mut evaluations = vec![
            evaluation(0, 0.2, 0.9),
            evaluation(1, 0.5, 0.1),
            evaluation(2, 0.2, 0.3),
        ];
        rank_evaluations(&mut evaluations, RankBy::Product);
        let runs: Vec<usize> = evaluations.iter().map(|e| e.run).collect();
        assert_eq!(runs, vec![1, 0, 2]);

        rank_evaluations(&mut evaluations, RankBy::Osm);
        let runs: Vec<usize> = evaluations.iter().map(|e| e.run).collect();
        assert_eq!(runs, vec![0, 2, 1]);
    }
}
