use thiserror::Error;

use crate::grid::GridError;
use crate::scenario::ScenarioError;
use crate::stats::StatsError;

/// Errors surfaced by the year loop and sweep driver.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error("no urban history at or before year {year}")]
    NoSnapshot { year: u32 },
    #[error("prediction needs prediction_stop_date")]
    MissingPredictionStop,
    #[error("record sink failed: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SimulationError {
    pub(crate) fn sink<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Sink(Box::new(err))
    }
}
