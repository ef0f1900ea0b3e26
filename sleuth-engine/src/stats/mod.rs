//! Per-year spatial statistics, Monte Carlo aggregation and calibration fit.
use log::debug;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

use crate::constants::LOG_STATS;
use crate::grid::Raster;
use crate::numbers::usize_to_f64;

pub mod aggregate;
pub mod calibration;
pub mod clusters;

pub use aggregate::{MetricSummary, RunningAggregates, YearSummary};
pub use calibration::{CalibrationScore, RankBy, line_fit};
use clusters::ClusterScratch;

const EDGE_OFFSETS: [(isize, isize); 4] = [(-1, 0), (0, -1), (1, 0), (0, 1)];

/// Fatal statistics conditions. These point at malformed grids or
/// scenario values and abort the current sweep point.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatsError {
    #[error("urban grid has zero population; centroid is undefined")]
    ZeroPopulation,
    #[error("found no clusters although population is {population}")]
    NoClusters { population: usize },
    #[error(
        "percent urban denominator is zero (total {total}, roads {roads}, excluded {excluded})"
    )]
    ZeroPercentUrbanDenominator {
        total: usize,
        roads: usize,
        excluded: usize,
    },
    #[error("line fit has no observations")]
    NoObservations,
}

/// Metrics tracked per year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Area,
    Edges,
    Clusters,
    Population,
    XMean,
    YMean,
    Radius,
    AverageSlope,
    MeanClusterSize,
    PercentUrban,
    GrowthRate,
    Leesalee,
}

impl Metric {
    /// Metrics compared against historical actuals by the line fit.
    pub const FITTED: [Self; 10] = [
        Self::Area,
        Self::Edges,
        Self::Clusters,
        Self::Population,
        Self::XMean,
        Self::YMean,
        Self::Radius,
        Self::AverageSlope,
        Self::MeanClusterSize,
        Self::PercentUrban,
    ];

    /// Every aggregated metric.
    pub const ALL: [Self; 12] = [
        Self::Area,
        Self::Edges,
        Self::Clusters,
        Self::Population,
        Self::XMean,
        Self::YMean,
        Self::Radius,
        Self::AverageSlope,
        Self::MeanClusterSize,
        Self::PercentUrban,
        Self::GrowthRate,
        Self::Leesalee,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Area => "area",
            Self::Edges => "edges",
            Self::Clusters => "clusters",
            Self::Population => "population",
            Self::XMean => "x_mean",
            Self::YMean => "y_mean",
            Self::Radius => "radius",
            Self::AverageSlope => "average_slope",
            Self::MeanClusterSize => "mean_cluster_size",
            Self::PercentUrban => "percent_urban",
            Self::GrowthRate => "growth_rate",
            Self::Leesalee => "leesalee",
        }
    }
}

/// Snapshot of one year's spatial statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsInfo {
    pub area: usize,
    pub edges: usize,
    pub clusters: usize,
    pub mean_cluster_size: f64,
    pub population: usize,
    pub x_mean: f64,
    pub y_mean: f64,
    pub radius: f64,
    pub average_slope: f64,
    pub percent_urban: f64,
    pub growth_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leesalee: Option<f64>,
}

impl StatsInfo {
    /// Value of one metric. A missing leesalee reads as 0.
    #[must_use]
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Area => usize_to_f64(self.area),
            Metric::Edges => usize_to_f64(self.edges),
            Metric::Clusters => usize_to_f64(self.clusters),
            Metric::Population => usize_to_f64(self.population),
            Metric::XMean => self.x_mean,
            Metric::YMean => self.y_mean,
            Metric::Radius => self.radius,
            Metric::AverageSlope => self.average_slope,
            Metric::MeanClusterSize => self.mean_cluster_size,
            Metric::PercentUrban => self.percent_urban,
            Metric::GrowthRate => self.growth_rate,
            Metric::Leesalee => self.leesalee.unwrap_or(0.0),
        }
    }
}

/// Pixel counts needed to turn spatial stats into rates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YearContext {
    pub growth_pixels: usize,
    pub road_pixels: usize,
    pub excluded_pixels: usize,
    pub total_pixels: usize,
}

/// Computes year statistics, reusing its clustering buffers across calls.
#[derive(Debug, Clone, Default)]
pub struct StatisticsEngine {
    scratch: ClusterScratch,
    log_year_stats: bool,
}

impl StatisticsEngine {
    #[must_use]
    pub fn new(log_year_stats: bool) -> Self {
        Self {
            scratch: ClusterScratch::default(),
            log_year_stats,
        }
    }

    /// Spatial statistics of an urban grid. Rates are left at zero; see
    /// [`StatisticsEngine::compute_with_rates`].
    ///
    /// # Errors
    ///
    /// Returns an error when the grid has no urban pixels, or when every
    /// urban pixel lies on the outer ring so no cluster can be formed.
    pub fn compute_year_stats(
        &mut self,
        urban: &Raster,
        slope: &Raster,
    ) -> Result<StatsInfo, StatsError> {
        let mut area = 0usize;
        let mut edges = 0usize;
        let mut row_total = 0.0;
        let mut col_total = 0.0;
        let mut slope_total = 0.0;
        for row in 0..urban.rows() {
            for col in 0..urban.cols() {
                if urban.get(row, col) == 0 {
                    continue;
                }
                area += 1;
                row_total += usize_to_f64(row);
                col_total += usize_to_f64(col);
                slope_total += f64::from(slope.get(row, col));
                let on_edge = EDGE_OFFSETS.iter().any(|&delta| {
                    urban
                        .shifted(row, col, delta)
                        .is_some_and(|(r, c)| urban.get(r, c) == 0)
                });
                if on_edge {
                    edges += 1;
                }
            }
        }
        if area == 0 {
            return Err(StatsError::ZeroPopulation);
        }

        let clusters = self.scratch.count(urban);
        if clusters.clusters == 0 {
            return Err(StatsError::NoClusters { population: area });
        }

        let count = usize_to_f64(area);
        Ok(StatsInfo {
            area,
            edges,
            clusters: clusters.clusters,
            mean_cluster_size: usize_to_f64(clusters.clustered_pixels)
                / usize_to_f64(clusters.clusters),
            population: area,
            x_mean: col_total / count,
            y_mean: row_total / count,
            radius: (count / PI).sqrt(),
            average_slope: slope_total / count,
            percent_urban: 0.0,
            growth_rate: 0.0,
            leesalee: None,
        })
    }

    /// Spatial statistics plus growth rate and percent urban.
    ///
    /// # Errors
    ///
    /// Propagates [`StatisticsEngine::compute_year_stats`] errors and fails
    /// when the percent-urban denominator is zero.
    pub fn compute_with_rates(
        &mut self,
        urban: &Raster,
        slope: &Raster,
        ctx: YearContext,
    ) -> Result<StatsInfo, StatsError> {
        let mut stats = self.compute_year_stats(urban, slope)?;
        stats.growth_rate = growth_rate(ctx.growth_pixels, stats.population)?;
        stats.percent_urban = percent_urban(
            stats.population,
            ctx.road_pixels,
            ctx.total_pixels,
            ctx.excluded_pixels,
        )?;
        if self.log_year_stats {
            debug!(
                target: LOG_STATS,
                "area={} edges={} clusters={} mean_size={:.2} growth_rate={:.3} percent_urban={:.3}",
                stats.area,
                stats.edges,
                stats.clusters,
                stats.mean_cluster_size,
                stats.growth_rate,
                stats.percent_urban
            );
        }
        Ok(stats)
    }
}

/// New growth as a percentage of population.
///
/// # Errors
///
/// Returns an error when population is zero.
pub fn growth_rate(new_growth: usize, population: usize) -> Result<f64, StatsError> {
    if population == 0 {
        return Err(StatsError::ZeroPopulation);
    }
    Ok(usize_to_f64(new_growth) / usize_to_f64(population) * 100.0)
}

/// Urban plus road pixels as a percentage of the land that could urbanize.
///
/// # Errors
///
/// Returns an error when roads and exclusions cover the whole grid.
pub fn percent_urban(
    population: usize,
    road_pixels: usize,
    total_pixels: usize,
    excluded_pixels: usize,
) -> Result<f64, StatsError> {
    let available = total_pixels
        .checked_sub(road_pixels)
        .and_then(|rest| rest.checked_sub(excluded_pixels))
        .filter(|&rest| rest > 0)
        .ok_or(StatsError::ZeroPercentUrbanDenominator {
            total: total_pixels,
            roads: road_pixels,
            excluded: excluded_pixels,
        })?;
    Ok(100.0 * usize_to_f64(population + road_pixels) / usize_to_f64(available))
}

/// Intersection over union of simulated and historical urban extent.
/// Two empty extents match perfectly.
#[must_use]
pub fn leesalee(simulated: &Raster, historical: &Raster) -> f64 {
    let mut intersection = 0usize;
    let mut union = 0usize;
    for (&sim, &hist) in simulated.cells().iter().zip(historical.cells().iter()) {
        let sim_urban = sim != 0;
        let hist_urban = hist != 0;
        if sim_urban && hist_urban {
            intersection += 1;
        }
        if sim_urban || hist_urban {
            union += 1;
        }
    }
    if union == 0 {
        return 1.0;
    }
    usize_to_f64(intersection) / usize_to_f64(union)
}
