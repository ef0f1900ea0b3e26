//! Goodness-of-fit scores comparing simulated means with historical actuals.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Metric, RunningAggregates, StatsError, StatsInfo};
use crate::numbers::usize_to_f64;

/// Score used to order sweep points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    #[default]
    Product,
    Osm,
}

impl RankBy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Osm => "osm",
        }
    }
}

/// Calibration scores for one sweep point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationScore {
    pub compare: f64,
    pub leesalee: f64,
    pub fmatch: f64,
    pub r_squared: BTreeMap<Metric, f64>,
    pub product: f64,
    pub osm: f64,
}

impl CalibrationScore {
    /// Build the scores from the historical actuals and the Monte Carlo
    /// aggregates of one sweep point.
    ///
    /// `actuals` holds the statistics of every control year. Leesalee is
    /// averaged over control years after `seed_year`, falling back to the
    /// seed year when it is the only snapshot. `fmatch` defaults to 1.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::NoObservations`] when no control year was
    /// simulated.
    pub fn evaluate(
        actuals: &BTreeMap<u32, StatsInfo>,
        simulated: &RunningAggregates,
        seed_year: u32,
        fmatch: Option<f64>,
    ) -> Result<Self, StatsError> {
        let observed: Vec<(u32, &StatsInfo)> = actuals
            .iter()
            .filter(|(year, _)| simulated.iterations(**year) > 0)
            .map(|(year, stats)| (*year, stats))
            .collect();
        let Some(&(final_year, final_actual)) = observed.last() else {
            return Err(StatsError::NoObservations);
        };

        let mut r_squared = BTreeMap::new();
        for metric in Metric::FITTED {
            let pairs: Vec<(f64, f64)> = observed
                .iter()
                .filter_map(|(year, actual)| {
                    let summary = simulated.summary(*year)?;
                    Some((actual.value(metric), summary.mean(metric)))
                })
                .collect();
            r_squared.insert(metric, line_fit(&pairs)?);
        }

        let simulated_population = simulated
            .summary(final_year)
            .map_or(0.0, |summary| summary.mean(Metric::Population));
        let compare = compare(
            usize_to_f64(final_actual.population),
            simulated_population,
        );

        let later: Vec<f64> = observed
            .iter()
            .filter(|(year, _)| *year > seed_year)
            .filter_map(|(year, _)| simulated.mean_leesalee(*year))
            .collect();
        let leesalee = if later.is_empty() {
            simulated
                .mean_leesalee(seed_year)
                .ok_or(StatsError::NoObservations)?
        } else {
            later.iter().sum::<f64>() / usize_to_f64(later.len())
        };

        let fmatch = fmatch.unwrap_or(1.0);
        let fitted_product: f64 = r_squared.values().product();
        let product = compare * leesalee * fitted_product * fmatch;
        let osm = compare
            * [
                Metric::Population,
                Metric::Edges,
                Metric::Clusters,
                Metric::AverageSlope,
                Metric::XMean,
                Metric::YMean,
            ]
            .iter()
            .map(|metric| r_squared.get(metric).copied().unwrap_or(0.0))
            .product::<f64>();

        Ok(Self {
            compare,
            leesalee,
            fmatch,
            r_squared,
            product,
            osm,
        })
    }

    #[must_use]
    pub fn r_squared(&self, metric: Metric) -> f64 {
        self.r_squared.get(&metric).copied().unwrap_or(0.0)
    }

    /// The score selected by `rank`.
    #[must_use]
    pub const fn ranking(&self, rank: RankBy) -> f64 {
        match rank {
            RankBy::Product => self.product,
            RankBy::Osm => self.osm,
        }
    }
}

/// Ratio of the smaller to the larger population, 0 when both are zero.
fn compare(actual: f64, simulated: f64) -> f64 {
    let high = actual.max(simulated);
    if high <= 0.0 {
        return 0.0;
    }
    actual.min(simulated) / high
}

/// Squared Pearson correlation of `(actual, simulated)` pairs.
///
/// # Errors
///
/// Returns [`StatsError::NoObservations`] for an empty series. A series with
/// zero variance scores 0.
pub fn line_fit(pairs: &[(f64, f64)]) -> Result<f64, StatsError> {
    if pairs.is_empty() {
        return Err(StatsError::NoObservations);
    }
    let n = usize_to_f64(pairs.len());
    let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for &(x, y) in pairs {
        sx += x;
        sy += y;
        sxx += x * x;
        syy += y * y;
        sxy += x * y;
    }
    let var_x = n.mul_add(sxx, -(sx * sx));
    let var_y = n.mul_add(syy, -(sy * sy));
    if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
        return Ok(0.0);
    }
    let r = n.mul_add(sxy, -(sx * sy)) / (var_x * var_y).sqrt();
    Ok((r * r).min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(population: usize, leesalee: Option<f64>) -> StatsInfo {
        StatsInfo {
            area: population,
            population,
            edges: population / 2,
            clusters: 1 + population / 10,
            x_mean: usize_to_f64(population) / 3.0,
            y_mean: usize_to_f64(population) / 4.0,
            radius: usize_to_f64(population).sqrt(),
            average_slope: 2.0 + usize_to_f64(population) / 100.0,
            mean_cluster_size: usize_to_f64(population) / 2.0,
            percent_urban: usize_to_f64(population) / 5.0,
            growth_rate: 0.0,
            leesalee,
        }
    }

    #[test]
    fn line_fit_of_perfect_and_inverse_lines() {
        let perfect = [(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)];
        assert!((line_fit(&perfect).unwrap() - 1.0).abs() < 1e-12);
        let inverse = [(1.0, 3.0), (2.0, 2.0), (3.0, 1.0)];
        assert!((line_fit(&inverse).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn line_fit_degenerate_inputs() {
        assert_eq!(line_fit(&[]), Err(StatsError::NoObservations));
        assert!(line_fit(&[(1.0, 5.0)]).unwrap().abs() < f64::EPSILON);
        assert!(line_fit(&[(1.0, 5.0), (2.0, 5.0)]).unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn line_fit_of_noisy_series_is_between_zero_and_one() {
        let noisy = [(1.0, 1.2), (2.0, 1.9), (3.0, 3.4), (4.0, 3.8)];
        let r2 = line_fit(&noisy).unwrap();
        assert!(r2 > 0.9 && r2 < 1.0);
    }

    #[test]
    fn identical_series_score_one() {
        let mut actuals = BTreeMap::new();
        let mut aggregates = RunningAggregates::new();
        for (year, population) in [(1990, 10), (2000, 20), (2010, 40)] {
            let lee = if year == 1990 { Some(1.0) } else { Some(0.5) };
            actuals.insert(year, info(population, None));
            aggregates.record(year, &info(population, lee));
        }
        let score = CalibrationScore::evaluate(&actuals, &aggregates, 1990, None).unwrap();
        assert!((score.compare - 1.0).abs() < 1e-12);
        assert!((score.leesalee - 0.5).abs() < 1e-12);
        for metric in Metric::FITTED {
            assert!((score.r_squared(metric) - 1.0).abs() < 1e-9, "{metric:?}");
        }
        assert!((score.product - 0.5).abs() < 1e-9);
        assert!((score.osm - 1.0).abs() < 1e-9);
        assert!((score.ranking(RankBy::Osm) - score.osm).abs() < f64::EPSILON);
    }

    #[test]
    fn compare_uses_final_year_population() {
        let mut actuals = BTreeMap::new();
        let mut aggregates = RunningAggregates::new();
        actuals.insert(1990, info(10, None));
        actuals.insert(2000, info(40, None));
        aggregates.record(1990, &info(10, Some(1.0)));
        aggregates.record(2000, &info(20, Some(0.4)));
        let score =
            CalibrationScore::evaluate(&actuals, &aggregates, 1990, Some(0.5)).unwrap();
        assert!((score.compare - 0.5).abs() < 1e-12);
        assert!((score.fmatch - 0.5).abs() < f64::EPSILON);
        // two points always fit a line exactly
        assert!((score.product - 0.5 * 0.4 * 0.5).abs() < 1e-9);
    }

    #[test]
    fn missing_simulation_is_no_observations() {
        let mut actuals = BTreeMap::new();
        actuals.insert(1990, info(10, None));
        let err = CalibrationScore::evaluate(&actuals, &RunningAggregates::new(), 1990, None)
            .unwrap_err();
        assert_eq!(err, StatsError::NoObservations);
    }
}
