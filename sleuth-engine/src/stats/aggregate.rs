//! Running Monte Carlo sums per year.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Metric, StatsInfo};
use crate::numbers::usize_to_f64;

const METRIC_COUNT: usize = Metric::ALL.len();

#[derive(Debug, Clone, Default)]
struct YearAccumulator {
    iterations: usize,
    with_leesalee: usize,
    sums: [f64; METRIC_COUNT],
    squares: [f64; METRIC_COUNT],
}

impl YearAccumulator {
    fn add(&mut self, stats: &StatsInfo) {
        self.iterations += 1;
        if stats.leesalee.is_some() {
            self.with_leesalee += 1;
        }
        for (index, metric) in Metric::ALL.iter().enumerate() {
            let value = stats.value(*metric);
            self.sums[index] += value;
            self.squares[index] += value * value;
        }
    }

    fn summarize(&self, index: usize) -> MetricSummary {
        let n = usize_to_f64(self.iterations);
        if self.iterations == 0 {
            return MetricSummary::default();
        }
        let mean = self.sums[index] / n;
        let std_dev = if self.iterations > 1 {
            ((self.squares[index] - n * mean * mean) / (n - 1.0))
                .max(0.0)
                .sqrt()
        } else {
            0.0
        };
        MetricSummary { mean, std_dev }
    }
}

/// Mean and sample standard deviation of one metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std_dev: f64,
}

/// Aggregated statistics for one simulated year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearSummary {
    pub year: u32,
    pub iterations: usize,
    pub metrics: BTreeMap<Metric, MetricSummary>,
}

impl YearSummary {
    /// Mean of a metric, 0 when absent.
    #[must_use]
    pub fn mean(&self, metric: Metric) -> f64 {
        self.metrics.get(&metric).map_or(0.0, |m| m.mean)
    }

    #[must_use]
    pub fn std_dev(&self, metric: Metric) -> f64 {
        self.metrics.get(&metric).map_or(0.0, |m| m.std_dev)
    }
}

/// Sums and sums of squares of every metric, keyed by year.
#[derive(Debug, Clone, Default)]
pub struct RunningAggregates {
    years: BTreeMap<u32, YearAccumulator>,
}

impl RunningAggregates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one iteration's statistics for `year` into the sums.
    pub fn record(&mut self, year: u32, stats: &StatsInfo) {
        self.years.entry(year).or_default().add(stats);
    }

    /// Number of iterations recorded for a year.
    #[must_use]
    pub fn iterations(&self, year: u32) -> usize {
        self.years.get(&year).map_or(0, |acc| acc.iterations)
    }

    #[must_use]
    pub fn years(&self) -> Vec<u32> {
        self.years.keys().copied().collect()
    }

    /// Summary of one year, if it was recorded.
    #[must_use]
    pub fn summary(&self, year: u32) -> Option<YearSummary> {
        let acc = self.years.get(&year)?;
        let metrics = Metric::ALL
            .iter()
            .enumerate()
            .filter(|(_, metric)| **metric != Metric::Leesalee || acc.with_leesalee > 0)
            .map(|(index, metric)| (*metric, acc.summarize(index)))
            .collect();
        Some(YearSummary {
            year,
            iterations: acc.iterations,
            metrics,
        })
    }

    /// Summaries of every recorded year in ascending order.
    #[must_use]
    pub fn summaries(&self) -> Vec<YearSummary> {
        self.years
            .keys()
            .filter_map(|year| self.summary(*year))
            .collect()
    }

    /// Mean leesalee for a year that was compared against a snapshot.
    #[must_use]
    pub fn mean_leesalee(&self, year: u32) -> Option<f64> {
        self.summary(year)?
            .metrics
            .get(&Metric::Leesalee)
            .map(|summary| summary.mean)
    }
}
