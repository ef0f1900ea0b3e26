use colored::Colorize;
use serde::{Deserialize, Serialize};
use sleuth_engine::{
    GridSource, GrowthRun, InMemoryGrids, Raster, SavedCoefficients, Scenario, SimulationError,
};
use std::time::{Duration, Instant};

const MIN_CHECK_YEARS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Determinism,
    PopulationMonotonic,
    ExclusionVeto,
    CriticalSlope,
    CoefficientBounds,
}

impl Check {
    pub const ALL: [Self; 5] = [
        Self::Determinism,
        Self::PopulationMonotonic,
        Self::ExclusionVeto,
        Self::CriticalSlope,
        Self::CoefficientBounds,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Determinism => "determinism",
            Self::PopulationMonotonic => "population-monotonic",
            Self::ExclusionVeto => "exclusion-veto",
            Self::CriticalSlope => "critical-slope",
            Self::CoefficientBounds => "coefficient-bounds",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|check| check.label() == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_name: String,
    pub passed: bool,
    pub seeds_run: usize,
    pub successful_seeds: usize,
    pub failures: Vec<String>,
    pub average_millis: f64,
}

pub struct GrowthChecker<'a> {
    grids: &'a InMemoryGrids,
    scenario: &'a Scenario,
    point: SavedCoefficients,
    last_year: u32,
    verbose: bool,
}

impl<'a> GrowthChecker<'a> {
    pub fn new(grids: &'a InMemoryGrids, scenario: &'a Scenario, verbose: bool) -> Self {
        let seed_year = grids.seed_year();
        let last_history = grids.urban_years().last().copied().unwrap_or(seed_year);
        let point = scenario
            .coefficients
            .points()
            .first()
            .copied()
            .unwrap_or(SavedCoefficients {
                diffusion: 50,
                breed: 50,
                spread: 50,
                slope_resistance: 50,
                road_gravity: 50,
            });
        Self {
            grids,
            scenario,
            point,
            last_year: last_history.max(seed_year + MIN_CHECK_YEARS),
            verbose,
        }
    }

    pub fn run(&self, checks: &[Check], seeds: &[u64]) -> Vec<CheckResult> {
        checks
            .iter()
            .map(|&check| self.run_check(check, seeds))
            .collect()
    }

    fn run_check(&self, check: Check, seeds: &[u64]) -> CheckResult {
        let mut failures = Vec::new();
        let mut durations = Vec::with_capacity(seeds.len());
        for &seed in seeds {
            if self.verbose {
                println!("🧪 Checking {} (seed {seed})", check.label().bright_white());
            }
            let start = Instant::now();
            let outcome = match check {
                Check::Determinism => self.determinism(seed),
                Check::PopulationMonotonic => self.population_monotonic(seed),
                Check::ExclusionVeto => self.exclusion_veto(seed),
                Check::CriticalSlope => self.critical_slope(seed),
                Check::CoefficientBounds => self.coefficient_bounds(seed),
            };
            durations.push(start.elapsed());
            match outcome {
                Ok(None) => {}
                Ok(Some(problem)) => failures.push(format!("seed {seed}: {problem}")),
                Err(err) => failures.push(format!("seed {seed}: simulation failed: {err}")),
            }
        }

        let average = if durations.is_empty() {
            Duration::ZERO
        } else {
            durations.iter().sum::<Duration>() / u32::try_from(durations.len()).unwrap_or(1)
        };
        CheckResult {
            check_name: check.label().to_string(),
            passed: failures.is_empty(),
            seeds_run: seeds.len(),
            successful_seeds: seeds.len().saturating_sub(failures.len()),
            failures,
            average_millis: average.as_secs_f64() * 1_000.0,
        }
    }

    fn start(&self, seed: u64) -> Result<GrowthRun<'a, InMemoryGrids>, SimulationError> {
        GrowthRun::new(self.grids, self.scenario, self.point, seed)
    }

    fn years(&self) -> std::ops::RangeInclusive<u32> {
        self.grids.seed_year() + 1..=self.last_year
    }

    fn grow_to_end(&self, seed: u64) -> Result<Raster, SimulationError> {
        let mut run = self.start(seed)?;
        for year in self.years() {
            run.advance_year(year)?;
        }
        Ok(run.urban().clone())
    }

    fn determinism(&self, seed: u64) -> Result<Option<String>, SimulationError> {
        let first = self.grow_to_end(seed)?.fingerprint();
        let second = self.grow_to_end(seed)?.fingerprint();
        Ok((first != second).then(|| format!("fingerprints differ: {first:016x} vs {second:016x}")))
    }

    fn population_monotonic(&self, seed: u64) -> Result<Option<String>, SimulationError> {
        let mut run = self.start(seed)?;
        let mut population = run.urban().count_nonzero();
        for year in self.years() {
            let record = run.advance_year(year)?;
            if record.growth.population < population {
                return Ok(Some(format!(
                    "population fell from {population} to {} in {year}",
                    record.growth.population
                )));
            }
            if record.growth.population - population != record.growth.growth_pixels {
                return Ok(Some(format!(
                    "{year}: growth {} does not match population change {}",
                    record.growth.growth_pixels,
                    record.growth.population - population
                )));
            }
            population = record.growth.population;
        }
        Ok(None)
    }

    fn exclusion_veto(&self, seed: u64) -> Result<Option<String>, SimulationError> {
        let grown = self.grow_to_end(seed)?;
        let violations = grown
            .cells()
            .iter()
            .zip(self.grids.excluded().cells())
            .filter(|&(&cell, &protection)| cell != 0 && protection >= 100)
            .count();
        Ok((violations > 0).then(|| format!("{violations} fully excluded pixels urbanized")))
    }

    fn critical_slope(&self, seed: u64) -> Result<Option<String>, SimulationError> {
        let Some(seeded) = self.grids.historical_urban_for_year(self.grids.seed_year()) else {
            return Ok(None);
        };
        let critical = self.scenario.clamped_critical_slope();
        let grown = self.grow_to_end(seed)?;
        let violations = grown
            .cells()
            .iter()
            .zip(seeded.cells())
            .zip(self.grids.slope().cells())
            .filter(|&((&cell, &seed_cell), &slope)| {
                cell != 0 && seed_cell == 0 && f64::from(slope) >= critical
            })
            .count();
        Ok((violations > 0).then(|| format!("{violations} pixels at or above critical slope grew")))
    }

    fn coefficient_bounds(&self, seed: u64) -> Result<Option<String>, SimulationError> {
        let mut run = self.start(seed)?;
        for year in self.years() {
            run.advance_year(year)?;
            let current = run.coefficients().current();
            if !current.within_bounds() {
                return Ok(Some(format!("{year}: coefficients out of bounds: {current:?}")));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::demo_bundle;

    #[test]
    fn parse_accepts_every_label() {
        for check in Check::ALL {
            assert_eq!(Check::parse(check.label()), Some(check));
        }
        assert_eq!(Check::parse("unknown"), None);
    }

    #[test]
    fn all_checks_pass_on_demo_landscape() {
        let grids = demo_bundle().into_grids().unwrap();
        let scenario = Scenario::default();
        let checker = GrowthChecker::new(&grids, &scenario, false);
        let results = checker.run(&Check::ALL, &[1, 2]);
        assert_eq!(results.len(), Check::ALL.len());
        for result in &results {
            assert!(result.passed, "{}: {:?}", result.check_name, result.failures);
            assert_eq!(result.successful_seeds, 2);
        }
    }

    #[test]
    fn check_years_extend_past_short_histories() {
        let grids = demo_bundle().into_grids().unwrap();
        let scenario = Scenario::default();
        let checker = GrowthChecker::new(&grids, &scenario, false);
        assert_eq!(checker.years(), 1991..=2000);
    }
}
