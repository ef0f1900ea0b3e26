//! Per-year output records and the sinks that receive them.
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::coefficients::SavedCoefficients;
use crate::spread::YearGrowth;
use crate::stats::StatsInfo;

/// Everything observed for one simulated year of one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearRecord {
    pub run: usize,
    pub iteration: usize,
    pub year: u32,
    /// Coefficients in effect during the year, before self-modification.
    pub coefficients: SavedCoefficients,
    pub growth: YearGrowth,
    pub stats: StatsInfo,
}

/// Destination for year records.
pub trait RecordSink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Accept one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be stored.
    fn accept(&mut self, record: &YearRecord) -> Result<(), Self::Error>;
}

/// Keeps every record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Vec<YearRecord>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> &[YearRecord] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<YearRecord> {
        self.records
    }
}

impl RecordSink for MemorySink {
    type Error = Infallible;

    fn accept(&mut self, record: &YearRecord) -> Result<(), Self::Error> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Drops every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl RecordSink for DiscardSink {
    type Error = Infallible;

    fn accept(&mut self, _record: &YearRecord) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    type Error = S::Error;

    fn accept(&mut self, record: &YearRecord) -> Result<(), Self::Error> {
        (**self).accept(record)
    }
}
