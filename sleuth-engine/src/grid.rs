//! Raster buffers and the read-only grid set the engine simulates over.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::Hasher;
use thiserror::Error;
use twox_hash::XxHash64;

use crate::constants::FULLY_EXCLUDED;

/// Neighbour offsets as `(row, col)` deltas, in the fixed order every
/// neighbour scan starts from.
pub const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];

/// Errors raised when grid inputs violate shape invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("grid dimensions must be non-zero (got {rows}x{cols})")]
    EmptyDimensions { rows: usize, cols: usize },
    #[error("{layer} has {actual} cells, expected {expected} ({rows}x{cols})")]
    LayerSize {
        layer: String,
        expected: usize,
        actual: usize,
        rows: usize,
        cols: usize,
    },
    #[error("no urban history rasters supplied")]
    MissingUrbanHistory,
    #[error("no road rasters supplied")]
    MissingRoads,
}

/// Flat row-major raster of 8-bit cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Raster {
    rows: usize,
    cols: usize,
    cells: Vec<u8>,
}

impl Raster {
    /// All-zero raster.
    #[must_use]
    pub fn zeroed(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![0; rows * cols],
        }
    }

    /// Raster with every cell set to `value`.
    #[must_use]
    pub fn filled(rows: usize, cols: usize, value: u8) -> Self {
        Self {
            rows,
            cols,
            cells: vec![value; rows * cols],
        }
    }

    /// Wrap an existing buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer length does not equal `rows * cols`.
    pub fn from_cells(
        layer: &str,
        rows: usize,
        cols: usize,
        cells: Vec<u8>,
    ) -> Result<Self, GridError> {
        if rows == 0 || cols == 0 {
            return Err(GridError::EmptyDimensions { rows, cols });
        }
        if cells.len() != rows * cols {
            return Err(GridError::LayerSize {
                layer: layer.to_string(),
                expected: rows * cols,
                actual: cells.len(),
                rows,
                cols,
            });
        }
        Ok(Self { rows, cols, cells })
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
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    #[must_use]
    pub const fn offset(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    #[inline]
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.cells[self.offset(row, col)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: u8) {
        let offset = self.offset(row, col);
        self.cells[offset] = value;
    }

    #[must_use]
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [u8] {
        &mut self.cells
    }

    /// Reset every cell to zero without reallocating.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Number of nonzero cells.
    #[must_use]
    pub fn count_nonzero(&self) -> usize {
        self.cells.iter().filter(|&&v| v != 0).count()
    }

    /// Number of cells at or above `threshold`.
    #[must_use]
    pub fn count_at_least(&self, threshold: u8) -> usize {
        self.cells.iter().filter(|&&v| v >= threshold).count()
    }

    /// Whether `(row, col)` lies inside the raster.
    #[inline]
    #[must_use]
    pub const fn in_bounds(&self, row: isize, col: isize) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.rows && (col as usize) < self.cols
    }

    /// Whether `(row, col)` lies strictly inside the outer ring.
    #[inline]
    #[must_use]
    pub const fn is_interior(&self, row: usize, col: usize) -> bool {
        row > 0 && col > 0 && row + 1 < self.rows && col + 1 < self.cols
    }

    /// Apply a `(row, col)` delta, returning the target when in bounds.
    #[inline]
    #[must_use]
    pub fn shifted(&self, row: usize, col: usize, delta: (isize, isize)) -> Option<(usize, usize)> {
        let r = row as isize + delta.0;
        let c = col as isize + delta.1;
        self.in_bounds(r, c).then(|| (r as usize, c as usize))
    }

    /// Stable 64-bit fingerprint of dimensions and contents.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(&(self.rows as u64).to_le_bytes());
        hasher.write(&(self.cols as u64).to_le_bytes());
        hasher.write(&self.cells);
        hasher.finish()
    }
}

/// Read-only access to the input rasters of one simulation.
pub trait GridSource {
    /// `(rows, cols)` shared by every raster.
    fn dimensions(&self) -> (usize, usize);

    /// Slope raster, 0..=255.
    fn slope(&self) -> &Raster;

    /// Exclusion raster, percent protected (0..=100).
    fn excluded(&self) -> &Raster;

    /// Road raster in effect for `year`.
    fn road_for_year(&self, year: u32) -> &Raster;

    /// Historical urban extent for `year`, when a snapshot exists.
    fn historical_urban_for_year(&self, year: u32) -> Option<&Raster>;

    /// Years with an urban-history snapshot, ascending.
    fn urban_years(&self) -> Vec<u32>;

    /// Total pixel count.
    fn total_pixels(&self) -> usize {
        let (rows, cols) = self.dimensions();
        rows * cols
    }

    /// Road pixels (nonzero road value) in effect for `year`.
    fn road_pixel_count(&self, year: u32) -> usize {
        self.road_for_year(year).count_nonzero()
    }

    /// Pixels that can never urbanize.
    fn excluded_pixel_count(&self) -> usize {
        self.excluded().count_at_least(FULLY_EXCLUDED)
    }
}

/// In-memory grid set keyed by year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryGrids {
    rows: usize,
    cols: usize,
    slope: Raster,
    excluded: Raster,
    /// Earliest road raster; answers every year before the first later one.
    base_roads: Raster,
    /// Road rasters after the earliest, keyed by year.
    later_roads: BTreeMap<u32, Raster>,
    urban: BTreeMap<u32, Raster>,
    excluded_pixels: usize,
}

impl InMemoryGrids {
    /// Assemble a grid set, validating that every layer shares one shape.
    ///
    /// # Errors
    ///
    /// Returns an error when a layer's dimensions differ from the slope
    /// raster's or when roads or urban history are missing.
    pub fn new(
        slope: Raster,
        excluded: Raster,
        mut roads: BTreeMap<u32, Raster>,
        urban: BTreeMap<u32, Raster>,
    ) -> Result<Self, GridError> {
        let rows = slope.rows();
        let cols = slope.cols();
        if rows == 0 || cols == 0 {
            return Err(GridError::EmptyDimensions { rows, cols });
        }
        if urban.is_empty() {
            return Err(GridError::MissingUrbanHistory);
        }
        let check = |layer: String, raster: &Raster| -> Result<(), GridError> {
            if raster.rows() == rows && raster.cols() == cols {
                Ok(())
            } else {
                Err(GridError::LayerSize {
                    layer,
                    expected: rows * cols,
                    actual: raster.len(),
                    rows,
                    cols,
                })
            }
        };
        check("excluded".to_string(), &excluded)?;
        for (year, raster) in &roads {
            check(format!("roads[{year}]"), raster)?;
        }
        for (year, raster) in &urban {
            check(format!("urban[{year}]"), raster)?;
        }
        let Some((_, base_roads)) = roads.pop_first() else {
            return Err(GridError::MissingRoads);
        };
        let excluded_pixels = excluded.count_at_least(FULLY_EXCLUDED);
        Ok(Self {
            rows,
            cols,
            slope,
            excluded,
            base_roads,
            later_roads: roads,
            urban,
            excluded_pixels,
        })
    }

    /// First urban-history year (the seed year).
    #[must_use]
    pub fn seed_year(&self) -> u32 {
        self.urban.keys().next().copied().unwrap_or_default()
    }
}

impl GridSource for InMemoryGrids {
    fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn slope(&self) -> &Raster {
        &self.slope
    }

    fn excluded(&self) -> &Raster {
        &self.excluded
    }

    fn road_for_year(&self, year: u32) -> &Raster {
        self.later_roads
            .range(..=year)
            .next_back()
            .map_or(&self.base_roads, |(_, raster)| raster)
    }

    fn historical_urban_for_year(&self, year: u32) -> Option<&Raster> {
        self.urban.get(&year)
    }

    fn urban_years(&self) -> Vec<u32> {
        self.urban.keys().copied().collect()
    }

    fn excluded_pixel_count(&self) -> usize {
        self.excluded_pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(year: u32, raster: Raster) -> BTreeMap<u32, Raster> {
        BTreeMap::from([(year, raster)])
    }

    #[test]
    fn from_cells_rejects_wrong_length() {
        let err = Raster::from_cells("slope", 2, 3, vec![0; 5]).unwrap_err();
        assert!(matches!(err, GridError::LayerSize { expected: 6, actual: 5, .. }));
        assert_eq!(
            Raster::from_cells("slope", 0, 3, Vec::new()).unwrap_err(),
            GridError::EmptyDimensions { rows: 0, cols: 3 }
        );
    }

    #[test]
    fn interior_and_bounds_checks() {
        let raster = Raster::zeroed(4, 5);
        assert!(raster.is_interior(1, 1));
        assert!(raster.is_interior(2, 3));
        assert!(!raster.is_interior(0, 2));
        assert!(!raster.is_interior(3, 2));
        assert!(!raster.is_interior(2, 4));
        assert_eq!(raster.shifted(0, 0, (-1, 0)), None);
        assert_eq!(raster.shifted(0, 0, (1, 1)), Some((1, 1)));
        assert_eq!(raster.shifted(3, 4, (0, 1)), None);
    }

    #[test]
    fn grid_set_validates_layer_shapes() {
        let err = InMemoryGrids::new(
            Raster::zeroed(3, 3),
            Raster::zeroed(3, 4),
            single(1990, Raster::zeroed(3, 3)),
            single(1990, Raster::zeroed(3, 3)),
        )
        .unwrap_err();
        assert!(matches!(err, GridError::LayerSize { ref layer, .. } if layer == "excluded"));

        let err = InMemoryGrids::new(
            Raster::zeroed(3, 3),
            Raster::zeroed(3, 3),
            BTreeMap::new(),
            single(1990, Raster::zeroed(3, 3)),
        )
        .unwrap_err();
        assert_eq!(err, GridError::MissingRoads);
    }

    #[test]
    fn roads_resolve_to_latest_year_at_or_before() {
        let early = Raster::filled(3, 3, 1);
        let late = Raster::filled(3, 3, 2);
        let grids = InMemoryGrids::new(
            Raster::zeroed(3, 3),
            Raster::zeroed(3, 3),
            BTreeMap::from([(1990, early), (2000, late)]),
            single(1990, Raster::zeroed(3, 3)),
        )
        .unwrap();
        assert_eq!(grids.road_for_year(1980).get(0, 0), 1);
        assert_eq!(grids.road_for_year(1995).get(0, 0), 1);
        assert_eq!(grids.road_for_year(2000).get(0, 0), 2);
        assert_eq!(grids.road_for_year(2010).get(0, 0), 2);
        assert_eq!(grids.road_pixel_count(2010), 9);
    }

    #[test]
    fn years_before_any_road_raster_use_the_earliest_roads() {
        let mut roads = Raster::zeroed(3, 3);
        roads.set(1, 1, 100);
        let grids = InMemoryGrids::new(
            Raster::filled(3, 3, 7),
            Raster::zeroed(3, 3),
            BTreeMap::from([(1990, roads.clone()), (2005, Raster::filled(3, 3, 50))]),
            single(1990, Raster::zeroed(3, 3)),
        )
        .unwrap();
        assert_eq!(grids.road_for_year(1900), &roads);
        assert_eq!(grids.road_for_year(2004), &roads);
        assert_eq!(grids.road_pixel_count(1900), 1);
        assert_eq!(grids.road_pixel_count(2005), 9);
    }

    #[test]
    fn excluded_count_only_includes_full_protection() {
        let mut excluded = Raster::zeroed(2, 2);
        excluded.set(0, 0, 100);
        excluded.set(0, 1, 99);
        excluded.set(1, 1, 255);
        let grids = InMemoryGrids::new(
            Raster::zeroed(2, 2),
            excluded,
            single(1990, Raster::zeroed(2, 2)),
            single(1990, Raster::zeroed(2, 2)),
        )
        .unwrap();
        assert_eq!(grids.excluded_pixel_count(), 2);
        assert_eq!(grids.total_pixels(), 4);
    }

    #[test]
    fn fingerprint_tracks_contents() {
        let mut a = Raster::zeroed(3, 3);
        let b = Raster::zeroed(3, 3);
        assert_eq!(a.fingerprint(), b.fingerprint());
        a.set(1, 1, 4);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(Raster::zeroed(1, 9).fingerprint(), b.fingerprint());
    }
}
