use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sleuth_engine::{InMemoryGrids, Raster, Scenario};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// JSON bundle of every input raster, row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridBundle {
    pub rows: usize,
    pub cols: usize,
    pub slope: Vec<u8>,
    pub excluded: Vec<u8>,
    pub roads: BTreeMap<u32, Vec<u8>>,
    pub urban: BTreeMap<u32, Vec<u8>>,
}

impl GridBundle {
    pub fn into_grids(self) -> Result<InMemoryGrids> {
        let Self {
            rows,
            cols,
            slope,
            excluded,
            roads,
            urban,
        } = self;
        let slope = Raster::from_cells("slope", rows, cols, slope)?;
        let excluded = Raster::from_cells("excluded", rows, cols, excluded)?;
        let roads = layers_by_year("roads", rows, cols, roads)?;
        let urban = layers_by_year("urban", rows, cols, urban)?;
        Ok(InMemoryGrids::new(slope, excluded, roads, urban)?)
    }
}

fn layers_by_year(
    name: &str,
    rows: usize,
    cols: usize,
    layers: BTreeMap<u32, Vec<u8>>,
) -> Result<BTreeMap<u32, Raster>> {
    layers
        .into_iter()
        .map(|(year, cells)| {
            let raster = Raster::from_cells(&format!("{name}[{year}]"), rows, cols, cells)?;
            Ok((year, raster))
        })
        .collect()
}

pub fn load_scenario(path: Option<&Path>) -> Result<Scenario> {
    let Some(path) = path else {
        return Ok(Scenario::default());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    let scenario = Scenario::from_json(&json)
        .with_context(|| format!("failed to parse scenario {}", path.display()))?;
    scenario
        .validate()
        .with_context(|| format!("invalid scenario {}", path.display()))?;
    Ok(scenario)
}

pub fn load_grids(path: Option<&Path>) -> Result<InMemoryGrids> {
    let Some(path) = path else {
        return demo_bundle().into_grids();
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read grid bundle {}", path.display()))?;
    let bundle: GridBundle = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse grid bundle {}", path.display()))?;
    bundle
        .into_grids()
        .with_context(|| format!("invalid grid bundle {}", path.display()))
}

/// Small synthetic landscape used when no grid bundle is given: a town on a
/// crossroads, a ridge to the north and a protected park to the east.
pub fn demo_bundle() -> GridBundle {
    const ROWS: usize = 32;
    const COLS: usize = 32;
    let mut slope = vec![0u8; ROWS * COLS];
    let mut excluded = vec![0u8; ROWS * COLS];
    let mut roads = vec![0u8; ROWS * COLS];
    for row in 0..ROWS {
        for col in 0..COLS {
            let i = row * COLS + col;
            slope[i] = if row < 6 { 40 } else { u8::try_from((row + col) % 9).unwrap_or(0) };
            if col >= 26 && (10..22).contains(&row) {
                excluded[i] = 100;
            }
            if row == 16 || col == 14 {
                roads[i] = 80;
            }
        }
    }

    let town = |radius: usize| -> Vec<u8> {
        let mut cells = vec![0u8; ROWS * COLS];
        for row in 16 - radius..=16 + radius {
            for col in 14 - radius..=14 + radius {
                cells[row * COLS + col] = 1;
            }
        }
        cells
    };

    GridBundle {
        rows: ROWS,
        cols: COLS,
        slope,
        excluded,
        roads: BTreeMap::from([(1990, roads)]),
        urban: BTreeMap::from([(1990, town(1)), (1995, town(2)), (2000, town(3))]),
    }
}
