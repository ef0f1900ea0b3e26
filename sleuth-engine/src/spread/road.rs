//! Spiral road search and road walking for road-influenced growth.
use crate::constants::{MAX_ROAD_VALUE, ROAD_GRAVITY_DIVISOR};
use crate::grid::{NEIGHBOR_OFFSETS, Raster};
use crate::numbers::{floor_f64_to_usize, usize_to_f64};
use crate::random::RandomStream;

/// Map a spiral search index to a `(row, col)` offset from the centre.
///
/// Band `b` holds the `8b` cells of the square ring at distance `b`, walked
/// down the left edge, along the bottom, up the right edge and back along
/// the top. Indices `0..8` are therefore the eight immediate neighbours in
/// [`NEIGHBOR_OFFSETS`] order.
#[must_use]
pub fn spiral_offset(index: usize) -> (isize, isize) {
    let mut band = 1usize;
    while 4 * band * (band + 1) <= index {
        band += 1;
    }
    let band_start = 4 * (band - 1) * band;
    let k = (index - band_start) as isize;
    let b = band as isize;

    let left_ln = 2 * b + 1;
    let right_ln = 2 * b + 1;
    let top_ln = 2 * b - 1;
    let bot_ln = 2 * b - 1;
    let range1 = left_ln;
    let range2 = left_ln + bot_ln;
    let range3 = left_ln + bot_ln + right_ln;
    let range4 = left_ln + bot_ln + right_ln + top_ln;

    if k < range1 {
        (-b + k, -b)
    } else if k >= range1 && k < range2 {
        (b, -b + 1 + (k - range1))
    } else if k >= range2 && k < range3 {
        (b - (k - range2), b)
    } else if k >= range3 && k < range4 {
        (-b, b - 1 - (k - range3))
    } else {
        (0, 0)
    }
}

/// Search budget for a road gravity coefficient on a `rows x cols` grid.
#[must_use]
pub fn max_search_index(road_gravity: f64, rows: usize, cols: usize) -> usize {
    let scaled = road_gravity / MAX_ROAD_VALUE * usize_to_f64(rows + cols) / ROAD_GRAVITY_DIVISOR;
    let gravity = floor_f64_to_usize(scaled);
    (4 * gravity * (1 + gravity)).max(rows).max(cols)
}

/// First road pixel met walking the spiral out from `(row, col)`.
#[must_use]
pub fn search(
    roads: &Raster,
    row: usize,
    col: usize,
    max_search_index: usize,
) -> Option<(usize, usize)> {
    (0..max_search_index).find_map(|index| {
        let (r, c) = roads.shifted(row, col, spiral_offset(index))?;
        (roads.get(r, c) != 0).then_some((r, c))
    })
}

/// Walk along connected road pixels from `start`.
///
/// Each step moves to the first road neighbour found scanning the eight
/// offsets from a random starting index. The walk succeeds at the first
/// pixel where the step count exceeds `floor(road / MAX_ROAD_VALUE *
/// diffusion)`, and fails at a pixel with no road neighbour.
pub fn walk(
    roads: &Raster,
    start: (usize, usize),
    diffusion: f64,
    rng: &mut RandomStream,
) -> Option<(usize, usize)> {
    let (mut row, mut col) = start;
    let mut run = 0usize;
    loop {
        let first = rng.uniform_int(0, NEIGHBOR_OFFSETS.len() - 1);
        let next = (0..NEIGHBOR_OFFSETS.len()).find_map(|step| {
            let delta = NEIGHBOR_OFFSETS[(first + step) % NEIGHBOR_OFFSETS.len()];
            let (r, c) = roads.shifted(row, col, delta)?;
            (roads.get(r, c) != 0).then_some((r, c))
        });
        let (r, c) = next?;
        row = r;
        col = c;
        run += 1;
        let run_threshold =
            floor_f64_to_usize(f64::from(roads.get(row, col)) / MAX_ROAD_VALUE * diffusion);
        if run > run_threshold {
            return Some((row, col));
        }
    }
}
