//! Model constants for the SLEUTH growth engine.
//!
//! Changing any of these changes simulation output for a given seed.

// Coefficient bounds -------------------------------------------------------
pub const MIN_DIFFUSION: f64 = 1.0;
pub const MAX_DIFFUSION: f64 = 100.0;
pub const MIN_BREED: f64 = 1.0;
pub const MAX_BREED: f64 = 100.0;
pub const MIN_SPREAD: f64 = 1.0;
pub const MAX_SPREAD: f64 = 100.0;
pub const MIN_SLOPE_RESISTANCE: f64 = 1.0;
pub const MAX_SLOPE_RESISTANCE: f64 = 100.0;
pub const MIN_ROAD_GRAVITY: f64 = 1.0;
pub const MAX_ROAD_GRAVITY: f64 = 100.0;

// Raster semantics ---------------------------------------------------------
/// Number of distinct slope values (slope rasters are 0..=255).
pub const SLOPE_TABLE_LEN: usize = 256;
/// Road raster value treated as full capacity.
pub const MAX_ROAD_VALUE: f64 = 100.0;
/// Exclusion value at or above which a pixel can never urbanize.
pub const FULLY_EXCLUDED: u8 = 100;
/// Lowest Z value counted toward population.
pub const URBAN_THRESHOLD: u8 = 1;

// Phase tags ---------------------------------------------------------------
pub const SEED_TAG: u8 = 1;
pub const SPONTANEOUS_TAG: u8 = 1;
pub const SPREADING_CENTER_TAG: u8 = 3;
pub const ORGANIC_TAG: u8 = 4;
pub const ROAD_TAG: u8 = 5;

// Spread tuning ------------------------------------------------------------
pub const DIFFUSION_SCALE: f64 = 0.005;
pub const MIN_NEIGHBORS_TO_SPREAD: usize = 2;
pub const SPREADING_CENTER_ATTEMPTS: usize = 8;
pub const ROAD_NEIGHBOR_ROUNDS: usize = 3;
pub const ORGANIC_MIN_URBAN_NEIGHBORS: usize = 2;
pub const ORGANIC_MAX_URBAN_NEIGHBORS: usize = 7;
pub const ROAD_GRAVITY_DIVISOR: f64 = 16.0;

// Log targets --------------------------------------------------------------
pub(crate) const LOG_SPREAD: &str = "sleuth::spread";
pub(crate) const LOG_COEFF: &str = "sleuth::coeff";
pub(crate) const LOG_STATS: &str = "sleuth::stats";
pub(crate) const LOG_RUN: &str = "sleuth::run";
