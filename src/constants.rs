//! # Constants and type definitions for divtrack
//!
//! Centralizes the **identifier aliases**, the **fixed analysis constants** and the
//! hash-map alias shared by every pass of the engine.
//!
//! ## Overview
//!
//! - Identifier aliases for spots, frames, tracklets and nuclear cycles
//! - Cycle numbering (which cycles are analysed, how boundary indices map to cycles)
//! - Default windows and thresholds used by the division-timing and stationary passes
//!
//! Absent values ("no parent", "no mother tracklet", "no neighbour") are never encoded
//! with numeric sentinels; every such field is an [`Option`].

use ahash::RandomState;
use std::collections::HashMap;
use std::ops::RangeInclusive;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Unique key of one detected nucleus at one frame
pub type SpotId = u64;

/// Acquisition frame index
pub type Frame = u32;

/// Dense tracklet identifier, starting at 1
pub type TrackletId = u32;

/// Nuclear cycle index (10..=14 for the analysed window)
pub type Cycle = u8;

/// Hash map using `ahash` for fast hashing of integer keys
pub type FastHashMap<K, V> = HashMap<K, V, RandomState>;

// -------------------------------------------------------------------------------------------------
// Cycle numbering
// -------------------------------------------------------------------------------------------------

/// Added to the boundary index found in `cycle_starts` to obtain the cycle number
pub const CYCLE_INDEX_OFFSET: Cycle = 9;

/// Cycles for which a separation template is fitted
pub const TEMPLATE_CYCLES: RangeInclusive<Cycle> = 11..=14;

/// Cycles for which a stationary timepoint is selected
pub const STATIONARY_CYCLES: RangeInclusive<Cycle> = 10..=14;

/// Reference cycle of the `time_since_nc11` axis, used by `cycle_pseudotime`
pub const REFERENCE_CYCLE: Cycle = 11;

// -------------------------------------------------------------------------------------------------
// Division timing defaults
// -------------------------------------------------------------------------------------------------

/// Only daughter pairs observed earlier than this after division are used
pub const MAX_TIME_SINCE_DIVISION: f64 = 2.1;

/// Decimals kept on a pair's `time_since_division`
pub const TIME_ROUNDING_DECIMALS: u32 = 2;

/// Default shift search interval and resolution
pub const SHIFT_RANGE_MIN: f64 = -1.0;
pub const SHIFT_RANGE_MAX: f64 = 1.0;
pub const SHIFT_NUM_POINTS: usize = 250;

/// Minimum number of distinct times required to fit a quadratic
pub const MIN_TEMPLATE_OBSERVATIONS: usize = 3;

/// Tolerance used to decide whether two times are distinct and for the SVD solve
pub const EPS: f64 = 1e-9;

// -------------------------------------------------------------------------------------------------
// Stationary timepoint defaults
// -------------------------------------------------------------------------------------------------

/// A frame is kept when its spot count exceeds this fraction of the cycle maximum
pub const STATIONARY_COUNT_FRACTION: f64 = 0.8;

/// Trailing moving-average window applied to per-frame mean displacement
pub const STATIONARY_ROLLING_WINDOW: usize = 5;
