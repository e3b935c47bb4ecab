//! # Division timing
//!
//! Estimates, for every resolved division, the **sub-frame time** at which it happened by
//! matching how the two daughter nuclei move apart against a per-cycle separation
//! template.
//!
//! ## Pipeline overview
//!
//! 1. **Daughter-pair observations** ([`pairs`])
//!    Records are grouped by `(frame, prev_tracklet_id)`. A group with exactly two members
//!    (both daughters of one division, present at that frame) yields one observation:
//!    the summed per-axis span of the pair, its time since division and mean position.
//!    Only observations earlier than `max_time_since_division` after the division are kept.
//!
//! 2. **Cycle templates** ([`template`])
//!    For each configured cycle, `distance(t) = a·t² + b·t + c` is fitted by ordinary
//!    least squares over all observations of that cycle. A cycle with fewer than three
//!    distinct times fails with a fitting error; other cycles are unaffected.
//!
//! 3. **Shift search** ([`estimator`])
//!    Per mother tracklet, a fixed grid of `num_points` candidate shifts in
//!    `[range_min, range_max]` is scanned. The shift minimizing the objective gives the
//!    corrected division time `min(time_since_nc11) + x₀*`. Precision is bounded by the
//!    grid spacing `(range_max - range_min) / (num_points - 1)`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use divtrack::division::{DivisionParams, MatchObjective};
//!
//! let params = DivisionParams::builder()
//!     .range(-0.5, 0.5)
//!     .num_points(501)
//!     .objective(MatchObjective::MeanOffset)
//!     .build()
//!     .unwrap();
//! ```
use std::cmp::Ordering::{Greater, Less};
use std::ops::RangeInclusive;

use log::info;

use crate::constants::{
    Cycle, MAX_TIME_SINCE_DIVISION, SHIFT_NUM_POINTS, SHIFT_RANGE_MAX, SHIFT_RANGE_MIN,
    TEMPLATE_CYCLES, TIME_ROUNDING_DECIMALS,
};
use crate::divtrack_errors::DivTrackError;
use crate::spots::SpotTable;

pub mod estimator;
pub mod pairs;
pub mod template;

use estimator::{estimate_division_times, DivisionTimeEstimate};
use pairs::{pair_observations, PairObservation};
use template::{fit_cycle_templates, CycleTemplates};

/// Objective minimized by the shift search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchObjective {
    /// Squared residuals after removing their mean (absorbs a constant vertical offset).
    #[default]
    MeanOffset,
    /// Squared residuals normalized by the observed distance, no mean removal.
    Relative,
}

/// Configuration of the division-timing stage.
///
/// Fields
/// -----------------
/// * `range_min`, `range_max` – bounds of the candidate shift grid (same unit as `time_since_nc11`).
/// * `num_points` – number of equally spaced candidates, bounds included.
/// * `max_time_since_division` – pairs observed at or after this time are discarded.
/// * `time_rounding_decimals` – decimals kept on a pair's time since division.
/// * `min_pair_observations` – minimum observations a division needs to be estimated.
/// * `cycles` – cycles for which a template is fitted.
/// * `objective` – see [`MatchObjective`].
///
/// Defaults: `[-1.0, 1.0]`, 250 points, 2.1, 2 decimals, 2 observations, cycles 11..=14,
/// [`MatchObjective::MeanOffset`].
#[derive(Debug, Clone, PartialEq)]
pub struct DivisionParams {
    pub range_min: f64,
    pub range_max: f64,
    pub num_points: usize,
    pub max_time_since_division: f64,
    pub time_rounding_decimals: u32,
    pub min_pair_observations: usize,
    pub cycles: RangeInclusive<Cycle>,
    pub objective: MatchObjective,
}

impl DivisionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> DivisionParamsBuilder {
        DivisionParamsBuilder::new()
    }

    /// Spacing between two consecutive candidate shifts.
    #[inline]
    pub fn grid_step(&self) -> f64 {
        (self.range_max - self.range_min) / (self.num_points - 1) as f64
    }

    /// Candidate shift `k` of the grid; the last candidate is exactly `range_max`.
    #[inline]
    pub fn grid_point(&self, k: usize) -> f64 {
        if k + 1 >= self.num_points {
            self.range_max
        } else {
            self.range_min + k as f64 * self.grid_step()
        }
    }
}

impl Default for DivisionParams {
    fn default() -> Self {
        DivisionParams {
            range_min: SHIFT_RANGE_MIN,
            range_max: SHIFT_RANGE_MAX,
            num_points: SHIFT_NUM_POINTS,
            max_time_since_division: MAX_TIME_SINCE_DIVISION,
            time_rounding_decimals: TIME_ROUNDING_DECIMALS,
            min_pair_observations: 2,
            cycles: TEMPLATE_CYCLES,
            objective: MatchObjective::MeanOffset,
        }
    }
}

/// Builder for [`DivisionParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct DivisionParamsBuilder {
    params: DivisionParams,
}

impl DivisionParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: DivisionParams::default(),
        }
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.params.range_min = min;
        self.params.range_max = max;
        self
    }
    pub fn num_points(mut self, v: usize) -> Self {
        self.params.num_points = v;
        self
    }
    pub fn max_time_since_division(mut self, v: f64) -> Self {
        self.params.max_time_since_division = v;
        self
    }
    pub fn time_rounding_decimals(mut self, v: u32) -> Self {
        self.params.time_rounding_decimals = v;
        self
    }
    pub fn min_pair_observations(mut self, v: usize) -> Self {
        self.params.min_pair_observations = v;
        self
    }
    pub fn cycles(mut self, v: RangeInclusive<Cycle>) -> Self {
        self.params.cycles = v;
        self
    }
    pub fn objective(mut self, v: MatchObjective) -> Self {
        self.params.objective = v;
        self
    }

    /// Finalize the builder.
    ///
    /// Validation rules
    /// -----------------
    /// * `range_min < range_max`, both finite.
    /// * `num_points >= 2`.
    /// * `max_time_since_division > 0`.
    /// * `min_pair_observations >= 1`.
    /// * `cycles` is not empty.
    pub fn build(self) -> Result<DivisionParams, DivTrackError> {
        let p = &self.params;

        if !(p.range_min.is_finite() && p.range_max.is_finite())
            || p.range_min.partial_cmp(&p.range_max) != Some(Less)
        {
            return Err(DivTrackError::InvalidDivisionParameter(
                "range_min must be < range_max".into(),
            ));
        }
        if p.num_points < 2 {
            return Err(DivTrackError::InvalidDivisionParameter(
                "num_points must be >= 2".into(),
            ));
        }
        if p.max_time_since_division.partial_cmp(&0.0) != Some(Greater) {
            return Err(DivTrackError::InvalidDivisionParameter(
                "max_time_since_division must be > 0".into(),
            ));
        }
        if p.min_pair_observations == 0 {
            return Err(DivTrackError::InvalidDivisionParameter(
                "min_pair_observations must be >= 1".into(),
            ));
        }
        if p.cycles.is_empty() {
            return Err(DivTrackError::InvalidDivisionParameter(
                "cycles must not be empty".into(),
            ));
        }
        Ok(self.params)
    }
}

/// Everything produced by the division-timing stage for one dataset.
#[derive(Debug)]
pub struct DivisionTiming {
    pub observations: Vec<PairObservation>,
    pub templates: CycleTemplates,
    pub estimates: Vec<DivisionTimeEstimate>,
}

impl DivisionTiming {
    /// Cycles whose template could not be fitted, with the reason.
    pub fn failed_cycles(&self) -> impl Iterator<Item = (Cycle, &DivTrackError)> {
        self.templates
            .iter()
            .filter_map(|(c, res)| res.as_ref().err().map(|e| (*c, e)))
    }
}

/// Run pair extraction, template fitting and shift search on a resolved table.
///
/// Requires tracklets, cycles and lineage to be resolved on `table`.
pub fn time_divisions(
    table: &SpotTable,
    params: &DivisionParams,
) -> Result<DivisionTiming, DivTrackError> {
    let observations = pair_observations(table, params)?;
    let templates = fit_cycle_templates(&observations, params);
    let estimates = estimate_division_times(&observations, &templates, params);
    info!(
        "{} daughter-pair observations, {} division times estimated",
        observations.len(),
        estimates.len()
    );
    Ok(DivisionTiming {
        observations,
        templates,
        estimates,
    })
}
