//! # Stationary timepoints
//!
//! Selects, for every nuclear cycle, the most **motion-quiescent** representative frame, and
//! builds a cross-referenced spatial snapshot of the embryo at those frames.
//!
//! ## Frame selection
//! -----------------
//! For one cycle:
//!
//! 1. Count the records of that cycle per frame and keep only frames whose count exceeds
//!    `count_fraction` × the cycle maximum. This drops frames caught in the middle of a
//!    division wave, where the count is still doubling.
//! 2. Over the kept frames, average `dtot` (instantaneous displacement) per frame.
//! 3. Smooth with a trailing moving average of `rolling_window` entries; a window that is
//!    incomplete or touches a frame without any displacement yields no value.
//! 4. The kept frame with the smallest smoothed value is the stationary frame.
//!
//! The same selection is repeated with `time_since_nc11` as the axis, which yields the
//! representative **time** of the cycle; frames may be unevenly spaced in time, so the two
//! are reported separately.
//!
//! ## Snapshot
//! -----------------
//! See [`snapshot`].
use std::cmp::Ordering::{Greater, Less};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use log::{debug, warn};
use ordered_float::OrderedFloat;

use crate::constants::{
    Cycle, Frame, STATIONARY_COUNT_FRACTION, STATIONARY_CYCLES, STATIONARY_ROLLING_WINDOW,
};
use crate::divtrack_errors::DivTrackError;
use crate::spots::SpotTable;

pub mod snapshot;

/// Configuration of the stationary timepoint search.
///
/// Defaults: `count_fraction = 0.8`, `rolling_window = 5`, cycles 10..=14.
#[derive(Debug, Clone, PartialEq)]
pub struct StationaryParams {
    pub count_fraction: f64,
    pub rolling_window: usize,
    pub cycles: RangeInclusive<Cycle>,
}

impl Default for StationaryParams {
    fn default() -> Self {
        StationaryParams {
            count_fraction: STATIONARY_COUNT_FRACTION,
            rolling_window: STATIONARY_ROLLING_WINDOW,
            cycles: STATIONARY_CYCLES,
        }
    }
}

impl StationaryParams {
    pub fn builder() -> StationaryParamsBuilder {
        StationaryParamsBuilder::default()
    }
}

/// Builder for [`StationaryParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct StationaryParamsBuilder {
    params: StationaryParams,
}

impl StationaryParamsBuilder {
    pub fn count_fraction(mut self, v: f64) -> Self {
        self.params.count_fraction = v;
        self
    }
    pub fn rolling_window(mut self, v: usize) -> Self {
        self.params.rolling_window = v;
        self
    }
    pub fn cycles(mut self, v: RangeInclusive<Cycle>) -> Self {
        self.params.cycles = v;
        self
    }

    /// Validation: `0 < count_fraction < 1`, `rolling_window >= 1`, non-empty cycles.
    ///
    /// A frame is kept when its count is strictly above `count_fraction` × the maximum, so a
    /// fraction of 1 would keep no frame at all.
    pub fn build(self) -> Result<StationaryParams, DivTrackError> {
        let p = &self.params;
        if p.count_fraction.partial_cmp(&0.0) != Some(Greater)
            || p.count_fraction.partial_cmp(&1.0) != Some(Less)
        {
            return Err(DivTrackError::InvalidStationaryParameter(
                "count_fraction must be in (0, 1)".into(),
            ));
        }
        if p.rolling_window == 0 {
            return Err(DivTrackError::InvalidStationaryParameter(
                "rolling_window must be >= 1".into(),
            ));
        }
        if p.cycles.is_empty() {
            return Err(DivTrackError::InvalidStationaryParameter(
                "cycles must not be empty".into(),
            ));
        }
        Ok(self.params)
    }
}

/// Representative low-motion moment of one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationaryTimepoint {
    pub cycle: Cycle,
    pub frame: Frame,
    pub time: f64,
}

/// Key of the first complete trailing window with the smallest mean.
fn rolling_argmin<K: Copy>(series: &[(K, Option<f64>)], window: usize) -> Option<K> {
    if window == 0 || series.len() < window {
        return None;
    }
    let mut best: Option<(K, f64)> = None;
    for end in window - 1..series.len() {
        let slice = &series[end + 1 - window..=end];
        let Some(sum) = slice
            .iter()
            .map(|(_, v)| *v)
            .try_fold(0.0, |acc, v| v.map(|v| acc + v))
        else {
            continue;
        };
        let avg = sum / window as f64;
        if best.map_or(true, |(_, b)| avg < b) {
            best = Some((series[end].0, avg));
        }
    }
    best.map(|(k, _)| k)
}

fn mean_or_none(acc: (f64, usize)) -> Option<f64> {
    (acc.1 > 0).then(|| acc.0 / acc.1 as f64)
}

/// Frames of `cycle` whose spot count exceeds `fraction` of the cycle's maximum count.
pub fn populated_frames(table: &SpotTable, cycle: Cycle, fraction: f64) -> BTreeSet<Frame> {
    let mut counts: BTreeMap<Frame, usize> = BTreeMap::new();
    for spot in table.iter().filter(|s| s.cycle == Some(cycle)) {
        *counts.entry(spot.frame).or_default() += 1;
    }
    let Some(&max) = counts.values().max() else {
        return BTreeSet::new();
    };
    let threshold = max as f64 * fraction;
    counts
        .into_iter()
        .filter_map(|(frame, n)| (n as f64 > threshold).then_some(frame))
        .collect()
}

/// Find the stationary frame and time of every configured cycle.
///
/// Return
/// ----------
/// * One [`StationaryTimepoint`] per cycle for which both a frame and a time could be
///   selected, in cycle order. Cycles without records, or with fewer kept frames than the
///   rolling window, are skipped with a warning.
pub fn find_stationary_timepoints(
    table: &SpotTable,
    params: &StationaryParams,
) -> Vec<StationaryTimepoint> {
    let mut timepoints = Vec::new();

    for cycle in params.cycles.clone() {
        if !table.iter().any(|s| s.cycle == Some(cycle)) {
            warn!("Cycle {cycle}: no records, no stationary timepoint");
            continue;
        }
        let frames = populated_frames(table, cycle, params.count_fraction);
        if frames.is_empty() {
            warn!(
                "Cycle {cycle}: no frame above {} of the maximum count, no stationary timepoint",
                params.count_fraction
            );
            continue;
        }

        let mut per_frame: BTreeMap<Frame, (f64, usize)> =
            frames.iter().map(|&f| (f, (0.0, 0))).collect();
        let mut per_time: BTreeMap<OrderedFloat<f64>, (f64, usize)> = BTreeMap::new();
        for spot in table.iter().filter(|s| frames.contains(&s.frame)) {
            let time_acc = per_time
                .entry(OrderedFloat(spot.time_since_nc11))
                .or_insert((0.0, 0));
            if let Some(dtot) = spot.dtot() {
                time_acc.0 += dtot;
                time_acc.1 += 1;
                if let Some(acc) = per_frame.get_mut(&spot.frame) {
                    acc.0 += dtot;
                    acc.1 += 1;
                }
            }
        }

        let frame_series: Vec<(Frame, Option<f64>)> = per_frame
            .into_iter()
            .map(|(f, acc)| (f, mean_or_none(acc)))
            .collect();
        let time_series: Vec<(OrderedFloat<f64>, Option<f64>)> = per_time
            .into_iter()
            .map(|(t, acc)| (t, mean_or_none(acc)))
            .collect();

        match (
            rolling_argmin(&frame_series, params.rolling_window),
            rolling_argmin(&time_series, params.rolling_window),
        ) {
            (Some(frame), Some(time)) => {
                debug!("Cycle {cycle}: stationary frame {frame}, time {}", time.0);
                timepoints.push(StationaryTimepoint {
                    cycle,
                    frame,
                    time: time.0,
                });
            }
            _ => warn!(
                "Cycle {cycle}: {} populated frames, not enough displacement data for a window of {}",
                frames.len(),
                params.rolling_window
            ),
        }
    }

    timepoints
}
