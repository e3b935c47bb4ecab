//! Daughter-pair observations.
//!
//! Records sharing a frame and a mother tracklet are the daughters of one division seen
//! at one instant. Exactly two of them make an observation; any other count (a missed
//! detection, a merge artifact, a division with more than two children) is dropped.
use std::collections::BTreeMap;

use itertools::{Itertools, MinMaxResult};
use log::debug;

use crate::constants::{Cycle, Frame, TrackletId};
use crate::divtrack_errors::DivTrackError;
use crate::division::DivisionParams;
use crate::spots::{SpotRecord, SpotTable};

/// Two daughters of one division observed at one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PairObservation {
    /// Mother tracklet of both daughters
    pub prev_tracklet_id: TrackletId,
    pub frame: Frame,
    /// Time since the daughters' tracklets started, rounded
    pub time_since_division: f64,
    /// Sum over the three axes of the pair's span
    pub distance: f64,
    /// Cycle of the daughters
    pub cycle: Cycle,
    /// Earliest `time_since_nc11` of the pair
    pub nc11_time: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub ap: f64,
    pub theta: f64,
}

/// Sum over `x`, `y`, `z` of `max - min` across `members`.
///
/// For exactly two points this is `|x₁-x₂| + |y₁-y₂| + |z₁-z₂|`.
pub fn axis_span_sum(members: &[&SpotRecord]) -> f64 {
    let span = |values: Vec<f64>| match values.into_iter().minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::MinMax(lo, hi) => hi - lo,
        MinMaxResult::OneElement(_) | MinMaxResult::NoElements => 0.0,
    };
    span(members.iter().map(|s| s.x).collect())
        + span(members.iter().map(|s| s.y).collect())
        + span(members.iter().map(|s| s.z).collect())
}

/// Round half to even at `decimals` places.
#[inline]
pub(crate) fn round_decimals(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round_ties_even() / scale
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    sum / n as f64
}

/// Extract every daughter-pair observation of a resolved table.
///
/// Arguments
/// -----------------
/// * `table`: records with `tracklet_id`, `cycle`, `prev_tracklet_id` and
///   `time_since_division` resolved.
/// * `params`: provides the time window and rounding.
///
/// Return
/// ----------
/// * Observations sorted by `(prev_tracklet_id, frame)`, restricted to pairs observed
///   earlier than `params.max_time_since_division`.
/// * `Err(DivTrackError::LineageNotResolved)` if a record with a mother lacks its cycle or
///   time since division.
pub fn pair_observations(
    table: &SpotTable,
    params: &DivisionParams,
) -> Result<Vec<PairObservation>, DivTrackError> {
    let mut groups: BTreeMap<(TrackletId, Frame), Vec<&SpotRecord>> = BTreeMap::new();
    for spot in table.iter() {
        if let Some(prev) = spot.prev_tracklet_id {
            groups.entry((prev, spot.frame)).or_default().push(spot);
        }
    }

    let mut rejected = 0usize;
    let mut late = 0usize;
    let mut observations = Vec::new();
    for ((prev, frame), members) in groups {
        if members.len() != 2 {
            rejected += 1;
            continue;
        }

        let mut time_since = f64::NEG_INFINITY;
        for s in &members {
            let t = s
                .time_since_division
                .ok_or(DivTrackError::LineageNotResolved("time_since_division"))?;
            time_since = time_since.max(t);
        }
        let time_since = round_decimals(time_since, params.time_rounding_decimals);
        let cycle = members[0]
            .cycle
            .ok_or(DivTrackError::LineageNotResolved("cycle"))?;

        if time_since >= params.max_time_since_division {
            late += 1;
            continue;
        }

        observations.push(PairObservation {
            prev_tracklet_id: prev,
            frame,
            time_since_division: time_since,
            distance: axis_span_sum(&members),
            cycle,
            nc11_time: members
                .iter()
                .map(|s| s.time_since_nc11)
                .fold(f64::INFINITY, f64::min),
            x: mean(members.iter().map(|s| s.x)),
            y: mean(members.iter().map(|s| s.y)),
            z: mean(members.iter().map(|s| s.z)),
            ap: mean(members.iter().map(|s| s.ap)),
            theta: mean(members.iter().map(|s| s.theta)),
        });
    }

    debug!(
        "{} pair observations kept, {rejected} groups without exactly two daughters, {late} past the separation window",
        observations.len()
    );
    Ok(observations)
}
