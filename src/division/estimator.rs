//! Grid-search shift estimation of division times.
//!
//! For one division with observations `(tᵢ, dᵢ)` and the template `f` of its cycle, every
//! candidate shift `x₀` of the grid is scored by evaluating `f(tᵢ - x₀)` against `dᵢ`:
//!
//! ```text
//! MeanOffset:  Σ (eᵢ - ē)²          eᵢ = f(tᵢ - x₀) - dᵢ
//! Relative:    Σ (eᵢ / dᵢ)²
//! ```
//!
//! The first candidate reaching the minimum is kept. The vertical offset of the best fit is
//! `mean(f(tᵢ - x₀*) - dᵢ)` and its error is the mean squared residual once that offset is
//! removed.
use std::collections::BTreeMap;

use log::{debug, warn};

use crate::constants::{Cycle, TrackletId};
use crate::division::pairs::PairObservation;
use crate::division::template::{CycleTemplate, CycleTemplates};
use crate::division::{DivisionParams, MatchObjective};

/// Best shift found for one division.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    pub x0: f64,
    pub offset: f64,
    pub mse: f64,
}

/// Corrected timing of one division.
#[derive(Debug, Clone, PartialEq)]
pub struct DivisionTimeEstimate {
    /// Mother tracklet (the tracklet that divided)
    pub tracklet_id: TrackletId,
    /// Earliest `time_since_nc11` at which both daughters were observed
    pub division_time: f64,
    /// `division_time + x₀*`
    pub corrected_division_time: f64,
    /// Cycle of the mother (daughter cycle - 1)
    pub cycle: Cycle,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub ap: f64,
    pub theta: f64,
    /// Mean squared error of the template fit
    pub error: f64,
    pub offset: f64,
    pub n_observations: usize,
}

fn score(times: &[f64], distances: &[f64], template: &CycleTemplate, x0: f64, objective: MatchObjective) -> f64 {
    match objective {
        MatchObjective::MeanOffset => {
            let errors: Vec<f64> = times
                .iter()
                .zip(distances)
                .map(|(t, d)| template.eval(t - x0) - d)
                .collect();
            let mean = errors.iter().sum::<f64>() / errors.len() as f64;
            errors.iter().map(|e| (e - mean).powi(2)).sum()
        }
        MatchObjective::Relative => times
            .iter()
            .zip(distances)
            .map(|(t, d)| {
                let e = template.eval(t - x0) - d;
                if *d > 0.0 {
                    (e / d).powi(2)
                } else {
                    e.powi(2)
                }
            })
            .sum(),
    }
}

fn group_mean(group: &[&PairObservation], field: impl Fn(&PairObservation) -> f64) -> f64 {
    group.iter().map(|o| field(o)).sum::<f64>() / group.len() as f64
}

/// Search the shift aligning `(times, distances)` with `template`.
///
/// Arguments
/// -----------------
/// * `times`: time since division of each observation.
/// * `distances`: observed separation at each time.
/// * `template`: separation curve of the division's cycle.
/// * `params`: grid bounds, resolution and objective.
///
/// Return
/// ----------
/// * The best [`TemplateMatch`]; `x0` is always a grid point within `[range_min, range_max]`.
pub fn match_template(
    times: &[f64],
    distances: &[f64],
    template: &CycleTemplate,
    params: &DivisionParams,
) -> TemplateMatch {
    let mut best_x0 = params.grid_point(0);
    let mut best_score = f64::INFINITY;
    for k in 0..params.num_points {
        let x0 = params.grid_point(k);
        let s = score(times, distances, template, x0, params.objective);
        if s < best_score {
            best_score = s;
            best_x0 = x0;
        }
    }

    let n = times.len() as f64;
    let offset = times
        .iter()
        .zip(distances)
        .map(|(t, d)| template.eval(t - best_x0) - d)
        .sum::<f64>()
        / n;
    let mse = times
        .iter()
        .zip(distances)
        .map(|(t, d)| (d - (template.eval(t - best_x0) - offset)).powi(2))
        .sum::<f64>()
        / n;

    TemplateMatch {
        x0: best_x0,
        offset,
        mse,
    }
}

/// Estimate the corrected time of every division with enough observations.
///
/// Observations are grouped by mother tracklet. A group is estimated when it holds at least
/// `params.min_pair_observations` observations and its cycle has a fitted template;
/// divisions of a cycle whose fit failed are skipped.
///
/// Return
/// ----------
/// * One [`DivisionTimeEstimate`] per estimated division, ordered by mother tracklet.
pub fn estimate_division_times(
    observations: &[PairObservation],
    templates: &CycleTemplates,
    params: &DivisionParams,
) -> Vec<DivisionTimeEstimate> {
    let mut groups: BTreeMap<TrackletId, Vec<&PairObservation>> = BTreeMap::new();
    for obs in observations {
        groups.entry(obs.prev_tracklet_id).or_default().push(obs);
    }

    let mut too_small = 0usize;
    let mut without_template = 0usize;
    let mut estimates = Vec::with_capacity(groups.len());

    for (tid, mut group) in groups {
        if group.len() < params.min_pair_observations {
            too_small += 1;
            continue;
        }
        group.sort_by_key(|o| o.frame);
        let cycle = group[0].cycle;
        let Some(Ok(template)) = templates.get(&cycle) else {
            without_template += 1;
            continue;
        };

        let times: Vec<f64> = group.iter().map(|o| o.time_since_division).collect();
        let distances: Vec<f64> = group.iter().map(|o| o.distance).collect();
        let m = match_template(&times, &distances, template, params);

        let division_time = group
            .iter()
            .map(|o| o.nc11_time)
            .fold(f64::INFINITY, f64::min);

        estimates.push(DivisionTimeEstimate {
            tracklet_id: tid,
            division_time,
            corrected_division_time: division_time + m.x0,
            cycle: cycle.saturating_sub(1),
            x: group_mean(&group, |o| o.x),
            y: group_mean(&group, |o| o.y),
            z: group_mean(&group, |o| o.z),
            ap: group_mean(&group, |o| o.ap),
            theta: group_mean(&group, |o| o.theta),
            error: m.mse,
            offset: m.offset,
            n_observations: group.len(),
        });
    }

    if without_template > 0 {
        warn!("{without_template} divisions skipped: no valid template for their cycle");
    }
    debug!(
        "{} divisions estimated, {too_small} with fewer than {} observations",
        estimates.len(),
        params.min_pair_observations
    );
    estimates
}
