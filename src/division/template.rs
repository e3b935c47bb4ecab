//! Per-cycle separation templates.
//!
//! A [`CycleTemplate`] is the quadratic `distance(t) = a·t² + b·t + c` that best describes,
//! in the least-squares sense, how far apart the two daughters of a division of that cycle
//! are `t` after the division. The system is solved through the SVD of the Vandermonde
//! matrix, which behaves well even when times are clustered.
use std::collections::BTreeMap;

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use smallvec::SmallVec;

use crate::constants::{Cycle, EPS, MIN_TEMPLATE_OBSERVATIONS};
use crate::divtrack_errors::DivTrackError;
use crate::division::pairs::PairObservation;
use crate::division::DivisionParams;

/// Fitted separation curve of one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleTemplate {
    pub cycle: Cycle,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    /// Observations used by the fit
    pub n_observations: usize,
}

/// Fit outcome per cycle; a failed cycle never hides the others.
pub type CycleTemplates = BTreeMap<Cycle, Result<CycleTemplate, DivTrackError>>;

impl CycleTemplate {
    pub fn new(cycle: Cycle, a: f64, b: f64, c: f64) -> Self {
        CycleTemplate {
            cycle,
            a,
            b,
            c,
            n_observations: 0,
        }
    }

    #[inline]
    pub fn eval(&self, t: f64) -> f64 {
        (self.a * t + self.b) * t + self.c
    }

    #[inline]
    pub fn coefficients(&self) -> [f64; 3] {
        [self.a, self.b, self.c]
    }

    /// Real roots of the template, ascending.
    ///
    /// A vanishing `a` degrades to the linear root; a constant template has none.
    pub fn x_intercepts(&self) -> SmallVec<[f64; 2]> {
        let mut roots = SmallVec::new();
        if self.a.abs() < EPS {
            if self.b.abs() >= EPS {
                roots.push(-self.c / self.b);
            }
            return roots;
        }
        let disc = self.b * self.b - 4.0 * self.a * self.c;
        if disc < 0.0 {
            return roots;
        }
        let sq = disc.sqrt();
        let r1 = (-self.b - sq) / (2.0 * self.a);
        let r2 = (-self.b + sq) / (2.0 * self.a);
        roots.push(r1.min(r2));
        roots.push(r1.max(r2));
        roots
    }
}

/// Least-squares quadratic through `(times[i], distances[i])`.
///
/// Arguments
/// -----------------
/// * `cycle`: cycle being fitted, reported in errors.
/// * `times`: time since division of every observation.
/// * `distances`: daughter separation of every observation.
///
/// Return
/// ----------
/// * `Err(DivTrackError::DegenerateTimes)` when several observations all share one time.
/// * `Err(DivTrackError::TooFewObservations)` when fewer than three distinct times exist.
/// * `Err(DivTrackError::SingularFit)` if the solve fails or yields non-finite coefficients.
pub fn fit_quadratic(
    cycle: Cycle,
    times: &[f64],
    distances: &[f64],
) -> Result<CycleTemplate, DivTrackError> {
    debug_assert_eq!(times.len(), distances.len());

    let mut distinct: Vec<f64> = times.to_vec();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup_by(|a, b| (*a - *b).abs() < EPS);

    if distinct.len() < MIN_TEMPLATE_OBSERVATIONS {
        if distinct.len() == 1 && times.len() > 1 {
            return Err(DivTrackError::DegenerateTimes { cycle });
        }
        return Err(DivTrackError::TooFewObservations {
            cycle,
            found: distinct.len(),
        });
    }

    let n = times.len();
    let vander = DMatrix::from_fn(n, 3, |i, j| times[i].powi(2 - j as i32));
    let rhs = DVector::from_column_slice(distances);

    let coeffs = vander
        .svd(true, true)
        .solve(&rhs, EPS)
        .map_err(|_| DivTrackError::SingularFit { cycle })?;

    if coeffs.iter().any(|c| !c.is_finite()) {
        return Err(DivTrackError::SingularFit { cycle });
    }

    Ok(CycleTemplate {
        cycle,
        a: coeffs[0],
        b: coeffs[1],
        c: coeffs[2],
        n_observations: n,
    })
}

/// Fit one template per configured cycle.
///
/// Every cycle of `params.cycles` gets an entry, including cycles without any observation
/// (which fail with [`DivTrackError::TooFewObservations`]).
pub fn fit_cycle_templates(
    observations: &[PairObservation],
    params: &DivisionParams,
) -> CycleTemplates {
    params
        .cycles
        .clone()
        .map(|cycle| {
            let (times, distances): (Vec<f64>, Vec<f64>) = observations
                .iter()
                .filter(|o| o.cycle == cycle)
                .map(|o| (o.time_since_division, o.distance))
                .unzip();

            let fit = fit_quadratic(cycle, &times, &distances);
            match &fit {
                Ok(t) => {
                    debug!(
                        "Cycle {cycle}: a={:.6} b={:.6} c={:.6} over {} observations",
                        t.a, t.b, t.c, t.n_observations
                    );
                    debug!("x intercepts for cycle {cycle}: {:?}", t.x_intercepts());
                }
                Err(e) => warn!("{e}"),
            }
            (cycle, fit)
        })
        .collect()
}
