//! Merge of optional dynamic-time-warp registration data.
//!
//! Registration is auxiliary: datasets without it, and records without a row in it,
//! simply keep `registration = None`.
use crate::constants::{FastHashMap, SpotId, REFERENCE_CYCLE};
use crate::spots::{Registration, SpotTable};

/// `spot id → (pseudotime, distance)`
pub type RegistrationTable = FastHashMap<SpotId, (f64, f64)>;

/// Attach registration values to the records of `table`.
///
/// `cycle_pseudotime` is only filled for records whose cycle is already assigned, so this
/// pass should run after cycle assignment.
///
/// Return
/// ----------
/// * The number of records that received registration data (0 when `registration` is `None`).
pub fn attach_registration(table: &mut SpotTable, registration: Option<&RegistrationTable>) -> usize {
    let Some(registration) = registration else {
        for spot in table.spots_mut() {
            spot.registration = None;
        }
        return 0;
    };

    let mut n = 0;
    for spot in table.spots_mut() {
        spot.registration = registration.get(&spot.id).map(|&(pseudotime, distance)| {
            n += 1;
            Registration {
                pseudotime,
                distance,
                cycle_pseudotime: spot
                    .cycle
                    .map(|c| pseudotime + f64::from(c) - f64::from(REFERENCE_CYCLE)),
            }
        });
    }
    n
}
