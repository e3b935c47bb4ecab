//! Per-record displacement relative to the parent detection.
//!
//! Every record whose parent is present gets
//! `d{x,y,z,AP,theta} = (value - parent value) / seconds_per_frame` and
//! `dtot = ‖(dx, dy, dz)‖`. Roots and records whose parent is missing keep
//! `displacement = None` and are ignored by the per-frame motion means.
use crate::divtrack_errors::DivTrackError;
use crate::spots::{DatasetMetadata, Displacement, SpotRecord, SpotTable};

fn displacement_between(spot: &SpotRecord, parent: &SpotRecord, dt: f64) -> Displacement {
    let dx = (spot.x - parent.x) / dt;
    let dy = (spot.y - parent.y) / dt;
    let dz = (spot.z - parent.z) / dt;
    let d_ap = (spot.ap - parent.ap) / dt;
    let d_theta = (spot.theta - parent.theta) / dt;
    Displacement {
        dx,
        dy,
        dz,
        d_ap,
        d_theta,
        dtot: (dx * dx + dy * dy + dz * dz).sqrt(),
        d_ap_abs: d_ap.abs(),
    }
}

/// Fill [`SpotRecord::displacement`] for every record of the table.
///
/// Return
/// ----------
/// * The number of records that received a displacement.
/// * `Err(DivTrackError::InvalidSecondsPerFrame)` for a non-positive or non-finite frame interval.
pub fn compute_displacements(
    table: &mut SpotTable,
    metadata: &DatasetMetadata,
) -> Result<usize, DivTrackError> {
    let dt = metadata.validate_seconds_per_frame()?;

    let parents: Vec<Option<usize>> = (0..table.len()).map(|row| table.parent_row(row)).collect();
    let computed: Vec<Option<Displacement>> = parents
        .iter()
        .enumerate()
        .map(|(row, parent)| {
            parent.map(|p| displacement_between(&table.spots()[row], &table.spots()[p], dt))
        })
        .collect();

    let mut n = 0;
    for (spot, disp) in table.spots_mut().iter_mut().zip(computed) {
        n += usize::from(disp.is_some());
        spot.displacement = disp;
    }
    Ok(n)
}
