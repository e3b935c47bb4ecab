//! Mother-tracklet resolution and time since division.
//!
//! For a record that starts a tracklet, `prev_tracklet_id` is the tracklet of its parent
//! (the tracklet that just divided). Continuation records inherit the value already
//! resolved on their parent, so every record of a tracklet shares one mother.
//! Root tracklets have no mother (`None`).
//!
//! `time_since_division` is the record's `time_since_nc11` minus the smallest
//! `time_since_nc11` of its tracklet.
use std::collections::BTreeMap;

use log::debug;

use crate::constants::{FastHashMap, TrackletId};
use crate::divtrack_errors::DivTrackError;
use crate::lineage::LineageForest;
use crate::spots::SpotTable;

/// Fill `prev_tracklet_id` and `time_since_division` for every record.
///
/// Requires [`assemble_tracklets`](crate::lineage::tracklets::assemble_tracklets) to have run.
///
/// Return
/// ----------
/// * The mother tracklet of every tracklet that has one, keyed by daughter tracklet.
/// * `Err(DivTrackError::LineageNotResolved)` if a record has no tracklet id.
pub fn resolve_lineage(
    table: &mut SpotTable,
) -> Result<BTreeMap<TrackletId, TrackletId>, DivTrackError> {
    let forest = LineageForest::build(table);
    let spots = table.spots();

    let tracklet: Vec<TrackletId> = spots
        .iter()
        .map(|s| {
            s.tracklet_id
                .ok_or(DivTrackError::LineageNotResolved("tracklet_id"))
        })
        .collect::<Result<_, _>>()?;

    let mut prev: Vec<Option<TrackletId>> = vec![None; spots.len()];
    for &row in forest.frame_order() {
        let Some(p) = forest.parent(row) else {
            continue;
        };
        prev[row] = if spots[row].is_child {
            Some(tracklet[p])
        } else {
            prev[p]
        };
    }

    let mut t_min: FastHashMap<TrackletId, f64> = FastHashMap::default();
    for (spot, &tid) in spots.iter().zip(&tracklet) {
        t_min
            .entry(tid)
            .and_modify(|t| *t = t.min(spot.time_since_nc11))
            .or_insert(spot.time_since_nc11);
    }

    let mut mothers = BTreeMap::new();
    for (row, spot) in table.spots_mut().iter_mut().enumerate() {
        let tid = tracklet[row];
        spot.prev_tracklet_id = prev[row];
        spot.time_since_division = t_min.get(&tid).map(|t0| spot.time_since_nc11 - t0);
        if let Some(mother) = prev[row] {
            mothers.insert(tid, mother);
        }
    }

    debug!("resolved {} tracklets with a mother", mothers.len());
    Ok(mothers)
}
