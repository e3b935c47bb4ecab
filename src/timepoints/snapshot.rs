//! Cross-referenced snapshot of the embryo at the stationary frames.
//!
//! The snapshot keeps every record observed at one of the stationary frames and adds:
//!
//! * `prev_tracklet_id` – for daughters of a two-child division, the mother tracklet,
//! * `prev_id` – the record of that mother tracklet among the snapshot rows, when the mother
//!   was captured at a representative frame (the latest such frame wins),
//! * `first_neighbor_distance` – Euclidean distance to the closest other record of the same
//!   cycle at the same frame, for records of cycles 10 to 14.
use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::constants::{Cycle, FastHashMap, Frame, SpotId, TrackletId, STATIONARY_CYCLES};
use crate::divtrack_errors::DivTrackError;
use crate::spots::{SpotRecord, SpotTable};
use crate::timepoints::StationaryTimepoint;

/// One record of the stationary-timepoint snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    pub spot: SpotRecord,
    pub prev_tracklet_id: Option<TrackletId>,
    pub prev_id: Option<SpotId>,
    pub first_neighbor_distance: Option<f64>,
}

/// Daughter tracklet → mother tracklet, for children of records with exactly two children.
fn division_mothers(table: &SpotTable) -> FastHashMap<TrackletId, TrackletId> {
    let spots = table.spots();
    let mut mothers = FastHashMap::default();
    for (row, spot) in spots.iter().enumerate() {
        let Some(prow) = table.parent_row(row) else {
            continue;
        };
        let parent = &spots[prow];
        if parent.n_children != 2 {
            continue;
        }
        if let (Some(daughter), Some(mother)) = (spot.tracklet_id, parent.tracklet_id) {
            mothers.insert(daughter, mother);
        }
    }
    mothers
}

/// Nearest-neighbour distance of every entry of `rows` against the others.
fn nearest_neighbors(rows: &[&SpotRecord]) -> Vec<Option<f64>> {
    let positions: Vec<_> = rows.iter().map(|s| s.position()).collect();
    positions
        .iter()
        .enumerate()
        .map(|(i, p)| {
            positions
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, q)| (p - q).norm())
                .min_by(f64::total_cmp)
        })
        .collect()
}

/// Build the snapshot table at the given stationary timepoints.
///
/// Arguments
/// -----------------
/// * `table`: records with `tracklet_id` and `cycle` resolved.
/// * `timepoints`: output of [`find_stationary_timepoints`](crate::timepoints::find_stationary_timepoints).
///
/// Return
/// ----------
/// * Snapshot rows in table order. Neighbour distances are computed for every record of a
///   cycle in [`STATIONARY_CYCLES`], whether or not that cycle has a timepoint of its own;
///   records of other cycles, and records alone in their `(cycle, frame)` group, get `None`.
/// * `Err(DivTrackError::LineageNotResolved)` if a kept record has no tracklet id.
pub fn build_timepoint_snapshot(
    table: &SpotTable,
    timepoints: &[StationaryTimepoint],
) -> Result<Vec<SnapshotRecord>, DivTrackError> {
    let frames: BTreeSet<Frame> = timepoints.iter().map(|tp| tp.frame).collect();
    let mothers = division_mothers(table);

    let kept: Vec<&SpotRecord> = table.iter().filter(|s| frames.contains(&s.frame)).collect();

    let mut representative: FastHashMap<TrackletId, (Frame, SpotId)> = FastHashMap::default();
    for spot in &kept {
        let tid = spot
            .tracklet_id
            .ok_or(DivTrackError::LineageNotResolved("tracklet_id"))?;
        let entry = representative.entry(tid).or_insert((spot.frame, spot.id));
        if spot.frame >= entry.0 {
            *entry = (spot.frame, spot.id);
        }
    }

    let mut groups: BTreeMap<(Cycle, Frame), Vec<usize>> = BTreeMap::new();
    for (k, spot) in kept.iter().enumerate() {
        if let Some(cycle) = spot.cycle.filter(|c| STATIONARY_CYCLES.contains(c)) {
            groups.entry((cycle, spot.frame)).or_default().push(k);
        }
    }
    let mut neighbor = vec![None; kept.len()];
    for ((cycle, frame), members) in &groups {
        let rows: Vec<&SpotRecord> = members.iter().map(|&k| kept[k]).collect();
        for (&k, d) in members.iter().zip(nearest_neighbors(&rows)) {
            neighbor[k] = d;
        }
        debug!("Snapshot cycle {cycle}, frame {frame}: {} records", members.len());
    }

    Ok(kept
        .into_iter()
        .zip(neighbor)
        .map(|(spot, first_neighbor_distance)| {
            let prev_tracklet_id = spot.tracklet_id.and_then(|t| mothers.get(&t).copied());
            let prev_id = prev_tracklet_id
                .and_then(|m| representative.get(&m))
                .map(|&(_, id)| id);
            SnapshotRecord {
                spot: spot.clone(),
                prev_tracklet_id,
                prev_id,
                first_neighbor_distance,
            }
        })
        .collect())
}

#[cfg(test)]
mod snapshot_tests {
    use approx::assert_relative_eq;

    use super::*;

    fn spot(id: SpotId, frame: Frame, pos: [f64; 3], tid: TrackletId, cycle: Cycle) -> SpotRecord {
        let mut s = SpotRecord::new(id, frame, pos, None, 0, frame as f64);
        s.tracklet_id = Some(tid);
        s.cycle = Some(cycle);
        s
    }

    #[test]
    fn test_nearest_neighbors() {
        let a = spot(1, 0, [0.0, 0.0, 0.0], 1, 10);
        let b = spot(2, 0, [3.0, 4.0, 0.0], 2, 10);
        let c = spot(3, 0, [0.0, 1.0, 0.0], 3, 10);
        let d = nearest_neighbors(&[&a, &b, &c]);
        assert_relative_eq!(d[0].unwrap(), 1.0);
        assert_relative_eq!(d[1].unwrap(), 18f64.sqrt());
        assert_relative_eq!(d[2].unwrap(), 1.0);
        assert_eq!(nearest_neighbors(&[&a]), vec![None]);
    }

    #[test]
    fn test_snapshot_links_mother() {
        // mother tracklet 1 at frame 3 (cycle 10) divides at frame 5; daughters 2 and 3
        let mut mother = spot(1, 3, [0.0; 3], 1, 10);
        mother.n_children = 1;
        let mut last = spot(2, 5, [0.0; 3], 1, 10);
        last.parent_id = Some(1);
        last.n_children = 2;
        let mut d1 = spot(3, 6, [1.0, 0.0, 0.0], 2, 11);
        d1.parent_id = Some(2);
        let mut d2 = spot(4, 6, [-1.0, 0.0, 0.0], 3, 11);
        d2.parent_id = Some(2);
        let other = spot(5, 6, [5.0, 0.0, 0.0], 4, 12);
        let table = SpotTable::new(vec![mother, last, d1, d2, other]).unwrap();

        let timepoints = [
            StationaryTimepoint { cycle: 10, frame: 3, time: 3.0 },
            StationaryTimepoint { cycle: 11, frame: 6, time: 6.0 },
        ];
        let snap = build_timepoint_snapshot(&table, &timepoints).unwrap();
        let ids: Vec<_> = snap.iter().map(|r| r.spot.id).collect();
        assert_eq!(ids, vec![1, 3, 4, 5]);

        assert_eq!(snap[0].prev_tracklet_id, None);
        assert_eq!(snap[0].first_neighbor_distance, None);

        assert_eq!(snap[1].prev_tracklet_id, Some(1));
        assert_eq!(snap[1].prev_id, Some(1));
        assert_relative_eq!(snap[1].first_neighbor_distance.unwrap(), 2.0);
        assert_eq!(snap[2].prev_id, Some(1));

        // alone in cycle 12 at frame 6
        assert_eq!(snap[3].first_neighbor_distance, None);
    }

    #[test]
    fn test_neighbors_for_cycle_without_timepoint() {
        let a = spot(1, 6, [0.0; 3], 1, 11);
        let b = spot(2, 6, [2.0, 0.0, 0.0], 2, 11);
        let late1 = spot(3, 6, [10.0, 0.0, 0.0], 3, 12);
        let late2 = spot(4, 6, [13.0, 4.0, 0.0], 4, 12);
        let early = spot(5, 6, [11.0, 0.0, 0.0], 5, 9);
        let table = SpotTable::new(vec![a, b, late1, late2, early]).unwrap();

        let timepoints = [StationaryTimepoint { cycle: 11, frame: 6, time: 6.0 }];
        let snap = build_timepoint_snapshot(&table, &timepoints).unwrap();
        assert_eq!(snap.len(), 5);

        assert_relative_eq!(snap[0].first_neighbor_distance.unwrap(), 2.0);
        // cycle 12 has no timepoint of its own but is grouped at frame 6
        assert_relative_eq!(snap[2].first_neighbor_distance.unwrap(), 5.0);
        assert_relative_eq!(snap[3].first_neighbor_distance.unwrap(), 5.0);
        // cycle 9 is outside the snapshot cycles
        assert_eq!(snap[4].first_neighbor_distance, None);
    }
}
