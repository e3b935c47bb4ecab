//! Tracklet assembly and cycle assignment.
//!
//! A record **starts** a tracklet (`is_child = true`) when it has no parent in the table
//! or when its parent is a division (`n_children > 1`). Every other record continues
//! its parent's tracklet. Tracklet ids are finally relabelled to `1..=N` in order of
//! first appearance in the table, a bijection that keeps group membership intact.
use log::{debug, warn};

use crate::constants::{FastHashMap, Frame, SpotId, TrackletId};
use crate::divtrack_errors::DivTrackError;
use crate::lineage::LineageForest;
use crate::spots::{DatasetMetadata, SpotTable};

/// Counts reported by [`assemble_tracklets`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackletSummary {
    pub n_tracklets: usize,
    /// Divisions (`n_children > 1`) whose number of children present in the table is not 2
    pub irregular_divisions: usize,
    /// Extra children of a non-dividing record, promoted to new tracklets
    pub promoted_children: usize,
    /// Records whose parent is absent from the table
    pub dangling_parents: usize,
    /// Records whose parent is not strictly earlier
    pub non_causal_parents: usize,
}

/// Compute `is_parent`, `is_child` and a dense `tracklet_id` for every record.
///
/// Arguments
/// -----------------
/// * `table`: records of one dataset; `frame`, `parent_id` and `n_children` must be populated.
///
/// Return
/// ----------
/// * A [`TrackletSummary`] with the number of tracklets and the data-quality counters.
///
/// Notes
/// ----------
/// * A division with a single child present still starts a new tracklet for that child.
/// * A record whose parent is missing or not strictly earlier starts a new tracklet.
/// * If a non-dividing record has several children present (inconsistent `n_children`),
///   the first one in frame order continues the tracklet and the others start new ones,
///   so that frames stay strictly increasing within every tracklet.
pub fn assemble_tracklets(table: &mut SpotTable) -> TrackletSummary {
    let forest = LineageForest::build(table);
    let n = table.len();

    let is_parent: Vec<bool> = table.iter().map(|s| s.n_children > 1).collect();

    let mut is_child = vec![true; n];
    let mut promoted_children = 0;
    let mut irregular_divisions = 0;
    for row in 0..n {
        let kids = forest.children(row);
        if is_parent[row] {
            if kids.len() != 2 {
                irregular_divisions += 1;
            }
            continue;
        }
        let mut heirs = kids.to_vec();
        heirs.sort_by_key(|&k| (table.spots()[k].frame, k));
        if let Some((&heir, rest)) = heirs.split_first() {
            is_child[heir] = false;
            promoted_children += rest.len();
        }
    }

    if irregular_divisions > 0 {
        warn!("{irregular_divisions} divisions do not have exactly two children in the table");
    }
    if promoted_children > 0 {
        warn!("{promoted_children} extra children of non-dividing records start new tracklets");
    }

    // Placeholder id = own spot id, then overwritten from the parent in frame order.
    let mut raw: Vec<SpotId> = table.iter().map(|s| s.id).collect();
    for &row in forest.frame_order() {
        if is_child[row] {
            continue;
        }
        if let Some(p) = forest.parent(row) {
            raw[row] = raw[p];
        }
    }

    let mut remap: FastHashMap<SpotId, TrackletId> = FastHashMap::default();
    let mut next: TrackletId = 1;
    let dense: Vec<TrackletId> = raw
        .iter()
        .map(|old| {
            *remap.entry(*old).or_insert_with(|| {
                let id = next;
                next += 1;
                id
            })
        })
        .collect();

    for (row, spot) in table.spots_mut().iter_mut().enumerate() {
        spot.is_parent = is_parent[row];
        spot.is_child = is_child[row];
        spot.tracklet_id = Some(dense[row]);
    }

    let summary = TrackletSummary {
        n_tracklets: remap.len(),
        irregular_divisions,
        promoted_children,
        dangling_parents: forest.dangling_parents(),
        non_causal_parents: forest.non_causal_parents(),
    };
    debug!("assembled {} tracklets from {} records", summary.n_tracklets, n);
    summary
}

/// Assign the nuclear `cycle` of every record from the first frame of its tracklet.
///
/// Return
/// ----------
/// * `Err(DivTrackError::LineageNotResolved)` if tracklets were not assembled first.
/// * `Err(DivTrackError::EmptyCycleBoundaries)` if the metadata carries no boundary.
pub fn assign_cycles(table: &mut SpotTable, metadata: &DatasetMetadata) -> Result<(), DivTrackError> {
    let mut first_frame: FastHashMap<TrackletId, Frame> = FastHashMap::default();
    for spot in table.iter() {
        let tid = spot
            .tracklet_id
            .ok_or(DivTrackError::LineageNotResolved("tracklet_id"))?;
        first_frame
            .entry(tid)
            .and_modify(|f| *f = (*f).min(spot.frame))
            .or_insert(spot.frame);
    }

    let cycles = first_frame
        .into_iter()
        .map(|(tid, frame)| metadata.cycle_of_first_frame(frame).map(|c| (tid, c)))
        .collect::<Result<FastHashMap<_, _>, _>>()?;

    for spot in table.spots_mut() {
        spot.cycle = spot.tracklet_id.and_then(|tid| cycles.get(&tid).copied());
    }
    Ok(())
}
