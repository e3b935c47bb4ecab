//! # Lineage: tracklets and mother tracklets
//!
//! Resolves the lineage forest implied by the flat `parent_id` pointers of a
//! [`SpotTable`] into **tracklets** (maximal continuous segments of one nucleus between
//! two divisions) and links every tracklet to the **mother tracklet** it descends from.
//!
//! ## Overview
//! -----------------
//! Propagation is done in two explicit passes:
//!
//! 1. [`LineageForest::build`] turns the parent pointers into a directed graph
//!    (`parent → children`) and computes a traversal order sorted by frame. Because a
//!    parent is always strictly earlier than its children, this order is topological:
//!    a parent is visited before any record that depends on it.
//! 2. The passes walk that order and copy identifiers from parent to child:
//!    * [`tracklets::assemble_tracklets`] – `is_parent`, `is_child`, dense `tracklet_id`,
//!    * [`tracklets::assign_cycles`] – nuclear `cycle` from the dataset boundaries,
//!    * [`resolver::resolve_lineage`] – `prev_tracklet_id` and `time_since_division`.
//!
//! The passes never rely on the row order of the table for correctness; row order only
//! defines the order of first appearance used to number tracklets.
//!
//! ## Invariants
//! -----------------
//! * Tracklet ids partition the records; frames are strictly increasing within a tracklet.
//! * Only the earliest record of a tracklet has `is_child = true`.
//! * Both children of a two-child division start distinct tracklets whose
//!   `prev_tracklet_id` is the mother's `tracklet_id`.
//!
//! ## Data quality
//! -----------------
//! A `parent_id` that names no record of the table is treated as a root and logged.
//! A parent that is not strictly earlier than its child is dropped the same way: the child
//! becomes a root and the remaining lineages are processed normally.
use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::constants::TrackletId;
use crate::spots::SpotTable;

pub mod resolver;
pub mod tracklets;

/// Explicit parent/child graph over the rows of a [`SpotTable`].
#[derive(Debug, Clone)]
pub struct LineageForest {
    parent: Vec<Option<usize>>,
    children: Vec<SmallVec<[usize; 2]>>,
    order: Vec<usize>,
    dangling: usize,
    non_causal: usize,
}

impl LineageForest {
    /// Build the graph and its frame-ordered traversal.
    ///
    /// Records whose parent is missing from the table, or not strictly earlier than them,
    /// become roots; both cases are counted and logged once.
    pub fn build(table: &SpotTable) -> Self {
        let n = table.len();
        let spots = table.spots();
        let mut parent = vec![None; n];
        let mut children: Vec<SmallVec<[usize; 2]>> = vec![SmallVec::new(); n];
        let mut dangling = 0;
        let mut non_causal = 0;

        for (row, spot) in spots.iter().enumerate() {
            let Some(pid) = spot.parent_id else {
                continue;
            };
            let Some(prow) = table.row_of(pid) else {
                dangling += 1;
                continue;
            };
            if spots[prow].frame >= spot.frame {
                log::debug!(
                    "Spot {} at frame {} has parent {} at frame {}",
                    spot.id,
                    spot.frame,
                    spots[prow].id,
                    spots[prow].frame
                );
                non_causal += 1;
                continue;
            }
            parent[row] = Some(prow);
            children[prow].push(row);
        }

        if dangling > 0 {
            log::warn!("{dangling} records reference a parent absent from the table; treated as roots");
        }
        if non_causal > 0 {
            log::warn!("{non_causal} records reference a parent that is not strictly earlier; treated as roots");
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&row| (spots[row].frame, row));

        LineageForest {
            parent,
            children,
            order,
            dangling,
            non_causal,
        }
    }

    #[inline]
    pub fn parent(&self, row: usize) -> Option<usize> {
        self.parent[row]
    }

    #[inline]
    pub fn children(&self, row: usize) -> &[usize] {
        &self.children[row]
    }

    /// Rows sorted by `(frame, row)`; every parent precedes its children.
    #[inline]
    pub fn frame_order(&self) -> &[usize] {
        &self.order
    }

    /// Number of records whose `parent_id` points outside the table.
    #[inline]
    pub fn dangling_parents(&self) -> usize {
        self.dangling
    }

    /// Number of records whose parent is at the same or a later frame.
    #[inline]
    pub fn non_causal_parents(&self) -> usize {
        self.non_causal
    }

    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.parent
            .iter()
            .enumerate()
            .filter_map(|(row, p)| p.is_none().then_some(row))
    }
}

/// Group the rows of a table by tracklet, each group sorted by frame.
///
/// Records without a tracklet id are skipped.
pub fn tracklet_members(table: &SpotTable) -> BTreeMap<TrackletId, Vec<usize>> {
    let mut groups: BTreeMap<TrackletId, Vec<usize>> = BTreeMap::new();
    for (row, spot) in table.iter().enumerate() {
        if let Some(tid) = spot.tracklet_id {
            groups.entry(tid).or_default().push(row);
        }
    }
    let spots = table.spots();
    for rows in groups.values_mut() {
        rows.sort_by_key(|&row| (spots[row].frame, row));
    }
    groups
}
