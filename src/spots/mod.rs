//! # Spots: per-frame nucleus detections
//!
//! A [`SpotRecord`] is one detected nucleus at one frame, as produced by the upstream
//! tracker. The engine receives one [`SpotTable`] per dataset together with its
//! [`DatasetMetadata`], and every pass of the pipeline augments the records **in place**.
//!
//! Data Model
//! -----------------
//! * **Given fields:** `id`, `frame`, position (`x`, `y`, `z`), body-axis coordinates
//!   (`ap`, `theta`), `parent_id`, `n_children`, `time_since_nc11`, `source`.
//! * **Derived fields:** `is_parent`, `is_child`, `tracklet_id`, `cycle`,
//!   `prev_tracklet_id`, `time_since_division`, plus the optional [`Displacement`] and
//!   [`Registration`] blocks. Derived fields start empty and are filled by the lineage,
//!   displacement and registration passes; they are never removed.
//!
//! "No parent" is `parent_id = None`. The upstream `-1` sentinel is translated at
//! ingestion time (see [`csv_reader`]).
//!
//! Modules
//! -----------------
//! * [`csv_reader`] – load an exported spot table and an optional registration table.
//! * [`displacement`] – per-record displacement relative to the parent detection.
//! * [`registration`] – merge of optional dynamic-time-warp registration data.
use nalgebra::Vector3;
use serde::Deserialize;

use crate::constants::{
    Cycle, FastHashMap, Frame, SpotId, TrackletId, CYCLE_INDEX_OFFSET,
};
use crate::divtrack_errors::DivTrackError;

pub mod csv_reader;
pub mod displacement;
pub mod registration;

/// Displacement of a record relative to its parent detection, per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Displacement {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub d_ap: f64,
    pub d_theta: f64,
    /// Euclidean norm of `(dx, dy, dz)`
    pub dtot: f64,
    pub d_ap_abs: f64,
}

/// Values merged from an optional dynamic-time-warp registration table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Registration {
    pub pseudotime: f64,
    pub distance: f64,
    /// `pseudotime + cycle - 11`, absent while the cycle is unknown
    pub cycle_pseudotime: Option<f64>,
}

/// One detected nucleus at one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotRecord {
    pub id: SpotId,
    pub frame: Frame,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub ap: f64,
    pub theta: f64,
    pub parent_id: Option<SpotId>,
    pub n_children: u8,
    pub time_since_nc11: f64,
    pub source: u32,

    pub is_parent: bool,
    pub is_child: bool,
    pub tracklet_id: Option<TrackletId>,
    pub cycle: Option<Cycle>,
    pub prev_tracklet_id: Option<TrackletId>,
    pub time_since_division: Option<f64>,
    pub displacement: Option<Displacement>,
    pub registration: Option<Registration>,
}

impl SpotRecord {
    /// Create a record with its given fields; body-axis coordinates and source default to 0.
    ///
    /// Arguments
    /// -----------------
    /// * `id`: unique key of the detection.
    /// * `frame`: acquisition frame.
    /// * `position`: `(x, y, z)` in the tracker's spatial units.
    /// * `parent_id`: detection this one continues or descends from, `None` for roots.
    /// * `n_children`: number of detections referencing this one (2 marks a division).
    /// * `time_since_nc11`: continuous time since the reference event.
    pub fn new(
        id: SpotId,
        frame: Frame,
        position: [f64; 3],
        parent_id: Option<SpotId>,
        n_children: u8,
        time_since_nc11: f64,
    ) -> Self {
        SpotRecord {
            id,
            frame,
            x: position[0],
            y: position[1],
            z: position[2],
            ap: 0.0,
            theta: 0.0,
            parent_id,
            n_children,
            time_since_nc11,
            source: 0,
            is_parent: false,
            is_child: false,
            tracklet_id: None,
            cycle: None,
            prev_tracklet_id: None,
            time_since_division: None,
            displacement: None,
            registration: None,
        }
    }

    pub fn with_body_axis(mut self, ap: f64, theta: f64) -> Self {
        self.ap = ap;
        self.theta = theta;
        self
    }

    pub fn with_source(mut self, source: u32) -> Self {
        self.source = source;
        self
    }

    #[inline]
    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    #[inline]
    pub fn dtot(&self) -> Option<f64> {
        self.displacement.map(|d| d.dtot)
    }
}

/// All spot records of one dataset, with an id → row index.
///
/// Row order is the order in which records were supplied; it defines the
/// "order of first appearance" used when tracklet ids are relabelled.
#[derive(Debug, Clone, Default)]
pub struct SpotTable {
    spots: Vec<SpotRecord>,
    index: FastHashMap<SpotId, usize>,
}

impl SpotTable {
    /// Build a table, rejecting duplicate ids.
    pub fn new(spots: Vec<SpotRecord>) -> Result<Self, DivTrackError> {
        let mut index = FastHashMap::with_capacity_and_hasher(spots.len(), Default::default());
        for (row, spot) in spots.iter().enumerate() {
            if index.insert(spot.id, row).is_some() {
                return Err(DivTrackError::DuplicateSpotId(spot.id));
            }
        }
        Ok(SpotTable { spots, index })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.spots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    #[inline]
    pub fn spots(&self) -> &[SpotRecord] {
        &self.spots
    }

    /// Mutable access to the records. Ids are part of the index and must not be changed.
    #[inline]
    pub(crate) fn spots_mut(&mut self) -> &mut [SpotRecord] {
        &mut self.spots
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpotRecord> {
        self.spots.iter()
    }

    #[inline]
    pub fn row_of(&self, id: SpotId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn get(&self, id: SpotId) -> Option<&SpotRecord> {
        self.row_of(id).map(|row| &self.spots[row])
    }

    /// Row of the parent of the record at `row`, if the parent is present in the table and
    /// strictly earlier than the record.
    #[inline]
    pub fn parent_row(&self, row: usize) -> Option<usize> {
        let frame = self.spots[row].frame;
        self.spots[row]
            .parent_id
            .and_then(|pid| self.row_of(pid))
            .filter(|&prow| self.spots[prow].frame < frame)
    }

    pub fn into_spots(self) -> Vec<SpotRecord> {
        self.spots
    }
}

/// Per-dataset metadata supplied alongside the spot table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetMetadata {
    /// Ordered frames marking the boundaries between successive cycles
    pub cycle_starts: Vec<Frame>,
    pub seconds_per_frame: f64,
}

impl DatasetMetadata {
    pub fn new(cycle_starts: Vec<Frame>, seconds_per_frame: f64) -> Self {
        DatasetMetadata {
            cycle_starts,
            seconds_per_frame,
        }
    }

    /// Cycle of a tracklet that first appears at `first_frame`.
    ///
    /// The cycle is `CYCLE_INDEX_OFFSET + i` where `i` is the index of the first boundary
    /// strictly greater than `first_frame`, or the number of boundaries when none is.
    ///
    /// Return
    /// ----------
    /// * `Err(DivTrackError::EmptyCycleBoundaries)` when no boundary is recorded.
    pub fn cycle_of_first_frame(&self, first_frame: Frame) -> Result<Cycle, DivTrackError> {
        if self.cycle_starts.is_empty() {
            return Err(DivTrackError::EmptyCycleBoundaries);
        }
        let idx = self
            .cycle_starts
            .iter()
            .position(|&start| start > first_frame)
            .unwrap_or(self.cycle_starts.len());
        Ok(CYCLE_INDEX_OFFSET.saturating_add(idx.min(Cycle::MAX as usize) as Cycle))
    }

    pub fn validate_seconds_per_frame(&self) -> Result<f64, DivTrackError> {
        if self.seconds_per_frame.is_finite() && self.seconds_per_frame > 0.0 {
            Ok(self.seconds_per_frame)
        } else {
            Err(DivTrackError::InvalidSecondsPerFrame(self.seconds_per_frame))
        }
    }
}

#[cfg(test)]
mod spots_tests {
    use super::*;

    #[test]
    fn test_duplicate_ids_rejected() {
        let spots = vec![
            SpotRecord::new(1, 0, [0.0; 3], None, 0, 0.0),
            SpotRecord::new(1, 1, [0.0; 3], None, 0, 0.1),
        ];
        assert_eq!(
            SpotTable::new(spots).unwrap_err(),
            DivTrackError::DuplicateSpotId(1)
        );
    }

    #[test]
    fn test_parent_row_lookup() {
        let spots = vec![
            SpotRecord::new(10, 0, [0.0; 3], None, 1, 0.0),
            SpotRecord::new(11, 1, [0.0; 3], Some(10), 0, 0.1),
            SpotRecord::new(12, 1, [0.0; 3], Some(99), 0, 0.1),
            SpotRecord::new(13, 1, [0.0; 3], Some(11), 0, 0.1),
        ];
        let table = SpotTable::new(spots).unwrap();
        assert_eq!(table.parent_row(1), Some(0));
        assert_eq!(table.parent_row(0), None);
        assert_eq!(table.parent_row(2), None);
        // same-frame parent
        assert_eq!(table.parent_row(3), None);
        assert_eq!(table.get(11).map(|s| s.frame), Some(1));
    }

    #[test]
    fn test_cycle_of_first_frame() {
        let meta = DatasetMetadata::new(vec![10, 40, 90, 160], 20.0);
        assert_eq!(meta.cycle_of_first_frame(0).unwrap(), 9);
        assert_eq!(meta.cycle_of_first_frame(10).unwrap(), 10);
        assert_eq!(meta.cycle_of_first_frame(45).unwrap(), 11);
        assert_eq!(meta.cycle_of_first_frame(159).unwrap(), 12);
        assert_eq!(meta.cycle_of_first_frame(200).unwrap(), 13);

        let empty = DatasetMetadata::new(vec![], 20.0);
        assert_eq!(
            empty.cycle_of_first_frame(3).unwrap_err(),
            DivTrackError::EmptyCycleBoundaries
        );
    }

    #[test]
    fn test_seconds_per_frame_validation() {
        assert!(DatasetMetadata::new(vec![0], 0.0)
            .validate_seconds_per_frame()
            .is_err());
        assert!(DatasetMetadata::new(vec![0], f64::NAN)
            .validate_seconds_per_frame()
            .is_err());
        assert_eq!(
            DatasetMetadata::new(vec![0], 12.5)
                .validate_seconds_per_frame()
                .unwrap(),
            12.5
        );
    }
}
