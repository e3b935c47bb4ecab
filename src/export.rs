//! # CSV export of the downstream tables
//!
//! * Division times: `tracklet_id, division_time, corrected_division_time, cycle, x, y, z,
//!   AP, theta, error, offset, n_observations`.
//! * Snapshot (and full spot table): every given and derived column of a record, followed by
//!   `prev_id` and `first_neighbor_distance`.
//!
//! Absent values (`None`) are written as empty cells.
use std::io;

use camino::Utf8Path;
use serde::Serialize;

use crate::constants::{Cycle, Frame, SpotId, TrackletId};
use crate::division::estimator::DivisionTimeEstimate;
use crate::divtrack_errors::DivTrackError;
use crate::spots::SpotRecord;
use crate::timepoints::snapshot::SnapshotRecord;

#[derive(Debug, Serialize)]
struct EstimateRow {
    tracklet_id: TrackletId,
    division_time: f64,
    corrected_division_time: f64,
    cycle: Cycle,
    x: f64,
    y: f64,
    z: f64,
    #[serde(rename = "AP")]
    ap: f64,
    theta: f64,
    error: f64,
    offset: f64,
    n_observations: usize,
}

impl From<&DivisionTimeEstimate> for EstimateRow {
    fn from(e: &DivisionTimeEstimate) -> Self {
        EstimateRow {
            tracklet_id: e.tracklet_id,
            division_time: e.division_time,
            corrected_division_time: e.corrected_division_time,
            cycle: e.cycle,
            x: e.x,
            y: e.y,
            z: e.z,
            ap: e.ap,
            theta: e.theta,
            error: e.error,
            offset: e.offset,
            n_observations: e.n_observations,
        }
    }
}

#[derive(Debug, Serialize)]
struct SpotRow {
    id: SpotId,
    frame: Frame,
    x: f64,
    y: f64,
    z: f64,
    #[serde(rename = "AP")]
    ap: f64,
    theta: f64,
    parent_id: Option<SpotId>,
    n_children: u8,
    time_since_nc11: f64,
    source: u32,
    is_parent: bool,
    is_child: bool,
    tracklet_id: Option<TrackletId>,
    cycle: Option<Cycle>,
    prev_tracklet_id: Option<TrackletId>,
    time_since_division: Option<f64>,
    dx: Option<f64>,
    dy: Option<f64>,
    dz: Option<f64>,
    #[serde(rename = "dAP")]
    d_ap: Option<f64>,
    dtheta: Option<f64>,
    dtot: Option<f64>,
    #[serde(rename = "dAP_abs")]
    d_ap_abs: Option<f64>,
    pseudotime: Option<f64>,
    registration_distance: Option<f64>,
    cycle_pseudotime: Option<f64>,
    prev_id: Option<SpotId>,
    first_neighbor_distance: Option<f64>,
}

impl SpotRow {
    fn new(s: &SpotRecord) -> Self {
        let d = s.displacement;
        let r = s.registration;
        SpotRow {
            id: s.id,
            frame: s.frame,
            x: s.x,
            y: s.y,
            z: s.z,
            ap: s.ap,
            theta: s.theta,
            parent_id: s.parent_id,
            n_children: s.n_children,
            time_since_nc11: s.time_since_nc11,
            source: s.source,
            is_parent: s.is_parent,
            is_child: s.is_child,
            tracklet_id: s.tracklet_id,
            cycle: s.cycle,
            prev_tracklet_id: s.prev_tracklet_id,
            time_since_division: s.time_since_division,
            dx: d.map(|d| d.dx),
            dy: d.map(|d| d.dy),
            dz: d.map(|d| d.dz),
            d_ap: d.map(|d| d.d_ap),
            dtheta: d.map(|d| d.d_theta),
            dtot: d.map(|d| d.dtot),
            d_ap_abs: d.map(|d| d.d_ap_abs),
            pseudotime: r.map(|r| r.pseudotime),
            registration_distance: r.map(|r| r.distance),
            cycle_pseudotime: r.and_then(|r| r.cycle_pseudotime),
            prev_id: None,
            first_neighbor_distance: None,
        }
    }
}

impl From<&SnapshotRecord> for SpotRow {
    fn from(rec: &SnapshotRecord) -> Self {
        SpotRow {
            prev_tracklet_id: rec.prev_tracklet_id,
            prev_id: rec.prev_id,
            first_neighbor_distance: rec.first_neighbor_distance,
            ..SpotRow::new(&rec.spot)
        }
    }
}

fn write_rows<W: io::Write, T: Serialize>(
    writer: W,
    rows: impl Iterator<Item = T>,
) -> Result<(), DivTrackError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the division-time table to any writer.
pub fn write_estimates<W: io::Write>(
    writer: W,
    estimates: &[DivisionTimeEstimate],
) -> Result<(), DivTrackError> {
    write_rows(writer, estimates.iter().map(EstimateRow::from))
}

pub fn write_estimates_csv(
    path: &Utf8Path,
    estimates: &[DivisionTimeEstimate],
) -> Result<(), DivTrackError> {
    write_estimates(std::fs::File::create(path)?, estimates)
}

/// Write the stationary-timepoint snapshot to any writer.
///
/// `prev_tracklet_id` is the snapshot's own value (set only for daughters of two-child
/// divisions), not the one resolved on the spot record.
pub fn write_snapshot<W: io::Write>(
    writer: W,
    snapshot: &[SnapshotRecord],
) -> Result<(), DivTrackError> {
    write_rows(writer, snapshot.iter().map(SpotRow::from))
}

pub fn write_snapshot_csv(path: &Utf8Path, snapshot: &[SnapshotRecord]) -> Result<(), DivTrackError> {
    write_snapshot(std::fs::File::create(path)?, snapshot)
}

/// Write every record with its derived columns; snapshot-only columns stay empty.
pub fn write_spots<W: io::Write>(writer: W, spots: &[SpotRecord]) -> Result<(), DivTrackError> {
    write_rows(writer, spots.iter().map(SpotRow::new))
}

pub fn write_spots_csv(path: &Utf8Path, spots: &[SpotRecord]) -> Result<(), DivTrackError> {
    write_spots(std::fs::File::create(path)?, spots)
}
