//! # CSV ingestion of exported spot tables
//!
//! Reads a spot table that an upstream exporter already flattened to CSV, and an
//! optional per-dataset registration table.
//!
//! ## Expected columns
//! -----------------
//! Spot table (header names are case-sensitive):
//! - `id`, `frame`, `x`, `y`, `z`, `AP`, `theta`, `parent_id`, `n_children`,
//!   `time_since_nc11`
//! - `source` is optional; when missing the caller-provided source index is used.
//!
//! A negative or empty `parent_id` (the upstream `-1` sentinel) becomes `None`.
//!
//! Registration table: `id`, `pseudotime`, `distance`. A missing registration file is
//! not an error: [`read_registration_csv`] returns `Ok(None)`.
use std::io;

use camino::Utf8Path;
use serde::Deserialize;

use crate::constants::{FastHashMap, Frame, SpotId};
use crate::divtrack_errors::DivTrackError;
use crate::spots::registration::RegistrationTable;
use crate::spots::{SpotRecord, SpotTable};

#[derive(Debug, Deserialize)]
struct SpotRow {
    id: SpotId,
    frame: Frame,
    x: f64,
    y: f64,
    z: f64,
    #[serde(rename = "AP")]
    ap: f64,
    theta: f64,
    #[serde(default)]
    parent_id: Option<i64>,
    n_children: u8,
    time_since_nc11: f64,
    #[serde(default)]
    source: Option<u32>,
}

impl SpotRow {
    fn into_record(self, default_source: u32) -> SpotRecord {
        let parent_id = self.parent_id.and_then(|p| u64::try_from(p).ok());
        SpotRecord::new(
            self.id,
            self.frame,
            [self.x, self.y, self.z],
            parent_id,
            self.n_children,
            self.time_since_nc11,
        )
        .with_body_axis(self.ap, self.theta)
        .with_source(self.source.unwrap_or(default_source))
    }
}

#[derive(Debug, Deserialize)]
struct RegistrationRow {
    id: SpotId,
    pseudotime: f64,
    distance: f64,
}

/// Read a spot table from any CSV source.
///
/// Arguments
/// -----------------
/// * `reader`: CSV byte stream with a header row.
/// * `source`: dataset index written to records that carry no `source` column.
///
/// Return
/// ----------
/// * The validated [`SpotTable`], or a CSV / duplicate-id error.
pub fn spots_from_reader<R: io::Read>(reader: R, source: u32) -> Result<SpotTable, DivTrackError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let spots = rdr
        .deserialize::<SpotRow>()
        .map(|row| row.map(|r| r.into_record(source)))
        .collect::<Result<Vec<_>, _>>()?;
    SpotTable::new(spots)
}

/// Read a spot table from a CSV file on disk.
pub fn read_spots_csv(path: &Utf8Path, source: u32) -> Result<SpotTable, DivTrackError> {
    let file = std::fs::File::open(path)?;
    spots_from_reader(io::BufReader::new(file), source)
}

pub fn registration_from_reader<R: io::Read>(
    reader: R,
) -> Result<RegistrationTable, DivTrackError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut table: RegistrationTable = FastHashMap::default();
    for row in rdr.deserialize::<RegistrationRow>() {
        let row = row?;
        table.insert(row.id, (row.pseudotime, row.distance));
    }
    Ok(table)
}

/// Read the optional registration table of a dataset.
///
/// Return
/// ----------
/// * `Ok(None)` when `path` does not exist.
pub fn read_registration_csv(path: &Utf8Path) -> Result<Option<RegistrationTable>, DivTrackError> {
    if !path.exists() {
        log::debug!("no registration table at {path}");
        return Ok(None);
    }
    let file = std::fs::File::open(path)?;
    registration_from_reader(io::BufReader::new(file)).map(Some)
}
