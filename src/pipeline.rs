//! # Per-dataset pipeline
//!
//! Runs every pass of the engine on one dataset, in dependency order:
//!
//! 1. [`compute_displacements`] – motion relative to the parent detection,
//! 2. [`assemble_tracklets`] and [`assign_cycles`] – tracklets and nuclear cycles,
//! 3. [`resolve_lineage`] – mother tracklets and time since division,
//! 4. [`attach_registration`] – optional dynamic-time-warp columns,
//! 5. [`time_divisions`] – cycle templates and corrected division times,
//! 6. [`find_stationary_timepoints`] and [`build_timepoint_snapshot`].
//!
//! Datasets share no state: [`process_datasets`] runs them one after the other and keeps
//! one `Result` per dataset, so a malformed dataset never aborts the batch. Callers that
//! want parallelism can call [`process_dataset`] from their own workers.
//!
//! ### Progress UI (feature: `progress`)
//! When compiled with the `progress` feature, [`process_datasets`] renders a progress bar
//! over datasets (via `indicatif`).
//!
//! ## Example
//!
//! ```rust,no_run
//! use camino::Utf8Path;
//! use divtrack::pipeline::{process_dataset, Dataset, PipelineParams};
//! use divtrack::spots::DatasetMetadata;
//!
//! let metadata = DatasetMetadata::new(vec![12, 61, 118, 190], 21.0);
//! let dataset = Dataset::from_csv(
//!     "embryo_01",
//!     Utf8Path::new("data/embryo_01_spots.csv"),
//!     Some(Utf8Path::new("data/embryo_01_dtw.csv")),
//!     metadata,
//!     0,
//! )
//! .unwrap();
//! let report = process_dataset(dataset, &PipelineParams::default()).unwrap();
//! report.write_csv(Utf8Path::new("out")).unwrap();
//! ```
use std::collections::BTreeMap;

#[cfg(feature = "progress")]
use std::time::Duration;

use camino::Utf8Path;
#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use crate::constants::TrackletId;
use crate::division::{time_divisions, DivisionParams, DivisionTiming};
use crate::divtrack_errors::DivTrackError;
use crate::export::{write_estimates_csv, write_snapshot_csv};
use crate::lineage::resolver::resolve_lineage;
use crate::lineage::tracklets::{assemble_tracklets, assign_cycles, TrackletSummary};
use crate::spots::csv_reader::{read_registration_csv, read_spots_csv};
use crate::spots::displacement::compute_displacements;
use crate::spots::registration::{attach_registration, RegistrationTable};
use crate::spots::{DatasetMetadata, SpotTable};
use crate::timepoints::snapshot::{build_timepoint_snapshot, SnapshotRecord};
use crate::timepoints::{find_stationary_timepoints, StationaryParams, StationaryTimepoint};

/// Parameters of every configurable stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineParams {
    pub division: DivisionParams,
    pub stationary: StationaryParams,
}

/// One dataset: its spot table, metadata and optional registration table.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub spots: SpotTable,
    pub metadata: DatasetMetadata,
    pub registration: Option<RegistrationTable>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, spots: SpotTable, metadata: DatasetMetadata) -> Self {
        Dataset {
            name: name.into(),
            spots,
            metadata,
            registration: None,
        }
    }

    pub fn with_registration(mut self, registration: RegistrationTable) -> Self {
        self.registration = Some(registration);
        self
    }

    /// Load a dataset from its exported CSV files.
    ///
    /// Arguments
    /// -----------------
    /// * `name`: label used in logs and output file names.
    /// * `spots_path`: spot table (see [`csv_reader`](crate::spots::csv_reader)).
    /// * `registration_path`: optional registration table; a path that does not exist is
    ///   treated as "no registration".
    /// * `metadata`: cycle boundaries and frame interval.
    /// * `source`: dataset index for records without a `source` column.
    pub fn from_csv(
        name: impl Into<String>,
        spots_path: &Utf8Path,
        registration_path: Option<&Utf8Path>,
        metadata: DatasetMetadata,
        source: u32,
    ) -> Result<Self, DivTrackError> {
        let spots = read_spots_csv(spots_path, source)?;
        let registration = match registration_path {
            Some(path) => read_registration_csv(path)?,
            None => None,
        };
        Ok(Dataset {
            name: name.into(),
            spots,
            metadata,
            registration,
        })
    }
}

/// Everything the engine produces for one dataset.
#[derive(Debug)]
pub struct DatasetReport {
    pub name: String,
    /// Input records with every derived field filled
    pub spots: SpotTable,
    pub tracklets: TrackletSummary,
    /// Mother tracklet of every daughter tracklet
    pub mothers: BTreeMap<TrackletId, TrackletId>,
    pub n_displacements: usize,
    pub n_registered: usize,
    pub timing: DivisionTiming,
    pub stationary: Vec<StationaryTimepoint>,
    pub snapshot: Vec<SnapshotRecord>,
}

impl DatasetReport {
    /// Write `<name>_division_times.csv` and `<name>_snapshot.csv` into `dir`.
    pub fn write_csv(&self, dir: &Utf8Path) -> Result<(), DivTrackError> {
        std::fs::create_dir_all(dir)?;
        write_estimates_csv(
            &dir.join(format!("{}_division_times.csv", self.name)),
            &self.timing.estimates,
        )?;
        write_snapshot_csv(&dir.join(format!("{}_snapshot.csv", self.name)), &self.snapshot)
    }
}

/// Run the whole engine on one dataset.
///
/// Return
/// ----------
/// * The [`DatasetReport`]. Cycles whose template could not be fitted are reported in
///   `timing.templates` and do not make the dataset fail.
/// * `Err(DivTrackError)` for malformed input (duplicate ids are caught at table
///   construction; missing cycle boundaries or an invalid frame interval are caught here).
///   Dangling and non-causal parents only cut the affected lineage: the child becomes a
///   root and is counted in `tracklets`.
pub fn process_dataset(
    dataset: Dataset,
    params: &PipelineParams,
) -> Result<DatasetReport, DivTrackError> {
    let Dataset {
        name,
        mut spots,
        metadata,
        registration,
    } = dataset;

    let n_displacements = compute_displacements(&mut spots, &metadata)?;
    let tracklets = assemble_tracklets(&mut spots);
    assign_cycles(&mut spots, &metadata)?;
    let mothers = resolve_lineage(&mut spots)?;
    let n_registered = attach_registration(&mut spots, registration.as_ref());

    let timing = time_divisions(&spots, &params.division)?;

    let stationary = find_stationary_timepoints(&spots, &params.stationary);
    let snapshot = build_timepoint_snapshot(&spots, &stationary)?;

    info!(
        "[{name}] {} records, {} tracklets, {} divisions timed ({} cycles without template), {} stationary timepoints, {} snapshot rows",
        spots.len(),
        tracklets.n_tracklets,
        timing.estimates.len(),
        timing.failed_cycles().count(),
        stationary.len(),
        snapshot.len()
    );

    Ok(DatasetReport {
        name,
        spots,
        tracklets,
        mothers,
        n_displacements,
        n_registered,
        timing,
        stationary,
        snapshot,
    })
}

/// Per-dataset outcome of a batch, in input order.
pub type DatasetResults = Vec<(String, Result<DatasetReport, DivTrackError>)>;

/// Run [`process_dataset`] on every dataset; one failure never stops the batch.
#[cfg(feature = "progress")]
pub fn process_datasets(datasets: Vec<Dataset>, params: &PipelineParams) -> DatasetResults {
    let pb = ProgressBar::new((datasets.len() as u64).max(1));
    if let Ok(style) = ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | ETA {eta_precise} | {msg}",
    ) {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(200));

    let mut results = Vec::with_capacity(datasets.len());
    for dataset in datasets {
        pb.set_message(dataset.name.clone());
        let name = dataset.name.clone();
        let res = process_dataset(dataset, params);
        if let Err(e) = &res {
            warn!("[{name}] dataset failed: {e}");
        }
        results.push((name, res));
        pb.inc(1);
    }

    pb.finish_and_clear();
    results
}

#[cfg(not(feature = "progress"))]
pub fn process_datasets(datasets: Vec<Dataset>, params: &PipelineParams) -> DatasetResults {
    datasets
        .into_iter()
        .map(|dataset| {
            let name = dataset.name.clone();
            let res = process_dataset(dataset, params);
            if let Err(e) = &res {
                warn!("[{name}] dataset failed: {e}");
            }
            (name, res)
        })
        .collect()
}
