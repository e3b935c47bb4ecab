//! # divtrack
//!
//! Nuclear lineage reconstruction and sub-frame division timing from tracked nucleus
//! detections of early embryos.
//!
//! Given one table of per-frame detections with parent pointers, the engine
//!
//! * segments the lineage forest into tracklets and links each to its mother ([`lineage`]),
//! * fits one daughter-separation template per nuclear cycle and uses it to estimate the
//!   corrected time of every division ([`division`]),
//! * selects the least-motion frame of every cycle and builds a spatial snapshot there
//!   ([`timepoints`]).
//!
//! [`pipeline::process_dataset`] chains every pass; [`export`] writes the results as CSV.
pub mod constants;
pub mod division;
pub mod divtrack_errors;
pub mod export;
pub mod lineage;
pub mod pipeline;
pub mod spots;
pub mod timepoints;

pub use divtrack_errors::DivTrackError;
pub use pipeline::{process_dataset, process_datasets, Dataset, DatasetReport, PipelineParams};
pub use spots::{DatasetMetadata, SpotRecord, SpotTable};
