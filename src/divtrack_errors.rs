use thiserror::Error;

use crate::constants::{Cycle, SpotId};

#[derive(Error, Debug)]
pub enum DivTrackError {
    #[error("Duplicate spot id in table: {0}")]
    DuplicateSpotId(SpotId),

    #[error("Lineage field not resolved yet: {0}")]
    LineageNotResolved(&'static str),

    #[error("Dataset metadata has no cycle boundaries")]
    EmptyCycleBoundaries,

    #[error("Invalid seconds per frame: {0}")]
    InvalidSecondsPerFrame(f64),

    #[error("Invalid division timing parameter: {0}")]
    InvalidDivisionParameter(String),

    #[error("Invalid stationary timepoint parameter: {0}")]
    InvalidStationaryParameter(String),

    #[error("Cycle {cycle}: {found} daughter-pair observations with distinct times, at least 3 are required")]
    TooFewObservations { cycle: Cycle, found: usize },

    #[error("Cycle {cycle}: every daughter-pair observation shares the same time since division")]
    DegenerateTimes { cycle: Cycle },

    #[error("Cycle {cycle}: least-squares system could not be solved")]
    SingularFit { cycle: Cycle },

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl DivTrackError {
    /// True for the errors raised when a cycle template cannot be fitted.
    pub fn is_fitting_error(&self) -> bool {
        matches!(
            self,
            DivTrackError::TooFewObservations { .. }
                | DivTrackError::DegenerateTimes { .. }
                | DivTrackError::SingularFit { .. }
        )
    }
}

impl PartialEq for DivTrackError {
    fn eq(&self, other: &Self) -> bool {
        use DivTrackError::*;
        match (self, other) {
            (DuplicateSpotId(a), DuplicateSpotId(b)) => a == b,
            (LineageNotResolved(a), LineageNotResolved(b)) => a == b,
            (InvalidSecondsPerFrame(a), InvalidSecondsPerFrame(b)) => a == b,
            (InvalidDivisionParameter(a), InvalidDivisionParameter(b)) => a == b,
            (InvalidStationaryParameter(a), InvalidStationaryParameter(b)) => a == b,
            (
                TooFewObservations {
                    cycle: c1,
                    found: f1,
                },
                TooFewObservations {
                    cycle: c2,
                    found: f2,
                },
            ) => c1 == c2 && f1 == f2,
            (DegenerateTimes { cycle: a }, DegenerateTimes { cycle: b }) => a == b,
            (SingularFit { cycle: a }, SingularFit { cycle: b }) => a == b,

            // Not comparable: same variant is enough
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            (EmptyCycleBoundaries, EmptyCycleBoundaries) => true,

            _ => false,
        }
    }
}
