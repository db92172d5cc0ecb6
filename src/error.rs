//! error types.
//!
//! FatalConfigError aborts a run before (or instead of) any sample processing.
//! SampleError is scoped to one sample : it is recorded, reported at the end, and the sample
//! still gets a (zero filled) column in the feature table.
//! Malformed lines are not errors, they are only counted (see ExtractStats and IndexStats).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FatalConfigError {
    #[error("cannot read reference annotation file {path:?} : {source}")]
    ReferenceUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no gene to KO mapping found in reference annotation file {path:?}")]
    EmptyIndex { path: PathBuf },

    #[error("cannot read genome count table {path:?} : {detail}")]
    MetadataUnreadable { path: PathBuf, detail: String },

    #[error(
        "genome count table {path:?} must contain a sample column (run_accession) \
         and a genome count column (num_genomes)"
    )]
    MetadataColumns { path: PathBuf },

    #[error("invalid marker panel {path:?} : {detail}")]
    MarkerPanel { path: PathBuf, detail: String },

    #[error("no input file matching *{suffix} in directory {dir:?}")]
    NoInputFiles { dir: PathBuf, suffix: String },

    #[error("sample id {sample} appears more than once")]
    DuplicateSample { sample: String },

    #[error("cannot write output {path:?} : {source}")]
    OutputUnwritable {
        path: PathBuf,
        source: std::io::Error,
    },
} // end of FatalConfigError

/// A recoverable error, scoped to one sample.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("sample {sample} : cannot read {path:?} : {source}")]
    Unreadable {
        sample: String,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("sample {sample} : empty input file")]
    Empty { sample: String },

    #[error("sample {sample} : no marker overlap")]
    NoMarkerOverlap { sample: String },

    #[error("sample {sample} : no genome count available")]
    MissingGenomeCount { sample: String },
} // end of SampleError

impl SampleError {
    pub fn get_sample(&self) -> &str {
        match self {
            SampleError::Unreadable { sample, .. }
            | SampleError::Empty { sample }
            | SampleError::NoMarkerOverlap { sample }
            | SampleError::MissingGenomeCount { sample } => sample,
        }
    }

    /// short reason tag used in reports
    pub fn get_kind(&self) -> SampleIssueKind {
        match self {
            SampleError::Unreadable { .. } => SampleIssueKind::Unreadable,
            SampleError::Empty { .. } => SampleIssueKind::Empty,
            SampleError::NoMarkerOverlap { .. } => SampleIssueKind::NoMarkerOverlap,
            SampleError::MissingGenomeCount { .. } => SampleIssueKind::MissingGenomeCount,
        }
    }
} // end of impl SampleError

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleIssueKind {
    Unreadable,
    Empty,
    NoMarkerOverlap,
    MissingGenomeCount,
}

/// A sample affected by a recoverable error, as written in the run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleIssue {
    pub sample: String,
    pub kind: SampleIssueKind,
    pub message: String,
}

impl From<&SampleError> for SampleIssue {
    fn from(err: &SampleError) -> Self {
        SampleIssue {
            sample: err.get_sample().to_string(),
            kind: err.get_kind(),
            message: err.to_string(),
        }
    }
}
