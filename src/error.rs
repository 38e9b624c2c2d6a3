use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::inventory::DateKey;

/// Errors scoped to one acquisition date. A stage error excludes that date
/// from the run but never aborts the dates processed alongside it.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{tool} exited with status {status:?}: {stderr}")]
    ExternalTool {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("no converted rasters to mosaic")]
    NoSources,

    #[error("band of {} holds {actual} values, expected {expected}", .path.display())]
    BandSize {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("cancelled")]
    Cancelled,
}

/// Errors that end the whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to build the worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("boundary {}: {detail}", .path.display())]
    Boundary { path: PathBuf, detail: String },

    #[error("failed to read the native resolution of {}: {source}", .path.display())]
    ResolutionProbe {
        path: PathBuf,
        #[source]
        source: StageError,
    },

    #[error("schema mismatch on {date}: expected {expected} cells, found {actual}")]
    SchemaMismatch {
        date: DateKey,
        expected: usize,
        actual: usize,
    },

    #[error(
        "schema mismatch on {date}: cell {cell_id} sits at grid ({row}, {col}), \
         the canonical cell sits at ({canonical_row}, {canonical_col})"
    )]
    SchemaKeyMismatch {
        date: DateKey,
        cell_id: u32,
        row: u32,
        col: u32,
        canonical_row: u32,
        canonical_col: u32,
    },

    #[error("no qualifying dates produced a table")]
    NothingToAssemble,

    #[error("run cancelled")]
    Cancelled,
}

/// Why a date is missing from the assembled table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    /// The date token appeared once while more than one tile is required.
    Incomplete,
    /// The external reprojection failed on both attempts.
    ExternalTool(String),
    /// Any other per-date stage failure.
    Stage(String),
    /// The run was cancelled before the date finished.
    Cancelled,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::Incomplete => write!(f, "date token seen only once"),
            ExclusionReason::ExternalTool(detail) | ExclusionReason::Stage(detail) => {
                write!(f, "{detail}")
            }
            ExclusionReason::Cancelled => write!(f, "cancelled before processing finished"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateExclusion {
    pub date: DateKey,
    pub reason: ExclusionReason,
}

impl DateExclusion {
    pub fn incomplete(date: DateKey) -> DateExclusion {
        DateExclusion {
            date,
            reason: ExclusionReason::Incomplete,
        }
    }

    pub fn from_stage(date: DateKey, err: StageError) -> DateExclusion {
        let reason = match &err {
            StageError::ExternalTool { .. } => ExclusionReason::ExternalTool(err.to_string()),
            StageError::Cancelled => ExclusionReason::Cancelled,
            _ => ExclusionReason::Stage(err.to_string()),
        };

        DateExclusion { date, reason }
    }
}

impl fmt::Display for DateExclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.date, self.reason)
    }
}
