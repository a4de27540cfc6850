use thiserror::Error;

use crate::data_structs::Label;

/// Failures which abort a run and must be reported to the caller.
///
/// Numeric problems inside normalization are not represented here: they are
/// absorbed where they happen and replaced with identity factors.
#[derive(Error, Debug)]
pub enum DiffPeakError {
    #[error("No signal: total coverage over all samples is {total}")]
    NoSignal { total: f64 },

    #[error("No data: region-of-interest scoring failed ({0})")]
    NoData(String),

    #[error(
        "No differential peaks detected (fold-change threshold {threshold:.2}, \
         coverage difference {diff_cov}, {passes} passes)"
    )]
    NoDifferentialSignal {
        threshold: f64,
        diff_cov:  i64,
        passes:    usize,
    },

    #[error("{label} training bucket failed the spread check after {attempts} resampling attempts")]
    DegenerateSample { label: Label, attempts: usize },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type DiffPeakResult<T> = Result<T, DiffPeakError>;
