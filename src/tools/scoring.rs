use log::*;
use ndarray::Array1;

use crate::config::{
    ScoringConfig,
    Verbosity,
};
use crate::data_structs::typedef::{
    BinIndex,
    CovType,
};
use crate::data_structs::{
    Condition,
    CoverageMatrix,
};
use crate::errors::{
    DiffPeakError,
    DiffPeakResult,
};
use crate::utils::finite_mean;

/// Per-bin score: the replicate mean of each condition relative to that
/// condition's grand mean, summed over both conditions.
pub fn compute_scores(matrix: &CoverageMatrix) -> DiffPeakResult<Array1<CovType>> {
    let mut scores = Array1::zeros(matrix.n_bins());
    for condition in Condition::BOTH {
        let grand_mean = finite_mean(matrix.condition(condition).iter())
            .filter(|m| *m != 0.0)
            .ok_or_else(|| {
                DiffPeakError::NoData(format!(
                    "mean coverage of condition {} is zero or undefined",
                    condition
                ))
            })?;
        scores += &(matrix.bin_means(condition) / grand_mean);
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(DiffPeakError::NoData("non-finite bin score".to_string()));
    }
    Ok(scores)
}

/// Scores every bin and keeps the putative regions of interest: bins with
/// a score above `score_threshold` whose mean coverage of both conditions
/// sums above `coverage_floor`. Indices are ascending.
pub fn putative_regions(
    matrix: &CoverageMatrix,
    config: &ScoringConfig,
    verbosity: Verbosity,
) -> DiffPeakResult<(Array1<CovType>, Vec<BinIndex>)> {
    let scores = compute_scores(matrix)?;
    let coverage = matrix.bin_means(Condition::First) + matrix.bin_means(Condition::Second);

    let regions = scores
        .iter()
        .zip(coverage.iter())
        .enumerate()
        .filter(|&(_, (&score, &cov))| {
            score > config.score_threshold && cov > config.coverage_floor
        })
        .map(|(bin, _)| bin)
        .collect::<Vec<_>>();

    if verbosity.is_verbose() {
        info!(
            "{} of {} bins are putative regions of interest",
            regions.len(),
            matrix.n_bins()
        );
    }
    Ok((scores, regions))
}
