//! Trimmed mean of M-values scaling between replicates.

use itertools::{
    izip,
    Itertools,
};
use log::*;
use ndarray::Array1;
use rand::Rng;
use thiserror::Error;

use crate::config::{
    TmmConfig,
    Verbosity,
};
use crate::data_structs::typedef::CovType;
use crate::data_structs::{
    Condition,
    CoverageMatrix,
};
use crate::utils::percentile_band;

/// Reasons a single factor could not be computed. Never leaves this module:
/// the affected sample falls back to an identity factor.
#[derive(Error, Debug)]
enum NormalizationFailure {
    #[error("no bin has positive coverage in every replicate")]
    NoSharedBins,
    #[error("trimming removed every bin")]
    EmptyTrim,
    #[error("factor is not finite ({0})")]
    NonFinite(f64),
}

/// Mean over all replicates of both conditions, restricted to bins where
/// every replicate is strictly positive. Returns the kept bin indices and the
/// reference value of each.
fn reference(matrix: &CoverageMatrix) -> (Vec<usize>, Array1<CovType>) {
    let n_samples = matrix.n_samples() as CovType;
    let first = matrix.condition(Condition::First);
    let second = matrix.condition(Condition::Second);

    let bins = (0..matrix.n_bins())
        .filter(|&bin| {
            first.column(bin).iter().all(|&v| v > 0.0)
                && second.column(bin).iter().all(|&v| v > 0.0)
        })
        .collect_vec();
    let values = bins
        .iter()
        .map(|&bin| (first.column(bin).sum() + second.column(bin).sum()) / n_samples)
        .collect();
    (bins, values)
}

/// Keeps (M, A) pairs inside the central M band and the central A band,
/// bounds included.
fn trim(
    m_values: &[f64],
    a_values: &[f64],
    config: &TmmConfig,
) -> Result<Vec<(f64, f64)>, NormalizationFailure> {
    let (m_low, m_high) =
        percentile_band(m_values, 100.0 - config.m_threshold, config.m_threshold)
            .ok_or(NormalizationFailure::EmptyTrim)?;
    let (a_low, a_high) =
        percentile_band(a_values, 100.0 - config.a_threshold, config.a_threshold)
            .ok_or(NormalizationFailure::EmptyTrim)?;

    let trimmed = izip!(m_values, a_values)
        .filter(|&(&m, &a)| m >= m_low && m <= m_high && a >= a_low && a <= a_high)
        .map(|(&m, &a)| (m, a))
        .collect_vec();
    if trimmed.is_empty() {
        Err(NormalizationFailure::EmptyTrim)
    }
    else {
        Ok(trimmed)
    }
}

fn tmm_factor(
    reference: &[CovType],
    replicate: &[CovType],
    config: &TmmConfig,
) -> Result<CovType, NormalizationFailure> {
    if reference.is_empty() {
        return Err(NormalizationFailure::NoSharedBins);
    }
    let (m_values, a_values): (Vec<f64>, Vec<f64>) = reference
        .iter()
        .zip(replicate.iter())
        .map(|(&r, &x)| ((r / x).ln(), 0.5 * (x * r).ln()))
        .unzip();

    let trimmed = trim(&m_values, &a_values, config)?;
    let weighted: f64 = trimmed.iter().map(|(m, a)| m * a).sum();
    let total: f64 = trimmed.iter().map(|(_, a)| a).sum();
    let factor = 2f64.powf(weighted / total);
    if factor.is_finite() && factor > 0.0 {
        Ok(factor)
    }
    else {
        Err(NormalizationFailure::NonFinite(factor))
    }
}

/// Computes one TMM factor per sample, in [`CoverageMatrix::sample_ids`]
/// order.
///
/// Each replicate is compared with the cross-sample mean on a random subset
/// of at most `config.sample_size` bins. A replicate whose factor cannot be
/// computed gets `1.0` and a warning; this function never fails.
pub fn tmm_factors<R: Rng>(
    matrix: &CoverageMatrix,
    config: &TmmConfig,
    rng: &mut R,
    verbosity: Verbosity,
) -> Vec<CovType> {
    let (bins, reference) = reference(matrix);
    if verbosity.is_debug() {
        debug!("TMM reference covers {} of {} bins", bins.len(), matrix.n_bins());
    }

    matrix
        .sample_ids()
        .into_iter()
        .map(|id| {
            let amount = bins.len().min(config.sample_size);
            let chosen = rand::seq::index::sample(&mut *rng, bins.len(), amount);
            let (ref_values, rep_values): (Vec<CovType>, Vec<CovType>) = match matrix.sample(id) {
                Some(row) => chosen
                    .iter()
                    .map(|i| (reference[i], row[bins[i]]))
                    .unzip(),
                None => (vec![], vec![]),
            };

            match tmm_factor(&ref_values, &rep_values, config) {
                Ok(factor) => {
                    if verbosity.is_verbose() {
                        info!("TMM scaling factor of {}: {:.4}", id, factor);
                    }
                    factor
                },
                Err(e) => {
                    warn!(
                        "TMM normalization not successfully performed for {} ({}), do not normalize data",
                        id, e
                    );
                    1.0
                },
            }
        })
        .collect()
}
