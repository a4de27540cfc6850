use itertools::Itertools;
use log::*;
use rayon::prelude::*;

use crate::config::Verbosity;
use crate::data_structs::typedef::CovType;
use crate::data_structs::{
    SampleCoverage,
    SampleId,
};
use crate::errors::{
    DiffPeakError,
    DiffPeakResult,
};
use crate::utils::THREAD_POOL;

/// Source of the input scaling factors.
#[derive(Debug, Clone, PartialEq)]
pub enum InputFactors {
    /// One user factor per sample, in IP sample order.
    Predefined(Vec<CovType>),
    /// Estimated from windowed read counts of every IP/input pair.
    Computed,
}

impl From<Option<Vec<CovType>>> for InputFactors {
    fn from(value: Option<Vec<CovType>>) -> Self {
        match value {
            Some(factors) => InputFactors::Predefined(factors),
            None => InputFactors::Computed,
        }
    }
}

/// Estimates the factor an input sample has to be multiplied with to match
/// the background of its IP sample.
pub trait InputFactorEstimator: Sync {
    /// `ip` and `input` hold read counts of the same genomic windows.
    /// `None` means no usable factor could be derived.
    fn estimate(
        &self,
        ip: &[CovType],
        input: &[CovType],
    ) -> Option<CovType>;
}

/// Signal extraction scaling (Diaz et al., 2012).
///
/// Windows are sorted by IP count. The factor is the ratio of IP to input
/// reads up to the window where the cumulative input fraction exceeds the
/// cumulative IP fraction the most, i.e. over the background part of the
/// genome. Windows where any of the two counts is zero are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct SesEstimator;

impl InputFactorEstimator for SesEstimator {
    fn estimate(
        &self,
        ip: &[CovType],
        input: &[CovType],
    ) -> Option<CovType> {
        let windows = ip
            .iter()
            .zip(input.iter())
            .filter(|&(&a, &b)| a > 0.0 && b > 0.0)
            .map(|(&a, &b)| (a, b))
            .sorted_by(|a, b| a.0.total_cmp(&b.0))
            .collect_vec();
        if windows.is_empty() {
            return None;
        }

        let total_ip: CovType = windows.iter().map(|w| w.0).sum();
        let total_input: CovType = windows.iter().map(|w| w.1).sum();

        let (mut cum_ip, mut cum_input) = (0.0, 0.0);
        let mut best = (CovType::NEG_INFINITY, 0.0, 0.0);
        for (a, b) in windows {
            cum_ip += a;
            cum_input += b;
            let diff = cum_input / total_input - cum_ip / total_ip;
            if diff > best.0 {
                best = (diff, cum_ip, cum_input);
            }
        }

        let factor = best.1 / best.2;
        (factor.is_finite() && factor > 0.0).then_some(factor)
    }
}

/// Paired window counts of an IP sample and its input.
#[derive(Debug, Clone)]
pub struct WindowCounts {
    pub ip:    SampleCoverage,
    pub input: SampleCoverage,
}

/// Factors for every IP sample. Samples without a usable estimate get
/// `None`.
pub fn estimate_factors<E: InputFactorEstimator>(
    windows: &[WindowCounts],
    estimator: &E,
) -> Vec<(SampleId, Option<CovType>)> {
    THREAD_POOL.install(|| {
        windows
            .par_iter()
            .map(|w| {
                let ip = w.ip.values().to_vec();
                let input = w.input.values().to_vec();
                (w.ip.id(), estimator.estimate(&ip, &input))
            })
            .collect()
    })
}

/// Scales each input by its factor and subtracts it from the IP sample with
/// the same id, clamping at zero.
///
/// Consumes the inputs: they are not needed once subtracted. Returns the
/// factor applied to every IP sample, `1.0` where nothing was subtracted.
pub fn subtract_inputs<E: InputFactorEstimator>(
    ip: &mut [SampleCoverage],
    inputs: Vec<SampleCoverage>,
    factors: &InputFactors,
    windows: Option<&[WindowCounts]>,
    estimator: &E,
    verbosity: Verbosity,
) -> DiffPeakResult<Vec<CovType>> {
    if inputs.len() != ip.len() {
        return Err(DiffPeakError::ShapeMismatch(format!(
            "{} input samples for {} IP samples",
            inputs.len(),
            ip.len()
        )));
    }
    if verbosity.is_verbose() {
        info!("Normalize input-DNA");
    }

    let factors: Vec<Option<CovType>> = match factors {
        InputFactors::Predefined(values) => {
            if values.len() != ip.len() {
                return Err(DiffPeakError::InvalidConfig(format!(
                    "{} input factors given for {} samples",
                    values.len(),
                    ip.len()
                )));
            }
            if verbosity.is_verbose() {
                info!("Use predefined input factors");
            }
            values.iter().copied().map(Some).collect()
        },
        InputFactors::Computed => {
            info!("Compute input factors");
            let owned;
            let windows = match windows {
                Some(windows) => windows,
                None => {
                    // Without dedicated window counts the bins themselves are
                    // compared.
                    owned = ip
                        .iter()
                        .cloned()
                        .zip(inputs.iter().cloned())
                        .map(|(ip, input)| WindowCounts { ip, input })
                        .collect_vec();
                    &owned
                },
            };
            let estimates = estimate_factors(windows, estimator);
            ip.iter()
                .map(|sample| {
                    estimates
                        .iter()
                        .find(|(id, _)| *id == sample.id())
                        .and_then(|(_, factor)| *factor)
                })
                .collect()
        },
    };

    let mut applied = Vec::with_capacity(ip.len());
    for (sample, mut input) in ip.iter_mut().zip(inputs) {
        if input.id() != sample.id() {
            return Err(DiffPeakError::ShapeMismatch(format!(
                "input {} is paired with IP sample {}",
                input.id(),
                sample.id()
            )));
        }
        let factor = factors[applied.len()];
        match factor {
            Some(factor) => {
                info!(
                    "Normalize input of signal {} with factor {:.3}",
                    sample.id(),
                    factor
                );
                input.scale(factor);
                sample.subtract_clamped(&input)?;
                applied.push(factor);
            },
            None => {
                warn!(
                    "No input factor could be estimated for {}, input is not subtracted (factor 1)",
                    sample.id()
                );
                applied.push(1.0);
            },
        }
    }
    Ok(applied)
}
