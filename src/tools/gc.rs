use log::*;
use ndarray::ArrayViewMut1;
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};

use crate::config::Verbosity;
use crate::data_structs::typedef::CovType;
use crate::data_structs::{
    BinLayout,
    SampleCoverage,
};
use crate::errors::{
    DiffPeakError,
    DiffPeakResult,
};
use crate::utils::THREAD_POOL;

/// Number of GC buckets: one per integer GC percentage, 0 to 100.
pub const N_GC_BUCKETS: usize = 101;

/// GC fraction of every bin of a [`BinLayout`].
///
/// Bins without a single A, C, G or T base have no GC value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcContent {
    fractions: Vec<Option<f64>>,
}

impl GcContent {
    pub fn new(fractions: Vec<Option<f64>>) -> Self {
        Self { fractions }
    }

    pub fn n_bins(&self) -> usize {
        self.fractions.len()
    }

    pub fn fractions(&self) -> &[Option<f64>] {
        &self.fractions
    }

    /// GC percentage bucket of a bin.
    pub fn bucket(
        &self,
        bin: usize,
    ) -> Option<usize> {
        self.fractions
            .get(bin)
            .copied()
            .flatten()
            .map(gc_bucket)
    }
}

/// Maps a GC fraction in `[0, 1]` onto its bucket, `round(100 * fraction)`.
pub fn gc_bucket(fraction: f64) -> usize {
    ((fraction.clamp(0.0, 1.0) * 100.0).round() as usize).min(N_GC_BUCKETS - 1)
}

/// Mean input coverage per GC bucket against the genome-wide mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcProfile {
    /// Bucket of every bin.
    buckets:   Vec<Option<usize>>,
    /// Mean coverage per bucket.
    histogram: Vec<CovType>,
    /// Number of bins per bucket.
    counts:    Vec<usize>,
    /// Mean coverage over all bins with a GC value.
    average:   CovType,
}

impl GcProfile {
    /// Builds the profile from input samples, pooled bin-wise.
    pub fn compute(
        gc: &GcContent,
        inputs: &[SampleCoverage],
    ) -> DiffPeakResult<Self> {
        if let Some(bad) = inputs.iter().find(|s| s.n_bins() != gc.n_bins()) {
            return Err(DiffPeakError::ShapeMismatch(format!(
                "input {} has {} bins, GC content covers {}",
                bad.id(),
                bad.n_bins(),
                gc.n_bins()
            )));
        }
        let buckets = (0..gc.n_bins())
            .map(|bin| gc.bucket(bin))
            .collect::<Vec<_>>();

        let mut sums = vec![0.0; N_GC_BUCKETS];
        let mut counts = vec![0usize; N_GC_BUCKETS];
        for input in inputs {
            for (bucket, value) in buckets.iter().zip(input.values()) {
                if let Some(bucket) = bucket {
                    sums[*bucket] += value;
                    counts[*bucket] += 1;
                }
            }
        }

        let total_count = counts.iter().sum::<usize>();
        let average = if total_count > 0 {
            sums.iter().sum::<CovType>() / total_count as CovType
        }
        else {
            0.0
        };
        let histogram = sums
            .iter()
            .zip(counts.iter())
            .map(|(sum, &count)| {
                if count > 0 {
                    sum / count as CovType
                }
                else {
                    0.0
                }
            })
            .collect();
        // Counts are reported per bin, not per bin and sample.
        let n_inputs = inputs.len().max(1);
        let counts = counts
            .into_iter()
            .map(|c| c / n_inputs)
            .collect();

        Ok(Self {
            buckets,
            histogram,
            counts,
            average,
        })
    }

    pub fn histogram(&self) -> &[CovType] {
        &self.histogram
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn average(&self) -> CovType {
        self.average
    }

    /// Multiplier applied to a bin. Bins without GC value or falling into a
    /// bucket with no observed coverage are left as they are.
    pub fn correction(
        &self,
        bin: usize,
    ) -> CovType {
        match self.buckets.get(bin).copied().flatten() {
            Some(bucket) if self.histogram[bucket] > 0.0 && self.average > 0.0 => {
                self.average / self.histogram[bucket]
            },
            _ => 1.0,
        }
    }

    /// Divides coverage by `histogram[bucket] / average` in place.
    pub fn normalize(
        &self,
        mut values: ArrayViewMut1<CovType>,
    ) {
        values
            .iter_mut()
            .enumerate()
            .for_each(|(bin, v)| *v *= self.correction(bin));
    }
}

/// Corrects IP and input coverage for GC bias.
///
/// The profile is computed from the first set of inputs passed to
/// [`GcCorrector::correct`] and reused afterwards, so one corrector must
/// only be shared between runs over the same genome and binning.
#[derive(Debug)]
pub struct GcCorrector {
    gc:      GcContent,
    profile: OnceCell<GcProfile>,
}

impl GcCorrector {
    pub fn new(gc: GcContent) -> Self {
        Self {
            gc,
            profile: OnceCell::new(),
        }
    }

    /// Checks that the GC content matches the layout the corrector is used
    /// with.
    pub fn for_layout(
        gc: GcContent,
        layout: &BinLayout,
    ) -> DiffPeakResult<Self> {
        if gc.n_bins() != layout.n_bins() {
            return Err(DiffPeakError::ShapeMismatch(format!(
                "GC content has {} bins, layout has {}",
                gc.n_bins(),
                layout.n_bins()
            )));
        }
        Ok(Self::new(gc))
    }

    pub fn gc_content(&self) -> &GcContent {
        &self.gc
    }

    /// Cached profile, if already computed.
    pub fn profile(&self) -> Option<&GcProfile> {
        self.profile.get()
    }

    /// Normalizes every IP and input sample in place. Samples are processed
    /// in parallel, one sample per worker.
    pub fn correct(
        &self,
        ip: &mut [SampleCoverage],
        inputs: &mut [SampleCoverage],
        verbosity: Verbosity,
    ) -> DiffPeakResult<&GcProfile> {
        let profile = self
            .profile
            .get_or_try_init(|| GcProfile::compute(&self.gc, inputs))?;
        if verbosity.is_verbose() {
            info!(
                "Correcting GC bias of {} IP and {} input samples (mean input coverage {:.3})",
                ip.len(),
                inputs.len(),
                profile.average()
            );
        }

        if let Some(bad) = ip
            .iter()
            .chain(inputs.iter())
            .find(|s| s.n_bins() != self.gc.n_bins())
        {
            return Err(DiffPeakError::ShapeMismatch(format!(
                "sample {} has {} bins, GC content covers {}",
                bad.id(),
                bad.n_bins(),
                self.gc.n_bins()
            )));
        }

        THREAD_POOL.install(|| {
            ip.par_iter_mut()
                .chain(inputs.par_iter_mut())
                .for_each(|sample| profile.normalize(sample.values_mut()));
        });
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use ndarray::array;

    use super::*;
    use crate::data_structs::{
        Condition,
        SampleId,
    };

    fn input(values: ndarray::Array1<f64>) -> SampleCoverage {
        SampleCoverage::new(SampleId::new(Condition::First, 0), values)
    }

    #[test]
    fn buckets_round_to_percent() {
        assert_eq!(gc_bucket(0.0), 0);
        assert_eq!(gc_bucket(0.424), 42);
        assert_eq!(gc_bucket(0.425), 43);
        assert_eq!(gc_bucket(1.0), 100);
        assert_eq!(gc_bucket(1.2), 100);
    }

    #[test]
    fn profile_flattens_gc_bias() {
        // Two GC levels, the GC-rich one is over-amplified twice.
        let gc = GcContent::new(vec![Some(0.4), Some(0.4), Some(0.6), Some(0.6), None]);
        let inputs = vec![input(array![10.0, 10.0, 20.0, 20.0, 7.0])];
        let profile = GcProfile::compute(&gc, &inputs).unwrap();

        assert_approx_eq!(profile.average(), 15.0);
        assert_approx_eq!(profile.histogram()[40], 10.0);
        assert_approx_eq!(profile.histogram()[60], 20.0);
        assert_eq!(profile.counts()[60], 2);

        let mut values = array![10.0, 10.0, 20.0, 20.0, 7.0];
        profile.normalize(values.view_mut());
        for (value, expected) in values.iter().zip([15.0, 15.0, 15.0, 15.0, 7.0]) {
            assert_approx_eq!(*value, expected);
        }
    }

    #[test]
    fn corrector_caches_profile() {
        let gc = GcContent::new(vec![Some(0.4), Some(0.6)]);
        let corrector = GcCorrector::new(gc);
        let mut ip = vec![input(array![4.0, 4.0])];
        let mut inputs = vec![input(array![1.0, 3.0])];
        corrector
            .correct(&mut ip, &mut inputs, Verbosity::Quiet)
            .unwrap();
        assert_approx_eq!(ip[0].values()[0], 8.0);
        assert_approx_eq!(ip[0].values()[1], 8.0 / 3.0);
        assert_approx_eq!(inputs[0].values()[0], 2.0);
        assert_approx_eq!(inputs[0].values()[1], 2.0);

        // A second call must not recompute the profile from other inputs.
        let mut other_inputs = vec![input(array![100.0, 100.0])];
        let profile = corrector
            .correct(&mut [], &mut other_inputs, Verbosity::Quiet)
            .unwrap();
        assert_approx_eq!(profile.average(), 2.0);
        assert_approx_eq!(other_inputs[0].values()[0], 200.0);
        assert_approx_eq!(other_inputs[0].values()[1], 200.0 / 3.0);
    }

    #[test]
    fn corrector_rejects_foreign_layout() {
        let layout = BinLayout::new(vec![("chr1".to_string(), 500)], 100, 100).unwrap();
        let gc = GcContent::new(vec![Some(0.5); 3]);
        assert!(GcCorrector::for_layout(gc, &layout).is_err());
    }
}
