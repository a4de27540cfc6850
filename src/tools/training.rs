//! Training set construction for the differential peak classifier.
//!
//! Bins of interest are classified into three classes (first condition up,
//! second condition up, neutral) by fold change and absolute difference of
//! their mean coverages. Thresholds start strict and are relaxed pass by
//! pass until both biased classes are populated, then every class is
//! subsampled to a common size.

use std::collections::BTreeSet;

use itertools::Itertools;
use log::*;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{
    Deserialize,
    Serialize,
};

use crate::config::{
    MirrorPolicy,
    TrainingConfig,
    Verbosity,
};
use crate::data_structs::typedef::{
    BinIndex,
    CountType,
};
use crate::data_structs::{
    Condition,
    CoverageMatrix,
    Label,
};
use crate::errors::{
    DiffPeakError,
    DiffPeakResult,
};
use crate::utils::{
    percentile,
    percentile_band,
};

/// A classified bin with the truncated mean coverage of both conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrainingExample {
    pub index: BinIndex,
    pub cov1:  CountType,
    pub cov2:  CountType,
}

impl TrainingExample {
    /// Same bin with the conditions swapped.
    pub fn mirrored(&self) -> Self {
        Self {
            index: self.index,
            cov1:  self.cov2,
            cov2:  self.cov1,
        }
    }
}

/// Classification thresholds of a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    /// Fold-change threshold on `(cov1 + 1) / (cov2 + 1)`.
    pub threshold: f64,
    /// Absolute coverage difference threshold.
    pub diff_cov:  i64,
}

impl TrainingParams {
    pub fn classify(
        &self,
        cov1: CountType,
        cov2: CountType,
    ) -> Label {
        let (c1, c2) = (cov1 as i64, cov2 as i64);
        let ratio = (c1 + 1) as f64 / (c2 + 1) as f64;
        let supported = c1 + c2 > self.diff_cov / 2;

        if (ratio > self.threshold && supported) || c1 - c2 > self.diff_cov {
            Label::FirstUp
        }
        else if (ratio < 1.0 / self.threshold && supported) || c2 - c1 > self.diff_cov {
            Label::SecondUp
        }
        else {
            Label::Neutral
        }
    }

    /// Next, more permissive, thresholds. `None` once both are at their
    /// floors.
    fn relax(
        &self,
        config: &TrainingConfig,
    ) -> Option<Self> {
        let next = Self {
            threshold: (self.threshold - config.threshold_step).max(config.threshold_floor),
            diff_cov:  (self.diff_cov - config.diff_cov_step).max(config.diff_cov_floor),
        };
        (next != *self).then_some(next)
    }
}

type Buckets = [Vec<TrainingExample>; 3];

/// Balanced training set handed to the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSet {
    indices:  Vec<BinIndex>,
    examples: Buckets,
    params:   TrainingParams,
    passes:   usize,
}

impl TrainingSet {
    /// Sorted, deduplicated bin indices of all examples, each extended by
    /// `ex` bins on both sides.
    pub fn indices(&self) -> &[BinIndex] {
        &self.indices
    }

    /// Examples of one class, sorted by bin index.
    pub fn examples(
        &self,
        label: Label,
    ) -> &[TrainingExample] {
        &self.examples[label.index()]
    }

    /// `(cov1, cov2)` pairs of one class.
    pub fn values(
        &self,
        label: Label,
    ) -> Vec<(CountType, CountType)> {
        self.examples(label)
            .iter()
            .map(|e| (e.cov1, e.cov2))
            .collect()
    }

    /// Thresholds the set was accepted with.
    pub fn params(&self) -> TrainingParams {
        self.params
    }

    /// Number of collection passes needed.
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Integer part of the `min_t` percentile of the positive absolute
/// differences between the condition means. `None` when the conditions
/// never differ.
pub fn initial_diff_cov(
    matrix: &CoverageMatrix,
    min_t: f64,
) -> Option<i64> {
    let diffs = (matrix.bin_means(Condition::First) - matrix.bin_means(Condition::Second))
        .iter()
        .map(|d| d.abs())
        .filter(|&d| d > 0.0)
        .collect_vec();
    percentile(&diffs, min_t).map(|p| p as i64)
}

/// Drops examples whose `cov1` or `cov2` lies outside the 2.5-97.5
/// percentile band of its bucket. Bounds are kept.
fn trim_outliers(bucket: &[TrainingExample]) -> Vec<TrainingExample> {
    let cov1 = bucket.iter().map(|e| e.cov1 as f64).collect_vec();
    let cov2 = bucket.iter().map(|e| e.cov2 as f64).collect_vec();
    match (
        percentile_band(&cov1, 2.5, 97.5),
        percentile_band(&cov2, 2.5, 97.5),
    ) {
        (Some((low1, high1)), Some((low2, high2))) => bucket
            .iter()
            .filter(|e| {
                let (c1, c2) = (e.cov1 as f64, e.cov2 as f64);
                c1 >= low1 && c1 <= high1 && c2 >= low2 && c2 <= high2
            })
            .copied()
            .collect(),
        _ => bucket.to_vec(),
    }
}

fn trim_buckets(
    buckets: &Buckets,
    enabled: bool,
) -> Buckets {
    buckets.clone().map(|bucket| {
        if enabled {
            trim_outliers(&bucket)
        }
        else {
            bucket
        }
    })
}

/// One collection pass over the examples in the given order. Stops early
/// once every bucket holds more than `y` examples, also after trimming.
fn collect(
    examples: &[TrainingExample],
    order: &[usize],
    params: &TrainingParams,
    config: &TrainingConfig,
) -> Buckets {
    let mut buckets: Buckets = Default::default();
    for (step, &i) in order.iter().enumerate() {
        let example = examples[i];
        buckets[params.classify(example.cov1, example.cov2).index()].push(example);

        if config.check_interval > 0
            && (step + 1) % config.check_interval == 0
            && buckets.iter().all(|b| b.len() > config.y)
        {
            let smallest = trim_buckets(&buckets, config.trim_outliers)
                .iter()
                .map(Vec::len)
                .min()
                .unwrap_or(0);
            if smallest >= config.y {
                break;
            }
        }
    }
    buckets
}

/// Fills a nearly empty biased bucket with the swapped examples of the
/// opposite one, if that one is large.
fn mirror_deficient(
    buckets: &mut Buckets,
    min_class_size: usize,
) {
    for label in [Label::FirstUp, Label::SecondUp] {
        let opposite = label.mirrored().index();
        if buckets[label.index()].len() < min_class_size / 2
            && buckets[opposite].len() > min_class_size * 2
        {
            buckets[label.index()] = buckets[opposite]
                .iter()
                .map(TrainingExample::mirrored)
                .collect();
        }
    }
}

fn has_spread(sample: &[TrainingExample]) -> bool {
    let n = sample.len() as u64;
    let sum1: u64 = sample.iter().map(|e| e.cov1 as u64).sum();
    let sum2: u64 = sample.iter().map(|e| e.cov2 as u64).sum();
    sum1 >= n && sum2 >= n
}

/// Draws `size` examples without replacement, redrawing while the sample
/// fails the spread check.
fn sample_bucket<R: Rng>(
    bucket: &[TrainingExample],
    size: usize,
    label: Label,
    max_resamples: usize,
    rng: &mut R,
) -> DiffPeakResult<Vec<TrainingExample>> {
    for attempt in 0..=max_resamples {
        let mut sample = bucket
            .choose_multiple(rng, size)
            .copied()
            .collect_vec();
        if has_spread(&sample) {
            sample.sort_by_key(|e| e.index);
            return Ok(sample);
        }
        if attempt < max_resamples {
            debug!("Resample {} examples because data is not spatial", label);
        }
    }
    Err(DiffPeakError::DegenerateSample {
        label,
        attempts: max_resamples,
    })
}

fn finalize<R: Rng>(
    buckets: Buckets,
    n_bins: usize,
    params: TrainingParams,
    passes: usize,
    config: &TrainingConfig,
    rng: &mut R,
    verbosity: Verbosity,
) -> DiffPeakResult<TrainingSet> {
    let trimmed = trim_buckets(&buckets, config.trim_outliers);
    if trimmed[Label::FirstUp.index()].is_empty() && trimmed[Label::SecondUp.index()].is_empty() {
        error!("No differential peaks left after outlier removal");
        return Err(DiffPeakError::NoDifferentialSignal {
            threshold: params.threshold,
            diff_cov: params.diff_cov,
            passes,
        });
    }
    let size = trimmed
        .iter()
        .filter(|b| !b.is_empty())
        .map(Vec::len)
        .min()
        .unwrap_or(0)
        .min(config.y);
    if verbosity.is_verbose() {
        info!(
            "Sampling {} examples per class from {} neutral, {} {}, {} {}",
            size,
            trimmed[Label::Neutral.index()].len(),
            trimmed[Label::FirstUp.index()].len(),
            Label::FirstUp,
            trimmed[Label::SecondUp.index()].len(),
            Label::SecondUp
        );
    }

    let mut examples: Buckets = Default::default();
    for label in Label::ALL {
        let bucket = &trimmed[label.index()];
        if !bucket.is_empty() {
            examples[label.index()] =
                sample_bucket(bucket, size, label, config.max_resamples, rng)?;
        }
    }

    let last = n_bins.saturating_sub(1);
    let indices = examples
        .iter()
        .flatten()
        .flat_map(|e| e.index.saturating_sub(config.ex)..=(e.index + config.ex).min(last))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    Ok(TrainingSet {
        indices,
        examples,
        params,
        passes,
    })
}

/// Builds the training set from the bins of interest `regions`.
///
/// # Errors
///
/// * [`DiffPeakError::NoDifferentialSignal`] when the conditions never
///   differ, when relaxation reaches its floors without a single biased
///   example, when outlier removal leaves no biased example, or when
///   `max_passes` passes did not settle.
///
/// `config` is expected to be validated; a zero `check_interval` disables
/// the early stop of a pass.
/// * [`DiffPeakError::DegenerateSample`] when a class keeps failing the
///   spread check.
pub fn build_training_set<R: Rng>(
    matrix: &CoverageMatrix,
    regions: &[BinIndex],
    config: &TrainingConfig,
    rng: &mut R,
    verbosity: Verbosity,
) -> DiffPeakResult<TrainingSet> {
    let no_signal = |params: &TrainingParams, passes: usize| {
        DiffPeakError::NoDifferentialSignal {
            threshold: params.threshold,
            diff_cov: params.diff_cov,
            passes,
        }
    };

    let mut params = TrainingParams {
        threshold: config.foldchange,
        diff_cov:  0,
    };
    params.diff_cov = match initial_diff_cov(matrix, config.min_t) {
        Some(diff_cov) if !regions.is_empty() => diff_cov,
        _ => return Err(no_signal(&params, 0)),
    };
    if verbosity.is_debug() {
        debug!(
            "Training set parameters: threshold: {}, diff_cov: {}",
            params.threshold, params.diff_cov
        );
    }

    let examples = regions
        .iter()
        .map(|&index| {
            let (cov1, cov2) = matrix.rounded_means(index);
            TrainingExample { index, cov1, cov2 }
        })
        .collect_vec();
    let mut order = (0..examples.len()).collect_vec();

    for pass in 1..=config.max_passes {
        order.shuffle(rng);
        let mut buckets = collect(&examples, &order, &params, config);
        if config.mirror == MirrorPolicy::Enabled {
            mirror_deficient(&mut buckets, config.min_class_size);
        }

        let n_first = buckets[Label::FirstUp.index()].len();
        let n_second = buckets[Label::SecondUp.index()].len();
        if n_first >= config.min_class_size || n_second >= config.min_class_size {
            if verbosity.is_debug() {
                debug!(
                    "Final training set parameters: threshold: {}, diff_cov: {}",
                    params.threshold, params.diff_cov
                );
            }
            return finalize(buckets, matrix.n_bins(), params, pass, config, rng, verbosity);
        }

        match params.relax(config) {
            Some(next) => {
                if verbosity.is_debug() {
                    debug!(
                        "Pass {}: {} {} and {} {} examples, relaxing to threshold {:.2}, diff_cov {}",
                        pass,
                        n_first,
                        Label::FirstUp,
                        n_second,
                        Label::SecondUp,
                        next.threshold,
                        next.diff_cov
                    );
                }
                params = next;
            },
            None if n_first + n_second == 0 => {
                error!("No differential peaks detected");
                return Err(no_signal(&params, pass));
            },
            None => {
                warn!(
                    "Thresholds are fully relaxed, accepting {} {} and {} {} examples",
                    n_first,
                    Label::FirstUp,
                    n_second,
                    Label::SecondUp
                );
                return finalize(buckets, matrix.n_bins(), params, pass, config, rng, verbosity);
            },
        }
    }
    Err(no_signal(&params, config.max_passes))
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use ndarray::Array2;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rstest::rstest;

    use super::*;

    /// Two replicates per condition, bins given as (cond1, cond2) coverage.
    fn matrix(bins: &[(f64, f64)]) -> CoverageMatrix {
        let first = bins.iter().map(|b| b.0).collect_vec();
        let second = bins.iter().map(|b| b.1).collect_vec();
        CoverageMatrix::new(
            Array2::from_shape_vec((2, bins.len()), [first.clone(), first].concat()).unwrap(),
            Array2::from_shape_vec((2, bins.len()), [second.clone(), second].concat()).unwrap(),
        )
        .unwrap()
    }

    fn repeat(
        bin: (f64, f64),
        n: usize,
    ) -> Vec<(f64, f64)> {
        vec![bin; n]
    }

    fn build(
        matrix: &CoverageMatrix,
        config: &TrainingConfig,
        seed: u64,
    ) -> DiffPeakResult<TrainingSet> {
        let regions = (0..matrix.n_bins()).collect_vec();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        build_training_set(matrix, &regions, config, &mut rng, Verbosity::Quiet)
    }

    #[rstest]
    #[case(50, 5, Label::FirstUp)]
    #[case(5, 50, Label::SecondUp)]
    #[case(20, 20, Label::Neutral)]
    // Fold change alone is not enough without coverage support.
    #[case(3, 0, Label::Neutral)]
    // Absolute difference alone is enough.
    #[case(131, 100, Label::FirstUp)]
    #[case(100, 131, Label::SecondUp)]
    fn classification(
        #[case] cov1: CountType,
        #[case] cov2: CountType,
        #[case] expected: Label,
    ) {
        let params = TrainingParams {
            threshold: 1.6,
            diff_cov:  30,
        };
        assert_eq!(params.classify(cov1, cov2), expected);
    }

    #[test]
    fn relaxation_stops_at_floors() {
        let config = TrainingConfig::default();
        let mut params = TrainingParams {
            threshold: 1.6,
            diff_cov:  40,
        };
        let mut steps = 0;
        while let Some(next) = params.relax(&config) {
            params = next;
            steps += 1;
        }
        assert_eq!(steps, 5);
        assert_eq!(params.diff_cov, 1);
        assert_eq!(params.threshold, 1.1);
    }

    #[test]
    fn identical_conditions_have_no_signal() {
        let m = matrix(&repeat((20.0, 20.0), 100));
        assert!(matches!(
            build(&m, &TrainingConfig::default(), 0),
            Err(DiffPeakError::NoDifferentialSignal { .. })
        ));
    }

    #[test]
    fn strongly_biased_bins_are_all_first_up() {
        let m = matrix(&repeat((50.0, 5.0), 1000));
        let set = build(&m, &TrainingConfig::default(), 1).unwrap();
        assert_eq!(set.examples(Label::FirstUp).len(), 1000);
        assert!(set.examples(Label::SecondUp).is_empty());
        assert!(set.examples(Label::Neutral).is_empty());
        assert_eq!(set.indices(), (0..1000).collect_vec().as_slice());
        assert_eq!(set.passes(), 1);

        let small = TrainingConfig::default().with_y(100).with_ex(0);
        let set = build(&m, &small, 1).unwrap();
        assert_eq!(set.examples(Label::FirstUp).len(), 100);
        assert_eq!(set.len(), 100);
    }

    #[test]
    fn thresholds_are_relaxed_until_both_classes_fill() {
        let mut bins = repeat((30.0, 20.0), 300);
        bins.extend(repeat((20.0, 30.0), 300));
        bins.extend(repeat((25.0, 25.0), 300));
        let m = matrix(&bins);
        let set = build(&m, &TrainingConfig::default(), 3).unwrap();

        assert_eq!(set.passes(), 2);
        assert_eq!(set.params().diff_cov, 1);
        assert_approx_eq!(set.params().threshold, 1.5);
        for label in Label::ALL {
            assert_eq!(set.examples(label).len(), 300);
        }
        assert!(set
            .examples(Label::FirstUp)
            .iter()
            .all(|e| (e.cov1, e.cov2) == (30, 20)));
    }

    #[test]
    fn fully_relaxed_without_bias_is_fatal() {
        let mut bins = repeat((20.0, 21.0), 200);
        bins.extend(repeat((21.0, 20.0), 200));
        let m = matrix(&bins);
        match build(&m, &TrainingConfig::default(), 4) {
            Err(DiffPeakError::NoDifferentialSignal {
                threshold,
                diff_cov,
                ..
            }) => {
                assert_eq!(diff_cov, 1);
                assert_eq!(threshold, 1.1);
            },
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn fully_relaxed_with_some_bias_is_accepted() {
        let mut bins = repeat((50.0, 5.0), 10);
        bins.extend(repeat((20.0, 21.0), 500));
        let m = matrix(&bins);
        let set = build(&m, &TrainingConfig::default(), 5).unwrap();
        assert_eq!(set.examples(Label::FirstUp).len(), 10);
        assert_eq!(set.examples(Label::Neutral).len(), 10);
        assert!(set.examples(Label::SecondUp).is_empty());
    }

    #[test]
    fn classes_are_disjoint() {
        let mut bins = repeat((60.0, 10.0), 400);
        bins.extend(repeat((10.0, 60.0), 400));
        bins.extend(repeat((30.0, 30.0), 400));
        bins.extend((0..400).map(|i| (20.0 + (i % 30) as f64, 20.0 + (i % 17) as f64)));
        let m = matrix(&bins);
        let set = build(&m, &TrainingConfig::default().with_y(250), 6).unwrap();

        let mut seen = BTreeSet::new();
        for label in Label::ALL {
            let examples = set.examples(label);
            assert!(examples.windows(2).all(|w| w[0].index < w[1].index));
            for example in examples {
                assert!(seen.insert(example.index));
            }
        }
    }

    #[test]
    fn same_seed_same_training_set() {
        let mut bins = repeat((60.0, 10.0), 300);
        bins.extend(repeat((10.0, 60.0), 300));
        bins.extend((0..600).map(|i| (20.0 + (i % 11) as f64, 20.0 + (i % 13) as f64)));
        let m = matrix(&bins);
        let config = TrainingConfig::default().with_y(120);
        assert_eq!(build(&m, &config, 11).unwrap(), build(&m, &config, 11).unwrap());
    }

    #[test]
    fn biased_examples_lost_to_outlier_removal_is_fatal() {
        let mut bins = vec![(100.0, 10.0), (50.0, 1.0)];
        bins.extend(repeat((20.0, 21.0), 500));
        let m = matrix(&bins);
        assert!(matches!(
            build(&m, &TrainingConfig::default(), 1),
            Err(DiffPeakError::NoDifferentialSignal {
                diff_cov: 1,
                ..
            })
        ));

        let untrimmed = TrainingConfig::default().with_trim_outliers(false);
        let set = build(&m, &untrimmed, 1).unwrap();
        assert_eq!(set.examples(Label::FirstUp).len(), 2);
        assert_eq!(set.examples(Label::Neutral).len(), 2);
    }

    #[test]
    fn zero_check_interval_does_not_panic() {
        let m = matrix(&repeat((50.0, 5.0), 50));
        let config = TrainingConfig::default()
            .with_check_interval(0)
            .with_min_class_size(10);
        let set = build(&m, &config, 2).unwrap();
        assert_eq!(set.examples(Label::FirstUp).len(), 50);
    }

    #[test]
    fn mirror_policy_fills_missing_class() {
        let mut bins = repeat((50.0, 5.0), 300);
        bins.extend(repeat((20.0, 20.0), 300));
        let m = matrix(&bins);

        let set = build(&m, &TrainingConfig::default(), 8).unwrap();
        assert!(set.examples(Label::SecondUp).is_empty());

        let mirrored = TrainingConfig::default().with_mirror(MirrorPolicy::Enabled);
        let set = build(&m, &mirrored, 8).unwrap();
        let second = set.examples(Label::SecondUp);
        assert_eq!(second.len(), 300);
        assert!(second.iter().all(|e| (e.cov1, e.cov2) == (5, 50)));
    }

    #[test]
    fn class_without_spread_is_degenerate() {
        let mut bins = repeat((50.0, 0.0), 200);
        bins.extend(repeat((30.0, 30.0), 200));
        let m = matrix(&bins);
        let config = TrainingConfig::default().with_max_resamples(5);
        assert!(matches!(
            build(&m, &config, 9),
            Err(DiffPeakError::DegenerateSample {
                label: Label::FirstUp,
                attempts: 5
            })
        ));
    }

    #[test]
    fn outlier_trim_keeps_bounds() {
        let bucket = (0..100)
            .map(|i| TrainingExample {
                index: i,
                cov1:  i as CountType,
                cov2:  7,
            })
            .collect_vec();
        let trimmed = trim_outliers(&bucket);
        // Band is [2.475, 96.525]: values 0, 1, 2, 97, 98, 99 are dropped.
        assert_eq!(trimmed.len(), 94);
        assert_eq!(trimmed.first().map(|e| e.cov1), Some(3));
    }

    #[test]
    fn extension_is_clamped_to_genome() {
        let m = matrix(&repeat((50.0, 5.0), 10));
        let config = TrainingConfig::default().with_min_class_size(5).with_ex(3);
        let set = build(&m, &config, 2).unwrap();
        assert_eq!(set.indices(), (0..10).collect_vec().as_slice());
    }
}
