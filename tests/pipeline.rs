use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use assert_approx_eq::assert_approx_eq;
use diffpeak::prelude::*;
use diffpeak::io::{
    read_chrom_sizes_file,
    read_gc_content,
};
use ndarray::Array1;
use rand::{
    Rng,
    SeedableRng,
};
use rand_chacha::ChaCha8Rng;

fn layout(n_bins: usize) -> BinLayout {
    BinLayout::new(vec![("chr1".to_string(), n_bins as u64 * 100)], 100, 100).unwrap()
}

fn sample(
    condition: Condition,
    replicate: usize,
    values: Vec<f64>,
) -> SampleCoverage {
    SampleCoverage::new(SampleId::new(condition, replicate), Array1::from_vec(values))
}

fn constant_samples(
    n_bins: usize,
    first: f64,
    second: f64,
) -> Vec<SampleCoverage> {
    (0..2)
        .map(|r| sample(Condition::First, r, vec![first; n_bins]))
        .chain((0..2).map(|r| sample(Condition::Second, r, vec![second; n_bins])))
        .collect()
}

fn without_tmm() -> DiffPeakConfig {
    let mut normalization = NormalizationConfig::default();
    normalization.tmm.enabled = false;
    DiffPeakConfig::default().with_normalization(normalization)
}

fn ip_only(ip: Vec<SampleCoverage>) -> PipelineInput {
    PipelineInput {
        ip,
        ..Default::default()
    }
}

/// Three blocks: first condition up, second condition up, and shared
/// background, with small random noise on every replicate.
fn noisy_samples(seed: u64) -> Vec<SampleCoverage> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut make = |condition: Condition, replicate: usize| {
        let values = (0..1000)
            .map(|bin| {
                let base = match (bin / 300, condition) {
                    (0, Condition::First) | (1, Condition::Second) => 60.0,
                    (0, _) | (1, _) => 5.0,
                    _ => 20.0,
                };
                base + rng.gen_range(0..5) as f64
            })
            .collect();
        sample(condition, replicate, values)
    };
    let mut samples = Vec::new();
    for condition in Condition::BOTH {
        for replicate in 0..2 {
            samples.push(make(condition, replicate));
        }
    }
    samples
}

#[test]
fn identical_conditions_have_no_differential_signal() {
    let values = (0..100).map(|i| 20.0 + (i % 7) as f64).collect::<Vec<_>>();
    let ip = (0..2)
        .map(|r| sample(Condition::First, r, values.clone()))
        .chain((0..2).map(|r| sample(Condition::Second, r, values.clone())))
        .collect();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut set =
        DiffCoverageSet::new(DiffPeakConfig::default(), layout(100), ip_only(ip), None, &mut rng)
            .unwrap();
    set.compute_putative_region_index().unwrap();
    assert_eq!(set.len(), 100);

    match set.training_set(&mut rng) {
        Err(DiffPeakError::NoDifferentialSignal { passes, .. }) => assert_eq!(passes, 0),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn first_condition_up_everywhere() {
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let mut set = DiffCoverageSet::new(
        without_tmm(),
        layout(1000),
        ip_only(constant_samples(1000, 50.0, 5.0)),
        None,
        &mut rng,
    )
    .unwrap();
    set.compute_putative_region_index().unwrap();
    assert_eq!(set.len(), 1000);

    let training = set.training_set(&mut rng).unwrap();
    assert_eq!(training.examples(Label::FirstUp).len(), 1000);
    assert!(training.examples(Label::SecondUp).is_empty());
    assert!(training.examples(Label::Neutral).is_empty());
    assert_eq!(training.indices(), (0..1000).collect::<Vec<_>>().as_slice());
    assert_eq!(training.passes(), 1);
}

#[test]
fn predefined_input_factor_is_subtracted() {
    let n_bins = 50;
    let inputs = constant_samples(n_bins, 10.0, 10.0);
    let config = DiffPeakConfig::default().with_normalization(
        NormalizationConfig::default()
            .with_factors_inputs(Some(vec![2.0; 4]))
            .with_tmm(TmmConfig::default().with_enabled(false)),
    );
    let input = PipelineInput {
        ip:      constant_samples(n_bins, 30.0, 30.0),
        inputs:  Some(inputs),
        windows: None,
    };
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let set = DiffCoverageSet::new(config, layout(n_bins), input, None, &mut rng).unwrap();

    assert_eq!(set.input_factors(), Some([2.0; 4].as_slice()));
    for id in set.matrix().sample_ids() {
        assert!(set.matrix().sample(id).unwrap().iter().all(|&v| v == 10.0));
    }
}

#[test]
fn empty_coverage_is_no_signal() {
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let result = DiffCoverageSet::new(
        DiffPeakConfig::default(),
        layout(10),
        ip_only(constant_samples(10, 0.0, 0.0)),
        None,
        &mut rng,
    );
    assert!(matches!(result, Err(DiffPeakError::NoSignal { .. })));
}

#[test]
fn empty_condition_cannot_be_scored() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let mut set = DiffCoverageSet::new(
        without_tmm(),
        layout(10),
        ip_only(constant_samples(10, 12.0, 0.0)),
        None,
        &mut rng,
    )
    .unwrap();
    assert!(matches!(
        set.compute_putative_region_index(),
        Err(DiffPeakError::NoData(_))
    ));
}

#[test]
fn layout_mismatch_is_rejected() {
    let mut rng = ChaCha8Rng::seed_from_u64(6);
    let result = DiffCoverageSet::new(
        DiffPeakConfig::default(),
        layout(20),
        ip_only(constant_samples(10, 5.0, 5.0)),
        None,
        &mut rng,
    );
    assert!(matches!(result, Err(DiffPeakError::ShapeMismatch(_))));
}

#[test]
fn regions_of_interest_exceed_coverage_floor() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut set = DiffCoverageSet::new(
        DiffPeakConfig::default(),
        layout(1000),
        ip_only(noisy_samples(7)),
        None,
        &mut rng,
    )
    .unwrap();
    set.compute_putative_region_index().unwrap();
    assert!(!set.is_empty());

    let first = set.matrix().bin_means(Condition::First);
    let second = set.matrix().bin_means(Condition::Second);
    let floor = set.config().scoring.coverage_floor;
    for &bin in set.regions_of_interest() {
        assert!(first[bin] + second[bin] > floor);
    }
    assert!(set.regions_of_interest().windows(2).all(|w| w[0] < w[1]));
    assert_eq!(
        set.observations(Some(set.regions_of_interest()))
            .unwrap()
            .nrows(),
        set.len()
    );
}

#[test]
fn same_seed_gives_same_run() {
    let run_once = |seed: u64| {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut set = DiffCoverageSet::new(
            DiffPeakConfig::default(),
            layout(1000),
            ip_only(noisy_samples(11)),
            None,
            &mut rng,
        )
        .unwrap();
        set.compute_putative_region_index().unwrap();
        let training = set.training_set(&mut rng).unwrap();
        (set.scaling_factors_ip().to_vec(), training)
    };
    let (factors_a, training_a) = run_once(42);
    let (factors_b, training_b) = run_once(42);
    assert_eq!(factors_a, factors_b);
    assert_eq!(training_a, training_b);
}

#[test]
fn training_classes_are_disjoint() {
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let mut set = DiffCoverageSet::new(
        DiffPeakConfig::default(),
        layout(1000),
        ip_only(noisy_samples(8)),
        None,
        &mut rng,
    )
    .unwrap();
    set.compute_putative_region_index().unwrap();
    let training = set.training_set(&mut rng).unwrap();

    let mut seen = HashSet::new();
    for label in Label::ALL {
        for example in training.examples(label) {
            assert!(seen.insert(example.index), "bin {} in two classes", example.index);
        }
    }
    assert!(!training.examples(Label::FirstUp).is_empty());
    assert!(!training.examples(Label::SecondUp).is_empty());
}

#[test]
fn identical_samples_keep_unit_scaling() {
    let values = (0..400).map(|i| 1.0 + (i % 13) as f64).collect::<Vec<_>>();
    let ip = (0..2)
        .map(|r| sample(Condition::First, r, values.clone()))
        .chain((0..2).map(|r| sample(Condition::Second, r, values.clone())))
        .collect();
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let set =
        DiffCoverageSet::new(DiffPeakConfig::default(), layout(400), ip_only(ip), None, &mut rng)
            .unwrap();
    for factor in set.scaling_factors_ip() {
        assert_approx_eq!(*factor, 1.0);
    }
}

#[test]
fn user_ip_factors_replace_tmm() {
    let config = DiffPeakConfig::default().with_normalization(
        NormalizationConfig::default().with_scaling_factors_ip(Some(vec![2.0, 2.0, 1.0, 1.0])),
    );
    let mut rng = ChaCha8Rng::seed_from_u64(10);
    let set = DiffCoverageSet::new(
        config,
        layout(10),
        ip_only(constant_samples(10, 5.0, 5.0)),
        None,
        &mut rng,
    )
    .unwrap();
    assert_eq!(set.scaling_factors_ip(), &[2.0, 2.0, 1.0, 1.0]);
    assert_eq!(set.matrix().bin_means(Condition::First)[0], 10.0);
    assert_eq!(set.max_colsum(), 30.0);
}

#[test]
fn negative_ip_factor_is_rejected() {
    let config = DiffPeakConfig::default().with_normalization(
        NormalizationConfig::default().with_scaling_factors_ip(Some(vec![-1.0, 1.0, 1.0, 1.0])),
    );
    let mut rng = ChaCha8Rng::seed_from_u64(13);
    let result = DiffCoverageSet::new(
        config,
        layout(10),
        ip_only(constant_samples(10, 5.0, 5.0)),
        None,
        &mut rng,
    );
    assert!(matches!(result, Err(DiffPeakError::InvalidConfig(_))));
}

#[test]
fn few_biased_bins_removed_as_outliers_is_no_signal() {
    let mut first = vec![100.0, 50.0];
    let mut second = vec![10.0, 1.0];
    first.extend(vec![20.0; 500]);
    second.extend(vec![21.0; 500]);
    let ip = (0..2)
        .map(|r| sample(Condition::First, r, first.clone()))
        .chain((0..2).map(|r| sample(Condition::Second, r, second.clone())))
        .collect();

    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut set =
        DiffCoverageSet::new(without_tmm(), layout(502), ip_only(ip), None, &mut rng).unwrap();
    set.compute_putative_region_index().unwrap();
    assert_eq!(set.len(), 502);
    assert!(matches!(
        set.training_set(&mut rng),
        Err(DiffPeakError::NoDifferentialSignal { .. })
    ));
}

fn write_file(
    path: &Path,
    contents: &str,
) {
    let mut file = fs::File::create(path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
}

/// BED reads with `per_bin(bin)` reads of 50 bp inside every bin.
fn bed_reads(
    n_bins: usize,
    per_bin: impl Fn(usize) -> usize,
) -> String {
    let mut bed = String::new();
    for bin in 0..n_bins {
        for j in 0..per_bin(bin) {
            let start = bin * 100 + j;
            bed.push_str(&format!("chr1\t{}\t{}\tr\t0\t+\n", start, start + 50));
        }
    }
    bed
}

#[test]
fn reads_to_training_set() {
    let dir = tempfile::tempdir().unwrap();
    let n_bins = 300;
    write_file(&dir.path().join("genome.sizes"), "chr1\t30000\n");
    write_file(
        &dir.path().join("genome.fa"),
        &format!(">chr1\n{}\n", "ACGTGGCCAT".repeat(3000)),
    );

    // Bins 0..100 are up in the first condition, 100..200 in the second,
    // 200..300 carry background only.
    let first = |bin: usize| match bin / 100 {
        0 => 30,
        1 => 6,
        _ => 1,
    };
    let second = |bin: usize| match bin / 100 {
        0 => 6,
        1 => 30,
        _ => 1,
    };
    let mut ip = Vec::new();
    let mut inputs = Vec::new();
    for condition in Condition::BOTH {
        for replicate in 0..2 {
            let id = SampleId::new(condition, replicate);
            let ip_path = dir.path().join(format!("{}.bed", id));
            let input_path = dir.path().join(format!("input-{}.bed", id));
            match condition {
                Condition::First => write_file(&ip_path, &bed_reads(n_bins, first)),
                Condition::Second => write_file(&ip_path, &bed_reads(n_bins, second)),
            }
            write_file(&input_path, &bed_reads(n_bins, |_| 1));
            ip.push((id, BedReads::from_path(&ip_path, ReadFilter::default()).unwrap()));
            inputs.push((id, BedReads::from_path(&input_path, ReadFilter::default()).unwrap()));
        }
    }

    let sizes = read_chrom_sizes_file(dir.path().join("genome.sizes")).unwrap();
    let config = DiffPeakConfig::default()
        .with_name("exp".to_string())
        .with_binning(BinningConfig::default().with_stepsize(100))
        .with_verbosity(Verbosity::Debug)
        .with_save_tracks(true)
        .with_save_input(true);
    let layout = BinLayout::new(sizes, config.binning.binsize, config.binning.stepsize).unwrap();
    assert_eq!(layout.n_bins(), n_bins);
    let gc = GcCorrector::for_layout(
        read_gc_content(dir.path().join("genome.fa"), &layout).unwrap(),
        &layout,
    )
    .unwrap();

    let input = PipelineInput::from_sources(&config, &layout, &ip, Some(&inputs)).unwrap();
    assert_eq!(input.windows.as_ref().map(Vec::len), Some(4));

    let mut rng = ChaCha8Rng::seed_from_u64(12);
    let (set, training) =
        diffpeak::pipeline::run(config, layout, input, Some(&gc), Some(dir.path()), &mut rng)
            .unwrap();

    for factor in set.input_factors().unwrap() {
        assert_approx_eq!(*factor, 3.5);
    }
    assert_eq!(set.len(), 200);
    assert_eq!(training.examples(Label::FirstUp).len(), 100);
    assert_eq!(training.examples(Label::SecondUp).len(), 100);
    assert!(training.examples(Label::Neutral).is_empty());
    assert_eq!(training.indices(), (0..202).collect::<Vec<_>>().as_slice());

    for suffix in [
        "trainingset.bed",
        "s0",
        "s1",
        "s2",
        "overall-cov-0",
        "overall-cov-1",
        "gc-content.tsv",
        "s1-rep0.bedGraph",
        "input-s2-rep1.bedGraph",
    ] {
        let path = dir.path().join(format!("exp-{}", suffix));
        assert!(path.exists(), "{} was not written", path.display());
    }
    let bed = fs::read_to_string(dir.path().join("exp-trainingset.bed")).unwrap();
    assert_eq!(bed.lines().count(), 202);
    assert_eq!(bed.lines().next(), Some("chr1\t0\t100"));
}
