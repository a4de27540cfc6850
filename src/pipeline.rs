//! Multi-replicate coverage set: normalization and region selection.
//!
//! [`DiffCoverageSet::new`] runs the normalization stages in a fixed order:
//!
//! 1. no-signal check on the raw IP coverage,
//! 2. GC-content correction of IP and input samples,
//! 3. input subtraction (inputs are dropped afterwards),
//! 4. assembly of the two condition matrices,
//! 5. IP scaling with user factors or TMM.
//!
//! Region-of-interest scoring and training set construction follow on the
//! normalized matrices.

use std::path::Path;

use itertools::Itertools;
use log::*;
use ndarray::{
    Array1,
    Array2,
};
use rand::rngs::StdRng;
use rand::{
    Rng,
    SeedableRng,
};

use crate::config::DiffPeakConfig;
use crate::data_structs::typedef::{
    BinIndex,
    CountType,
    CovType,
};
use crate::data_structs::{
    BinLayout,
    Contig,
    CoverageMatrix,
    Label,
    SampleCoverage,
    SampleId,
};
use crate::errors::{
    DiffPeakError,
    DiffPeakResult,
};
use crate::io::{
    CoverageSource,
    ReportWriter,
};
use crate::tools::gc::GcCorrector;
use crate::tools::input::{
    subtract_inputs,
    InputFactors,
    SesEstimator,
    WindowCounts,
};
use crate::tools::scoring::putative_regions;
use crate::tools::tmm::tmm_factors;
use crate::tools::training::{
    build_training_set,
    TrainingSet,
};
use crate::utils::n_threads;

/// Random source of a run: seeded when a seed is configured.
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Coverage entering the pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineInput {
    /// One entry per IP replicate of both conditions.
    pub ip:      Vec<SampleCoverage>,
    /// Input samples paired with the IP samples by id.
    pub inputs:  Option<Vec<SampleCoverage>>,
    /// Window counts for input factor estimation.
    pub windows: Option<Vec<WindowCounts>>,
}

impl PipelineInput {
    /// Extracts coverage of every source. Window counts are only produced
    /// when input factors have to be estimated.
    pub fn from_sources<S: CoverageSource>(
        config: &DiffPeakConfig,
        layout: &BinLayout,
        ip: &[(SampleId, S)],
        inputs: Option<&[(SampleId, S)]>,
    ) -> anyhow::Result<Self> {
        let load = |sources: &[(SampleId, S)], layout: &BinLayout| {
            sources
                .iter()
                .map(|(id, source)| {
                    if config.verbosity.is_verbose() {
                        info!("Counting reads of {} from {}", id, source.name());
                    }
                    source.coverage(*id, layout)
                })
                .collect::<anyhow::Result<Vec<_>>>()
        };

        let ip_coverage = load(ip, layout)?;
        let (input_coverage, windows) = match inputs {
            Some(inputs) => {
                let windows = if config.normalization.factors_inputs.is_none() {
                    let window = config.normalization.input_window;
                    let window_layout = BinLayout::new(
                        layout
                            .chroms()
                            .iter()
                            .map(|c| (c.name.clone(), c.length))
                            .collect(),
                        window,
                        window,
                    )?;
                    let ip_windows = load(ip, &window_layout)?;
                    let input_windows = load(inputs, &window_layout)?;
                    Some(
                        ip_windows
                            .into_iter()
                            .zip(input_windows)
                            .map(|(ip, input)| WindowCounts { ip, input })
                            .collect(),
                    )
                }
                else {
                    None
                };
                (Some(load(inputs, layout)?), windows)
            },
            None => (None, None),
        };

        Ok(Self {
            ip: ip_coverage,
            inputs: input_coverage,
            windows,
        })
    }
}

/// Normalized coverage of both conditions and the regions selected from
/// it.
#[derive(Debug, Clone)]
pub struct DiffCoverageSet {
    config:              DiffPeakConfig,
    layout:              BinLayout,
    matrix:              CoverageMatrix,
    input_factors:       Option<Vec<CovType>>,
    scaling_factors_ip:  Vec<CovType>,
    saved_inputs:        Option<Vec<SampleCoverage>>,
    scores:              Option<Array1<CovType>>,
    regions_of_interest: Vec<BinIndex>,
}

impl DiffCoverageSet {
    /// Normalizes the given coverage.
    ///
    /// # Arguments
    ///
    /// * `gc` - GC corrector of the genome. GC correction is skipped when it
    ///   is missing, when `no_gc_content` is set or without input samples.
    /// * `rng` - random source of the TMM subsampling.
    ///
    /// # Errors
    ///
    /// [`DiffPeakError::NoSignal`] when the IP samples hold no reads, and
    /// shape or configuration errors.
    pub fn new<R: Rng>(
        config: DiffPeakConfig,
        layout: BinLayout,
        input: PipelineInput,
        gc: Option<&GcCorrector>,
        rng: &mut R,
    ) -> DiffPeakResult<Self> {
        config.validate()?;
        let verbosity = config.verbosity;
        if verbosity.is_debug() {
            debug!("Using {} worker threads", n_threads());
        }
        let PipelineInput {
            mut ip,
            inputs,
            windows,
        } = input;

        if let Some(bad) = ip.iter().find(|s| s.n_bins() != layout.n_bins()) {
            return Err(DiffPeakError::ShapeMismatch(format!(
                "sample {} has {} bins, layout has {}",
                bad.id(),
                bad.n_bins(),
                layout.n_bins()
            )));
        }
        let total = count_positive_signal(&ip);
        if total < 1.0 {
            return Err(DiffPeakError::NoSignal { total });
        }

        let mut saved_inputs = None;
        let input_factors = match inputs {
            Some(mut inputs) => {
                match gc {
                    Some(corrector) if !config.normalization.no_gc_content => {
                        corrector.correct(&mut ip, &mut inputs, verbosity)?;
                    },
                    Some(_) => {},
                    None if !config.normalization.no_gc_content => {
                        debug!("No genome GC content given, skipping GC correction");
                    },
                    None => {},
                }
                if config.save_input {
                    saved_inputs = Some(inputs.clone());
                }
                Some(subtract_inputs(
                    &mut ip,
                    inputs,
                    &InputFactors::from(config.normalization.factors_inputs.clone()),
                    windows.as_deref(),
                    &SesEstimator,
                    verbosity,
                )?)
            },
            None => None,
        };
        // Window counts are only needed to estimate the input factors.
        drop(windows);

        let mut matrix = CoverageMatrix::from_samples(ip)?;
        if verbosity.is_verbose() {
            info!("Normalize ChIP-seq profiles");
        }
        let scaling_factors_ip = match &config.normalization.scaling_factors_ip {
            Some(factors) => {
                if factors.len() != matrix.n_samples() {
                    return Err(DiffPeakError::InvalidConfig(format!(
                        "{} IP scaling factors given for {} samples",
                        factors.len(),
                        matrix.n_samples()
                    )));
                }
                factors.clone()
            },
            None if config.normalization.tmm.enabled => {
                if verbosity.is_verbose() {
                    info!("Use global TMM approach");
                }
                tmm_factors(&matrix, &config.normalization.tmm, rng, verbosity)
            },
            None => vec![1.0; matrix.n_samples()],
        };
        matrix.scale_samples(&scaling_factors_ip)?;
        if verbosity.is_debug() {
            for (id, factor) in matrix.sample_ids().iter().zip(&scaling_factors_ip) {
                debug!("Use scaling factor {:.4} for {}", factor, id);
            }
        }

        Ok(Self {
            config,
            layout,
            matrix,
            input_factors,
            scaling_factors_ip,
            saved_inputs,
            scores: None,
            regions_of_interest: Vec::new(),
        })
    }

    /// Scores all bins and stores the putative regions of interest.
    pub fn compute_putative_region_index(&mut self) -> DiffPeakResult<&[BinIndex]> {
        let (scores, regions) =
            putative_regions(&self.matrix, &self.config.scoring, self.config.verbosity)?;
        self.scores = Some(scores);
        self.regions_of_interest = regions;
        Ok(&self.regions_of_interest)
    }

    /// Builds the classifier training set from the regions of interest.
    pub fn training_set<R: Rng>(
        &self,
        rng: &mut R,
    ) -> DiffPeakResult<TrainingSet> {
        build_training_set(
            &self.matrix,
            &self.regions_of_interest,
            &self.config.training,
            rng,
            self.config.verbosity,
        )
    }

    pub fn config(&self) -> &DiffPeakConfig {
        &self.config
    }

    pub fn layout(&self) -> &BinLayout {
        &self.layout
    }

    /// Normalized coverage of both conditions.
    pub fn matrix(&self) -> &CoverageMatrix {
        &self.matrix
    }

    /// Factors the inputs were scaled with, `None` without inputs.
    pub fn input_factors(&self) -> Option<&[CovType]> {
        self.input_factors.as_deref()
    }

    pub fn scaling_factors_ip(&self) -> &[CovType] {
        &self.scaling_factors_ip
    }

    pub fn scores(&self) -> Option<&Array1<CovType>> {
        self.scores.as_ref()
    }

    pub fn regions_of_interest(&self) -> &[BinIndex] {
        &self.regions_of_interest
    }

    /// Number of regions of interest.
    pub fn len(&self) -> usize {
        self.regions_of_interest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions_of_interest.is_empty()
    }

    pub fn n_bins(&self) -> usize {
        self.matrix.n_bins()
    }

    /// Truncated mean coverages of the `i`-th region of interest.
    pub fn covs(
        &self,
        i: usize,
    ) -> Option<(CountType, CountType)> {
        self.regions_of_interest
            .get(i)
            .map(|&bin| self.matrix.rounded_means(bin))
    }

    /// Classifier observations, bins x samples. `None` selects every bin.
    pub fn observations(
        &self,
        bins: Option<&[BinIndex]>,
    ) -> DiffPeakResult<Array2<CovType>> {
        self.matrix.observations(bins)
    }

    pub fn max_colsum(&self) -> CovType {
        self.matrix.max_colsum()
    }

    pub fn index_to_contig(
        &self,
        index: BinIndex,
    ) -> Option<Contig> {
        self.layout.index_to_contig(index)
    }

    /// Writes the debug outputs: training set regions and values, and the
    /// overall coverage matrices.
    pub fn export_debug(
        &self,
        report: &ReportWriter,
        training: &TrainingSet,
    ) -> anyhow::Result<()> {
        report.training_set(&self.layout, training)?;
        report.overall_coverage(&self.matrix)?;
        Ok(())
    }

    /// Writes the coverage tracks enabled in the configuration. Saved
    /// inputs are released afterwards.
    pub fn export_tracks(
        &mut self,
        report: &ReportWriter,
    ) -> anyhow::Result<()> {
        if self.config.save_tracks {
            for id in self.matrix.sample_ids() {
                if let Some(values) = self.matrix.sample(id) {
                    report.track(&self.layout, id, false, values)?;
                }
            }
        }
        if let Some(inputs) = self.saved_inputs.take() {
            for input in inputs {
                report.track(&self.layout, input.id(), true, input.values())?;
            }
        }
        Ok(())
    }
}

/// Sum of all IP coverage.
pub fn count_positive_signal(ip: &[SampleCoverage]) -> CovType {
    ip.iter().map(SampleCoverage::total).sum()
}

/// Runs the whole pipeline and returns the coverage set together with its
/// training set. Debug outputs are written to `out_dir` when the
/// configuration asks for them.
pub fn run<R: Rng>(
    config: DiffPeakConfig,
    layout: BinLayout,
    input: PipelineInput,
    gc: Option<&GcCorrector>,
    out_dir: Option<&Path>,
    rng: &mut R,
) -> anyhow::Result<(DiffCoverageSet, TrainingSet)> {
    let report = out_dir.map(|dir| ReportWriter::new(dir, &config.name));
    let mut set = DiffCoverageSet::new(config, layout, input, gc, rng)?;

    if let (Some(report), Some(corrector)) = (&report, gc) {
        if let Some(profile) = corrector.profile() {
            if set.config().verbosity.is_verbose() {
                report.gc_histogram(profile)?;
            }
        }
    }
    if let Some(report) = &report {
        set.export_tracks(report)?;
    }

    let n_regions = set.compute_putative_region_index()?.len();
    info!("Found {} putative regions of interest", n_regions);
    let training = set.training_set(rng)?;
    info!(
        "Training set of {} bins ({})",
        training.len(),
        Label::ALL
            .iter()
            .map(|l| format!("{}: {}", l, training.examples(*l).len()))
            .join(", ")
    );

    if let Some(report) = &report {
        if set.config().verbosity.is_debug() {
            set.export_debug(report, &training)?;
        }
    }
    Ok((set, training))
}
