//! Run configuration.
//!
//! Every component receives the part of [`DiffPeakConfig`] it needs
//! (including [`Verbosity`]) as an explicit argument; nothing is read from
//! process-wide state. All structs deserialize from partial JSON, missing
//! fields fall back to their defaults.

use serde::{
    Deserialize,
    Serialize,
};

use crate::data_structs::typedef::{
    CovType,
    PosType,
};
use crate::errors::{
    DiffPeakError,
    DiffPeakResult,
};
use crate::with_field_fn;

/// How much diagnostic output a run produces.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Verbosity {
    #[default]
    Quiet,
    /// Stage progress and scaling factors.
    Verbose,
    /// Additionally writes intermediate files (training set BED, value
    /// lists, overall coverage dumps).
    Debug,
}

impl Verbosity {
    pub fn is_verbose(&self) -> bool {
        *self >= Verbosity::Verbose
    }

    pub fn is_debug(&self) -> bool {
        *self == Verbosity::Debug
    }

    pub fn from_flags(
        verbose: bool,
        debug: bool,
    ) -> Self {
        match (verbose, debug) {
            (_, true) => Verbosity::Debug,
            (true, false) => Verbosity::Verbose,
            (false, false) => Verbosity::Quiet,
        }
    }
}

/// Whether a deficient biased class may be filled with the coordinate-swapped
/// examples of the opposite class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MirrorPolicy {
    #[default]
    Disabled,
    /// Assumes both conditions behave symmetrically. Mirrored classes share
    /// bin indices with the class they were copied from.
    Enabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinningConfig {
    pub binsize:        PosType,
    pub stepsize:       PosType,
    /// Reads are extended to this length in their strand direction.
    /// Zero keeps the original read length.
    pub extension_size: PosType,
    /// Drop reads with identical coordinates and strand.
    pub rmdup:          bool,
}

impl BinningConfig {
    with_field_fn!(binsize, PosType);
    with_field_fn!(stepsize, PosType);
    with_field_fn!(extension_size, PosType);
    with_field_fn!(rmdup, bool);
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            binsize:        100,
            stepsize:       50,
            extension_size: 0,
            rmdup:          true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TmmConfig {
    pub enabled:     bool,
    /// Central band of M-values kept: `100 - m_threshold ..= m_threshold`.
    pub m_threshold: f64,
    /// Central band of A-values kept: `100 - a_threshold ..= a_threshold`.
    pub a_threshold: f64,
    /// Maximum number of bins subsampled per replicate.
    pub sample_size: usize,
}

impl TmmConfig {
    with_field_fn!(enabled, bool);
    with_field_fn!(m_threshold, f64);
    with_field_fn!(a_threshold, f64);
    with_field_fn!(sample_size, usize);
}

impl Default for TmmConfig {
    fn default() -> Self {
        Self {
            enabled:     true,
            m_threshold: 80.0,
            a_threshold: 95.0,
            sample_size: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Skip GC-content correction.
    pub no_gc_content:      bool,
    /// Input scaling factors, one per sample (first condition replicates,
    /// then second). `None` estimates them from the data.
    pub factors_inputs:     Option<Vec<CovType>>,
    /// Window width in bases for input factor estimation.
    pub input_window:       PosType,
    /// IP scaling factors, one per sample. Replace TMM when given.
    pub scaling_factors_ip: Option<Vec<CovType>>,
    pub tmm:                TmmConfig,
}

impl NormalizationConfig {
    with_field_fn!(no_gc_content, bool);
    with_field_fn!(factors_inputs, Option<Vec<CovType>>);
    with_field_fn!(input_window, PosType);
    with_field_fn!(scaling_factors_ip, Option<Vec<CovType>>);
    with_field_fn!(tmm, TmmConfig);
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            no_gc_content:      false,
            factors_inputs:     None,
            input_window:       1000,
            scaling_factors_ip: None,
            tmm:                TmmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Bins need a score strictly above this value.
    pub score_threshold: f64,
    /// Bins need mean coverage of both conditions summed strictly above
    /// this value.
    pub coverage_floor:  CovType,
}

impl ScoringConfig {
    with_field_fn!(score_threshold, f64);
    with_field_fn!(coverage_floor, CovType);
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.0,
            coverage_floor:  10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Initial fold-change threshold.
    pub foldchange:      f64,
    /// Percentile of positive mean-coverage differences used as the initial
    /// absolute difference threshold.
    pub min_t:           f64,
    /// Target number of examples per class.
    pub y:               usize,
    /// Bins added on both sides of every selected bin.
    pub ex:              usize,
    /// Biased classes below this size trigger threshold relaxation.
    pub min_class_size:  usize,
    /// Early-stop check interval, in visited bins.
    pub check_interval:  usize,
    pub diff_cov_step:   i64,
    pub threshold_step:  f64,
    pub diff_cov_floor:  i64,
    pub threshold_floor: f64,
    /// Hard cap on collection passes.
    pub max_passes:      usize,
    /// Resampling attempts before a class is declared degenerate.
    pub max_resamples:   usize,
    pub mirror:          MirrorPolicy,
    /// Drop examples outside the 2.5-97.5 percentile band per class.
    pub trim_outliers:   bool,
}

impl TrainingConfig {
    with_field_fn!(foldchange, f64);
    with_field_fn!(min_t, f64);
    with_field_fn!(y, usize);
    with_field_fn!(ex, usize);
    with_field_fn!(min_class_size, usize);
    with_field_fn!(check_interval, usize);
    with_field_fn!(max_passes, usize);
    with_field_fn!(max_resamples, usize);
    with_field_fn!(mirror, MirrorPolicy);
    with_field_fn!(trim_outliers, bool);
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            foldchange:      1.6,
            min_t:           95.0,
            y:               1000,
            ex:              2,
            min_class_size:  100,
            check_interval:  500,
            diff_cov_step:   15,
            threshold_step:  0.1,
            diff_cov_floor:  1,
            threshold_floor: 1.1,
            max_passes:      1000,
            max_resamples:   100,
            mirror:          MirrorPolicy::Disabled,
            trim_outliers:   true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffPeakConfig {
    /// Experiment name, used as output file prefix.
    pub name:          String,
    pub binning:       BinningConfig,
    pub normalization: NormalizationConfig,
    pub scoring:       ScoringConfig,
    pub training:      TrainingConfig,
    pub verbosity:     Verbosity,
    /// Seed of the random source. `None` draws one from entropy.
    pub seed:          Option<u64>,
    /// Export coverage tracks of the input samples.
    pub save_input:    bool,
    /// Export coverage tracks of the normalized IP samples.
    pub save_tracks:   bool,
}

impl DiffPeakConfig {
    with_field_fn!(name, String);
    with_field_fn!(binning, BinningConfig);
    with_field_fn!(normalization, NormalizationConfig);
    with_field_fn!(scoring, ScoringConfig);
    with_field_fn!(training, TrainingConfig);
    with_field_fn!(verbosity, Verbosity);
    with_field_fn!(seed, Option<u64>);
    with_field_fn!(save_input, bool);
    with_field_fn!(save_tracks, bool);

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges which would otherwise surface as obscure numeric
    /// failures deep inside the pipeline.
    pub fn validate(&self) -> DiffPeakResult<()> {
        let invalid = |msg: String| Err(DiffPeakError::InvalidConfig(msg));
        let tmm = &self.normalization.tmm;
        let training = &self.training;

        if self.binning.binsize == 0 || self.binning.stepsize == 0 {
            return invalid("binsize and stepsize must be positive".into());
        }
        if self.normalization.input_window == 0 {
            return invalid("input_window must be positive".into());
        }
        for (name, value) in [("m_threshold", tmm.m_threshold), ("a_threshold", tmm.a_threshold)] {
            if !(50.0..=100.0).contains(&value) {
                return invalid(format!("{} must be within [50, 100], got {}", name, value));
            }
        }
        if !(0.0..=100.0).contains(&training.min_t) {
            return invalid(format!("min_t must be within [0, 100], got {}", training.min_t));
        }
        if training.foldchange <= 1.0 {
            return invalid(format!("foldchange must exceed 1, got {}", training.foldchange));
        }
        if training.check_interval == 0 || training.max_passes == 0 {
            return invalid("check_interval and max_passes must be positive".into());
        }
        if training.diff_cov_step <= 0 || training.threshold_step <= 0.0 {
            return invalid("relaxation steps must be positive".into());
        }
        for (name, factors) in [
            ("factors_inputs", &self.normalization.factors_inputs),
            ("scaling_factors_ip", &self.normalization.scaling_factors_ip),
        ] {
            let factors = factors.as_deref().unwrap_or_default();
            if let Some(bad) = factors.iter().find(|f| !f.is_finite() || **f <= 0.0) {
                return invalid(format!("{} must be finite and positive, got {}", name, bad));
            }
        }
        Ok(())
    }
}

impl Default for DiffPeakConfig {
    fn default() -> Self {
        Self {
            name:          "diffpeak".to_string(),
            binning:       BinningConfig::default(),
            normalization: NormalizationConfig::default(),
            scoring:       ScoringConfig::default(),
            training:      TrainingConfig::default(),
            verbosity:     Verbosity::default(),
            seed:          None,
            save_input:    false,
            save_tracks:   false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(DiffPeakConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = DiffPeakConfig::from_json(
            r#"{"name": "exp", "training": {"y": 250}, "verbosity": "Debug"}"#,
        )
        .unwrap();
        assert_eq!(config.name, "exp");
        assert_eq!(config.training.y, 250);
        assert_eq!(config.training.ex, 2);
        assert_eq!(config.normalization.tmm.m_threshold, 80.0);
        assert!(config.verbosity.is_debug());
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        let config = DiffPeakConfig::default().with_normalization(
            NormalizationConfig::default()
                .with_tmm(TmmConfig::default().with_m_threshold(20.0)),
        );
        assert!(config.validate().is_err());

        let config = DiffPeakConfig::default()
            .with_training(TrainingConfig::default().with_foldchange(0.5));
        assert!(config.validate().is_err());

        let config = DiffPeakConfig::default().with_normalization(
            NormalizationConfig::default().with_scaling_factors_ip(Some(vec![-1.0, 1.0])),
        );
        assert!(config.validate().is_err());

        let config = DiffPeakConfig::default().with_normalization(
            NormalizationConfig::default().with_factors_inputs(Some(vec![2.0, f64::NAN])),
        );
        assert!(config.validate().is_err());

        let config = DiffPeakConfig::default().with_normalization(
            NormalizationConfig::default().with_scaling_factors_ip(Some(vec![0.5, 2.0])),
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn verbosity_flags() {
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(true, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert!(Verbosity::Debug.is_verbose());
        assert!(!Verbosity::Verbose.is_debug());
    }
}
