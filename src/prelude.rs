//! Commonly used types of the crate.

pub use crate::config::{
    BinningConfig,
    DiffPeakConfig,
    MirrorPolicy,
    NormalizationConfig,
    ScoringConfig,
    TmmConfig,
    TrainingConfig,
    Verbosity,
};
pub use crate::data_structs::typedef::*;
pub use crate::data_structs::{
    BinLayout,
    Condition,
    Contig,
    CoverageMatrix,
    Label,
    RegionIndex,
    RegionSet,
    SampleCoverage,
    SampleId,
    Strand,
};
pub use crate::errors::{
    DiffPeakError,
    DiffPeakResult,
};
pub use crate::io::{
    BedReads,
    CoverageSource,
    ReadFilter,
    ReportWriter,
};
pub use crate::pipeline::{
    make_rng,
    run,
    DiffCoverageSet,
    PipelineInput,
};
pub use crate::tools::gc::{
    GcContent,
    GcCorrector,
    GcProfile,
};
pub use crate::tools::input::{
    InputFactorEstimator,
    InputFactors,
    SesEstimator,
    WindowCounts,
};
pub use crate::tools::training::{
    TrainingExample,
    TrainingParams,
    TrainingSet,
};
