//! Core data structures of the `diffpeak` crate.
//!
//! - [`coords`]: genomic regions ([`Contig`]) and the genome binning
//!   ([`BinLayout`]) that maps bin indices to coordinates.
//! - [`region_set`]: sorted region collections with intersection, merging,
//!   BED I/O and an overlap index used for masking.
//! - [`coverage`]: per-replicate coverage ([`SampleCoverage`]) addressed by
//!   typed [`SampleId`]s, and the two-condition [`CoverageMatrix`].
//! - Enumerations for [`Condition`], training [`Label`]s and [`Strand`].
//! - [`typedef`]: type aliases for positions, counts, coverages and bin
//!   indices.

pub mod coords;
pub mod coverage;
mod enums;
pub mod region_set;
pub mod typedef;

pub use coords::{
    BinLayout,
    Contig,
};
pub use coverage::{
    CoverageMatrix,
    SampleCoverage,
    SampleId,
};
pub use enums::{
    Condition,
    Label,
    Strand,
};
pub use region_set::{
    RegionIndex,
    RegionSet,
};
