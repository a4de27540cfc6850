//! Genomic coordinates and the binning of a genome into fixed-width,
//! fixed-stride windows.
//!
//! - [`Contig`]: a genomic region defined by a sequence name, start, end and
//!   strand.
//! - [`BinLayout`]: chromosome size table plus `binsize`/`stepsize`, mapping
//!   genome-wide bin indices to coordinates and back.

mod bins;
mod contig;

pub use bins::{
    BinLayout,
    ChromBins,
};
pub use contig::Contig;
