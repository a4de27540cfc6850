//! Readers and writers around the normalization pipeline.
//!
//! - [`bed_reads`]: the [`CoverageSource`] abstraction and its BED-file
//!   implementation counting reads into bins (read extension, duplicate
//!   removal, masking).
//! - [`chrom_sizes`]: chromosome size tables, from a sizes file or a FASTA
//!   genome.
//! - [`fasta_gc`]: GC content of every bin from a FASTA genome.
//! - [`report`]: coverage tracks (bedGraph), GC histograms and the debug
//!   outputs of the training set.
pub mod bed_reads;
pub mod chrom_sizes;
pub mod fasta_gc;
pub mod report;

pub use bed_reads::{
    BedReads,
    CoverageSource,
    ReadFilter,
};
pub use chrom_sizes::{
    chrom_sizes_from_fasta,
    read_chrom_sizes,
    read_chrom_sizes_file,
};
pub use fasta_gc::{
    gc_content_from_fasta,
    read_gc_content,
};
pub use report::ReportWriter;
