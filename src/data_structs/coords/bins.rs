use serde::{
    Deserialize,
    Serialize,
};

use super::Contig;
use crate::data_structs::enums::Strand;
use crate::data_structs::typedef::{
    BinIndex,
    PosType,
};
use crate::errors::{
    DiffPeakError,
    DiffPeakResult,
};

/// Bins of a single chromosome inside a [`BinLayout`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromBins {
    pub name:   String,
    pub length: PosType,
    /// Genome-wide index of the first bin of this chromosome.
    pub offset: BinIndex,
    pub n_bins: usize,
}

/// Genome split into windows of `binsize` placed every `stepsize` bases.
///
/// Bins of all chromosomes are concatenated in chromosome-table order, which
/// is the column order of every coverage matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinLayout {
    binsize:  PosType,
    stepsize: PosType,
    chroms:   Vec<ChromBins>,
}

impl BinLayout {
    pub fn new(
        chrom_sizes: Vec<(String, PosType)>,
        binsize: PosType,
        stepsize: PosType,
    ) -> DiffPeakResult<Self> {
        if binsize == 0 || stepsize == 0 {
            return Err(DiffPeakError::InvalidConfig(format!(
                "binsize ({}) and stepsize ({}) must be positive",
                binsize, stepsize
            )));
        }
        let mut offset = 0;
        let chroms = chrom_sizes
            .into_iter()
            .map(|(name, length)| {
                let n_bins = length.div_ceil(stepsize) as usize;
                let chrom = ChromBins {
                    name,
                    length,
                    offset,
                    n_bins,
                };
                offset += n_bins;
                chrom
            })
            .collect();
        Ok(Self {
            binsize,
            stepsize,
            chroms,
        })
    }

    pub fn binsize(&self) -> PosType {
        self.binsize
    }

    pub fn stepsize(&self) -> PosType {
        self.stepsize
    }

    pub fn chroms(&self) -> &[ChromBins] {
        &self.chroms
    }

    pub fn chrom(
        &self,
        name: &str,
    ) -> Option<&ChromBins> {
        self.chroms.iter().find(|c| c.name == name)
    }

    /// Total number of bins over all chromosomes.
    pub fn n_bins(&self) -> usize {
        self.chroms
            .last()
            .map(|c| c.offset + c.n_bins)
            .unwrap_or(0)
    }

    /// Read-counting window `[start, end)` of a bin local to `chrom`.
    pub fn window(
        &self,
        chrom: &ChromBins,
        local: usize,
    ) -> (PosType, PosType) {
        let start = local as PosType * self.stepsize;
        (start, (start + self.binsize).min(chrom.length))
    }

    /// Range of local bin indices whose windows overlap `[start, end)`.
    pub fn overlapping_bins(
        &self,
        chrom: &ChromBins,
        start: PosType,
        end: PosType,
    ) -> std::ops::Range<usize> {
        if end <= start || chrom.n_bins == 0 {
            return 0..0;
        }
        // Window b covers [b*step, b*step + binsize).
        let first = if start + 1 > self.binsize {
            (start + 1 - self.binsize).div_ceil(self.stepsize)
        }
        else {
            0
        };
        let last = ((end - 1) / self.stepsize).min(chrom.n_bins as PosType - 1);
        if first > last {
            0..0
        }
        else {
            first as usize..last as usize + 1
        }
    }

    /// Genomic coordinates of a genome-wide bin index.
    ///
    /// The reported region spans one step, truncated at the chromosome end.
    pub fn index_to_contig(
        &self,
        index: BinIndex,
    ) -> Option<Contig> {
        let pos = self
            .chroms
            .partition_point(|c| c.offset + c.n_bins <= index);
        let chrom = self.chroms.get(pos)?;
        if index < chrom.offset {
            return None;
        }
        let start = (index - chrom.offset) as PosType * self.stepsize;
        let end = (start + self.stepsize).min(chrom.length);
        Some(Contig::new(chrom.name.clone(), start, end, Strand::None))
    }
}
