use std::fs::File;
use std::io::{
    BufReader,
    Read,
};
use std::path::{
    Path,
    PathBuf,
};

use anyhow::Context;
use hashbrown::HashSet;
use log::*;

use crate::data_structs::typedef::{
    CountType,
    PosType,
};
use crate::data_structs::{
    BinLayout,
    Contig,
    RegionIndex,
    RegionSet,
    SampleCoverage,
    SampleId,
    Strand,
};

/// Producer of per-bin read counts of one sample.
pub trait CoverageSource {
    /// Human readable origin of the reads, used in logs.
    fn name(&self) -> &str;

    /// Counts reads into the bins of `layout`.
    fn coverage(
        &self,
        id: SampleId,
        layout: &BinLayout,
    ) -> anyhow::Result<SampleCoverage>;
}

/// Options applied to reads before they are counted.
#[derive(Debug, Clone, Default)]
pub struct ReadFilter {
    /// Reads are extended to this length in their strand direction. Shorter
    /// values than the read length are ignored.
    pub extension_size: PosType,
    /// Keep only one of reads with identical coordinates and strand.
    pub rmdup:          bool,
    /// Reads overlapping any of these regions are dropped.
    pub mask:           Option<RegionIndex>,
}

/// Aligned reads loaded from a BED file.
#[derive(Debug, Clone)]
pub struct BedReads {
    name:   String,
    reads:  Vec<Contig>,
    filter: ReadFilter,
}

impl BedReads {
    pub fn from_reader<R: Read>(
        name: &str,
        handle: R,
        filter: ReadFilter,
    ) -> anyhow::Result<Self> {
        let reads = RegionSet::read_bed(name, handle)?;
        Ok(Self {
            name: name.to_string(),
            reads: reads.regions().to_vec(),
            filter,
        })
    }

    pub fn from_path<P: AsRef<Path>>(
        path: P,
        filter: ReadFilter,
    ) -> anyhow::Result<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .with_context(|| format!("Failed to open reads {}", path.display()))?;
        Self::from_reader(&path.to_string_lossy(), BufReader::new(file), filter)
    }

    pub fn n_reads(&self) -> usize {
        self.reads.len()
    }

    /// Read extended towards its 3' end to the configured fragment length.
    fn extend(
        &self,
        read: &Contig,
    ) -> Contig {
        let mut extended = read.clone();
        let ext = self.filter.extension_size;
        if ext > read.length() {
            let missing = ext - read.length();
            match read.strand() {
                Strand::Forward => extended.extend(0, missing),
                Strand::Reverse => extended.extend(missing, 0),
                Strand::None => {},
            }
        }
        extended
    }

    /// Reads left after duplicate removal and masking, extended.
    fn filtered_reads(&self) -> Vec<Contig> {
        let mut seen = HashSet::new();
        let mut n_duplicates = 0usize;
        let mut n_masked = 0usize;

        let reads = self
            .reads
            .iter()
            .filter(|read| {
                if self.filter.rmdup
                    && !seen.insert((read.seqname().clone(), read.start(), read.end(), read.strand()))
                {
                    n_duplicates += 1;
                    return false;
                }
                if let Some(mask) = &self.filter.mask {
                    if mask.overlaps(read.seqname(), read.start(), read.end()) {
                        n_masked += 1;
                        return false;
                    }
                }
                true
            })
            .map(|read| self.extend(read))
            .collect::<Vec<_>>();
        debug!(
            "{}: {} reads kept, {} duplicates, {} masked",
            self.name,
            reads.len(),
            n_duplicates,
            n_masked
        );
        reads
    }
}

impl CoverageSource for BedReads {
    fn name(&self) -> &str {
        &self.name
    }

    fn coverage(
        &self,
        id: SampleId,
        layout: &BinLayout,
    ) -> anyhow::Result<SampleCoverage> {
        let mut counts: Vec<CountType> = vec![0; layout.n_bins()];
        for read in self.filtered_reads() {
            let Some(chrom) = layout.chrom(read.seqname()) else {
                continue;
            };
            for local in layout.overlapping_bins(chrom, read.start(), read.end()) {
                counts[chrom.offset + local] += 1;
            }
        }
        Ok(SampleCoverage::from_counts(id, &counts))
    }
}
