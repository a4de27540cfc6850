use std::fs::File;
use std::io::{
    BufReader,
    Read,
};
use std::path::Path;

use anyhow::Context;
use bio::io::fasta;
use hashbrown::HashMap;
use log::*;

use crate::data_structs::BinLayout;
use crate::tools::gc::GcContent;

/// Running G+C and A+T base counts along a sequence; entry `i` covers
/// bases `[0, i)`.
struct BaseCounts {
    gc: Vec<u32>,
    at: Vec<u32>,
}

impl BaseCounts {
    fn new(seq: &[u8]) -> Self {
        let mut gc = Vec::with_capacity(seq.len() + 1);
        let mut at = Vec::with_capacity(seq.len() + 1);
        gc.push(0);
        at.push(0);
        for base in seq {
            let (g, a) = match base.to_ascii_uppercase() {
                b'G' | b'C' => (1, 0),
                b'A' | b'T' => (0, 1),
                _ => (0, 0),
            };
            gc.push(gc[gc.len() - 1] + g);
            at.push(at[at.len() - 1] + a);
        }
        Self { gc, at }
    }

    fn fraction(
        &self,
        start: usize,
        end: usize,
    ) -> Option<f64> {
        let end = end.min(self.gc.len() - 1);
        if start >= end {
            return None;
        }
        let gc = self.gc[end] - self.gc[start];
        let at = self.at[end] - self.at[start];
        (gc + at > 0).then(|| gc as f64 / (gc + at) as f64)
    }
}

/// GC fraction of every bin of `layout`, computed over the bin's read
/// counting window. Chromosomes missing from the FASTA get no GC values.
pub fn gc_content_from_fasta<R: Read>(
    handle: R,
    layout: &BinLayout,
) -> anyhow::Result<GcContent> {
    let mut fractions = vec![None; layout.n_bins()];
    let wanted = layout
        .chroms()
        .iter()
        .map(|c| (c.name.as_str(), c))
        .collect::<HashMap<_, _>>();

    for record in fasta::Reader::new(handle).records() {
        let record = record.context("Failed to read FASTA record")?;
        let Some(chrom) = wanted.get(record.id()) else {
            debug!("Skipping sequence {} absent from the chromosome table", record.id());
            continue;
        };
        if record.seq().len() as u64 != chrom.length {
            warn!(
                "Sequence {} has {} bases, chromosome table says {}",
                chrom.name,
                record.seq().len(),
                chrom.length
            );
        }
        let counts = BaseCounts::new(record.seq());
        for local in 0..chrom.n_bins {
            let (start, end) = layout.window(chrom, local);
            fractions[chrom.offset + local] = counts.fraction(start as usize, end as usize);
        }
    }
    Ok(GcContent::new(fractions))
}

pub fn read_gc_content<P: AsRef<Path>>(
    path: P,
    layout: &BinLayout,
) -> anyhow::Result<GcContent> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("Failed to open genome {}", path.as_ref().display()))?;
    info!("Compute GC-content");
    gc_content_from_fasta(BufReader::new(file), layout)
}
