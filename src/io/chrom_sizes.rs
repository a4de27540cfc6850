use std::fs::File;
use std::io::{
    BufReader,
    Read,
};
use std::path::Path;

use anyhow::{
    bail,
    Context,
};
use bio::io::fasta;

use crate::data_structs::typedef::PosType;

/// Reads a two-column `name<TAB>length` chromosome size table. Lines
/// starting with `#` are skipped.
pub fn read_chrom_sizes<R: Read>(handle: R) -> anyhow::Result<Vec<(String, PosType)>> {
    let sizes = csv::ReaderBuilder::default()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(handle)
        .deserialize::<(String, PosType)>()
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to parse chromosome sizes")?;
    if sizes.is_empty() {
        bail!("Chromosome size table is empty");
    }
    Ok(sizes)
}

pub fn read_chrom_sizes_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<(String, PosType)>> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;
    read_chrom_sizes(BufReader::new(file))
}

/// Chromosome sizes taken from the sequences of a FASTA file, in file
/// order.
pub fn chrom_sizes_from_fasta<R: Read>(handle: R) -> anyhow::Result<Vec<(String, PosType)>> {
    fasta::Reader::new(handle)
        .records()
        .map(|record| {
            let record = record.context("Failed to read FASTA record")?;
            Ok((record.id().to_string(), record.seq().len() as PosType))
        })
        .collect()
}
