use std::fs::File;
use std::io::{
    BufWriter,
    Write,
};
use std::path::{
    Path,
    PathBuf,
};

use anyhow::Context;
use itertools::Itertools;
use log::*;
use ndarray::{
    ArrayView1,
    ArrayView2,
};
use serde::Serialize;

use crate::data_structs::typedef::{
    CountType,
    CovType,
};
use crate::data_structs::{
    BinLayout,
    Condition,
    CoverageMatrix,
    Label,
    SampleId,
};
use crate::tools::gc::GcProfile;
use crate::tools::training::TrainingSet;

#[derive(Serialize)]
struct GcHistogramRow {
    gc_percent:    usize,
    mean_coverage: CovType,
    n_bins:        usize,
}

/// Writes the GC profile as a tab separated table with header.
pub fn write_gc_histogram<W: Write>(
    handle: W,
    profile: &GcProfile,
) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::default()
        .delimiter(b'\t')
        .has_headers(true)
        .from_writer(handle);
    for (gc_percent, (mean, count)) in profile
        .histogram()
        .iter()
        .zip(profile.counts())
        .enumerate()
    {
        writer
            .serialize(GcHistogramRow {
                gc_percent,
                mean_coverage: *mean,
                n_bins: *count,
            })
            .context("Failed to write GC histogram row")?;
    }
    writer.flush().context("Failed to flush GC histogram")?;
    Ok(())
}

/// Writes one coverage track in bedGraph format. Each bin is reported over
/// its step-sized region; zero bins are omitted.
pub fn write_bedgraph<W: Write>(
    mut handle: W,
    layout: &BinLayout,
    track_name: &str,
    values: ArrayView1<CovType>,
) -> anyhow::Result<()> {
    writeln!(handle, "track type=bedGraph name=\"{}\"", track_name)
        .context("Failed to write bedGraph header")?;
    for (index, value) in values.iter().enumerate() {
        if *value == 0.0 {
            continue;
        }
        let Some(contig) = layout.index_to_contig(index) else {
            break;
        };
        writeln!(
            handle,
            "{}\t{}\t{}\t{}",
            contig.seqname(),
            contig.start(),
            contig.end(),
            value
        )
        .with_context(|| format!("Failed to write bedGraph entry for bin {}", index))?;
    }
    handle.flush().context("Failed to flush bedGraph")?;
    Ok(())
}

/// Writes training set bins as BED regions.
pub fn write_training_bed<W: Write>(
    mut handle: W,
    layout: &BinLayout,
    training: &TrainingSet,
) -> anyhow::Result<()> {
    for &index in training.indices() {
        let contig = layout
            .index_to_contig(index)
            .with_context(|| format!("Bin {} is outside the genome", index))?;
        writeln!(
            handle,
            "{}\t{}\t{}",
            contig.seqname(),
            contig.start(),
            contig.end()
        )
        .context("Failed to write training set region")?;
    }
    handle.flush().context("Failed to flush training set")?;
    Ok(())
}

/// Writes `(cov1, cov2)` pairs, one per line.
pub fn write_values<W: Write>(
    mut handle: W,
    values: &[(CountType, CountType)],
) -> anyhow::Result<()> {
    for (cov1, cov2) in values {
        writeln!(handle, "{}\t{}", cov1, cov2).context("Failed to write training values")?;
    }
    handle.flush().context("Failed to flush training values")?;
    Ok(())
}

/// Writes a replicates x bins matrix column by column: one line per bin
/// with the value of every replicate.
pub fn write_overall_coverage<W: Write>(
    mut handle: W,
    matrix: ArrayView2<CovType>,
) -> anyhow::Result<()> {
    for column in matrix.columns() {
        writeln!(handle, "{}", column.iter().join("\t"))
            .context("Failed to write overall coverage")?;
    }
    handle.flush().context("Failed to flush overall coverage")?;
    Ok(())
}

/// Places the output files of one experiment in a directory, named after
/// the experiment.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir:  PathBuf,
    name: String,
}

impl ReportWriter {
    pub fn new<P: AsRef<Path>>(
        dir: P,
        name: &str,
    ) -> Self {
        Self {
            dir:  dir.as_ref().to_path_buf(),
            name: name.to_string(),
        }
    }

    pub fn path(
        &self,
        suffix: &str,
    ) -> PathBuf {
        self.dir.join(format!("{}-{}", self.name, suffix))
    }

    fn create(
        &self,
        suffix: &str,
    ) -> anyhow::Result<BufWriter<File>> {
        let path = self.path(suffix);
        debug!("Writing {}", path.display());
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(BufWriter::new(file))
    }

    /// `<name>-trainingset.bed` and the value lists `<name>-s0`, `-s1`,
    /// `-s2` of the neutral, first and second condition classes.
    pub fn training_set(
        &self,
        layout: &BinLayout,
        training: &TrainingSet,
    ) -> anyhow::Result<()> {
        write_training_bed(self.create("trainingset.bed")?, layout, training)?;
        for label in Label::ALL {
            let suffix = format!("s{}", label.index());
            write_values(self.create(&suffix)?, &training.values(label))?;
        }
        Ok(())
    }

    /// `<name>-overall-cov-0` and `<name>-overall-cov-1`.
    pub fn overall_coverage(
        &self,
        matrix: &CoverageMatrix,
    ) -> anyhow::Result<()> {
        for condition in Condition::BOTH {
            let suffix = format!("overall-cov-{}", condition.index());
            write_overall_coverage(self.create(&suffix)?, matrix.condition(condition).view())?;
        }
        Ok(())
    }

    /// `<name>-gc-content.tsv`.
    pub fn gc_histogram(
        &self,
        profile: &GcProfile,
    ) -> anyhow::Result<()> {
        write_gc_histogram(self.create("gc-content.tsv")?, profile)
    }

    /// `<name>-s<c>-rep<r>.bedGraph`, or `<name>-input-s<c>-rep<r>.bedGraph`
    /// for input samples.
    pub fn track(
        &self,
        layout: &BinLayout,
        id: SampleId,
        is_input: bool,
        values: ArrayView1<CovType>,
    ) -> anyhow::Result<()> {
        let suffix = if is_input {
            format!("input-{}.bedGraph", id)
        }
        else {
            format!("{}.bedGraph", id)
        };
        let track_name = format!("{}-{}", self.name, suffix.trim_end_matches(".bedGraph"));
        write_bedgraph(self.create(&suffix)?, layout, &track_name, values)
    }
}
