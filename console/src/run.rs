use std::fs::File;
use std::io::BufReader;
use std::path::{
    Path,
    PathBuf,
};

use anyhow::{
    anyhow,
    bail,
    Context,
};
use clap::Args;
use console::style;
use diffpeak::config::DiffPeakConfig;
use diffpeak::data_structs::typedef::PosType;
use diffpeak::data_structs::{
    BinLayout,
    Condition,
    Label,
    RegionSet,
    SampleId,
};
use diffpeak::io::{
    chrom_sizes_from_fasta,
    read_chrom_sizes_file,
    read_gc_content,
    BedReads,
    ReadFilter,
};
use diffpeak::pipeline::{
    make_rng,
    run,
    PipelineInput,
};
use diffpeak::tools::gc::GcCorrector;
use log::*;

use crate::utils::{
    expand_wildcards,
    UtilsArgs,
};

#[derive(Args, Debug, Clone)]
pub(crate) struct RunArgs {
    #[arg(
        value_parser,
        short = '1',
        long,
        num_args = 1..,
        required = true,
        help = "BED files of aligned reads, one per replicate of the first condition."
    )]
    first: Vec<String>,
    #[arg(
        value_parser,
        short = '2',
        long,
        num_args = 1..,
        required = true,
        help = "BED files of aligned reads, one per replicate of the second condition."
    )]
    second: Vec<String>,
    #[arg(
        long,
        num_args = 1..,
        help_heading = "INPUT-DNA",
        help = "Input-DNA BED files of the first condition, in replicate order."
    )]
    input_first: Vec<String>,
    #[arg(
        long,
        num_args = 1..,
        help_heading = "INPUT-DNA",
        help = "Input-DNA BED files of the second condition, in replicate order."
    )]
    input_second: Vec<String>,

    #[arg(
        short = 'g',
        long,
        help = "Genome FASTA. Used for GC-content correction and, without \
                --chrom-sizes, for chromosome sizes."
    )]
    genome:      Option<PathBuf>,
    #[arg(short = 'c', long, help = "Tab separated chromosome size table.")]
    chrom_sizes: Option<PathBuf>,
    #[arg(long, help = "JSON configuration. Missing fields take default values.")]
    config:      Option<PathBuf>,
    #[arg(long, help = "BED regions; reads overlapping them are ignored.")]
    mask:        Option<PathBuf>,

    #[arg(
        short = 'o',
        long,
        required = true,
        help = "Directory for the generated output files."
    )]
    output: PathBuf,
    #[arg(short = 'n', long, help = "Experiment name, prefix of all output files.")]
    name:   Option<String>,

    #[arg(long, help_heading = "OVERRIDES", help = "Bin width in bases.")]
    binsize:       Option<PosType>,
    #[arg(long, help_heading = "OVERRIDES", help = "Distance between bin starts.")]
    stepsize:      Option<PosType>,
    #[arg(long, help_heading = "OVERRIDES", help = "Read extension size.")]
    ext:           Option<PosType>,
    #[arg(long, help_heading = "OVERRIDES", help = "Keep duplicate reads.")]
    keep_dup:      bool,
    #[arg(long, help_heading = "OVERRIDES", help = "Skip GC-content correction.")]
    no_gc_content: bool,
    #[arg(long, help_heading = "OVERRIDES", help = "Seed of the random source.")]
    seed:          Option<u64>,
    #[arg(
        long,
        help_heading = "OVERRIDES",
        help = "Write normalized IP coverage tracks."
    )]
    save_tracks:   bool,
    #[arg(
        long,
        help_heading = "OVERRIDES",
        help = "Write input-DNA coverage tracks."
    )]
    save_input:    bool,
}

impl RunArgs {
    fn config(
        &self,
        utils: &UtilsArgs,
    ) -> anyhow::Result<DiffPeakConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                DiffPeakConfig::from_json(&json)?
            },
            None => DiffPeakConfig::default(),
        };
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(binsize) = self.binsize {
            config.binning.binsize = binsize;
        }
        if let Some(stepsize) = self.stepsize {
            config.binning.stepsize = stepsize;
        }
        if let Some(ext) = self.ext {
            config.binning.extension_size = ext;
        }
        if self.keep_dup {
            config.binning.rmdup = false;
        }
        if self.no_gc_content {
            config.normalization.no_gc_content = true;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.save_tracks |= self.save_tracks;
        config.save_input |= self.save_input;
        config.verbosity = utils.verbosity();
        config.validate()?;
        Ok(config)
    }

    fn chrom_sizes(&self) -> anyhow::Result<Vec<(String, PosType)>> {
        match (&self.chrom_sizes, &self.genome) {
            (Some(path), _) => read_chrom_sizes_file(path),
            (None, Some(genome)) => {
                let file = File::open(genome)
                    .with_context(|| format!("Failed to open genome {}", genome.display()))?;
                chrom_sizes_from_fasta(BufReader::new(file))
            },
            (None, None) => bail!("Either --chrom-sizes or --genome is required"),
        }
    }

    fn load_reads(
        paths: &[PathBuf],
        condition: Condition,
        filter: &ReadFilter,
    ) -> anyhow::Result<Vec<(SampleId, BedReads)>> {
        paths
            .iter()
            .enumerate()
            .map(|(replicate, path)| {
                if !path.is_file() {
                    bail!("Path {} is not a file", style(path.display()).red());
                }
                let reads = BedReads::from_path(path, filter.clone())?;
                Ok((SampleId::new(condition, replicate), reads))
            })
            .collect()
    }

    pub fn run(
        &self,
        utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let config = self.config(utils)?;
        let first = expand_wildcards(&self.first);
        let second = expand_wildcards(&self.second);
        let input_first = expand_wildcards(&self.input_first);
        let input_second = expand_wildcards(&self.input_second);

        if first.is_empty() || second.is_empty() {
            bail!("Both conditions need at least one replicate");
        }
        let has_inputs = !input_first.is_empty() || !input_second.is_empty();
        if has_inputs && (input_first.len() != first.len() || input_second.len() != second.len())
        {
            bail!("Input-DNA files must be given for every replicate of both conditions");
        }
        if !self.output.is_dir() {
            std::fs::create_dir_all(&self.output).with_context(|| {
                format!("Failed to create output directory {}", self.output.display())
            })?;
        }

        let layout = BinLayout::new(
            self.chrom_sizes()?,
            config.binning.binsize,
            config.binning.stepsize,
        )?;
        info!(
            "Genome split into {} bins of {} bp (step {})",
            layout.n_bins(),
            layout.binsize(),
            layout.stepsize()
        );

        let mask = match &self.mask {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("Failed to open mask {}", path.display()))?;
                Some(RegionSet::read_bed(&path.to_string_lossy(), BufReader::new(file))?.index())
            },
            None => None,
        };
        let filter = ReadFilter {
            extension_size: config.binning.extension_size,
            rmdup: config.binning.rmdup,
            mask,
        };

        let mut ip = Self::load_reads(&first, Condition::First, &filter)?;
        ip.extend(Self::load_reads(&second, Condition::Second, &filter)?);
        let inputs = if has_inputs {
            let mut inputs = Self::load_reads(&input_first, Condition::First, &filter)?;
            inputs.extend(Self::load_reads(&input_second, Condition::Second, &filter)?);
            Some(inputs)
        }
        else {
            None
        };

        let gc = match &self.genome {
            Some(genome) if has_inputs && !config.normalization.no_gc_content => {
                let content = read_gc_content(genome, &layout)?;
                Some(GcCorrector::for_layout(content, &layout)?)
            },
            _ => None,
        };

        let input = PipelineInput::from_sources(&config, &layout, &ip, inputs.as_deref())?;
        let mut rng = make_rng(config.seed);
        let name = config.name.clone();
        let (set, training) = run(
            config,
            layout,
            input,
            gc.as_ref(),
            Some(self.output.as_path()),
            &mut rng,
        )?;

        let training_path = self.output.join(format!("{}-trainingset.json", name));
        write_json(&training_path, &training)?;

        println!(
            "{} regions of interest, training set of {} bins ({} {}, {} {}, {} {})",
            style(set.len()).green(),
            style(training.len()).green(),
            training.examples(Label::Neutral).len(),
            Label::Neutral,
            training.examples(Label::FirstUp).len(),
            Label::FirstUp,
            training.examples(Label::SecondUp).len(),
            Label::SecondUp,
        );
        println!("Written to {}", style(training_path.display()).blue());
        Ok(())
    }
}

fn write_json<T: diffpeak::exports::serde::Serialize>(
    path: &Path,
    value: &T,
) -> anyhow::Result<()> {
    let file = File::create(path)
        .map_err(|e| anyhow!("Failed to create {}: {}", path.display(), e))?;
    serde_json::to_writer_pretty(file, value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
