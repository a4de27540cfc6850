use std::path::PathBuf;

use clap::Args;
use diffpeak::config::Verbosity;
use glob::glob;
use log::LevelFilter;

/// Options shared by all subcommands.
#[derive(Args, Debug, Clone)]
pub(crate) struct UtilsArgs {
    #[arg(
        long,
        short = 'T',
        default_value_t = 0,
        help_heading = "UTILS",
        help = "Number of worker threads. 0 uses all available cores."
    )]
    pub threads: usize,
    #[arg(
        long,
        short = 'V',
        default_value_t = false,
        help_heading = "UTILS",
        help = "Report progress of the normalization steps."
    )]
    pub verbose: bool,
    #[arg(
        long,
        default_value_t = false,
        help_heading = "UTILS",
        help = "Print intermediate parameters and write debug output files."
    )]
    pub debug:   bool,
}

impl UtilsArgs {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.debug)
    }

    /// Sets up logging and the size of the worker pool. Must run before the
    /// pool is first used.
    pub fn setup(&self) -> anyhow::Result<()> {
        let level = match self.verbosity() {
            Verbosity::Quiet => LevelFilter::Warn,
            Verbosity::Verbose => LevelFilter::Info,
            Verbosity::Debug => LevelFilter::Debug,
        };
        let mut builder = pretty_env_logger::formatted_timed_builder();
        builder.filter_level(level);
        if let Ok(filters) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }
        builder.try_init()?;
        if self.threads > 0 {
            std::env::set_var("DIFFPEAK_NUM_THREADS", self.threads.to_string());
        }
        Ok(())
    }
}

/// Expands wildcards the shell left in place.
pub(crate) fn expand_wildcards(paths: &[String]) -> Vec<PathBuf> {
    let mut expanded_paths = Vec::new();

    for path in paths {
        if path.contains('*') || path.contains('?') {
            match glob(path) {
                Ok(matches) => {
                    let before = expanded_paths.len();
                    expanded_paths.extend(matches.filter_map(Result::ok));
                    if expanded_paths.len() == before {
                        log::warn!("Pattern {} matched no files", path);
                    }
                },
                Err(e) => log::error!("Invalid pattern {}: {}", path, e),
            }
        }
        else {
            expanded_paths.push(PathBuf::from(path));
        }
    }

    expanded_paths
}
