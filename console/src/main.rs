mod run;
mod utils;

use clap::{
    Parser,
    Subcommand,
};
use diffpeak::config::DiffPeakConfig;
use run::RunArgs;
use utils::UtilsArgs;
use wild::ArgsOs;

#[derive(Parser, Debug)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None,)]
struct Cli {
    #[command(subcommand)]
    command: MainMenu,
}

#[derive(Subcommand, Debug)]
enum MainMenu {
    /// Normalize replicate coverage and build the classifier training set.
    Run {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  RunArgs,
    },

    /// Print the default configuration as JSON.
    Config,
}

fn main() -> anyhow::Result<()> {
    let args: ArgsOs = wild::args_os();
    let cli = Cli::parse_from(args);

    match cli.command {
        MainMenu::Run { utils, args } => {
            utils.setup()?;
            args.run(&utils)?;
        },
        MainMenu::Config => {
            println!(
                "{}",
                serde_json::to_string_pretty(&DiffPeakConfig::default())?
            );
        },
    }
    Ok(())
}
