use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "card-classifier")]
#[command(about = "Copy camera card media into make/model/date folders as cards are inserted")]
pub struct Args {
    /// Config file (default: ./card-classifier.toml, then the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output root for this process, overriding the config file
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Don't open the output folder when a run finishes
    #[arg(long, global = true, default_value_t = false)]
    pub no_open: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Wait for volumes and process each one as it is inserted (default)
    Watch,

    /// Process one mounted volume now
    Run {
        /// Volume root (e.g. the card's mount point)
        volume: PathBuf,

        /// Print the run summary as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Save a new output directory to the config file
    SetOutput { directory: PathBuf },

    /// Print the effective configuration
    ShowConfig,
}
