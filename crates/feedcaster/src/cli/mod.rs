pub mod compose;
pub mod config_cmd;
pub mod index;
pub mod run;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "feedcaster")]
#[command(version, about = "Pick content, compose a post, publish it to Mastodon")]
pub struct Cli {
    /// Path to feedcaster.toml
    #[arg(
        long,
        global = true,
        env = "FEEDCASTER_CONFIG",
        default_value = "feedcaster.toml"
    )]
    pub config: PathBuf,

    /// Directory holding the state file (overrides config file)
    #[arg(long, global = true, env = "FEEDCASTER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one posting cycle
    Run(RunArgs),
    /// Content index operations (folder source)
    #[command(subcommand)]
    Index(IndexCommands),
    /// Render a record file against the configured template
    Compose(ComposeArgs),
    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Compose and print without posting or advancing state
    #[arg(long)]
    pub dry_run: bool,

    /// Restrict folder selection to identifiers with this prefix
    #[arg(long)]
    pub scope: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum IndexCommands {
    /// Rescan the content folder now, keeping exposure counts
    Rebuild,
    /// Show index size and exposure spread
    Stats,
}

#[derive(Args, Debug)]
pub struct ComposeArgs {
    /// JSON file holding one record
    pub record: PathBuf,

    /// Resolve as feed or record (defaults to the configured source's mode)
    #[arg(long, value_parser = ["feed", "record"])]
    pub mode: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate the config file
    Validate,
    /// Show the resolved config
    Show,
}
