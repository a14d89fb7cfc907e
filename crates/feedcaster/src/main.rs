mod cli;
mod config;
mod http;
mod imgur;
mod mastodon;
mod media;
mod state;

use clap::Parser;
use cli::{Cli, Commands};
use tracing::error;

fn main() {
    // Library `log` records are forwarded through the subscriber's log bridge.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.as_deref();

    let result = match cli.command {
        Commands::Run(args) => cli::run::run(args, &cli.config, data_dir),
        Commands::Index(cmd) => cli::index::run(cmd, &cli.config, data_dir),
        Commands::Compose(args) => cli::compose::run(args, &cli.config),
        Commands::Config(cmd) => cli::config_cmd::run(cmd, &cli.config, data_dir),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
