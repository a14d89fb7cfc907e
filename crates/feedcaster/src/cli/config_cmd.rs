use crate::cli::ConfigCommands;
use crate::config::BotConfig;
use anyhow::Result;
use feedcaster_core::Pipeline;
use std::path::Path;

pub fn run(cmd: ConfigCommands, config_path: &Path, data_dir: Option<&Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Validate => validate(config_path),
        ConfigCommands::Show => show(config_path, data_dir),
    }
}

fn validate(config_path: &Path) -> Result<()> {
    let config = match BotConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("❌ Failed to parse {}: {:#}", config_path.display(), e);
            std::process::exit(1);
        }
    };

    let mut errors = config.validate();
    if errors.is_empty() {
        // compiles denylist and template patterns too
        if let Err(e) = Pipeline::new(&config.account, config.source, config.pipeline.clone()) {
            errors.push(e.to_string());
        }
    }

    if errors.is_empty() {
        println!(
            "✅ {} is valid ({} source, posting as {}).",
            config_path.display(),
            config.source,
            config.account
        );
        return Ok(());
    }

    println!("❌ Validation errors in {}:", config_path.display());
    for e in &errors {
        println!("  - {}", e);
    }
    std::process::exit(1);
}

fn show(config_path: &Path, data_dir: Option<&Path>) -> Result<()> {
    let config = BotConfig::load_or_default(config_path);
    let rendered = toml::to_string_pretty(&config)
        .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
    println!("# state: {}", config.state_path(data_dir).display());
    println!("{}", rendered);
    Ok(())
}
