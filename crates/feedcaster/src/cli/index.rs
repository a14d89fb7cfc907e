use crate::cli::IndexCommands;
use crate::config::BotConfig;
use crate::state;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use feedcaster_core::{load_state, save_state, ContentIndex, IndexOrigin, INDEX_STATE_KEY};
use std::path::Path;

pub fn run(cmd: IndexCommands, config_path: &Path, data_dir: Option<&Path>) -> Result<()> {
    let config = BotConfig::load(config_path)?;
    match cmd {
        IndexCommands::Rebuild => rebuild(&config, data_dir),
        IndexCommands::Stats => stats(&config, data_dir),
    }
}

fn rebuild(config: &BotConfig, data_dir: Option<&Path>) -> Result<()> {
    let root = config
        .pipeline
        .index
        .root()
        .context("index.folder is not set")?;
    let mut store = state::open_store(config, data_dir)?;

    let persisted: Option<ContentIndex> = load_state(store.as_ref(), INDEX_STATE_KEY)?;
    let outcome = ContentIndex::rebuild(&root, Duration::zero(), persisted, Utc::now());

    if outcome.origin == IndexOrigin::MissingRoot {
        anyhow::bail!("Content folder {} does not exist", root.display());
    }

    save_state(store.as_mut(), INDEX_STATE_KEY, &outcome.index)?;
    store.flush()?;
    println!(
        "Indexed {} files under {}",
        outcome.index.len(),
        root.display()
    );
    Ok(())
}

fn stats(config: &BotConfig, data_dir: Option<&Path>) -> Result<()> {
    let store = state::open_store(config, data_dir)?;
    let Some(index) = load_state::<ContentIndex>(store.as_ref(), INDEX_STATE_KEY)? else {
        println!("No index yet. Run `feedcaster index rebuild` or a folder run first.");
        return Ok(());
    };

    let stats = index.stats();
    println!();
    println!("Content Index");
    println!("{}", "─".repeat(40));
    println!("Files:     {:>8}", stats.total);
    println!("Unposted:  {:>8}", stats.unposted);
    if let (Some(min), Some(max)) = (stats.min_count, stats.max_count) {
        println!("Exposure:  {:>8}", format!("{}..{}", min, max));
    }
    println!("Built:     {}", stats.built_at.format("%Y-%m-%d %H:%M UTC"));
    println!("{}", "─".repeat(40));
    println!();
    Ok(())
}
