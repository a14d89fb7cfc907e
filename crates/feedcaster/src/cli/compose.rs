use crate::cli::ComposeArgs;
use crate::config::BotConfig;
use crate::http;
use crate::imgur::ImgurClient;
use anyhow::{Context, Result};
use feedcaster_core::{AlbumCounter, ComposeMode, Composer};
use std::path::Path;

/// Render one record file and print the message the bot would send.
pub fn run(args: ComposeArgs, config_path: &Path) -> Result<()> {
    let config = BotConfig::load(config_path)?;

    let mode = match args.mode.as_deref() {
        Some("feed") => ComposeMode::Feed,
        Some("record") => ComposeMode::Record,
        _ => config.source.compose_mode(),
    };
    let mut compose = config.pipeline.compose.clone();
    compose.mode = Some(mode);
    let composer = Composer::new(&compose, mode)?;

    let raw = std::fs::read_to_string(&args.record)
        .with_context(|| format!("Failed to read {}", args.record.display()))?;
    let record: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", args.record.display()))?;

    let imgur = match config.imgur_client_id() {
        Some(id) => Some(ImgurClient::new(http::client(&config.http)?, id)?),
        None => None,
    };
    let composition = composer.render_record(&record, imgur.as_ref().map(|c| c as &dyn AlbumCounter))?;

    println!("{}", composition.text);
    println!();
    println!(
        "mode: {}  length: {}/{}",
        mode,
        composer.normalized_len(&composition.text),
        compose.max_length
    );
    if let Some(attachment) = composition.attachment {
        match attachment.url {
            Some(url) => println!("attachment: {} {}", attachment.kind, url),
            None => println!("attachment: {}", attachment.kind),
        }
    }
    Ok(())
}
