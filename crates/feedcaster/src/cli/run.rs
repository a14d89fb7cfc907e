use crate::cli::RunArgs;
use crate::config::{self, BotConfig};
use crate::http;
use crate::imgur::ImgurClient;
use crate::mastodon::MastodonClient;
use crate::media::WebMediaResolver;
use crate::state;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use feedcaster_core::{
    read_records, AlbumCounter, Collaborators, ContentLibrary, MemoryStateStore, Pipeline,
    PreparedPost, SourceKind, StateStore, INDEX_STATE_KEY, LAST_MAX_TIMESTAMP_KEY,
};
use std::path::Path;
use tracing::{info, warn};

pub fn run(args: RunArgs, config_path: &Path, data_dir: Option<&Path>) -> Result<()> {
    let config = BotConfig::load(config_path)?;
    let errors = config.validate();
    if !errors.is_empty() {
        bail!("Invalid configuration: {}", errors.join("; "));
    }

    let pipeline = Pipeline::new(&config.account, config.source, config.pipeline.clone())?;
    let client = http::client(&config.http)?;

    // Credentials and identity are settled before any state is read or written.
    let mastodon = if args.dry_run {
        None
    } else {
        let mastodon = MastodonClient::new(client.clone(), config.base_url(), config::access_token()?);
        pipeline.verify_account(&mastodon)?;
        Some(mastodon)
    };

    let mut store = state::open_store(&config, data_dir)?;

    // A dry run works on a copy so neither the index nor the cursor moves.
    let mut scratch;
    let state: &mut dyn StateStore = if args.dry_run {
        scratch = MemoryStateStore::snapshot(store.as_ref(), &[INDEX_STATE_KEY, LAST_MAX_TIMESTAMP_KEY])?;
        &mut scratch
    } else {
        store.as_mut()
    };

    let imgur = match config.imgur_client_id() {
        Some(id) => Some(ImgurClient::new(client.clone(), id)?),
        None => None,
    };
    let resolver = WebMediaResolver::new(client.clone(), imgur.clone())?;
    let albums = imgur.as_ref().map(|c| c as &dyn AlbumCounter);

    info!("Running {} source for {}", config.source, config.account);

    let prepared: Vec<PreparedPost> = match config.source {
        SourceKind::Folder => {
            let mut library = ContentLibrary::open(state, config.pipeline.index.clone(), Utc::now())?;
            pipeline
                .next_from_folder(&mut library, args.scope.as_deref(), &mut rand::thread_rng())?
                .into_iter()
                .collect()
        }
        SourceKind::Feed => {
            let url = config.pipeline.feed.url.as_deref().unwrap_or_default();
            match http::get_json(&client, "feed fetch", url) {
                Ok(document) => {
                    let candidates = pipeline.feed_candidates(state, &document)?;
                    info!("{} new feed items", candidates.len());
                    pipeline.prepare(candidates, albums, Some(&resolver))?
                }
                Err(e) => {
                    warn!("Could not fetch {}: {}", url, e);
                    Vec::new()
                }
            }
        }
        SourceKind::Records => {
            let path = config
                .records
                .path
                .as_deref()
                .context("records.path is required for the records source")?;
            let candidates = pipeline.candidates(read_records(path)?)?;
            info!("{} records loaded from {}", candidates.len(), path.display());
            pipeline.prepare(candidates, albums, Some(&resolver))?
        }
    };

    let Some(mastodon) = mastodon else {
        print_dry_run(&prepared);
        return Ok(());
    };

    let report = pipeline.publish(
        &prepared,
        &Collaborators {
            poster: &mastodon,
            uploader: &mastodon,
            identity: &mastodon,
        },
    )?;

    info!("Posted {} of {}", report.posted, prepared.len());
    if let Some((id, err)) = report.failure {
        bail!(
            "Posting {} failed: {} ({} not attempted)",
            id,
            err,
            report.skipped
        );
    }
    Ok(())
}

fn print_dry_run(prepared: &[PreparedPost]) {
    if prepared.is_empty() {
        println!("Nothing to post.");
        return;
    }
    for post in prepared {
        println!("── {} ──", post.candidate_id);
        println!("{}", post.text);
        for media in &post.media {
            println!("  [{}] {}", media.kind, media.source);
        }
    }
    println!();
    println!("{} post(s), dry run: nothing sent, state untouched.", prepared.len());
}
