//! One posting cycle: source -> filter -> classify/compose -> publish.

use crate::classify::AlbumCounter;
use crate::compose::{ComposeMode, Composer};
use crate::config::PipelineConfig;
use crate::error::{FeedcasterError, Result};
use crate::feed;
use crate::filter::FilterChain;
use crate::index::ContentLibrary;
use crate::publish::{
    self, AccountLookup, MediaRequest, MediaResolver, MediaSource, MediaUploader, OutboundPost,
    Poster, PublishReport,
};
use crate::storage::StateStore;
use crate::types::Candidate;
use chrono::{DateTime, Local};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

/// Where candidates come from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Files under the content index root.
    Folder,
    /// Remote JSON feed.
    Feed,
    /// Local JSON file holding an array of flat records.
    Records,
}

impl SourceKind {
    pub fn compose_mode(self) -> ComposeMode {
        match self {
            SourceKind::Feed => ComposeMode::Feed,
            SourceKind::Folder | SourceKind::Records => ComposeMode::Record,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Folder => write!(f, "folder"),
            SourceKind::Feed => write!(f, "feed"),
            SourceKind::Records => write!(f, "records"),
        }
    }
}

/// A composed message and the media still to be uploaded for it.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPost {
    pub candidate_id: String,
    pub text: String,
    pub media: Vec<MediaRequest>,
}

/// External services used when actually posting.
pub struct Collaborators<'a> {
    pub poster: &'a dyn Poster,
    pub uploader: &'a dyn MediaUploader,
    pub identity: &'a dyn AccountLookup,
}

pub struct Pipeline {
    account: String,
    source: SourceKind,
    filter: FilterChain,
    composer: Composer,
    config: PipelineConfig,
}

impl Pipeline {
    /// Validate the configuration and compile the filter chain and template.
    /// Every configuration problem surfaces here, before any external call.
    pub fn new(account: &str, source: SourceKind, config: PipelineConfig) -> Result<Self> {
        if account.trim().is_empty() {
            return Err(FeedcasterError::Config("account is required".into()));
        }
        config.validate()?;

        let filter = FilterChain::new(&config.filter, Some(account))?;
        let composer = Composer::new(&config.compose, source.compose_mode())?;

        Ok(Self {
            account: account.to_string(),
            source,
            filter,
            composer,
            config,
        })
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Extract candidates from raw records with the configured field map.
    pub fn candidates(&self, records: Vec<Value>) -> Result<Vec<Candidate>> {
        records
            .into_iter()
            .map(|record| Candidate::from_record(record, &self.config.candidate))
            .collect()
    }

    /// New feed items since the persisted cursor, as candidates.
    pub fn feed_candidates(&self, store: &mut dyn StateStore, document: &Value) -> Result<Vec<Candidate>> {
        let items = feed::take_new_items(store, document, &self.config.feed)?;
        self.candidates(items)
    }

    /// Filter and compose with the thread RNG.
    pub fn prepare(
        &self,
        candidates: Vec<Candidate>,
        albums: Option<&dyn AlbumCounter>,
        resolver: Option<&dyn MediaResolver>,
    ) -> Result<Vec<PreparedPost>> {
        self.prepare_with(candidates, albums, resolver, &mut rand::thread_rng())
    }

    /// Run the filter chain, then classify and compose each survivor.
    /// Fatal errors abort; anything else drops the one candidate.
    pub fn prepare_with<R: Rng + ?Sized>(
        &self,
        candidates: Vec<Candidate>,
        albums: Option<&dyn AlbumCounter>,
        resolver: Option<&dyn MediaResolver>,
        rng: &mut R,
    ) -> Result<Vec<PreparedPost>> {
        let admitted = self.filter.admit_with(candidates, rng);

        let mut prepared = Vec::with_capacity(admitted.len());
        for candidate in admitted {
            let composition = match self.composer.render(&candidate, albums) {
                Ok(c) => c,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::warn!("Could not compose {}: {}", candidate.id, e);
                    continue;
                }
            };
            if composition.text.is_empty() {
                log::info!("Skipping {}: composed text is empty", candidate.id);
                continue;
            }

            let media = match (&composition.attachment, resolver) {
                (Some(decision), Some(resolver)) => publish::resolve_media(decision, resolver),
                _ => Vec::new(),
            };

            prepared.push(PreparedPost {
                candidate_id: candidate.id,
                text: composition.text,
                media,
            });
        }
        Ok(prepared)
    }

    /// Select the next file from the library and compose it. The file itself
    /// becomes the attachment. `scope` overrides the configured prefix.
    pub fn next_from_folder<R: Rng + ?Sized>(
        &self,
        library: &mut ContentLibrary<'_>,
        scope: Option<&str>,
        rng: &mut R,
    ) -> Result<Option<PreparedPost>> {
        let Some(id) = library.next(scope, rng)? else {
            return Ok(None);
        };
        let path = library
            .path_of(&id)
            .ok_or_else(|| FeedcasterError::Config("index.folder is not set".into()))?;

        let record = file_record(&path, &id)?;
        let composition = self.composer.render_record(&record, None)?;
        if composition.text.is_empty() {
            log::info!("Skipping {}: composed text is empty", id);
            return Ok(None);
        }

        let source = MediaSource::Path(path.clone());
        let media = if is_video_file(&path) {
            MediaRequest::video(source)
        } else {
            MediaRequest::image(source)
        };

        Ok(Some(PreparedPost {
            candidate_id: id,
            text: composition.text,
            media: vec![media],
        }))
    }

    /// Fail unless `lookup` is authenticated as the configured account. Run
    /// this before touching state or fetching content.
    pub fn verify_account(&self, lookup: &dyn AccountLookup) -> Result<()> {
        publish::verify_identity(&self.account, lookup)
    }

    /// Check the identity, upload media and post the batch in order.
    pub fn publish(&self, prepared: &[PreparedPost], collaborators: &Collaborators<'_>) -> Result<PublishReport> {
        if prepared.is_empty() {
            log::info!("Nothing to post");
            return Ok(PublishReport::default());
        }

        publish::verify_identity(&self.account, collaborators.identity)?;

        let posts: Vec<OutboundPost> = prepared
            .iter()
            .map(|p| OutboundPost {
                candidate_id: p.candidate_id.clone(),
                text: p.text.clone(),
                media_ids: publish::upload_all(&p.candidate_id, &p.media, collaborators.uploader),
            })
            .collect();

        Ok(publish::publish_batch(&posts, collaborators.poster))
    }
}

/// Read a JSON array of records. A missing file means no records.
pub fn read_records(path: &Path) -> Result<Vec<Value>> {
    if !path.exists() {
        log::warn!("Records file {} does not exist", path.display());
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&raw)? {
        Value::Array(items) => Ok(items),
        _ => Err(FeedcasterError::Integrity(format!(
            "records file {} is not a JSON array",
            path.display()
        ))),
    }
}

/// Template record describing a content file. `id` is the path relative to
/// the index root.
pub fn file_record(path: &Path, id: &str) -> Result<Value> {
    let meta = std::fs::metadata(path)?;
    let relative = Path::new(id);

    let dirname = relative
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| ".".to_string());
    let stem = |p: &Path| p.file_stem().map(|s| s.to_string_lossy().into_owned());

    let modified = meta.modified().ok().map(day);
    let created = meta.created().ok().map(day).or_else(|| modified.clone());

    Ok(json!({
        "filepath": path.to_string_lossy(),
        "dirname": dirname,
        "filename": id,
        "basename": stem(path).unwrap_or_default(),
        "extension": path.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default(),
        "size": format!("{}k", group_thousands((meta.len() as f64 / 1024.0).round() as u64)),
        "created": created.unwrap_or_default(),
        "modified": modified.unwrap_or_default(),
    }))
}

fn day(time: std::time::SystemTime) -> String {
    DateTime::<Local>::from(time).format("%Y-%m-%d").to_string()
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "mp4" | "mov" | "webm" | "m4v"))
        .unwrap_or(false)
}
