//! Collaborator seams for posting and media, and the batch publisher.

use crate::classify::{AttachmentDecision, AttachmentKind};
use crate::error::{CollaboratorError, FeedcasterError, Result};
use std::path::PathBuf;

/// Attachments accepted per post. Extra media ids are dropped.
pub const MAX_MEDIA_PER_POST: usize = 4;

pub const IMAGE_LIMIT_BYTES: u64 = 5 * 1024 * 1024;
pub const VIDEO_LIMIT_BYTES: u64 = 15 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn limit(self) -> u64 {
        match self {
            MediaKind::Image => IMAGE_LIMIT_BYTES,
            MediaKind::Video => VIDEO_LIMIT_BYTES,
        }
    }

    pub fn mime_hint(self) -> &'static str {
        match self {
            MediaKind::Image => "image/jpeg",
            MediaKind::Video => "video/mp4",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Enforce the size ceiling before anything is sent.
pub fn check_payload(kind: MediaKind, size: u64) -> Result<()> {
    if size > kind.limit() {
        return Err(FeedcasterError::PayloadTooLarge {
            kind: match kind {
                MediaKind::Image => "image",
                MediaKind::Video => "video",
            },
            size,
            limit: kind.limit(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Path(PathBuf),
    Url(String),
}

impl std::fmt::Display for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaSource::Path(p) => write!(f, "{}", p.display()),
            MediaSource::Url(u) => write!(f, "{}", u),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRequest {
    pub source: MediaSource,
    pub kind: MediaKind,
}

impl MediaRequest {
    pub fn image(source: MediaSource) -> Self {
        Self {
            source,
            kind: MediaKind::Image,
        }
    }

    pub fn video(source: MediaSource) -> Self {
        Self {
            source,
            kind: MediaKind::Video,
        }
    }
}

/// Posting platform.
pub trait Poster {
    fn post(&self, text: &str, media_ids: &[String]) -> std::result::Result<(), CollaboratorError>;
}

/// Media hosting on the posting platform. Implementations must call
/// [`check_payload`] before sending bytes.
pub trait MediaUploader {
    fn upload(&self, request: &MediaRequest) -> Result<String>;
}

/// Authenticated account lookup.
pub trait AccountLookup {
    fn authenticated_account(&self) -> std::result::Result<String, CollaboratorError>;
}

/// Turns hosted pages into direct media URLs.
pub trait MediaResolver {
    /// Direct image URLs of an album, in album order.
    fn album_images(&self, album_url: &str) -> std::result::Result<Vec<String>, CollaboratorError>;

    /// `og:image` of a page.
    fn page_image(&self, page_url: &str) -> std::result::Result<Option<String>, CollaboratorError>;

    /// Video rendition of a short animation page.
    fn gif_video(&self, page_url: &str) -> std::result::Result<Option<String>, CollaboratorError>;
}

/// How a fetchable attachment becomes uploadable media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    Direct,
    Album,
    PageImage,
    GifVideo,
}

impl UploadStrategy {
    pub fn for_kind(kind: AttachmentKind) -> Option<Self> {
        match kind {
            AttachmentKind::Image => Some(UploadStrategy::Direct),
            AttachmentKind::Album(_) => Some(UploadStrategy::Album),
            AttachmentKind::Instagram => Some(UploadStrategy::PageImage),
            AttachmentKind::Gif => Some(UploadStrategy::GifVideo),
            AttachmentKind::SelfPost
            | AttachmentKind::CrossLink
            | AttachmentKind::Video
            | AttachmentKind::Link => None,
        }
    }
}

/// Media to upload for an attachment decision. Lookup failures are logged
/// and yield nothing; the post goes out without media.
pub fn resolve_media(decision: &AttachmentDecision, resolver: &dyn MediaResolver) -> Vec<MediaRequest> {
    let Some(url) = decision.url.as_deref() else {
        return Vec::new();
    };
    let Some(strategy) = UploadStrategy::for_kind(decision.kind) else {
        return Vec::new();
    };

    let resolved = match strategy {
        UploadStrategy::Direct => Ok(vec![MediaRequest::image(MediaSource::Url(url.to_string()))]),
        UploadStrategy::Album => resolver.album_images(url).map(|images| {
            images
                .into_iter()
                .take(MAX_MEDIA_PER_POST)
                .map(|u| MediaRequest::image(MediaSource::Url(u)))
                .collect()
        }),
        UploadStrategy::PageImage => resolver.page_image(url).map(|image| {
            image
                .map(|u| MediaRequest::image(MediaSource::Url(u)))
                .into_iter()
                .collect()
        }),
        UploadStrategy::GifVideo => resolver.gif_video(url).map(|video| {
            video
                .map(|u| MediaRequest::video(MediaSource::Url(u)))
                .into_iter()
                .collect()
        }),
    };

    match resolved {
        Ok(requests) => requests,
        Err(e) => {
            log::warn!("Could not resolve {} media at {}: {}", decision.kind, url, e);
            Vec::new()
        }
    }
}

/// Upload each request in order, keeping at most [`MAX_MEDIA_PER_POST`]
/// ids. Failed uploads are logged and skipped.
pub fn upload_all(candidate_id: &str, requests: &[MediaRequest], uploader: &dyn MediaUploader) -> Vec<String> {
    let mut ids = Vec::new();
    for request in requests {
        if ids.len() == MAX_MEDIA_PER_POST {
            break;
        }
        match uploader.upload(request) {
            Ok(id) => {
                log::info!("Uploaded {} {} for {}", request.kind, request.source, candidate_id);
                ids.push(id);
            }
            Err(e) => log::warn!("Upload of {} for {} failed: {}", request.source, candidate_id, e),
        }
    }
    ids
}

/// Refuse to post under the wrong identity.
pub fn verify_identity(expected: &str, lookup: &dyn AccountLookup) -> Result<()> {
    let actual = lookup
        .authenticated_account()
        .map_err(|e| FeedcasterError::Identity(e.to_string()))?;
    let expected = expected.trim_start_matches('@');
    if !actual.trim_start_matches('@').eq_ignore_ascii_case(expected) {
        return Err(FeedcasterError::Identity(format!(
            "credentials belong to '{}', configured account is '{}'",
            actual, expected
        )));
    }
    log::debug!("Authenticated as {}", actual);
    Ok(())
}

/// A rendered message ready to go out.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundPost {
    pub candidate_id: String,
    pub text: String,
    pub media_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishReport {
    pub posted: usize,
    /// Posts never attempted because an earlier one failed.
    pub skipped: usize,
    pub failure: Option<(String, CollaboratorError)>,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Post in order and stop at the first failure.
pub fn publish_batch(posts: &[OutboundPost], poster: &dyn Poster) -> PublishReport {
    let mut report = PublishReport::default();
    if posts.is_empty() {
        log::info!("Nothing to post");
        return report;
    }

    for (i, post) in posts.iter().enumerate() {
        let media = &post.media_ids[..post.media_ids.len().min(MAX_MEDIA_PER_POST)];
        log::info!(
            "Posting {}: [{}b] {}{}",
            post.candidate_id,
            post.text.len(),
            post.text,
            if media.is_empty() { "" } else { " (with attachment)" }
        );
        match poster.post(&post.text, media) {
            Ok(()) => report.posted += 1,
            Err(e) => {
                log::error!(
                    "Posting {} failed: {} (code {})",
                    post.candidate_id,
                    e.message,
                    e.code
                );
                report.skipped = posts.len() - i - 1;
                report.failure = Some((post.candidate_id.clone(), e));
                break;
            }
        }
    }
    report
}
