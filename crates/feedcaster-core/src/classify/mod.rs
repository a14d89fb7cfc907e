//! URL -> attachment strategy, as an ordered decision table.
//!
//! Rules are evaluated top to bottom and the first match wins. Broad video
//! patterns sit below the host-specific rules they would otherwise shadow.

use crate::error::{CollaboratorError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What kind of resource a candidate links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// Links to its own permalink: a text-only post.
    #[serde(rename = "self")]
    SelfPost,
    CrossLink,
    Image,
    /// Album, with the image count when a lookup reported more than one.
    Album(Option<u32>),
    Instagram,
    Gif,
    Video,
    Link,
}

impl std::fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttachmentKind::SelfPost => write!(f, "self"),
            AttachmentKind::CrossLink => write!(f, "crosslink"),
            AttachmentKind::Image => write!(f, "image"),
            AttachmentKind::Album(Some(n)) => write!(f, "album:{}", n),
            AttachmentKind::Album(None) => write!(f, "album"),
            AttachmentKind::Instagram => write!(f, "instagram"),
            AttachmentKind::Gif => write!(f, "gif"),
            AttachmentKind::Video => write!(f, "video"),
            AttachmentKind::Link => write!(f, "link"),
        }
    }
}

impl FromStr for AttachmentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let kind = match s {
            "self" => AttachmentKind::SelfPost,
            "crosslink" => AttachmentKind::CrossLink,
            "image" => AttachmentKind::Image,
            "album" | "gallery" => AttachmentKind::Album(None),
            "instagram" => AttachmentKind::Instagram,
            "gif" => AttachmentKind::Gif,
            "video" => AttachmentKind::Video,
            "link" => AttachmentKind::Link,
            other => match other.strip_prefix("album:") {
                Some(n) => AttachmentKind::Album(Some(
                    n.parse().map_err(|_| format!("bad album count in '{}'", other))?,
                )),
                None => return Err(format!("unknown attachment kind '{}'", other)),
            },
        };
        Ok(kind)
    }
}

/// Classification result. `url` is set only when the resource should be
/// fetched and attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDecision {
    pub kind: AttachmentKind,
    pub url: Option<String>,
}

impl AttachmentDecision {
    fn text_only(kind: AttachmentKind) -> Self {
        Self { kind, url: None }
    }

    fn fetch(kind: AttachmentKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: Some(url.into()),
        }
    }

    pub fn is_fetchable(&self) -> bool {
        self.url.is_some()
    }
}

/// Image-count lookup for album hosts.
pub trait AlbumCounter {
    fn image_count(&self, album_url: &str) -> std::result::Result<u32, CollaboratorError>;
}

enum Matcher {
    /// URL contains the candidate's own permalink.
    SelfLink,
    Pattern(Regex),
}

enum Outcome {
    TextOnly(AttachmentKind),
    Fetch(AttachmentKind),
    /// Fetchable image whose URL carries HTML-escaped ampersands.
    UnescapedImage,
    Album,
}

struct Rule {
    name: &'static str,
    matcher: Matcher,
    outcome: Outcome,
}

pub struct AttachmentClassifier {
    rules: Vec<Rule>,
}

impl AttachmentClassifier {
    pub fn new() -> Result<Self> {
        let pattern = |re: &str| -> Result<Matcher> { Ok(Matcher::Pattern(Regex::new(re)?)) };

        let rules = vec![
            Rule {
                name: "self-link",
                matcher: Matcher::SelfLink,
                outcome: Outcome::TextOnly(AttachmentKind::SelfPost),
            },
            Rule {
                name: "cross-post",
                matcher: pattern(r"(?i)reddit\.com")?,
                outcome: Outcome::TextOnly(AttachmentKind::CrossLink),
            },
            Rule {
                name: "bare image",
                matcher: pattern(r"(?i)\.png|\.gif$|\.jpe?g")?,
                outcome: Outcome::Fetch(AttachmentKind::Image),
            },
            Rule {
                name: "imgur single image",
                matcher: pattern(r"(?i)imgur\.com/.[^/]|imgur\.com/gallery/")?,
                outcome: Outcome::Fetch(AttachmentKind::Image),
            },
            Rule {
                name: "reddit upload",
                matcher: pattern(r"(?i)reddituploads\.com")?,
                outcome: Outcome::UnescapedImage,
            },
            Rule {
                name: "imgur album",
                matcher: pattern(r"(?i)imgur\.com/a/")?,
                outcome: Outcome::Album,
            },
            Rule {
                name: "instagram",
                matcher: pattern(r"(?i)instagram\.com/.[^/]|instagram\.com/p/")?,
                outcome: Outcome::Fetch(AttachmentKind::Instagram),
            },
            Rule {
                name: "gfycat",
                matcher: pattern(r"(?i)gfycat\.com/")?,
                outcome: Outcome::Fetch(AttachmentKind::Gif),
            },
            Rule {
                name: "video host",
                matcher: pattern(
                    r"(?i)\.gifv|\.webm|youtube\.com/|youtu\.be/|vine\.co/|vimeo\.com/|liveleak\.com/",
                )?,
                outcome: Outcome::TextOnly(AttachmentKind::Video),
            },
            Rule {
                name: "adult video host",
                matcher: pattern(r"(?i)pornhub\.com|xhamster\.com")?,
                outcome: Outcome::TextOnly(AttachmentKind::Video),
            },
        ];

        Ok(Self { rules })
    }

    /// Classify `url`. `permalink` is the candidate's own address; `counter`
    /// refines album tags and may fail without affecting the outcome class.
    pub fn classify(
        &self,
        url: &str,
        permalink: Option<&str>,
        counter: Option<&dyn AlbumCounter>,
    ) -> AttachmentDecision {
        for rule in &self.rules {
            let hit = match &rule.matcher {
                Matcher::SelfLink => permalink.is_some_and(|p| !p.is_empty() && url.contains(p)),
                Matcher::Pattern(re) => re.is_match(url),
            };
            if !hit {
                continue;
            }

            log::debug!("{} matched rule '{}'", url, rule.name);
            return match &rule.outcome {
                Outcome::TextOnly(kind) => AttachmentDecision::text_only(*kind),
                Outcome::Fetch(kind) => AttachmentDecision::fetch(*kind, url),
                Outcome::UnescapedImage => {
                    AttachmentDecision::fetch(AttachmentKind::Image, url.replace("&amp;", "&"))
                }
                Outcome::Album => {
                    AttachmentDecision::fetch(AttachmentKind::Album(album_count(url, counter)), url)
                }
            };
        }

        AttachmentDecision::text_only(AttachmentKind::Link)
    }
}

fn album_count(url: &str, counter: Option<&dyn AlbumCounter>) -> Option<u32> {
    let counter = counter?;
    match counter.image_count(url) {
        Ok(n) if n > 1 => Some(n),
        Ok(_) => None,
        Err(e) => {
            log::warn!("Album image count unavailable for {}: {}", url, e);
            None
        }
    }
}
