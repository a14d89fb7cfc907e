use crate::error::{FeedcasterError, Result};
use crate::record::{self, FieldLookup};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A short-form link embedded in a candidate and the destination it stands for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddedLink {
    pub short: String,
    pub expanded: String,
}

impl EmbeddedLink {
    pub fn new(short: impl Into<String>, expanded: impl Into<String>) -> Self {
        Self {
            short: short.into(),
            expanded: expanded.into(),
        }
    }
}

/// A unit of content that may be posted.
///
/// Produced by a source (feed, record file, content index) and left untouched
/// afterwards, except for link expansion done by the filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Stable key used in log lines.
    pub id: String,
    pub body: String,
    pub author: Option<String>,
    pub links: Vec<EmbeddedLink>,
    pub media_count: usize,
    /// URL used by the attachment classifier, when the source exposes one.
    pub source_url: Option<String>,
    /// The record the candidate was extracted from. Template variables
    /// resolve against this.
    pub record: Value,
    /// Where `body` lives in `record`, so expansions are visible to templates.
    body_path: Option<String>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            author: None,
            links: Vec::new(),
            media_count: 0,
            source_url: None,
            record: Value::Null,
            body_path: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_links(mut self, links: Vec<EmbeddedLink>) -> Self {
        self.links = links;
        self
    }

    pub fn with_media_count(mut self, count: usize) -> Self {
        self.media_count = count;
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_record(mut self, record: Value) -> Self {
        self.record = record;
        self
    }

    pub fn with_body_path(mut self, path: impl Into<String>) -> Self {
        self.body_path = Some(path.into());
        self
    }

    /// Extract a candidate from a raw record using the configured field map.
    pub fn from_record(record: Value, fields: &CandidateFields) -> Result<Self> {
        let text_at = |path: &str| -> Result<Option<String>> {
            match record::lookup(&record, path) {
                FieldLookup::Found(v) => Ok(Some(record::value_to_text(v))),
                FieldLookup::Missing => Ok(None),
                FieldLookup::Malformed(reason) => Err(FeedcasterError::Config(format!(
                    "candidate field '{}': {}",
                    path, reason
                ))),
            }
        };

        let body = text_at(&fields.body)?.unwrap_or_default();
        let id = match &fields.id {
            Some(path) => text_at(path)?,
            None => None,
        }
        .unwrap_or_else(|| body.chars().take(40).collect());
        let author = match &fields.author {
            Some(path) => text_at(path)?,
            None => None,
        };
        let source_url = match &fields.source_url {
            Some(path) => text_at(path)?,
            None => None,
        };

        let mut links = Vec::new();
        if let Some(path) = &fields.links {
            match record::lookup(&record, path) {
                FieldLookup::Found(Value::Array(items)) => {
                    for item in items {
                        let short = item.get(&fields.link_short).and_then(Value::as_str);
                        let expanded = item.get(&fields.link_expanded).and_then(Value::as_str);
                        if let (Some(short), Some(expanded)) = (short, expanded) {
                            links.push(EmbeddedLink::new(short, expanded));
                        }
                    }
                }
                FieldLookup::Malformed(reason) => {
                    return Err(FeedcasterError::Config(format!(
                        "candidate field '{}': {}",
                        path, reason
                    )))
                }
                _ => {}
            }
        }

        let media_count = match &fields.media {
            Some(path) => match record::lookup(&record, path) {
                FieldLookup::Found(Value::Array(items)) => items.len(),
                FieldLookup::Found(_) | FieldLookup::Missing => 0,
                FieldLookup::Malformed(reason) => {
                    return Err(FeedcasterError::Config(format!(
                        "candidate field '{}': {}",
                        path, reason
                    )))
                }
            },
            None => 0,
        };

        Ok(Self {
            id,
            body,
            author,
            links,
            media_count,
            source_url,
            record,
            body_path: Some(fields.body.clone()),
        })
    }

    /// Replace every short-form link in the body with its destination.
    /// Returns the number of links that were present in the body.
    pub fn expand_links(&mut self) -> usize {
        let mut expanded = 0;
        for link in &self.links {
            if !link.short.is_empty() && self.body.contains(&link.short) {
                self.body = self.body.replace(&link.short, &link.expanded);
                expanded += 1;
            }
        }
        if expanded > 0 {
            if let Some(path) = &self.body_path {
                record::set_path(&mut self.record, path, &self.body);
            }
        }
        expanded
    }
}

/// Where candidate attributes live inside a source record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CandidateFields {
    pub id: Option<String>,
    pub body: String,
    pub author: Option<String>,
    /// Array of link objects.
    pub links: Option<String>,
    /// Key of the short form inside each link object.
    pub link_short: String,
    /// Key of the expanded form inside each link object.
    pub link_expanded: String,
    /// Array of embedded media objects.
    pub media: Option<String>,
    pub source_url: Option<String>,
}

impl Default for CandidateFields {
    fn default() -> Self {
        Self {
            id: Some("id".to_string()),
            body: "text".to_string(),
            author: Some("user.screen_name".to_string()),
            links: Some("entities.urls".to_string()),
            link_short: "url".to_string(),
            link_expanded: "expanded_url".to_string(),
            media: Some("entities.media".to_string()),
            source_url: None,
        }
    }
}

impl CandidateFields {
    pub fn validate(&self) -> Result<()> {
        let paths = std::iter::once(Some(&self.body))
            .chain([
                self.id.as_ref(),
                self.author.as_ref(),
                self.links.as_ref(),
                self.media.as_ref(),
                self.source_url.as_ref(),
            ])
            .flatten();
        for path in paths {
            record::validate_path(path).map_err(|reason| {
                FeedcasterError::Config(format!("candidate field '{}': {}", path, reason))
            })?;
        }
        Ok(())
    }
}
