use crate::compose::{ComposeMode, TemplateVariable};
use crate::error::{FeedcasterError, Result};
use crate::record;
use crate::types::CandidateFields;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything the pipeline needs, minus credentials and collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub index: IndexConfig,
    pub filter: FilterConfig,
    pub compose: ComposeConfig,
    pub feed: FeedConfig,
    pub candidate: CandidateFields,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(mut self, index: IndexConfig) -> Self {
        self.index = index;
        self
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_compose(mut self, compose: ComposeConfig) -> Self {
        self.compose = compose;
        self
    }

    pub fn with_feed(mut self, feed: FeedConfig) -> Self {
        self.feed = feed;
        self
    }

    /// Source-independent checks. Source-specific required keys are checked
    /// where the source is opened.
    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;
        self.compose.validate()?;
        self.feed.validate()?;
        self.candidate.validate()?;
        Ok(())
    }
}

/// Content index for the folder source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Universe root. Required for the folder source.
    pub folder: Option<PathBuf>,

    /// Rebuild the index when older than this. Default: 86400 (one day).
    pub max_index_age_secs: u64,

    /// Never post the same file twice. Default: false.
    pub post_only_once: bool,

    /// Only select identifiers starting with this prefix.
    pub scope: Option<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            folder: None,
            max_index_age_secs: 86_400,
            post_only_once: false,
            scope: None,
        }
    }
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn with_max_index_age_secs(mut self, secs: u64) -> Self {
        self.max_index_age_secs = secs;
        self
    }

    pub fn with_post_only_once(mut self, once: bool) -> Self {
        self.post_only_once = once;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn root(&self) -> Option<PathBuf> {
        self.folder.clone()
    }

    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.max_index_age_secs).unwrap_or(i64::MAX))
    }
}

/// Admission weight per coarse content class, each in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdmissionWeights {
    pub media: f64,
    pub urls: f64,
    pub mentions: f64,
    pub base: f64,
}

impl Default for AdmissionWeights {
    fn default() -> Self {
        Self {
            media: 1.0,
            urls: 0.8,
            mentions: 0.5,
            base: 0.7,
        }
    }
}

impl AdmissionWeights {
    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [
            ("media", self.media),
            ("urls", self.urls),
            ("mentions", self.mentions),
            ("base", self.base),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(FeedcasterError::Config(format!(
                    "filter.weights.{} must be between 0.0 and 1.0 (got {})",
                    name, weight
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    /// Substrings that drop a candidate, matched against the lower-cased body.
    pub text: Vec<String>,

    /// Tokens matched against the author and mentioned handles.
    pub authors: Vec<String>,

    /// Include the quote-tweet markers. Default: true.
    pub default_quote_filters: bool,

    pub weights: AdmissionWeights,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            text: Vec::new(),
            authors: Vec::new(),
            default_quote_filters: true,
            weights: AdmissionWeights::default(),
        }
    }
}

impl FilterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: Vec<String>) -> Self {
        self.text = text;
        self
    }

    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.authors = authors;
        self
    }

    pub fn with_weights(mut self, weights: AdmissionWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.weights.validate()
    }
}

/// Message template and length accounting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComposeConfig {
    /// Resolution mode. Defaults to the mode implied by the source.
    pub mode: Option<ComposeMode>,

    /// Template with placeholder tokens. Required.
    pub format: String,

    /// Hard budget in bytes. Default: 280.
    pub max_length: usize,

    /// Length a shortened link counts for. `https` links count one more.
    /// Default: 23.
    pub short_url_length: usize,

    /// Leave `@` untouched. Default: false.
    pub allow_mentions: bool,

    /// Replacement for `@` when mentions are disallowed. Defaults to the
    /// mode's marker.
    pub mention_marker: Option<String>,

    pub variables: Vec<TemplateVariable>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            mode: None,
            format: String::new(),
            max_length: 280,
            short_url_length: 23,
            allow_mentions: false,
            mention_marker: None,
            variables: Vec::new(),
        }
    }
}

impl ComposeConfig {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: ComposeMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_max_length(mut self, max: usize) -> Self {
        self.max_length = max;
        self
    }

    pub fn with_short_url_length(mut self, len: usize) -> Self {
        self.short_url_length = len;
        self
    }

    pub fn with_allow_mentions(mut self, allow: bool) -> Self {
        self.allow_mentions = allow;
        self
    }

    pub fn with_mention_marker(mut self, marker: impl Into<String>) -> Self {
        self.mention_marker = Some(marker.into());
        self
    }

    pub fn with_variable(mut self, variable: TemplateVariable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.format.trim().is_empty() {
            return Err(FeedcasterError::Config("compose.format is required".into()));
        }
        if self.max_length == 0 {
            return Err(FeedcasterError::Config(
                "compose.max_length must be > 0".into(),
            ));
        }
        for variable in &self.variables {
            variable.validate()?;
        }
        Ok(())
    }
}

/// Remote JSON feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
    /// Required for the feed source.
    pub url: Option<String>,

    /// Path to the item array inside the document; the document itself when
    /// unset.
    pub root_node: Option<String>,

    /// Numeric field used as the incremental cursor.
    pub timestamp_field: Option<String>,

    /// Only the newest items are considered. Default: 10.
    pub max_items: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: None,
            root_node: None,
            timestamp_field: None,
            max_items: 10,
        }
    }
}

impl FeedConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_root_node(mut self, path: impl Into<String>) -> Self {
        self.root_node = Some(path.into());
        self
    }

    pub fn with_timestamp_field(mut self, path: impl Into<String>) -> Self {
        self.timestamp_field = Some(path.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_items == 0 {
            return Err(FeedcasterError::Config("feed.max_items must be > 0".into()));
        }
        for (key, path) in [
            ("feed.root_node", &self.root_node),
            ("feed.timestamp_field", &self.timestamp_field),
        ] {
            if let Some(path) = path {
                record::validate_path(path)
                    .map_err(|reason| FeedcasterError::Config(format!("{}: {}", key, reason)))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.compose.max_length, 280);
        assert_eq!(config.compose.short_url_length, 23);
        assert!(!config.compose.allow_mentions);
        assert_eq!(config.feed.max_items, 10);
        assert!(config.filter.default_quote_filters);
        assert_eq!(config.filter.weights.urls, 0.8);
        assert_eq!(config.index.max_age(), chrono::Duration::days(1));
    }

    #[test]
    fn weights_out_of_range_are_rejected() {
        let config = FilterConfig::new().with_weights(AdmissionWeights {
            mentions: 1.5,
            ..Default::default()
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mentions"));
    }

    #[test]
    fn missing_format_is_fatal() {
        let err = ComposeConfig::default().validate().unwrap_err();
        assert!(err.is_fatal());
        assert!(ComposeConfig::new("{title}").validate().is_ok());
    }

    #[test]
    fn malformed_feed_paths_are_rejected() {
        let feed = FeedConfig::default().with_root_node("data..children");
        assert!(feed.validate().is_err());
        let feed = FeedConfig::default().with_root_node("data.children");
        assert!(feed.validate().is_ok());
    }
}
