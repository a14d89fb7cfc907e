//! Budgeted template composition.
//!
//! Fixed variables are substituted first and cost their full length. The
//! first truncatable variable then gets whatever budget is left, measured
//! with every link counted at its shortened width. Lengths are byte lengths.

pub mod template;

use crate::classify::{AlbumCounter, AttachmentClassifier, AttachmentDecision};
use crate::config::ComposeConfig;
use crate::error::{FeedcasterError, Result};
use crate::record;
use crate::types::Candidate;
use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use template::{SpecialKind, TemplateVariable, VariableSource, DEFAULT_PERMALINK_PATH};
use template::CompiledVariable;

/// Composition flavour, tied to the kind of source records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComposeMode {
    /// Nested feed items. Mentions become `@\`.
    Feed,
    /// Flat records. Mentions become `#`.
    Record,
}

impl ComposeMode {
    pub fn mention_marker(self) -> &'static str {
        match self {
            ComposeMode::Feed => "@\\",
            ComposeMode::Record => "#",
        }
    }
}

impl std::fmt::Display for ComposeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComposeMode::Feed => write!(f, "feed"),
            ComposeMode::Record => write!(f, "record"),
        }
    }
}

/// Rendered message plus the attachment a special variable asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub text: String,
    pub attachment: Option<AttachmentDecision>,
}

pub struct Composer {
    format: String,
    max_length: usize,
    short_url_length: usize,
    /// `None` when mentions are allowed.
    mention_marker: Option<String>,
    mode: ComposeMode,
    variables: Vec<CompiledVariable>,
    classifier: AttachmentClassifier,
    links: Regex,
}

impl Composer {
    /// Compile the template. `default_mode` applies when the config leaves the
    /// mode unset.
    pub fn new(config: &ComposeConfig, default_mode: ComposeMode) -> Result<Self> {
        config.validate()?;

        let variables = config
            .variables
            .iter()
            .map(CompiledVariable::compile)
            .collect::<Result<Vec<_>>>()?;

        for var in &variables {
            if let VariableSource::Special { subject, .. } = &var.spec.source {
                match variables.iter().find(|v| &v.spec.token == subject) {
                    Some(v) if matches!(v.spec.source, VariableSource::Special { .. }) => {
                        return Err(FeedcasterError::Config(format!(
                            "template variable {}: subject {} is itself special",
                            var.spec.token, subject
                        )))
                    }
                    Some(_) => {}
                    None => {
                        return Err(FeedcasterError::Config(format!(
                            "template variable {}: subject {} is not defined",
                            var.spec.token, subject
                        )))
                    }
                }
            }
        }

        let mode = config.mode.unwrap_or(default_mode);
        let mention_marker = if config.allow_mentions {
            None
        } else {
            Some(
                config
                    .mention_marker
                    .clone()
                    .unwrap_or_else(|| mode.mention_marker().to_string()),
            )
        };

        Ok(Self {
            format: config.format.clone(),
            max_length: config.max_length,
            short_url_length: config.short_url_length,
            mention_marker,
            mode,
            variables,
            classifier: AttachmentClassifier::new()?,
            links: Regex::new(r"http(s?)://\S+")?,
        })
    }

    pub fn mode(&self) -> ComposeMode {
        self.mode
    }

    pub fn render(&self, candidate: &Candidate, counter: Option<&dyn AlbumCounter>) -> Result<Composition> {
        self.render_record(&candidate.record, counter)
    }

    pub fn render_record(&self, record: &Value, counter: Option<&dyn AlbumCounter>) -> Result<Composition> {
        let mut attachment = None;
        let mut text = self.format.clone();

        for var in self.variables.iter().filter(|v| !v.spec.truncate) {
            let value = self.resolve(var, record, counter, &mut attachment)?;
            text = text.replace(&var.spec.token, &value);
        }

        text = self.neutralize(&text);

        let mut budget = self.max_length as i64 - self.normalized_len(&text) as i64;

        let mut truncatable = self.variables.iter().filter(|v| v.spec.truncate);
        if let Some(var) = truncatable.next() {
            budget += var.spec.token.len() as i64;
            let raw = self.resolve(var, record, counter, &mut attachment)?;
            let value = self.neutralize(&html_unescape(&raw));

            let needed = self.normalized_len(&value) as i64;
            if needed <= budget {
                text = text.replace(&var.spec.token, &value);
            } else {
                let cut = truncate_bytes(&value, budget.max(0) as usize);
                log::debug!(
                    "Truncated {} from {} to {} bytes (budget {})",
                    var.spec.token,
                    value.len(),
                    cut.len(),
                    budget
                );
                text = text.replace(&var.spec.token, cut);
            }
        }

        for var in truncatable {
            let value = self.resolve(var, record, counter, &mut attachment)?;
            text = text.replace(&var.spec.token, &self.neutralize(&value));
        }

        Ok(Composition {
            text: text.trim().to_string(),
            attachment,
        })
    }

    /// Length of `text` with every link counted at its shortened width.
    pub fn normalized_len(&self, text: &str) -> usize {
        let mut len = text.len();
        for caps in self.links.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let secure = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            len = len - whole.len() + self.short_url_length + usize::from(secure);
        }
        len
    }

    fn neutralize(&self, text: &str) -> String {
        match &self.mention_marker {
            Some(marker) => text.replace('@', marker),
            None => text.to_string(),
        }
    }

    fn resolve(
        &self,
        var: &CompiledVariable,
        record: &Value,
        counter: Option<&dyn AlbumCounter>,
        attachment: &mut Option<AttachmentDecision>,
    ) -> Result<String> {
        let VariableSource::Special {
            special,
            subject,
            permalink_path,
        } = &var.spec.source
        else {
            return var.resolve_plain(record);
        };

        let subject_value = match self.variables.iter().find(|v| &v.spec.token == subject) {
            Some(v) => v.resolve_plain(record)?,
            None => String::new(),
        };
        if subject_value.is_empty() {
            log::warn!(
                "Special value {} has no subject: {} resolved empty",
                var.spec.token,
                subject
            );
            return Ok(String::new());
        }

        match special {
            SpecialKind::MediaType => {
                let path = permalink_path.as_deref().unwrap_or(DEFAULT_PERMALINK_PATH);
                let permalink = record::lookup(record, path).found().map(record::value_to_text);
                let decision = self
                    .classifier
                    .classify(&subject_value, permalink.as_deref(), counter);
                let tag = decision.kind.to_string();
                *attachment = decision.is_fetchable().then_some(decision);
                Ok(tag)
            }
        }
    }
}

/// Decode the HTML character references feeds carry, named or numeric.
/// Markup is kept as text; unknown references are left as written.
pub fn html_unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let fragment = Html::parse_fragment(&text.replace('<', "&lt;"));
    fragment.root_element().text().collect()
}

/// First `max` bytes of `text`, backed off to a char boundary.
fn truncate_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests;
