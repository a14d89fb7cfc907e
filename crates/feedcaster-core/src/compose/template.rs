use crate::error::{FeedcasterError, Result};
use crate::record;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default location of a candidate's own permalink in feed records.
pub const DEFAULT_PERMALINK_PATH: &str = "data.permalink";

/// A placeholder in the message template and where its value comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateVariable {
    /// Literal text replaced in the template, e.g. `{title}`.
    pub token: String,
    pub source: VariableSource,
    /// May be shortened to fit the budget. Only the first such variable is.
    #[serde(default)]
    pub truncate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariableSource {
    /// Dotted path into the record. `regex` keeps the first capture group
    /// when it matches; `prefix` is prepended to whatever results.
    Path {
        path: String,
        #[serde(default)]
        default: Option<String>,
        #[serde(default)]
        regex: Option<String>,
        #[serde(default)]
        prefix: Option<String>,
    },
    /// Computed value derived from another variable.
    Special {
        special: SpecialKind,
        /// Token of the variable whose value is the input.
        subject: String,
        #[serde(default)]
        permalink_path: Option<String>,
    },
    /// Top-level key of a flat record, taken verbatim.
    Field {
        name: String,
        #[serde(default)]
        default: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpecialKind {
    /// Attachment tag of the subject URL (`image`, `album:3`, `link`, ...).
    MediaType,
}

impl std::fmt::Display for SpecialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecialKind::MediaType => write!(f, "media_type"),
        }
    }
}

impl TemplateVariable {
    pub fn path(token: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            source: VariableSource::Path {
                path: path.into(),
                default: None,
                regex: None,
                prefix: None,
            },
            truncate: false,
        }
    }

    pub fn field(token: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            source: VariableSource::Field {
                name: name.into(),
                default: None,
            },
            truncate: false,
        }
    }

    pub fn media_type(token: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            source: VariableSource::Special {
                special: SpecialKind::MediaType,
                subject: subject.into(),
                permalink_path: None,
            },
            truncate: false,
        }
    }

    pub fn truncatable(mut self) -> Self {
        self.truncate = true;
        self
    }

    /// Only meaningful for path sources.
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        match &mut self.source {
            VariableSource::Path { default, .. } | VariableSource::Field { default, .. } => {
                *default = Some(value.into())
            }
            VariableSource::Special { .. } => {}
        }
        self
    }

    pub fn with_regex(mut self, pattern: impl Into<String>) -> Self {
        if let VariableSource::Path { regex, .. } = &mut self.source {
            *regex = Some(pattern.into());
        }
        self
    }

    pub fn with_prefix(mut self, value: impl Into<String>) -> Self {
        if let VariableSource::Path { prefix, .. } = &mut self.source {
            *prefix = Some(value.into());
        }
        self
    }

    pub fn with_permalink_path(mut self, path: impl Into<String>) -> Self {
        if let VariableSource::Special { permalink_path, .. } = &mut self.source {
            *permalink_path = Some(path.into());
        }
        self
    }

    /// Shape checks that need no record.
    pub fn validate(&self) -> Result<()> {
        if self.token.is_empty() {
            return Err(FeedcasterError::Config(
                "template variable token is empty".into(),
            ));
        }
        let bad = |reason: String| {
            FeedcasterError::Config(format!("template variable {}: {}", self.token, reason))
        };
        match &self.source {
            VariableSource::Path { path, regex, .. } => {
                record::validate_path(path).map_err(bad)?;
                if let Some(pattern) = regex {
                    Regex::new(pattern).map_err(|e| bad(e.to_string()))?;
                }
            }
            VariableSource::Special {
                subject,
                permalink_path,
                ..
            } => {
                if subject.is_empty() {
                    return Err(bad("special value has no subject".into()));
                }
                if let Some(path) = permalink_path {
                    record::validate_path(path).map_err(bad)?;
                }
            }
            VariableSource::Field { name, .. } => {
                if name.is_empty() {
                    return Err(bad("field name is empty".into()));
                }
            }
        }
        Ok(())
    }
}

/// Variable with its regex compiled once per composer.
pub(crate) struct CompiledVariable {
    pub(crate) spec: TemplateVariable,
    pub(crate) regex: Option<Regex>,
}

impl CompiledVariable {
    pub(crate) fn compile(spec: &TemplateVariable) -> Result<Self> {
        spec.validate()?;
        let regex = match &spec.source {
            VariableSource::Path {
                regex: Some(pattern),
                ..
            } => Some(Regex::new(pattern)?),
            _ => None,
        };
        Ok(Self {
            spec: spec.clone(),
            regex,
        })
    }

    /// Resolve a plain (non-special) source against `record`.
    pub(crate) fn resolve_plain(&self, record: &serde_json::Value) -> Result<String> {
        match &self.spec.source {
            VariableSource::Path {
                path,
                default,
                prefix,
                ..
            } => {
                let mut value = match record::lookup(record, path) {
                    record::FieldLookup::Found(v) => record::value_to_text(v),
                    record::FieldLookup::Missing => default.clone().unwrap_or_default(),
                    record::FieldLookup::Malformed(reason) => {
                        return Err(FeedcasterError::Config(format!(
                            "template variable {}: {}",
                            self.spec.token, reason
                        )))
                    }
                };

                if let Some(re) = &self.regex {
                    let captured = re
                        .captures(&value)
                        .and_then(|caps| caps.get(1))
                        .map(|m| m.as_str().to_string())
                        .filter(|s| !s.is_empty());
                    if let Some(captured) = captured {
                        value = captured;
                    }
                }

                if let Some(prefix) = prefix.as_deref().filter(|p| !p.is_empty()) {
                    value.insert_str(0, prefix);
                }
                Ok(value)
            }
            VariableSource::Field { name, default } => Ok(match record::lookup_flat(record, name) {
                record::FieldLookup::Found(v) => record::value_to_text(v),
                _ => default.clone().unwrap_or_default(),
            }),
            VariableSource::Special { .. } => Err(FeedcasterError::Config(format!(
                "template variable {} is special and cannot be used as a subject",
                self.spec.token
            ))),
        }
    }
}
