//! Ordered admission rules applied to candidates before composition.
//!
//! Each candidate has its short links expanded first, then passes through the
//! text denylist, the author denylist and a weighted random admission roll.
//! The first failing rule drops it.

use crate::config::{AdmissionWeights, FilterConfig};
use crate::error::Result;
use crate::types::Candidate;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Quote-tweet markers rejected on every source.
pub const DEFAULT_TEXT_DENYLIST: &[&str] = &["\"@", "ô@", "â@", "“@"];

/// Which rule dropped a candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilterRule {
    Text,
    Author,
    Admission,
}

impl std::fmt::Display for FilterRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterRule::Text => write!(f, "text"),
            FilterRule::Author => write!(f, "author"),
            FilterRule::Admission => write!(f, "admission"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterRejection {
    pub rule: FilterRule,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterResult {
    Pass,
    Reject(FilterRejection),
}

/// Coarse content type used to pick an admission weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    Media,
    Urls,
    Mentions,
    Base,
}

impl ContentClass {
    pub fn of(candidate: &Candidate) -> Self {
        if candidate.media_count > 0 {
            ContentClass::Media
        } else if !candidate.links.is_empty() {
            ContentClass::Urls
        } else if candidate.body.starts_with('@') {
            ContentClass::Mentions
        } else {
            ContentClass::Base
        }
    }

    pub fn weight(self, weights: &AdmissionWeights) -> f64 {
        match self {
            ContentClass::Media => weights.media,
            ContentClass::Urls => weights.urls,
            ContentClass::Mentions => weights.mentions,
            ContentClass::Base => weights.base,
        }
    }
}

impl std::fmt::Display for ContentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentClass::Media => write!(f, "media"),
            ContentClass::Urls => write!(f, "urls"),
            ContentClass::Mentions => write!(f, "mentions"),
            ContentClass::Base => write!(f, "base"),
        }
    }
}

struct AuthorToken {
    token: String,
    mention: Regex,
}

pub struct FilterChain {
    text_denylist: Vec<String>,
    authors: Vec<AuthorToken>,
    weights: AdmissionWeights,
}

impl FilterChain {
    /// Build the chain. `account` is the posting account; mentions of it are
    /// always denied.
    pub fn new(config: &FilterConfig, account: Option<&str>) -> Result<Self> {
        config.validate()?;

        let mut text_denylist: Vec<String> = Vec::new();
        if config.default_quote_filters {
            text_denylist.extend(DEFAULT_TEXT_DENYLIST.iter().map(|s| s.to_string()));
        }
        text_denylist.extend(
            config
                .text
                .iter()
                .filter(|s| !s.is_empty())
                .map(|s| s.to_lowercase()),
        );

        let own = account
            .filter(|a| !a.is_empty())
            .map(|a| format!("@{}", a.trim_start_matches('@')));
        let mut authors = Vec::new();
        for token in own.iter().chain(config.authors.iter()) {
            let token = token.to_lowercase();
            if token.is_empty() {
                continue;
            }
            let mention = Regex::new(&format!(r"(?i)@\S*{}", regex::escape(&token)))?;
            authors.push(AuthorToken { token, mention });
        }

        Ok(Self {
            text_denylist,
            authors,
            weights: config.weights.clone(),
        })
    }

    /// Run every candidate through the chain with the thread RNG.
    pub fn admit(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        self.admit_with(candidates, &mut rand::thread_rng())
    }

    /// Order-preserving filter. Link expansion happens before any rule sees
    /// the body.
    pub fn admit_with<R: Rng + ?Sized>(&self, candidates: Vec<Candidate>, rng: &mut R) -> Vec<Candidate> {
        let total = candidates.len();
        let admitted: Vec<Candidate> = candidates
            .into_iter()
            .filter_map(|mut candidate| {
                candidate.expand_links();
                let roll: f64 = rng.gen();
                match self.check(&candidate, roll) {
                    FilterResult::Pass => Some(candidate),
                    FilterResult::Reject(rejection) => {
                        log::info!(
                            "Skipping {} ({} rule): {}",
                            candidate.id,
                            rejection.rule,
                            rejection.reason
                        );
                        None
                    }
                }
            })
            .collect();

        log::info!("Filter chain admitted {} of {} candidates", admitted.len(), total);
        admitted
    }

    /// Evaluate the rules in order against an already expanded candidate.
    /// `roll` is the admission draw in `[0, 1)`.
    pub fn check(&self, candidate: &Candidate, roll: f64) -> FilterResult {
        if let FilterResult::Reject(r) = self.check_text(candidate) {
            return FilterResult::Reject(r);
        }
        if let FilterResult::Reject(r) = self.check_author(candidate) {
            return FilterResult::Reject(r);
        }
        self.check_admission(candidate, roll)
    }

    /// Rule 1: lower-cased body must not contain a denylisted substring.
    pub fn check_text(&self, candidate: &Candidate) -> FilterResult {
        let body = candidate.body.to_lowercase();
        match self.text_denylist.iter().find(|needle| body.contains(needle.as_str())) {
            Some(needle) => FilterResult::Reject(FilterRejection {
                rule: FilterRule::Text,
                reason: format!(
                    "contains \"{}\": {}",
                    needle,
                    candidate.body.replace('\n', " ")
                ),
            }),
            None => FilterResult::Pass,
        }
    }

    /// Rule 2: neither the author nor any mentioned handle may contain a
    /// denylisted token.
    pub fn check_author(&self, candidate: &Candidate) -> FilterResult {
        let author = candidate.author.as_deref().unwrap_or("").to_lowercase();
        for entry in &self.authors {
            if !author.is_empty() && author.contains(&entry.token) {
                return FilterResult::Reject(FilterRejection {
                    rule: FilterRule::Author,
                    reason: format!("author contains \"{}\": {}", entry.token, author),
                });
            }
            if entry.mention.is_match(&candidate.body) {
                return FilterResult::Reject(FilterRejection {
                    rule: FilterRule::Author,
                    reason: format!(
                        "mentioned handle contains \"{}\": {}",
                        entry.token,
                        candidate.body.replace('\n', " ")
                    ),
                });
            }
        }
        FilterResult::Pass
    }

    /// Rule 3: weighted admission. Rejected when the roll exceeds the weight
    /// of the candidate's content class.
    pub fn check_admission(&self, candidate: &Candidate, roll: f64) -> FilterResult {
        let class = ContentClass::of(candidate);
        let weight = class.weight(&self.weights);
        if roll > weight {
            FilterResult::Reject(FilterRejection {
                rule: FilterRule::Admission,
                reason: format!("roll {:.3} above {} weight {:.2}", roll, class, weight),
            })
        } else {
            FilterResult::Pass
        }
    }
}
