use super::{ContentEntry, ContentIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How the next piece of content is chosen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Uniform pick among the entries with the lowest exposure count.
    #[default]
    LeastExposed,
    /// Uniform pick among entries never posted. No fallback when none remain.
    NeverExposed,
}

impl std::fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionPolicy::LeastExposed => write!(f, "least_exposed"),
            SelectionPolicy::NeverExposed => write!(f, "never_exposed"),
        }
    }
}

impl ContentIndex {
    /// Pick an identifier under `policy`, restricted to `scope` when given.
    /// `None` means nothing is available, which callers must not paper over.
    pub fn select<'a, R: Rng + ?Sized>(
        &'a self,
        policy: SelectionPolicy,
        scope: Option<&str>,
        rng: &mut R,
    ) -> Option<&'a str> {
        let in_scope = |e: &&ContentEntry| scope.map_or(true, |prefix| e.id.starts_with(prefix));

        let target = match policy {
            SelectionPolicy::LeastExposed => self.entries().iter().filter(in_scope).map(|e| e.count).min()?,
            SelectionPolicy::NeverExposed => 0,
        };

        let pool: Vec<&'a str> = self
            .entries()
            .iter()
            .filter(in_scope)
            .filter(|e| e.count == target)
            .map(|e| e.id.as_str())
            .collect();

        pool.choose(rng).copied()
    }
}
