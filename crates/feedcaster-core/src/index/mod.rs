//! Exposure-tracked content index and the selector built on it.

pub mod library;
pub mod scan;
pub mod selector;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

pub use library::{ContentLibrary, INDEX_STATE_KEY};
pub use selector::SelectionPolicy;

/// One indexed piece of content and how often it has been posted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentEntry {
    /// Path relative to the universe root, `/` separated.
    pub id: String,
    pub count: u64,
}

/// Where an index came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    /// Persisted index still inside its max age.
    Cached,
    /// Fresh scan of the universe root.
    Scanned,
    /// The root does not exist; the index is empty.
    MissingRoot,
}

#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub index: ContentIndex,
    pub origin: IndexOrigin,
}

/// Identifier -> exposure count, kept in case-insensitive natural order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentIndex {
    entries: Vec<ContentEntry>,
    pub built_at: DateTime<Utc>,
}

impl ContentIndex {
    pub fn empty(built_at: DateTime<Utc>) -> Self {
        Self {
            entries: Vec::new(),
            built_at,
        }
    }

    /// Build from scanned identifiers, carrying over counts from `prior` for
    /// identifiers that still exist. Everything else starts at zero.
    pub fn from_identifiers<I>(ids: I, prior: Option<&ContentIndex>, built_at: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let carried: HashMap<&str, u64> = prior
            .map(|p| p.entries.iter().map(|e| (e.id.as_str(), e.count)).collect())
            .unwrap_or_default();

        let mut entries: Vec<ContentEntry> = ids
            .into_iter()
            .map(|id| {
                let count = carried.get(id.as_str()).copied().unwrap_or(0);
                ContentEntry { id, count }
            })
            .collect();
        entries.sort_by(|a, b| natural_cmp_ci(&a.id, &b.id));
        entries.dedup_by(|a, b| a.id == b.id);

        Self { entries, built_at }
    }

    /// Reuse `persisted` when younger than `max_age`, otherwise rescan `root`.
    pub fn rebuild(
        root: &Path,
        max_age: Duration,
        persisted: Option<ContentIndex>,
        now: DateTime<Utc>,
    ) -> RebuildOutcome {
        if let Some(index) = persisted.as_ref() {
            if index.is_fresh(max_age, now) {
                log::info!("Using cached content index ({} entries)", index.len());
                return RebuildOutcome {
                    index: index.clone(),
                    origin: IndexOrigin::Cached,
                };
            }
        }

        if !root.is_dir() {
            log::warn!("Content root {} does not exist", root.display());
            return RebuildOutcome {
                index: ContentIndex::empty(now),
                origin: IndexOrigin::MissingRoot,
            };
        }

        log::info!("Scanning {}", root.display());
        let ids = scan::scan_leaves(root);
        let index = ContentIndex::from_identifiers(ids, persisted.as_ref(), now);
        log::info!("Built content index with {} entries", index.len());

        RebuildOutcome {
            index,
            origin: IndexOrigin::Scanned,
        }
    }

    pub fn is_fresh(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now - self.built_at < max_age
    }

    pub fn entries(&self) -> &[ContentEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, id: &str) -> Option<u64> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.count)
    }

    /// Bump the exposure count of exactly one entry. Returns the new count,
    /// or `None` when the identifier is not indexed.
    pub fn record_selection(&mut self, id: &str) -> Option<u64> {
        let entry = self.entries.iter_mut().find(|e| e.id == id)?;
        entry.count += 1;
        Some(entry.count)
    }

    /// Entries whose identifier starts with `scope` (all entries when `None`).
    pub fn scoped<'a>(&'a self, scope: Option<&'a str>) -> impl Iterator<Item = &'a ContentEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| scope.map_or(true, |prefix| e.id.starts_with(prefix)))
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            total: self.entries.len(),
            unposted: 0,
            min_count: None,
            max_count: None,
            built_at: self.built_at,
        };
        for e in &self.entries {
            if e.count == 0 {
                stats.unposted += 1;
            }
            stats.min_count = Some(stats.min_count.map_or(e.count, |m| m.min(e.count)));
            stats.max_count = Some(stats.max_count.map_or(e.count, |m| m.max(e.count)));
        }
        stats
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub total: usize,
    pub unposted: usize,
    pub min_count: Option<u64>,
    pub max_count: Option<u64>,
    pub built_at: DateTime<Utc>,
}

/// Case-insensitive natural ordering: digit runs compare numerically, so
/// `img2` sorts before `img10`. Ties fall back to the raw byte order.
pub fn natural_cmp_ci(a: &str, b: &str) -> Ordering {
    let la = a.to_lowercase();
    let lb = b.to_lowercase();
    let mut ca = la.chars().peekable();
    let mut cb = lb.chars().peekable();

    loop {
        match (ca.peek().copied(), cb.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let na = take_digits(&mut ca);
                let nb = take_digits(&mut cb);
                let ta = na.trim_start_matches('0');
                let tb = nb.trim_start_matches('0');
                let ord = ta
                    .len()
                    .cmp(&tb.len())
                    .then_with(|| ta.cmp(tb))
                    .then_with(|| na.len().cmp(&nb.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                ca.next();
                cb.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut out = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        out.push(c);
        chars.next();
    }
    out
}
