//! Incremental selection over a fetched JSON feed document.

use crate::config::FeedConfig;
use crate::error::{FeedcasterError, Result};
use crate::record::{self, FieldLookup};
use crate::storage::{load_state, save_state, StateStore};
use serde_json::Value;

/// State key of the newest timestamp seen on the previous run.
pub const LAST_MAX_TIMESTAMP_KEY: &str = "last_max_timestamp";

#[derive(Debug, Clone, PartialEq)]
pub struct FeedSelection {
    pub items: Vec<Value>,
    /// Highest positive timestamp among `items`.
    pub newest_timestamp: Option<f64>,
}

/// Keep the newest `max_items` nodes under the root node and drop those not
/// newer than `last_max`. Nodes without a numeric timestamp are kept.
pub fn select_new_items(document: &Value, config: &FeedConfig, last_max: Option<f64>) -> Result<FeedSelection> {
    let nodes: &[Value] = match &config.root_node {
        Some(path) => match record::lookup(document, path) {
            FieldLookup::Found(Value::Array(items)) => items.as_slice(),
            FieldLookup::Found(_) => {
                log::warn!("Feed root node '{}' is not a list", path);
                &[]
            }
            FieldLookup::Missing => {
                log::warn!("Feed has no root node '{}'", path);
                &[]
            }
            FieldLookup::Malformed(reason) => {
                return Err(FeedcasterError::Config(format!("feed.root_node: {}", reason)))
            }
        },
        None => match document {
            Value::Array(items) => items.as_slice(),
            _ => {
                log::warn!("Feed document is not a list and no root node is configured");
                &[]
            }
        },
    };

    let start = nodes.len().saturating_sub(config.max_items);
    let recent = &nodes[start..];

    let timestamp_of = |node: &Value| -> Result<Option<f64>> {
        let Some(field) = &config.timestamp_field else {
            return Ok(None);
        };
        match record::lookup(node, field) {
            FieldLookup::Found(v) => Ok(record::value_as_f64(v).filter(|t| *t > 0.0)),
            FieldLookup::Missing => Ok(None),
            FieldLookup::Malformed(reason) => Err(FeedcasterError::Config(format!(
                "feed.timestamp_field: {}",
                reason
            ))),
        }
    };

    let last_max = last_max.filter(|t| *t > 0.0);
    let mut items = Vec::with_capacity(recent.len());
    let mut newest: Option<f64> = None;
    for node in recent {
        let ts = timestamp_of(node)?;
        if let (Some(ts), Some(last)) = (ts, last_max) {
            if ts <= last {
                continue;
            }
        }
        if let Some(ts) = ts {
            newest = Some(newest.map_or(ts, |n| n.max(ts)));
        }
        items.push(node.clone());
    }

    log::info!(
        "Feed: {} nodes, {} considered, {} new",
        nodes.len(),
        recent.len(),
        items.len()
    );

    Ok(FeedSelection {
        items,
        newest_timestamp: newest,
    })
}

/// Select new items against the persisted cursor and advance it.
pub fn take_new_items(store: &mut dyn StateStore, document: &Value, config: &FeedConfig) -> Result<Vec<Value>> {
    let last_max: Option<f64> = load_state(&*store, LAST_MAX_TIMESTAMP_KEY)?;
    let selection = select_new_items(document, config, last_max)?;

    if let Some(newest) = selection.newest_timestamp {
        save_state(store, LAST_MAX_TIMESTAMP_KEY, &timestamp_value(newest))?;
        store.flush()?;
        log::debug!("Feed cursor advanced to {}", newest);
    }

    Ok(selection.items)
}

/// Whole timestamps are stored as integers.
fn timestamp_value(ts: f64) -> Value {
    if ts.fract() == 0.0 && ts < i64::MAX as f64 {
        Value::from(ts as i64)
    } else {
        Value::from(ts)
    }
}
