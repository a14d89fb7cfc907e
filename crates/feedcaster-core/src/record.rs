//! Path lookups into raw JSON records (feed items, flat database rows).
//!
//! Paths are dot separated (`data.permalink`, `entities.urls.0.url`).
//! Numeric segments index into arrays.

use serde_json::Value;

/// Outcome of resolving a path against a record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldLookup<'a> {
    Found(&'a Value),
    /// Path is well formed but the record does not carry it (or it is null).
    Missing,
    /// The path itself cannot be resolved against any record.
    Malformed(String),
}

impl<'a> FieldLookup<'a> {
    pub fn found(self) -> Option<&'a Value> {
        match self {
            FieldLookup::Found(v) => Some(v),
            _ => None,
        }
    }
}

/// Check that a path is usable without touching a record.
pub fn validate_path(path: &str) -> std::result::Result<(), String> {
    if path.trim().is_empty() {
        return Err("path is empty".to_string());
    }
    if path.split('.').any(|segment| segment.trim().is_empty()) {
        return Err(format!("path '{}' has an empty segment", path));
    }
    Ok(())
}

pub fn lookup<'a>(record: &'a Value, path: &str) -> FieldLookup<'a> {
    if let Err(reason) = validate_path(path) {
        return FieldLookup::Malformed(reason);
    }

    let mut node = record;
    for segment in path.split('.') {
        let next = match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(Value::Null) | None => return FieldLookup::Missing,
            Some(v) => node = v,
        }
    }

    FieldLookup::Found(node)
}

/// Top-level key lookup used by flat records. The key is taken verbatim.
pub fn lookup_flat<'a>(record: &'a Value, key: &str) -> FieldLookup<'a> {
    if key.is_empty() {
        return FieldLookup::Malformed("field name is empty".to_string());
    }
    match record.get(key) {
        Some(Value::Null) | None => FieldLookup::Missing,
        Some(v) => FieldLookup::Found(v),
    }
}

/// Overwrite an existing string at `path`. Returns false when the path does
/// not lead to an existing value.
pub fn set_path(record: &mut Value, path: &str, value: &str) -> bool {
    if validate_path(path).is_err() {
        return false;
    }

    let mut node = record;
    for segment in path.split('.') {
        let next = match node {
            Value::Object(map) => map.get_mut(segment),
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(i) => items.get_mut(i),
                Err(_) => None,
            },
            _ => None,
        };
        match next {
            Some(v) => node = v,
            None => return false,
        }
    }

    *node = Value::String(value.to_string());
    true
}

/// Render a record value as template text.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Numeric view of a value; numeric strings count.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_nested_and_indexed() {
        let record = json!({"data": {"permalink": "/r/x/1", "urls": [{"url": "a"}]}});
        assert_eq!(
            lookup(&record, "data.permalink").found(),
            Some(&json!("/r/x/1"))
        );
        assert_eq!(lookup(&record, "data.urls.0.url").found(), Some(&json!("a")));
    }

    #[test]
    fn lookup_distinguishes_missing_and_malformed() {
        let record = json!({"a": {"b": null}});
        assert_eq!(lookup(&record, "a.c"), FieldLookup::Missing);
        assert_eq!(lookup(&record, "a.b"), FieldLookup::Missing);
        assert!(matches!(lookup(&record, "a..b"), FieldLookup::Malformed(_)));
        assert!(matches!(lookup(&record, ""), FieldLookup::Malformed(_)));
    }

    #[test]
    fn lookup_through_scalar_is_missing() {
        let record = json!({"a": "text"});
        assert_eq!(lookup(&record, "a.b"), FieldLookup::Missing);
    }

    #[test]
    fn flat_lookup_keeps_dots_in_key() {
        let record = json!({"file.name": "x.png", "file": {"name": "nested"}});
        assert_eq!(lookup_flat(&record, "file.name").found(), Some(&json!("x.png")));
    }

    #[test]
    fn set_path_overwrites_existing_only() {
        let mut record = json!({"text": "old", "user": {}});
        assert!(set_path(&mut record, "text", "new"));
        assert_eq!(record["text"], json!("new"));
        assert!(!set_path(&mut record, "user.name", "x"));
    }

    #[test]
    fn text_rendering() {
        assert_eq!(value_to_text(&json!(12)), "12");
        assert_eq!(value_to_text(&json!(true)), "true");
        assert_eq!(value_to_text(&json!("s")), "s");
        assert_eq!(value_as_f64(&json!("1700000000")), Some(1_700_000_000.0));
    }
}
