//! Ordered key/value journal entry.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ObjectId;

/// Ordered `(":key", value)` pairs describing one object's loggable state.
///
/// Keys keep insertion order; the journal compares entries field by field to
/// decide whether a modification happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEntry {
    fields: Vec<(String, String)>,
}

impl LogEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `key` with the `Display` form of `value`. A repeated key
    /// replaces the earlier value in place.
    pub fn add(&mut self, key: &str, value: impl Display) {
        let value = value.to_string();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    /// Booleans are written as `0`/`1`.
    pub fn add_bool(&mut self, key: &str, value: bool) {
        self.add(key, if value { 1 } else { 0 });
    }

    pub fn add_id(&mut self, key: &str, id: Option<ObjectId>) {
        match id {
            Some(id) => self.add(key, id),
            None => self.add(key, "0x0"),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.parse::<i64>(key).map(|v| v != 0)
    }

    /// A zero id means "none".
    pub fn id(&self, key: &str) -> Option<ObjectId> {
        self.get(key)
            .and_then(ObjectId::from_hex)
            .filter(|id| id.get() != 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{} {}", k, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let mut e = LogEntry::new();
        e.add(":start", 100u64);
        e.add_id(":sequence", Some(ObjectId::new(0x1F)));
        e.add_bool(":selected", true);
        assert_eq!(e.to_string(), ":start 100 :sequence 0x1F :selected 1");
    }

    #[test]
    fn typed_access() {
        let mut e = LogEntry::new();
        e.add(":y", 0.25f32);
        e.add_bool(":selected", false);
        e.add_id(":sequence", None);
        assert_eq!(e.parse::<f32>(":y"), Some(0.25));
        assert_eq!(e.bool(":selected"), Some(false));
        assert_eq!(e.id(":sequence"), None);
        assert_eq!(e.parse::<u64>(":missing"), None);
    }

    #[test]
    fn repeated_key_replaces() {
        let mut e = LogEntry::new();
        e.add(":start", 1);
        e.add(":start", 2);
        assert_eq!(e.len(), 1);
        assert_eq!(e.get(":start"), Some("2"));
    }

    #[test]
    fn serializes_as_pairs() {
        let mut e = LogEntry::new();
        e.add(":start", 5);
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"[[":start","5"]]"#);
        let back: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
