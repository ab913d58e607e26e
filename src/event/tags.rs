//! Tag lists carried by tag events.
//!
//! ```rust
//! use padflow::event::{TagList, TagValue};
//!
//! let mut tags = TagList::new();
//! tags.set("title", "Morning Show");
//! tags.set("bitrate", 128_000u64);
//!
//! assert_eq!(tags.get_str("title"), Some("Morning Show"));
//! assert_eq!(tags.get("bitrate"), Some(&TagValue::UInt(128_000)));
//! ```

use std::collections::BTreeMap;

/// A single tag value.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// Text.
    String(String),
    /// Unsigned integer.
    UInt(u64),
    /// Signed integer.
    Int(i64),
    /// Boolean.
    Bool(bool),
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        TagValue::String(s.to_string())
    }
}

impl From<String> for TagValue {
    fn from(s: String) -> Self {
        TagValue::String(s)
    }
}

impl From<u64> for TagValue {
    fn from(v: u64) -> Self {
        TagValue::UInt(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Int(v)
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Bool(v)
    }
}

/// An ordered set of named tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagList {
    tags: BTreeMap<String, TagValue>,
}

impl TagList {
    /// Create an empty tag list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a tag, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<TagValue>) {
        self.tags.insert(name.into(), value.into());
    }

    /// Get a tag value.
    pub fn get(&self, name: &str) -> Option<&TagValue> {
        self.tags.get(name)
    }

    /// Get a string tag.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.tags.get(name) {
            Some(TagValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Merge `other` into `self`; tags in `other` win.
    pub fn merge(&mut self, other: &TagList) {
        for (k, v) in &other.tags {
            self.tags.insert(k.clone(), v.clone());
        }
    }
}
