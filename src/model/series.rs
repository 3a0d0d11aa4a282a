//! Tagged time series
//!
//! A `TimeSeries` pairs an immutable tag map with a fixed-step sequence
//! and a human-facing label. Tags are held in a `BTreeMap` so iteration
//! order, and everything derived from it, is deterministic.

use crate::model::TimeSeq;
use std::collections::BTreeMap;

/// Immutable tag-name to tag-value mapping
///
/// The reserved key `name` identifies the metric; other keys are user tags.
pub type TagMap = BTreeMap<String, String>;

/// The reserved tag key holding the metric identifier
pub const NAME_KEY: &str = "name";

/// A tagged, labelled, fixed-step series
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    tags: TagMap,
    label: String,
    data: TimeSeq,
}

impl TimeSeries {
    /// Create a series with a label derived from its tags
    pub fn new(tags: TagMap, data: TimeSeq) -> Self {
        let label = default_label(&tags);
        Self { tags, label, data }
    }

    /// Create a series with an explicit label
    pub fn with_label(tags: TagMap, label: impl Into<String>, data: TimeSeq) -> Self {
        Self {
            tags,
            label: label.into(),
            data,
        }
    }

    /// Tag map
    pub fn tags(&self) -> &TagMap {
        &self.tags
    }

    /// Human-facing label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Underlying sequence
    pub fn data(&self) -> &TimeSeq {
        &self.data
    }

    /// Consume into the underlying sequence
    pub fn into_data(self) -> TimeSeq {
        self.data
    }

    /// Value of the `name` tag, if present
    pub fn name(&self) -> Option<&str> {
        self.tags.get(NAME_KEY).map(String::as_str)
    }

    /// Replace the sequence, keeping tags and label
    pub fn with_data(&self, data: TimeSeq) -> TimeSeries {
        TimeSeries {
            tags: self.tags.clone(),
            label: self.label.clone(),
            data,
        }
    }

    /// Replace the label, keeping tags and data
    pub fn relabel(mut self, label: impl Into<String>) -> TimeSeries {
        self.label = label.into();
        self
    }

    /// True when the series window intersects `[start, end)`
    pub fn intersects(&self, start: i64, end: i64) -> bool {
        self.data.start() < end && self.data.end() > start
    }
}

/// Default label for a tag map
///
/// The metric name alone when it is the only tag, otherwise every pair as
/// `k=v` joined with commas in map order.
pub fn default_label(tags: &TagMap) -> String {
    if tags.len() == 1 {
        if let Some(name) = tags.get(NAME_KEY) {
            return name.clone();
        }
    }
    if tags.is_empty() {
        return "NO TAGS".to_string();
    }
    tags.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}
