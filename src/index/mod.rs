//! Tag index - the queryable series corpus
//!
//! The evaluator reaches data exclusively through the [`TagIndex`] trait,
//! so a corpus can be backed by anything that can enumerate tagged series.
//! [`MemoryTagIndex`] is the in-process implementation used by the CLI and
//! tests.
//!
//! # Design Notes
//! - Read-only and shareable across concurrent requests
//! - Results are sorted for deterministic downstream ordering
//! - A predicate over missing tags yields an empty result, never an error

mod group;
mod predicate;

pub use group::{group_by, reduce_all, Reducer};
pub use predicate::{Query, TagRegex};

use crate::model::TimeSeries;
use std::io;

/// Read-only access to a corpus of tagged series
///
/// Implementations must be internally immutable or synchronise reads;
/// one instance may serve many concurrent evaluations.
pub trait TagIndex: Send + Sync {
    /// Series matching `query` whose windows intersect `[start, end)`
    ///
    /// The result is sorted by label then tags so evaluation order is
    /// deterministic. I/O-backed implementations surface failures as
    /// `io::Error`; they are never folded into evaluation errors.
    fn find(&self, query: &Query, start: i64, end: i64) -> io::Result<Vec<TimeSeries>>;

    /// Every tag key present in the corpus, sorted
    ///
    /// Serves validation and autocompletion; not on the rendering path.
    fn all_tag_keys(&self) -> Vec<String>;
}

/// An in-memory, immutable corpus
#[derive(Debug, Default)]
pub struct MemoryTagIndex {
    series: Vec<TimeSeries>,
}

impl MemoryTagIndex {
    /// Build from a list of series
    pub fn new(series: Vec<TimeSeries>) -> Self {
        Self { series }
    }

    /// Number of series held
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Check if the corpus holds no series
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl TagIndex for MemoryTagIndex {
    fn find(&self, query: &Query, start: i64, end: i64) -> io::Result<Vec<TimeSeries>> {
        let mut out: Vec<TimeSeries> = self
            .series
            .iter()
            .filter(|s| s.intersects(start, end) && query.matches(s.tags()))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.label()
                .cmp(b.label())
                .then_with(|| a.tags().cmp(b.tags()))
        });
        Ok(out)
    }

    fn all_tag_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .series
            .iter()
            .flat_map(|s| s.tags().keys().cloned())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}
