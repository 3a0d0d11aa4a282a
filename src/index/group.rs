//! Aggregation and group-by partitioning
//!
//! Reductions fold a set of aligned series into one series per step,
//! skipping NaN inputs. A step where every input is NaN stays NaN.

use crate::model::{TagMap, TimeSeq, TimeSeries};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Elementwise reduction applied across member series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    /// Sum of non-NaN inputs
    Sum,
    /// Count of non-NaN inputs
    Count,
    /// Minimum of non-NaN inputs
    Min,
    /// Maximum of non-NaN inputs
    Max,
    /// Mean of non-NaN inputs
    Avg,
}

impl Reducer {
    /// Reduce the samples of one step
    ///
    /// NaN inputs are skipped; all-NaN steps reduce to NaN.
    pub fn reduce(&self, samples: impl Iterator<Item = f64>) -> f64 {
        let mut acc = f64::NAN;
        let mut count = 0_u64;
        for v in samples {
            if v.is_nan() {
                continue;
            }
            count += 1;
            if count == 1 {
                acc = v;
                continue;
            }
            acc = match self {
                Reducer::Sum | Reducer::Avg => acc + v,
                Reducer::Count => acc,
                Reducer::Min => acc.min(v),
                Reducer::Max => acc.max(v),
            };
        }
        if count == 0 {
            return f64::NAN;
        }
        match self {
            Reducer::Count => count as f64,
            Reducer::Avg => acc / count as f64,
            _ => acc,
        }
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reducer::Sum => write!(f, "sum"),
            Reducer::Count => write!(f, "count"),
            Reducer::Min => write!(f, "min"),
            Reducer::Max => write!(f, "max"),
            Reducer::Avg => write!(f, "avg"),
        }
    }
}

/// Fold aligned series into a single sequence
///
/// Returns `None` for an empty input set: an absent metric yields no
/// line rather than an all-NaN one. All members must share the grid of
/// the first; the caller normalizes beforehand.
pub fn reduce_all(series: &[TimeSeries], reducer: Reducer) -> Option<TimeSeq> {
    let first = series.first()?;
    let start = first.data().start();
    let step = first.data().step();
    let len = first.data().len();
    let values = (0..len)
        .map(|i| reducer.reduce(series.iter().map(|s| s.data().get(i))))
        .collect();
    // Members share the first series' validated grid
    Some(TimeSeq::new(start, step, values).expect("reduced grid matches a validated input grid"))
}

/// Partition series by the values of `keys` and reduce each group
///
/// One output per distinct value tuple, carrying exactly the group-by
/// tags, labelled `k1=v1,k2=v2` in key order. Series missing any key are
/// dropped. Output is sorted lexicographically by the value tuple, which
/// fixes legend and stack layering order downstream.
pub fn group_by(series: &[TimeSeries], keys: &[String], reducer: Reducer) -> Vec<TimeSeries> {
    let mut groups: BTreeMap<Vec<String>, Vec<TimeSeries>> = BTreeMap::new();
    for s in series {
        let tuple: Option<Vec<String>> = keys
            .iter()
            .map(|k| s.tags().get(k).cloned())
            .collect();
        if let Some(tuple) = tuple {
            groups.entry(tuple).or_default().push(s.clone());
        }
    }

    groups
        .into_iter()
        .filter_map(|(tuple, members)| {
            let data = reduce_all(&members, reducer)?;
            let tags: TagMap = keys.iter().cloned().zip(tuple.iter().cloned()).collect();
            let label = keys
                .iter()
                .zip(tuple.iter())
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(",");
            Some(TimeSeries::with_label(tags, label, data))
        })
        .collect()
}
