//! Fixed-step time sequences
//!
//! A `TimeSeq` is the fundamental unit of data in the engine: a start
//! instant aligned to a step, and one `f64` sample per step. Missing
//! samples are NaN. All arithmetic is elementwise and NaN-propagating:
//! `NaN op x = NaN`, `0/0 = NaN`, `x/0 = ±inf`.

use crate::model::error::{DataError, DataResult};
use serde::{Deserialize, Serialize};

/// A fixed-step sequence of samples
///
/// Covers the half-open window `[start, start + step * len)`. Immutable
/// after construction; every transforming method returns a new sequence.
#[derive(Debug, Clone, Serialize)]
pub struct TimeSeq {
    /// Window start in epoch millis, always a multiple of `step`
    start: i64,
    /// Sample interval in millis, always positive
    step: i64,
    /// One sample per step; NaN marks a missing sample
    #[serde(with = "crate::model::time_seq::nan_values")]
    values: Vec<f64>,
}

impl TimeSeq {
    /// Create a sequence, validating the grid
    pub fn new(start: i64, step: i64, values: Vec<f64>) -> DataResult<Self> {
        if step <= 0 {
            return Err(DataError::InvalidSeqSpec(format!(
                "step must be positive, got {}",
                step
            )));
        }
        if start.rem_euclid(step) != 0 {
            return Err(DataError::InvalidSeqSpec(format!(
                "start {} is not aligned to step {}",
                start, step
            )));
        }
        Ok(Self {
            start,
            step,
            values,
        })
    }

    /// A sequence of `n` copies of `value` on the given grid
    pub fn constant(start: i64, step: i64, n: usize, value: f64) -> DataResult<Self> {
        Self::new(start, step, vec![value; n])
    }

    /// Window start in epoch millis
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Sample interval in millis
    pub fn step(&self) -> i64 {
        self.step
    }

    /// Exclusive window end in epoch millis
    pub fn end(&self) -> i64 {
        self.start + self.step * self.values.len() as i64
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the sequence holds no samples
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw sample slice
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Sample at index `i`, NaN when out of range
    pub fn get(&self, i: usize) -> f64 {
        self.values.get(i).copied().unwrap_or(f64::NAN)
    }

    /// Sample covering instant `t`, NaN outside the window
    pub fn value_at(&self, t: i64) -> f64 {
        if t < self.start {
            return f64::NAN;
        }
        let i = (t - self.start) / self.step;
        self.get(i as usize)
    }

    /// Iterate `(time, value)` pairs in window order
    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        let start = self.start;
        let step = self.step;
        self.values
            .iter()
            .enumerate()
            .map(move |(i, v)| (start + step * i as i64, *v))
    }

    /// Restrict to `[start, end)`, truncating or NaN-padding as needed
    ///
    /// The requested bounds are floor-aligned to the sequence step, so the
    /// returned window always sits on the grid.
    pub fn bounded(&self, start: i64, end: i64) -> DataResult<TimeSeq> {
        let s = start - start.rem_euclid(self.step);
        let e = end - end.rem_euclid(self.step);
        if e < s {
            return Err(DataError::InvalidSeqSpec(format!(
                "bounded window end {} precedes start {}",
                end, start
            )));
        }
        let n = ((e - s) / self.step) as usize;
        let values = (0..n)
            .map(|i| self.value_at(s + self.step * i as i64))
            .collect();
        TimeSeq::new(s, self.step, values)
    }

    /// Elementwise transform
    pub fn map(&self, f: impl Fn(f64) -> f64) -> TimeSeq {
        TimeSeq {
            start: self.start,
            step: self.step,
            values: self.values.iter().map(|v| f(*v)).collect(),
        }
    }

    /// Elementwise combination with another sequence on the same grid
    ///
    /// Sequences on differing grids are a hard error, not a resample.
    pub fn combine(&self, other: &TimeSeq, f: impl Fn(f64, f64) -> f64) -> DataResult<TimeSeq> {
        if self.start != other.start || self.step != other.step || self.len() != other.len() {
            return Err(DataError::Misaligned(format!(
                "cannot combine [start={}, step={}, len={}] with [start={}, step={}, len={}]",
                self.start,
                self.step,
                self.len(),
                other.start,
                other.step,
                other.len()
            )));
        }
        Ok(TimeSeq {
            start: self.start,
            step: self.step,
            values: self
                .values
                .iter()
                .zip(other.values.iter())
                .map(|(a, b)| f(*a, *b))
                .collect(),
        })
    }

    /// Combine with a scalar on the right-hand side
    pub fn combine_scalar(&self, scalar: f64, f: impl Fn(f64, f64) -> f64) -> TimeSeq {
        self.map(|v| f(v, scalar))
    }

    /// Smallest finite sample, `None` when all samples are NaN
    pub fn min_finite(&self) -> Option<f64> {
        fold_finite(&self.values, f64::INFINITY, f64::min)
    }

    /// Largest finite sample, `None` when all samples are NaN
    pub fn max_finite(&self) -> Option<f64> {
        fold_finite(&self.values, f64::NEG_INFINITY, f64::max)
    }

    /// True when no sample is a number
    pub fn all_nan(&self) -> bool {
        self.values.iter().all(|v| v.is_nan())
    }
}

/// Sample-wise equality where NaN equals NaN, so codec round-trips of
/// sequences with gaps compare equal.
impl PartialEq for TimeSeq {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start
            && self.step == other.step
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|(a, b)| a == b || (a.is_nan() && b.is_nan()))
    }
}

fn fold_finite(values: &[f64], init: f64, f: impl Fn(f64, f64) -> f64) -> Option<f64> {
    let mut acc = init;
    let mut seen = false;
    for v in values {
        if v.is_finite() {
            acc = f(acc, *v);
            seen = true;
        }
    }
    seen.then_some(acc)
}

impl<'de> Deserialize<'de> for TimeSeq {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            start: i64,
            step: i64,
            #[serde(with = "nan_values")]
            values: Vec<f64>,
        }
        let raw = Raw::deserialize(deserializer)?;
        TimeSeq::new(raw.start, raw.step, raw.values).map_err(serde::de::Error::custom)
    }
}

/// JSON representation of sample arrays
///
/// JSON has no NaN or infinity, so missing samples serialise as `null`
/// and infinities as the strings `"Inf"` / `"-Inf"`.
pub(crate) mod nan_values {
    use serde::de::{SeqAccess, Visitor};
    use serde::ser::SerializeSeq;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for v in values {
            if v.is_nan() {
                seq.serialize_element(&Option::<f64>::None)?;
            } else if *v == f64::INFINITY {
                seq.serialize_element("Inf")?;
            } else if *v == f64::NEG_INFINITY {
                seq.serialize_element("-Inf")?;
            } else {
                seq.serialize_element(v)?;
            }
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        struct ValuesVisitor;

        impl<'de> Visitor<'de> for ValuesVisitor {
            type Value = Vec<f64>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an array of numbers, nulls, or \"Inf\"/\"-Inf\"")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                #[derive(serde::Deserialize)]
                #[serde(untagged)]
                enum Sample {
                    Num(f64),
                    Marker(String),
                    Missing(Option<()>),
                }

                let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(sample) = seq.next_element::<Sample>()? {
                    out.push(match sample {
                        Sample::Num(v) => v,
                        Sample::Marker(m) if m == "Inf" => f64::INFINITY,
                        Sample::Marker(m) if m == "-Inf" => f64::NEG_INFINITY,
                        Sample::Marker(m) => {
                            return Err(serde::de::Error::custom(format!(
                                "unrecognized sample marker: {:?}",
                                m
                            )))
                        }
                        Sample::Missing(_) => f64::NAN,
                    });
                }
                Ok(out)
            }
        }

        deserializer.deserialize_seq(ValuesVisitor)
    }
}
