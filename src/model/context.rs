//! Evaluation context
//!
//! The `(start, end, step, timezone)` window a single graph request runs
//! against. Both boundaries are aligned to the step grid; the timezone is
//! only consulted when tick labels are rendered.

use crate::model::error::{DataError, DataResult};
use crate::model::{TimeSeq, TimeSeries};
use chrono_tz::Tz;

/// The window and grid for one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvalContext {
    start: i64,
    end: i64,
    step: i64,
    tz: Tz,
}

impl EvalContext {
    /// Create a context, validating window and grid
    pub fn new(start: i64, end: i64, step: i64, tz: &str) -> DataResult<Self> {
        if step <= 0 {
            return Err(DataError::InvalidContext(format!(
                "step must be positive, got {}",
                step
            )));
        }
        if end <= start {
            return Err(DataError::InvalidContext(format!(
                "end {} must be after start {}",
                end, start
            )));
        }
        if start.rem_euclid(step) != 0 || end.rem_euclid(step) != 0 {
            return Err(DataError::InvalidContext(format!(
                "window [{}, {}) is not aligned to step {}",
                start, end, step
            )));
        }
        let tz: Tz = tz
            .parse()
            .map_err(|_| DataError::UnknownTimezone(tz.to_string()))?;
        Ok(Self {
            start,
            end,
            step,
            tz,
        })
    }

    /// Window start in epoch millis
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Exclusive window end in epoch millis
    pub fn end(&self) -> i64 {
        self.end
    }

    /// Grid step in millis
    pub fn step(&self) -> i64 {
        self.step
    }

    /// Zone used for tick-label rendering
    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Number of samples in the window
    pub fn num_steps(&self) -> usize {
        ((self.end - self.start) / self.step) as usize
    }

    /// Sample instants in window order
    pub fn timestamps(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.num_steps() as i64).map(move |i| self.start + i * self.step)
    }

    /// A constant sequence spanning the window
    pub fn constant_seq(&self, value: f64) -> TimeSeq {
        // Window is validated, so the grid invariants hold
        TimeSeq::new(self.start, self.step, vec![value; self.num_steps()])
            .unwrap_or_else(|_| unreachable!("validated context produces a valid grid"))
    }

    /// Clip a series to the window, NaN-filling gaps
    pub fn normalize(&self, series: &TimeSeries) -> DataResult<TimeSeries> {
        if series.data().step() != self.step {
            return Err(DataError::Misaligned(format!(
                "series step {} does not match context step {}",
                series.data().step(),
                self.step
            )));
        }
        let data = series.data().bounded(self.start, self.end)?;
        Ok(series.with_data(data))
    }
}
