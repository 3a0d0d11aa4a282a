//! Graph definitions
//!
//! The self-describing render plan: metadata, plots, lines, and vertical
//! spans. A `GraphDef` carries everything the raster engine needs; no
//! re-evaluation happens after it is built.

use crate::chart::Color;
use crate::model::{DataError, DataResult, TimeSeq};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rendering theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Dark marks on a white background
    Light,
    /// Light marks on a near-black background
    Dark,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme: {:?}", other)),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

/// Plot arrangement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Every presentation in one plot
    Single,
    /// One plot per axis attribute, stacked on a shared x-axis
    Axes,
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Layout::Single),
            "axes" => Ok(Layout::Axes),
            other => Err(format!("unknown layout: {:?}", other)),
        }
    }
}

/// How a line's data is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    /// Polyline through consecutive samples
    Line,
    /// Filled to the zero baseline, then stroked
    Area,
    /// Filled onto a running baseline shared by the stack group
    Stack,
    /// Converted to vertical bands over non-zero runs
    Vspan,
}

/// One drawable series inside a plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDef {
    pub label: String,
    pub color: Color,
    pub style: LineStyle,
    pub line_width: u32,
    /// Opacity percentage, 0-100
    pub alpha: u8,
    /// 0 for the left axis, 1 for the right
    pub axis: u8,
    pub data: TimeSeq,
}

/// A vertical band over a time interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VSpanDef {
    /// Band start in epoch millis, inclusive
    pub t1: i64,
    /// Band end in epoch millis, exclusive
    pub t2: i64,
    pub color: Color,
    pub alpha: u8,
    pub label: String,
}

/// One plot: an axis with its lines and bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotDef {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ylabel: Option<String>,
    /// Lower y bound, already resolved by the builder
    pub lower: f64,
    /// Upper y bound, already resolved by the builder
    pub upper: f64,
    pub lines: Vec<LineDef>,
    pub vspans: Vec<VSpanDef>,
}

impl PlotDef {
    /// An axis with nothing on it
    pub fn empty() -> Self {
        Self {
            ylabel: None,
            lower: 0.0,
            upper: 1.0,
            lines: Vec::new(),
            vspans: Vec::new(),
        }
    }

    /// Check if the plot holds no lines or bands
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.vspans.is_empty()
    }
}

/// The full render plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDef {
    pub start_time: i64,
    pub end_time: i64,
    pub step: i64,
    pub width: u32,
    pub height: u32,
    pub theme: Theme,
    pub layout: Layout,
    /// Zone name used for tick labels
    pub timezone: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ylabel: Option<String>,
    pub show_legend: bool,
    pub legend_stats: bool,
    pub only_graph: bool,
    pub plots: Vec<PlotDef>,
}

impl GraphDef {
    /// Check the structural invariants
    ///
    /// The window must be a positive whole number of steps and every
    /// line must sit exactly on it. Mis-alignment is a hard error.
    pub fn validate(&self) -> DataResult<()> {
        if self.step <= 0 {
            return Err(DataError::InvalidContext(format!(
                "step must be positive, got {}",
                self.step
            )));
        }
        let span = self.end_time - self.start_time;
        if span <= 0 || span % self.step != 0 {
            return Err(DataError::InvalidContext(format!(
                "window [{}, {}) is not a positive multiple of step {}",
                self.start_time, self.end_time, self.step
            )));
        }
        for (pi, plot) in self.plots.iter().enumerate() {
            for line in &plot.lines {
                let d = &line.data;
                if d.start() != self.start_time || d.step() != self.step || d.end() != self.end_time
                {
                    return Err(DataError::Misaligned(format!(
                        "line {:?} in plot {} covers [{}, {}) at step {}, graph covers [{}, {}) at step {}",
                        line.label,
                        pi,
                        d.start(),
                        d.end(),
                        d.step(),
                        self.start_time,
                        self.end_time,
                        self.step
                    )));
                }
            }
        }
        Ok(())
    }

    /// Total legend entries across plots
    pub fn legend_entries(&self) -> usize {
        self.plots
            .iter()
            .map(|p| p.lines.len() + p.vspans.len())
            .sum()
    }
}
