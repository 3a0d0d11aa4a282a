//! Presentation options
//!
//! Everything a caller can tune about the rendered image, independent of
//! the query and window. Options deserialize from config files with
//! per-field defaults and validate before a request runs.

use crate::chart::{Layout, PaletteSelection, SortMode, SortOrder, Theme};
use serde::Deserialize;
use thiserror::Error;

/// Smallest canvas the engine will lay out
pub const MIN_WIDTH: u32 = 80;
/// Smallest canvas the engine will lay out
pub const MIN_HEIGHT: u32 = 40;

/// Option validation failures
#[derive(Error, Debug)]
pub enum UsageError {
    /// Canvas below the layout minimum
    #[error("canvas {width}x{height} is below the minimum {MIN_WIDTH}x{MIN_HEIGHT}")]
    CanvasTooSmall { width: u32, height: u32 },

    /// Palette name (or `hash:` spec) not recognised
    #[error("unknown palette: {0}")]
    UnknownPalette(String),

    /// Explicit y bounds that cross
    #[error("lower bound {lower} must be below upper bound {upper}")]
    InvalidBounds { lower: f64, upper: f64 },

    /// Window boundary or step that does not parse
    #[error("invalid time reference: {0}")]
    InvalidTime(String),

    /// A flag value outside its vocabulary (theme, layout, sort, preset)
    #[error("{0}")]
    InvalidFlag(String),
}

/// Presentation configuration for one graph request
#[derive(Debug, Clone, Deserialize)]
pub struct GraphOptions {
    /// Canvas width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Canvas height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_theme")]
    pub theme: Theme,

    #[serde(default = "default_layout")]
    pub layout: Layout,

    /// Palette name, optionally prefixed with `hash:`
    #[serde(default = "default_palette")]
    pub palette: String,

    /// Draw the legend band below the plot
    #[serde(default = "default_true")]
    pub show_legend: bool,

    /// Include per-line statistics in legend entries
    #[serde(default = "default_true")]
    pub legend_stats: bool,

    /// Suppress all chrome; the canvas is the plot area
    #[serde(default)]
    pub only_graph: bool,

    /// Title text centred above the plot
    #[serde(default)]
    pub title: Option<String>,

    /// Label drawn rotated along the left margin
    #[serde(default)]
    pub ylabel: Option<String>,

    /// Explicit lower y bound for the first plot
    #[serde(default)]
    pub lower: Option<f64>,

    /// Explicit upper y bound for the first plot
    #[serde(default)]
    pub upper: Option<f64>,

    /// Legend ordering statistic; unset preserves evaluator order
    #[serde(default)]
    pub sort: Option<SortMode>,

    #[serde(default = "default_order")]
    pub order: SortOrder,

    /// Keep all-NaN stacked series as zero-contribution legend entries
    #[serde(default)]
    pub keep_empty_stack_layers: bool,
}

fn default_width() -> u32 {
    700
}

fn default_height() -> u32 {
    300
}

fn default_theme() -> Theme {
    Theme::Light
}

fn default_layout() -> Layout {
    Layout::Single
}

fn default_palette() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

fn default_order() -> SortOrder {
    SortOrder::Asc
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            theme: default_theme(),
            layout: default_layout(),
            palette: default_palette(),
            show_legend: true,
            legend_stats: true,
            only_graph: false,
            title: None,
            ylabel: None,
            lower: None,
            upper: None,
            sort: None,
            order: default_order(),
            keep_empty_stack_layers: false,
        }
    }
}

impl GraphOptions {
    /// Validate, returning the parsed palette selection
    pub fn validate(&self) -> Result<PaletteSelection, UsageError> {
        if self.width < MIN_WIDTH || self.height < MIN_HEIGHT {
            return Err(UsageError::CanvasTooSmall {
                width: self.width,
                height: self.height,
            });
        }
        if let (Some(l), Some(u)) = (self.lower, self.upper) {
            if l >= u {
                return Err(UsageError::InvalidBounds { lower: l, upper: u });
            }
        }
        PaletteSelection::parse(&self.palette)
            .ok_or_else(|| UsageError::UnknownPalette(self.palette.clone()))
    }
}
