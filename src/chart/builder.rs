//! Graph definition builder
//!
//! Shapes evaluator output into plots: vertical-span extraction, legend
//! sorting, palette assignment, axis partitioning, and y-range
//! resolution. The result is a validated [`GraphDef`] ready for the
//! raster engine or the codec.

use crate::chart::palette::{hash_label, PaletteSelection};
use crate::chart::{Color, GraphDef, LineDef, LineStyle, PlotDef, VSpanDef};
use crate::config::GraphOptions;
use crate::model::{DataResult, EvalContext, TimeSeq};
use crate::sql::StyledLine;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Legend ordering statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// By label text
    Legend,
    Min,
    Max,
    Avg,
    Count,
    Total,
    Last,
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legend" => Ok(SortMode::Legend),
            "min" => Ok(SortMode::Min),
            "max" => Ok(SortMode::Max),
            "avg" => Ok(SortMode::Avg),
            "count" => Ok(SortMode::Count),
            "total" => Ok(SortMode::Total),
            "last" => Ok(SortMode::Last),
            other => Err(format!("unknown sort mode: {:?}", other)),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortMode::Legend => "legend",
            SortMode::Min => "min",
            SortMode::Max => "max",
            SortMode::Avg => "avg",
            SortMode::Count => "count",
            SortMode::Total => "total",
            SortMode::Last => "last",
        };
        write!(f, "{}", name)
    }
}

/// Legend ordering direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {:?}", other)),
        }
    }
}

/// Summary statistics of one line's finite samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStats {
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub avg: Option<f64>,
    pub last: Option<f64>,
    pub total: Option<f64>,
    pub count: usize,
}

impl LineStats {
    /// Compute over the finite samples of a sequence
    pub fn of(data: &TimeSeq) -> LineStats {
        let finite: Vec<f64> = data.values().iter().copied().filter(|v| v.is_finite()).collect();
        let count = finite.len();
        let total: f64 = finite.iter().sum();
        LineStats {
            max: data.max_finite(),
            min: data.min_finite(),
            avg: (count > 0).then(|| total / count as f64),
            last: finite.last().copied(),
            total: (count > 0).then_some(total),
            count,
        }
    }

    fn stat(&self, mode: SortMode) -> Option<f64> {
        match mode {
            SortMode::Legend => None,
            SortMode::Min => self.min,
            SortMode::Max => self.max,
            SortMode::Avg => self.avg,
            SortMode::Count => (self.count > 0).then_some(self.count as f64),
            SortMode::Total => self.total,
            SortMode::Last => self.last,
        }
    }
}

/// Build a validated graph definition from evaluator output
pub fn build_graph_def(
    ctx: &EvalContext,
    options: &GraphOptions,
    palette: &PaletteSelection,
    styled: Vec<StyledLine>,
) -> DataResult<GraphDef> {
    tracing::debug!(lines = styled.len(), layout = ?options.layout, "building graph definition");

    // Split bands from drawable lines
    let mut lines: Vec<StyledLine> = Vec::new();
    let mut spans: Vec<(StyledLine, Vec<(i64, i64)>)> = Vec::new();
    for line in styled {
        if line.style == LineStyle::Vspan {
            let bands = vspan_bands(&line.data);
            spans.push((line, bands));
        } else {
            lines.push(line);
        }
    }

    // Entirely empty stack layers carry no pixels and no information
    if !options.keep_empty_stack_layers {
        lines.retain(|l| l.style != LineStyle::Stack || !l.data.all_nan());
    }

    sort_lines(&mut lines, options.sort, options.order);

    // Auto-colours rotate through palette entries not claimed explicitly
    let explicit: HashSet<Color> = lines
        .iter()
        .map(|l| l.color)
        .chain(spans.iter().map(|(l, _)| l.color))
        .flatten()
        .collect();
    let available: Vec<Color> = {
        let filtered: Vec<Color> = palette
            .palette
            .colors()
            .iter()
            .copied()
            .filter(|c| !explicit.contains(c))
            .collect();
        if filtered.is_empty() {
            palette.palette.colors().to_vec()
        } else {
            filtered
        }
    };
    let mut auto_idx = 0_usize;
    let mut pick = |label: &str, color: Option<Color>| -> Color {
        match color {
            Some(c) => c,
            None if palette.hashed => {
                available[(hash_label(label) % available.len() as u64) as usize]
            }
            None => {
                let c = available[auto_idx % available.len()];
                auto_idx += 1;
                c
            }
        }
    };

    let line_defs: Vec<LineDef> = lines
        .into_iter()
        .map(|l| LineDef {
            color: pick(&l.label, l.color),
            label: l.label,
            style: l.style,
            line_width: l.line_width,
            alpha: l.alpha,
            axis: l.axis,
            data: l.data,
        })
        .collect();

    let span_defs: Vec<(u8, VSpanDef)> = spans
        .into_iter()
        .flat_map(|(l, bands)| {
            let color = pick(&l.label, l.color);
            bands
                .into_iter()
                .map(move |(t1, t2)| {
                    (
                        l.axis,
                        VSpanDef {
                            t1,
                            t2,
                            color,
                            alpha: l.alpha,
                            label: l.label.clone(),
                        },
                    )
                })
                .collect::<Vec<_>>()
        })
        .collect();

    // Partition by axis attribute, or lump everything together
    let axes: Vec<u8> = match options.layout {
        crate::chart::Layout::Single => vec![0],
        crate::chart::Layout::Axes => {
            let mut present: Vec<u8> = line_defs
                .iter()
                .map(|l| l.axis)
                .chain(span_defs.iter().map(|(a, _)| *a))
                .collect();
            present.sort_unstable();
            present.dedup();
            if present.is_empty() {
                vec![0]
            } else {
                present
            }
        }
    };

    let mut plots = Vec::with_capacity(axes.len());
    for axis in &axes {
        let plot_lines: Vec<LineDef> = match options.layout {
            crate::chart::Layout::Single => line_defs.clone(),
            crate::chart::Layout::Axes => line_defs
                .iter()
                .filter(|l| l.axis == *axis)
                .cloned()
                .collect(),
        };
        let plot_spans: Vec<VSpanDef> = match options.layout {
            crate::chart::Layout::Single => span_defs.iter().map(|(_, v)| v.clone()).collect(),
            crate::chart::Layout::Axes => span_defs
                .iter()
                .filter(|(a, _)| a == axis)
                .map(|(_, v)| v.clone())
                .collect(),
        };
        let (lower, upper) = y_range(&plot_lines);
        plots.push(PlotDef {
            ylabel: if *axis == 0 { options.ylabel.clone() } else { None },
            lower,
            upper,
            lines: plot_lines,
            vspans: plot_spans,
        });
    }

    // Explicit bounds override the first plot's computed range
    if let Some(plot) = plots.first_mut() {
        if let Some(l) = options.lower {
            plot.lower = l;
        }
        if let Some(u) = options.upper {
            plot.upper = u;
        }
    }

    let def = GraphDef {
        start_time: ctx.start(),
        end_time: ctx.end(),
        step: ctx.step(),
        width: options.width,
        height: options.height,
        theme: options.theme,
        layout: options.layout,
        timezone: ctx.tz().name().to_string(),
        title: options.title.clone(),
        ylabel: options.ylabel.clone(),
        show_legend: options.show_legend && !options.only_graph,
        legend_stats: options.legend_stats,
        only_graph: options.only_graph,
        plots,
    };
    def.validate()?;
    Ok(def)
}

/// Extract vertical bands from a condition series
///
/// A band opens at the first sample that is a non-zero number and closes
/// at the next sample that is zero or NaN, exclusive at that sample's
/// time. A run still open at the end of the window closes at the window
/// end. Adjacent bands never merge, so for intervals `[s_k, e_k)`,
/// `e_k <= s_{k+1}` always holds.
pub fn vspan_bands(data: &TimeSeq) -> Vec<(i64, i64)> {
    let mut bands = Vec::new();
    let mut open: Option<i64> = None;
    for (t, v) in data.iter() {
        let set = !v.is_nan() && v != 0.0;
        match (set, open) {
            (true, None) => open = Some(t),
            (false, Some(start)) => {
                bands.push((start, t));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        bands.push((start, data.end()));
    }
    bands
}

/// Stable legend sort; lines without the statistic sort last
fn sort_lines(lines: &mut [StyledLine], sort: Option<SortMode>, order: SortOrder) {
    let Some(mode) = sort else {
        return;
    };
    if mode == SortMode::Legend {
        lines.sort_by(|a, b| {
            let cmp = a.label.cmp(&b.label);
            match order {
                SortOrder::Asc => cmp,
                SortOrder::Desc => cmp.reverse(),
            }
        });
        return;
    }
    lines.sort_by(|a, b| {
        let sa = LineStats::of(&a.data).stat(mode);
        let sb = LineStats::of(&b.data).stat(mode);
        match (sa, sb) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (Some(_), None) => std::cmp::Ordering::Less,
            (Some(x), Some(y)) => {
                let cmp = x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal);
                match order {
                    SortOrder::Asc => cmp,
                    SortOrder::Desc => cmp.reverse(),
                }
            }
        }
    });
}

/// Resolve a plot's y-range from its member lines
///
/// Stacked series range over their cumulative sums, positive and
/// negative sides independently; area and stack styles always include
/// zero. An empty plot defaults to `[0, 1]`; a flat plot is padded so
/// the line does not sit on the border.
fn y_range(lines: &[LineDef]) -> (f64, f64) {
    let mut lower = f64::INFINITY;
    let mut upper = f64::NEG_INFINITY;
    let mut seen = false;

    let n = lines
        .iter()
        .filter(|l| l.style == LineStyle::Stack)
        .map(|l| l.data.len())
        .max()
        .unwrap_or(0);
    let mut pos = vec![0.0_f64; n];
    let mut neg = vec![0.0_f64; n];

    for line in lines {
        match line.style {
            LineStyle::Stack => {
                for (i, v) in line.data.values().iter().enumerate() {
                    if !v.is_finite() {
                        continue;
                    }
                    seen = true;
                    if *v >= 0.0 {
                        pos[i] += v;
                        upper = upper.max(pos[i]);
                        lower = lower.min(0.0);
                    } else {
                        neg[i] += v;
                        lower = lower.min(neg[i]);
                        upper = upper.max(0.0);
                    }
                }
            }
            LineStyle::Area => {
                if let (Some(lo), Some(hi)) = (line.data.min_finite(), line.data.max_finite()) {
                    seen = true;
                    lower = lower.min(lo.min(0.0));
                    upper = upper.max(hi.max(0.0));
                }
            }
            _ => {
                if let (Some(lo), Some(hi)) = (line.data.min_finite(), line.data.max_finite()) {
                    seen = true;
                    lower = lower.min(lo);
                    upper = upper.max(hi);
                }
            }
        }
    }

    if !seen {
        return (0.0, 1.0);
    }
    if lower == upper {
        return (lower - 0.5, upper + 0.5);
    }
    (lower, upper)
}
