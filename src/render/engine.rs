//! Graph rasteriser
//!
//! Turns a [`GraphDef`] into PNG bytes: chrome layout, tick selection,
//! vertical spans, line/area/stack drawing, and the legend band. The
//! same definition always rasterises to the same bytes.

use crate::chart::{GraphDef, LineDef, LineStats, LineStyle, PlotDef};
use crate::config::{MIN_HEIGHT, MIN_WIDTH};
use crate::render::canvas::Canvas;
use crate::render::error::{RenderError, RenderResult};
use crate::render::font::{self, GLYPH_HEIGHT};
use crate::render::ticks::{self, fmt_value};
use chrono_tz::Tz;

const LEGEND_ROW_HEIGHT: i64 = 14;
const PLOT_GAP: i64 = 8;
const MIN_PLOT_EXTENT: i64 = 8;

/// Resolved pixel layout for one render
struct Layout {
    left: i64,
    right: i64,
    /// Vertical extent of each plot, top to bottom
    plot_areas: Vec<(i64, i64)>,
    /// Top of the title band, when a title is drawn
    title_top: Option<i64>,
    /// Baseline row for x tick labels, when labels are drawn
    x_label_top: Option<i64>,
    /// Top of the legend band, when a legend is drawn
    legend_top: Option<i64>,
}

/// Rasterise a graph definition to PNG bytes
pub fn render(gdef: &GraphDef) -> RenderResult<Vec<u8>> {
    if gdef.width < MIN_WIDTH || gdef.height < MIN_HEIGHT {
        return Err(RenderError::InvalidCanvas {
            width: gdef.width,
            height: gdef.height,
            min_width: MIN_WIDTH,
            min_height: MIN_HEIGHT,
        });
    }
    tracing::debug!(
        width = gdef.width,
        height = gdef.height,
        plots = gdef.plots.len(),
        "rendering graph"
    );

    let theme = gdef.theme.colors();
    let layout = compute_layout(gdef)?;
    let mut canvas = Canvas::new(gdef.width, gdef.height, theme.background);
    let tz: Tz = gdef
        .timezone
        .parse()
        .unwrap_or(chrono_tz::UTC);

    let time_ticks = ticks::time_ticks(gdef.start_time, gdef.end_time, tz);

    for (plot, area) in gdef.plots.iter().zip(layout.plot_areas.iter()) {
        draw_plot(&mut canvas, gdef, plot, &layout, *area, &time_ticks);
    }

    if let Some(x_label_top) = layout.x_label_top {
        for tick in &time_ticks {
            let x = x_of(tick.time, gdef, &layout);
            let tw = font::text_width(&tick.label);
            font::draw_text(&mut canvas, x - tw / 2, x_label_top, &tick.label, theme.text);
        }
    }

    if let (Some(title_top), Some(title)) = (layout.title_top, gdef.title.as_deref()) {
        let tw = font::text_width(title);
        let x = (canvas.width() - tw) / 2;
        font::draw_text(&mut canvas, x, title_top, title, theme.text);
    }

    if let (Some(ylabel), Some(&(top, bottom))) =
        (gdef.ylabel.as_deref(), layout.plot_areas.first())
    {
        if !gdef.only_graph {
            let th = font::text_width(ylabel);
            let y = (top + bottom + th) / 2;
            font::draw_text_rot90(&mut canvas, 2, y, ylabel, theme.text);
        }
    }

    if let Some(legend_top) = layout.legend_top {
        draw_legend(&mut canvas, gdef, &layout, legend_top);
    }

    canvas.encode_png()
}

/// Resolve the pixel layout, dropping chrome on small canvases
fn compute_layout(gdef: &GraphDef) -> RenderResult<Layout> {
    let w = gdef.width as i64;
    let h = gdef.height as i64;
    let roomy = h >= 160;

    let (left, right, mut top, bottom_band) = if gdef.only_graph {
        (0, w, 0, 0)
    } else {
        let left = if w >= 300 { 60 } else { (w / 4).max(20) };
        let right_margin = if w >= 300 { 10 } else { 4 };
        let top = if roomy { 10 } else { 2 };
        let bottom_band = if roomy { 40 } else { 14 };
        (left, w - right_margin, top, bottom_band)
    };

    let title_top = if gdef.title.is_some() && !gdef.only_graph && h >= 100 {
        let t = top;
        top += GLYPH_HEIGHT + 9;
        Some(t)
    } else {
        None
    };

    let entries = gdef.legend_entries();
    let legend_rows = if gdef.show_legend && !gdef.only_graph && entries > 0 && roomy {
        legend_row_count(gdef, left, right)
    } else {
        0
    };
    let legend_h = if legend_rows > 0 {
        legend_rows * LEGEND_ROW_HEIGHT + 2
    } else {
        0
    };

    let plots_bottom = h - bottom_band - legend_h;
    if right - left < MIN_PLOT_EXTENT || plots_bottom - top < MIN_PLOT_EXTENT {
        return Err(RenderError::LayoutOverflow(format!(
            "no room for a {}x{} plot area",
            right - left,
            plots_bottom - top
        )));
    }

    let n = gdef.plots.len().max(1) as i64;
    let per_plot = (plots_bottom - top - PLOT_GAP * (n - 1)) / n;
    if per_plot < MIN_PLOT_EXTENT {
        return Err(RenderError::LayoutOverflow(format!(
            "{} plots do not fit in {} rows",
            n,
            plots_bottom - top
        )));
    }
    let plot_areas: Vec<(i64, i64)> = (0..n)
        .map(|i| {
            let t = top + i * (per_plot + PLOT_GAP);
            (t, t + per_plot)
        })
        .collect();

    Ok(Layout {
        left,
        right,
        plot_areas,
        title_top,
        x_label_top: (!gdef.only_graph && bottom_band >= 14).then_some(plots_bottom + 4),
        legend_top: (legend_h > 0).then_some(h - legend_h),
    })
}

/// Rows the legend needs at the current canvas width
fn legend_row_count(gdef: &GraphDef, left: i64, right: i64) -> i64 {
    if gdef.legend_stats {
        return gdef.legend_entries() as i64;
    }
    let mut rows = 1_i64;
    let mut x = left;
    for plot in &gdef.plots {
        let labels = plot
            .lines
            .iter()
            .map(|l| l.label.as_str())
            .chain(plot.vspans.iter().map(|v| v.label.as_str()));
        for label in labels {
            let entry_w = 14 + font::text_width(label) + 12;
            if x + entry_w > right && x > left {
                rows += 1;
                x = left;
            }
            x += entry_w;
        }
    }
    rows
}

fn x_of(t: i64, gdef: &GraphDef, layout: &Layout) -> i64 {
    let span = (gdef.end_time - gdef.start_time) as f64;
    let frac = (t - gdef.start_time) as f64 / span;
    layout.left + (frac * (layout.right - layout.left) as f64).round() as i64
}

fn y_of(v: f64, plot: &PlotDef, top: i64, bottom: i64) -> i64 {
    let span = plot.upper - plot.lower;
    let frac = ((v - plot.lower) / span).clamp(0.0, 1.0);
    bottom - (frac * (bottom - top) as f64).round() as i64
}

fn draw_plot(
    canvas: &mut Canvas,
    gdef: &GraphDef,
    plot: &PlotDef,
    layout: &Layout,
    (top, bottom): (i64, i64),
    time_ticks: &[ticks::TimeTick],
) {
    let theme = gdef.theme.colors();
    let value_ticks = ticks::value_ticks(plot.lower, plot.upper, 8);

    // Background bands go under everything else
    for vspan in &plot.vspans {
        let x0 = x_of(vspan.t1, gdef, layout);
        let x1 = x_of(vspan.t2, gdef, layout);
        canvas.fill_rect(
            x0,
            top,
            x1.max(x0 + 1),
            bottom,
            vspan.color,
            vspan.alpha as f64 / 100.0,
        );
    }

    for tick in &value_ticks {
        let y = y_of(tick.value, plot, top, bottom);
        canvas.hline(layout.left, layout.right, y, theme.grid);
    }
    for tick in time_ticks {
        let x = x_of(tick.time, gdef, layout);
        canvas.vline(x, top, bottom, theme.grid);
    }

    draw_data(canvas, gdef, plot, layout, top, bottom);

    // Border above data so clamped lines stay inside the frame
    canvas.hline(layout.left, layout.right, top, theme.axis);
    canvas.hline(layout.left, layout.right, bottom, theme.axis);
    canvas.vline(layout.left, top, bottom, theme.axis);
    canvas.vline(layout.right, top, bottom, theme.axis);

    if !gdef.only_graph {
        for tick in &value_ticks {
            let y = y_of(tick.value, plot, top, bottom);
            canvas.hline(layout.left - 3, layout.left - 1, y, theme.axis);
            let tw = font::text_width(&tick.label);
            font::draw_text(
                canvas,
                layout.left - 5 - tw,
                y - GLYPH_HEIGHT / 2,
                &tick.label,
                theme.text,
            );
        }
        for tick in time_ticks {
            let x = x_of(tick.time, gdef, layout);
            canvas.vline(x, bottom + 1, bottom + 3, theme.axis);
        }
    }
}

/// Draw every line of a plot, tracking stack baselines across them
fn draw_data(
    canvas: &mut Canvas,
    gdef: &GraphDef,
    plot: &PlotDef,
    layout: &Layout,
    top: i64,
    bottom: i64,
) {
    let n = ((gdef.end_time - gdef.start_time) / gdef.step) as usize;
    let xs: Vec<i64> = (0..n)
        .map(|i| x_of(gdef.start_time + i as i64 * gdef.step, gdef, layout))
        .collect();
    let mut pos_base = vec![0.0_f64; n];
    let mut neg_base = vec![0.0_f64; n];

    for line in &plot.lines {
        let alpha = line.alpha as f64 / 100.0;
        match line.style {
            LineStyle::Line => draw_polyline(canvas, plot, line, &xs, top, bottom, alpha),
            LineStyle::Area => {
                fill_between(
                    canvas,
                    plot,
                    &xs,
                    top,
                    bottom,
                    line,
                    |_| 0.0,
                    |_, v| v,
                    alpha,
                );
                draw_polyline(canvas, plot, line, &xs, top, bottom, alpha);
            }
            LineStyle::Stack => {
                fill_between(
                    canvas,
                    plot,
                    &xs,
                    top,
                    bottom,
                    line,
                    |i| {
                        if line.data.get(i) >= 0.0 {
                            pos_base[i]
                        } else {
                            neg_base[i]
                        }
                    },
                    |i, v| {
                        if v >= 0.0 {
                            pos_base[i] + v
                        } else {
                            neg_base[i] + v
                        }
                    },
                    alpha,
                );
                for (i, v) in line.data.values().iter().enumerate() {
                    if v.is_finite() {
                        if *v >= 0.0 {
                            pos_base[i] += v;
                        } else {
                            neg_base[i] += v;
                        }
                    }
                }
            }
            // Bands were converted by the builder; nothing to stroke
            LineStyle::Vspan => {}
        }
    }
}

/// Stroke a polyline through consecutive finite samples
///
/// NaN samples break the line into segments; an isolated sample renders
/// as a dot of the line width's diameter.
fn draw_polyline(
    canvas: &mut Canvas,
    plot: &PlotDef,
    line: &LineDef,
    xs: &[i64],
    top: i64,
    bottom: i64,
    alpha: f64,
) {
    let values = line.data.values();
    let mut i = 0;
    while i < values.len() {
        if !values[i].is_finite() {
            i += 1;
            continue;
        }
        let mut j = i;
        while j + 1 < values.len() && values[j + 1].is_finite() {
            j += 1;
        }
        if i == j {
            canvas.stamp(
                xs[i],
                y_of(values[i], plot, top, bottom),
                line.color,
                line.line_width,
                alpha,
            );
        } else {
            for k in i..j {
                canvas.draw_line(
                    xs[k],
                    y_of(values[k], plot, top, bottom),
                    xs[k + 1],
                    y_of(values[k + 1], plot, top, bottom),
                    line.color,
                    line.line_width,
                    alpha,
                );
            }
        }
        i = j + 1;
    }
}

/// Fill pixel columns between two value curves over each finite run
#[allow(clippy::too_many_arguments)]
fn fill_between(
    canvas: &mut Canvas,
    plot: &PlotDef,
    xs: &[i64],
    top: i64,
    bottom: i64,
    line: &LineDef,
    base: impl Fn(usize) -> f64,
    value: impl Fn(usize, f64) -> f64,
    alpha: f64,
) {
    let values = line.data.values();
    for i in 0..values.len() {
        let v = values[i];
        if !v.is_finite() {
            continue;
        }
        let y0 = y_of(base(i), plot, top, bottom);
        let y1 = y_of(value(i, v), plot, top, bottom);

        let next = if i + 1 < values.len() && values[i + 1].is_finite() {
            Some((
                y_of(base(i + 1), plot, top, bottom),
                y_of(value(i + 1, values[i + 1]), plot, top, bottom),
            ))
        } else {
            None
        };

        match next {
            Some((ny0, ny1)) => {
                let (x0, x1) = (xs[i], xs[i + 1]);
                for x in x0..x1 {
                    let f = (x - x0) as f64 / (x1 - x0).max(1) as f64;
                    let ya = y0 + ((ny0 - y0) as f64 * f).round() as i64;
                    let yb = y1 + ((ny1 - y1) as f64 * f).round() as i64;
                    canvas.fill_vertical(x, ya, yb, line.color, alpha);
                }
            }
            None => canvas.fill_vertical(xs[i], y0, y1, line.color, alpha),
        }
    }
}

fn draw_legend(canvas: &mut Canvas, gdef: &GraphDef, layout: &Layout, legend_top: i64) {
    let theme = gdef.theme.colors();
    let mut x = layout.left;
    let mut y = legend_top + 2;

    let mut entry = |canvas: &mut Canvas, color, alpha: u8, filled: bool, text: String| {
        let entry_w = 14 + font::text_width(&text) + 12;
        if !gdef.legend_stats && x + entry_w > layout.right && x > layout.left {
            x = layout.left;
            y += LEGEND_ROW_HEIGHT;
        }
        if filled {
            canvas.fill_rect(x, y + 2, x + 10, y + 10, color, alpha as f64 / 100.0);
        } else {
            canvas.fill_rect(x, y + 5, x + 10, y + 8, color, 1.0);
        }
        font::draw_text(canvas, x + 14, y + 2, &text, theme.text);
        if gdef.legend_stats {
            y += LEGEND_ROW_HEIGHT;
        } else {
            x += entry_w;
        }
    };

    for plot in &gdef.plots {
        for line in &plot.lines {
            let text = if gdef.legend_stats {
                let stats = LineStats::of(&line.data);
                format!(
                    "{}  max {} min {} avg {} last {} tot {}",
                    line.label,
                    stat(stats.max),
                    stat(stats.min),
                    stat(stats.avg),
                    stat(stats.last),
                    stat(stats.total),
                )
            } else {
                line.label.clone()
            };
            entry(
                canvas,
                line.color,
                line.alpha,
                line.style != LineStyle::Line,
                text,
            );
        }
        for vspan in &plot.vspans {
            entry(canvas, vspan.color, vspan.alpha, true, vspan.label.clone());
        }
    }
}

fn stat(v: Option<f64>) -> String {
    match v {
        Some(v) => fmt_value(v),
        None => "NaN".to_string(),
    }
}

/// Check if a theme's background covers a canvas position
#[cfg(test)]
fn is_background(png_pixel: crate::chart::Color, theme: crate::chart::Theme) -> bool {
    png_pixel == theme.colors().background
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{Color, GraphDef, Layout as GraphLayout, LineDef, PlotDef, Theme, VSpanDef};
    use crate::model::TimeSeq;

    const MINUTE: i64 = 60_000;

    fn line(label: &str, style: LineStyle, values: Vec<f64>) -> LineDef {
        LineDef {
            label: label.to_string(),
            color: Color::rgb(255, 0, 0),
            style,
            line_width: 1,
            alpha: 100,
            axis: 0,
            data: TimeSeq::new(0, MINUTE, values).unwrap(),
        }
    }

    fn graph(plots: Vec<PlotDef>) -> GraphDef {
        GraphDef {
            start_time: 0,
            end_time: 6 * MINUTE,
            step: MINUTE,
            width: 700,
            height: 300,
            theme: Theme::Light,
            layout: GraphLayout::Single,
            timezone: "UTC".to_string(),
            title: None,
            ylabel: None,
            show_legend: true,
            legend_stats: true,
            only_graph: false,
            plots,
        }
    }

    fn plot(lines: Vec<LineDef>, vspans: Vec<VSpanDef>) -> PlotDef {
        let mut p = PlotDef::empty();
        p.upper = 10.0;
        p.lines = lines;
        p.vspans = vspans;
        p
    }

    #[test]
    fn test_rejects_tiny_canvas() {
        let mut g = graph(vec![PlotDef::empty()]);
        g.width = 79;
        assert!(matches!(
            render(&g),
            Err(RenderError::InvalidCanvas { .. })
        ));
        g.width = 700;
        g.height = 39;
        assert!(matches!(
            render(&g),
            Err(RenderError::InvalidCanvas { .. })
        ));
    }

    #[test]
    fn test_minimum_canvas_renders() {
        let mut g = graph(vec![PlotDef::empty()]);
        g.width = 80;
        g.height = 40;
        let png = render(&g).unwrap();
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_empty_graph_renders_axes_only() {
        let g = graph(vec![PlotDef::empty()]);
        let png = render(&g).unwrap();
        assert!(!png.is_empty());
    }

    #[test]
    fn test_deterministic_bytes() {
        let g = graph(vec![plot(
            vec![
                line("a", LineStyle::Line, vec![1.0, 5.0, f64::NAN, 7.0, 2.0, 9.0]),
                line("b", LineStyle::Area, vec![0.5, 1.0, 1.5, 2.0, 1.0, 0.5]),
            ],
            vec![VSpanDef {
                t1: MINUTE,
                t2: 2 * MINUTE,
                color: Color::rgb(0, 0, 255),
                alpha: 40,
                label: "triggered".to_string(),
            }],
        )]);
        assert_eq!(render(&g).unwrap(), render(&g).unwrap());
    }

    #[test]
    fn test_themes_differ() {
        let mut light = graph(vec![plot(
            vec![line("a", LineStyle::Line, vec![1.0; 6])],
            vec![],
        )]);
        let mut dark = light.clone();
        light.theme = Theme::Light;
        dark.theme = Theme::Dark;
        assert_ne!(render(&light).unwrap(), render(&dark).unwrap());
    }

    #[test]
    fn test_stack_and_line_render() {
        let g = graph(vec![plot(
            vec![
                line("up", LineStyle::Stack, vec![2.0; 6]),
                line("up2", LineStyle::Stack, vec![3.0; 6]),
                line("down", LineStyle::Stack, vec![-1.0; 6]),
            ],
            vec![],
        )]);
        assert!(render(&g).is_ok());
    }

    #[test]
    fn test_two_plots_render() {
        let g = {
            let mut g = graph(vec![
                plot(vec![line("requests", LineStyle::Line, vec![100.0; 6])], vec![]),
                plot(vec![line("latency", LineStyle::Line, vec![1.0; 6])], vec![]),
            ]);
            g.layout = GraphLayout::Axes;
            g
        };
        assert!(render(&g).is_ok());
    }

    #[test]
    fn test_only_graph_fills_canvas() {
        let mut g = graph(vec![plot(
            vec![line("a", LineStyle::Area, vec![5.0; 6])],
            vec![],
        )]);
        g.only_graph = true;
        g.title = Some("ignored".to_string());
        let png = render(&g).unwrap();
        assert!(!png.is_empty());
    }

    #[test]
    fn test_layout_reserves_legend_rows() {
        let g = graph(vec![plot(
            vec![
                line("a", LineStyle::Line, vec![1.0; 6]),
                line("b", LineStyle::Line, vec![2.0; 6]),
            ],
            vec![],
        )]);
        let layout = compute_layout(&g).unwrap();
        // Two stats entries: two legend rows above the canvas bottom
        assert_eq!(layout.legend_top, Some(300 - (2 * LEGEND_ROW_HEIGHT + 2)));
    }

    #[test]
    fn test_layout_only_graph_has_no_chrome() {
        let mut g = graph(vec![plot(
            vec![line("a", LineStyle::Line, vec![1.0; 6])],
            vec![],
        )]);
        g.only_graph = true;
        let layout = compute_layout(&g).unwrap();
        assert_eq!(layout.left, 0);
        assert_eq!(layout.right, 700);
        assert!(layout.legend_top.is_none());
        assert!(layout.x_label_top.is_none());
        assert!(layout.title_top.is_none());
    }

    #[test]
    fn test_background_theme_helper() {
        assert!(is_background(Color::rgb(255, 255, 255), Theme::Light));
        assert!(!is_background(Color::rgb(255, 255, 255), Theme::Dark));
    }
}
