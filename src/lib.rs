//! # Vellum
//!
//! Time-series graph rendering engine driven by a stack-based query
//! language over an in-memory corpus of tagged series. One request is a
//! pure function: program text, a time window, presentation options and
//! a tag index go in; deterministic PNG bytes and a self-describing
//! graph definition come out.
//!
//! ## Pipeline
//!
//! ```text
//! query text → parser → stack evaluator → GraphDef builder → PNG engine
//!                             │
//!                         tag index
//! ```
//!
//! ## Modules
//!
//! - [`model`]: fixed-step sequences, tagged series, evaluation context
//! - [`index`]: tag predicates, group-by, and the data-source contract
//! - [`sql`]: the postfix query language parser and evaluator
//! - [`chart`]: graph definitions, palettes, builder, and the V2 codec
//! - [`render`]: deterministic PNG rasterisation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vellum::{render_graph, EvalContext, GraphOptions, MemoryTagIndex};
//! use vellum::model::{TagMap, TimeSeq, TimeSeries};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tags = TagMap::new();
//!     tags.insert("name".to_string(), "sps".to_string());
//!     let series = TimeSeries::new(
//!         tags,
//!         TimeSeq::new(0, 60_000, vec![1.0, 2.0, 3.0])?,
//!     );
//!     let index = MemoryTagIndex::new(vec![series]);
//!
//!     let ctx = EvalContext::new(0, 180_000, 60_000, "UTC")?;
//!     let result = render_graph(
//!         "name,sps,:eq,:sum",
//!         &ctx,
//!         &GraphOptions::default(),
//!         &index,
//!     )?;
//!
//!     std::fs::write("graph.png", &result.png)?;
//!     Ok(())
//! }
//! ```

pub mod chart;
pub mod config;
mod error;
pub mod index;
pub mod model;
pub mod render;
pub mod sql;
pub mod timeparse;

// Re-export the types most callers touch
pub use chart::{build_graph_def, GraphDef, Layout, LineStyle, Theme};
pub use config::{GraphOptions, UsageError};
pub use error::GraphError;
pub use index::{MemoryTagIndex, Query, TagIndex};
pub use model::{EvalContext, TimeSeq, TimeSeries};
pub use sql::{parse_program, Evaluator};

/// Output of one graph request
#[derive(Debug, Clone)]
pub struct GraphResult {
    /// Encoded PNG image
    pub png: Vec<u8>,
    /// The render plan the image was produced from
    pub graph_def: GraphDef,
}

/// Evaluate a program and render it
///
/// The single entry point: validates options, parses and evaluates the
/// program against the index, builds the graph definition, and
/// rasterises it. No hidden side effects; identical inputs produce
/// identical bytes.
pub fn render_graph(
    program: &str,
    context: &EvalContext,
    options: &GraphOptions,
    index: &dyn TagIndex,
) -> Result<GraphResult, GraphError> {
    let span = tracing::debug_span!("render_graph", program_len = program.len());
    let _guard = span.enter();

    let palette = options.validate()?;
    let program = sql::parse_program(program)?;
    let mut evaluator = sql::Evaluator::new(context, index);
    let styled = evaluator.execute(&program)?;
    let graph_def = chart::build_graph_def(context, options, &palette, styled)?;
    let png = render::render(&graph_def)?;
    Ok(GraphResult { png, graph_def })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataError, TagMap};

    const MINUTE: i64 = 60_000;
    // 2011-12-25T00:00:00Z .. 2012-01-01T00:00:00Z
    const WEEK_START: i64 = 1_324_771_200_000;
    const WEEK_END: i64 = 1_325_376_000_000;

    fn tags(pairs: &[(&str, &str)]) -> TagMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// A day-period wave between `min` and `max`, sampled on the window
    fn wave_series(
        pairs: &[(&str, &str)],
        start: i64,
        end: i64,
        step: i64,
        min: f64,
        max: f64,
    ) -> TimeSeries {
        let amp = (max - min) / 2.0;
        let offset = min + amp;
        let lambda = 2.0 * std::f64::consts::PI / 86_400_000.0;
        let values = (0..((end - start) / step))
            .map(|i| {
                let t = (start + i * step) as f64;
                amp * (t * lambda).sin() + offset
            })
            .collect();
        TimeSeries::new(tags(pairs), TimeSeq::new(start, step, values).unwrap())
    }

    fn week_corpus() -> MemoryTagIndex {
        MemoryTagIndex::new(vec![
            wave_series(
                &[("name", "sps"), ("nf.cluster", "nccp-silverlight")],
                WEEK_START,
                WEEK_END,
                MINUTE,
                20_000.0,
                80_000.0,
            ),
            wave_series(
                &[("name", "sps"), ("nf.cluster", "nccp-xbox")],
                WEEK_START,
                WEEK_END,
                MINUTE,
                10_000.0,
                30_000.0,
            ),
        ])
    }

    fn week_ctx() -> EvalContext {
        EvalContext::new(WEEK_START, WEEK_END, MINUTE, "UTC").unwrap()
    }

    #[test]
    fn test_grouped_sum_with_threshold_vspan() {
        let program = "name,sps,:eq,(,nf.cluster,),:by,:sum,50000,:gt,:vspan,40,:alpha,\
                       triggered,:legend,\
                       name,sps,:eq,(,nf.cluster,),:by,input,:legend,\
                       50000,:const,threshold,:legend";
        let result = render_graph(
            program,
            &week_ctx(),
            &GraphOptions::default(),
            &week_corpus(),
        )
        .unwrap();

        let plot = &result.graph_def.plots[0];
        // The combined wave tops 50k once a day
        assert!(!plot.vspans.is_empty());
        assert!(plot.vspans.iter().all(|v| v.label == "triggered" && v.alpha == 40));
        // Two cluster input lines plus the constant threshold line
        assert_eq!(plot.lines.len(), 3);
        assert_eq!(plot.lines[0].label, "input");
        assert_eq!(plot.lines[1].label, "input");
        assert_eq!(plot.lines[2].label, "threshold");
        assert!(plot.lines[2]
            .data
            .values()
            .iter()
            .all(|v| *v == 50_000.0));
        assert!(!result.png.is_empty());
    }

    #[test]
    fn test_stack_with_negative_values() {
        let index = MemoryTagIndex::new(vec![
            TimeSeries::new(
                tags(&[("name", "cpu"), ("host", "h3")]),
                TimeSeq::new(0, MINUTE, vec![-1.0; 6]).unwrap(),
            ),
            TimeSeries::new(
                tags(&[("name", "cpu"), ("host", "h1")]),
                TimeSeq::new(0, MINUTE, vec![2.0; 6]).unwrap(),
            ),
            TimeSeries::new(
                tags(&[("name", "cpu"), ("host", "h2")]),
                TimeSeq::new(0, MINUTE, vec![3.0; 6]).unwrap(),
            ),
        ]);
        let ctx = EvalContext::new(0, 6 * MINUTE, MINUTE, "UTC").unwrap();
        let result = render_graph(
            "name,cpu,:eq,(,host,),:by,:stack",
            &ctx,
            &GraphOptions::default(),
            &index,
        )
        .unwrap();

        let plot = &result.graph_def.plots[0];
        let labels: Vec<_> = plot.lines.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, vec!["host=h1", "host=h2", "host=h3"]);
        // Positive layers stack to 5, the negative one hangs below zero
        assert_eq!(plot.upper, 5.0);
        assert_eq!(plot.lower, -1.0);
    }

    #[test]
    fn test_multi_axis_layout() {
        let index = MemoryTagIndex::new(vec![
            TimeSeries::new(
                tags(&[("name", "requests")]),
                TimeSeq::new(0, MINUTE, vec![1000.0; 6]).unwrap(),
            ),
            TimeSeries::new(
                tags(&[("name", "latency")]),
                TimeSeq::new(0, MINUTE, vec![0.25; 6]).unwrap(),
            ),
        ]);
        let ctx = EvalContext::new(0, 6 * MINUTE, MINUTE, "UTC").unwrap();
        let options = GraphOptions {
            layout: Layout::Axes,
            ..Default::default()
        };
        let result = render_graph(
            "name,requests,:eq,:sum,0,:axis,name,latency,:eq,:sum,1,:axis",
            &ctx,
            &options,
            &index,
        )
        .unwrap();

        let def = &result.graph_def;
        assert_eq!(def.plots.len(), 2);
        // Ranges resolve independently per axis
        assert!(def.plots[0].upper > 100.0);
        assert!(def.plots[1].upper < 1.0);
    }

    #[test]
    fn test_empty_result_renders_axes_only() {
        let ctx = EvalContext::new(0, 6 * MINUTE, MINUTE, "UTC").unwrap();
        let result = render_graph(
            "name,nonexistent,:eq,:sum",
            &ctx,
            &GraphOptions::default(),
            &MemoryTagIndex::default(),
        )
        .unwrap();
        assert_eq!(result.graph_def.plots.len(), 1);
        assert!(result.graph_def.plots[0].is_empty());
        assert_eq!(result.graph_def.plots[0].lower, 0.0);
        assert_eq!(result.graph_def.plots[0].upper, 1.0);
        assert!(!result.png.is_empty());
    }

    #[test]
    fn test_codec_round_trip_and_rerender() {
        let result = render_graph(
            "name,sps,:eq,(,nf.cluster,),:by",
            &week_ctx(),
            &GraphOptions::default(),
            &week_corpus(),
        )
        .unwrap();

        for bytes in [
            chart::encode(&result.graph_def).unwrap(),
            chart::encode_gzip(&result.graph_def).unwrap(),
        ] {
            let back = chart::decode(&bytes).unwrap();
            assert_eq!(back, result.graph_def);
            // Re-rendering the decoded definition reproduces the image
            assert_eq!(render::render(&back).unwrap(), result.png);
        }
    }

    #[test]
    fn test_determinism_across_runs() {
        let run = || {
            render_graph(
                "name,sps,:eq,(,nf.cluster,),:by,:stack",
                &week_ctx(),
                &GraphOptions::default(),
                &week_corpus(),
            )
            .unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.png, b.png);
        assert_eq!(a.graph_def, b.graph_def);
    }

    #[test]
    fn test_unaligned_context_rejected() {
        assert!(matches!(
            EvalContext::new(10, 6 * MINUTE, MINUTE, "UTC"),
            Err(DataError::InvalidContext(_))
        ));
    }

    #[test]
    fn test_error_kinds_surface() {
        let ctx = EvalContext::new(0, 6 * MINUTE, MINUTE, "UTC").unwrap();
        let index = MemoryTagIndex::default();

        let bad_palette = GraphOptions {
            palette: "neon".to_string(),
            ..Default::default()
        };
        let err = render_graph("", &ctx, &bad_palette, &index).unwrap_err();
        assert_eq!(err.kind(), "usage");

        let err = render_graph("(,oops", &ctx, &GraphOptions::default(), &index).unwrap_err();
        assert_eq!(err.kind(), "parse");

        let err =
            render_graph("name,sps,:eq,:frobnicate", &ctx, &GraphOptions::default(), &index)
                .unwrap_err();
        assert_eq!(err.kind(), "eval");
    }

    #[test]
    fn test_empty_program_produces_empty_graph() {
        let ctx = EvalContext::new(0, 6 * MINUTE, MINUTE, "UTC").unwrap();
        let result = render_graph("", &ctx, &GraphOptions::default(), &MemoryTagIndex::default())
            .unwrap();
        assert_eq!(result.graph_def.legend_entries(), 0);
        assert_eq!(result.graph_def.width, 700);
    }
}
