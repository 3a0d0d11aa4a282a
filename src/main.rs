//! Vellum CLI
//!
//! Renders a graph from a stack-language query against a synthetic
//! demo corpus:
//!
//! ```text
//! vellum --q "name,sps,:eq,(,nf.cluster,),:by" \
//!        --s e-1w --e 2012-01-01T00:00:00Z --step 1m \
//!        --out graph.png --emit-v2 graph.v2.json.gz
//! ```
//!
//! Exit codes: 0 success, 2 usage error, 1 runtime failure.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vellum::model::{TagMap, TimeSeq, TimeSeries};
use vellum::timeparse::{self, parse_step, parse_time};
use vellum::{
    chart, render_graph, EvalContext, GraphError, GraphOptions, MemoryTagIndex, UsageError,
};

#[derive(Parser)]
#[command(name = "vellum")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Render time-series graphs from stack-language queries")]
struct Cli {
    /// Query program text
    #[arg(long)]
    q: String,

    /// Window start: ISO-8601, epoch millis, or e-relative like e-1w
    #[arg(long, default_value = "e-3h")]
    s: String,

    /// Window end: ISO-8601, epoch millis, now, or now-relative
    #[arg(long, default_value = "now")]
    e: String,

    /// Time zone for tick labels
    #[arg(long, default_value = "UTC")]
    tz: String,

    /// Step: a duration like 1m, or raw milliseconds
    #[arg(long, default_value = "1m")]
    step: String,

    /// Canvas width in pixels
    #[arg(long, default_value_t = 700)]
    w: u32,

    /// Canvas height in pixels
    #[arg(long, default_value_t = 300)]
    h: u32,

    #[arg(long, default_value = "light")]
    theme: String,

    /// Plot arrangement: single, or axes for one plot per y-axis
    #[arg(long, default_value = "single")]
    layout: String,

    /// Palette name, optionally prefixed with hash:
    #[arg(long, default_value = "default")]
    palette: String,

    /// Omit the legend band
    #[arg(long)]
    no_legend: bool,

    /// Omit per-line statistics from legend entries
    #[arg(long)]
    no_legend_stats: bool,

    /// Draw only the plot area, no chrome
    #[arg(long)]
    only_graph: bool,

    /// Title text above the plot
    #[arg(long)]
    title: Option<String>,

    /// Label along the left axis
    #[arg(long)]
    ylabel: Option<String>,

    /// Explicit lower y bound
    #[arg(long)]
    l: Option<f64>,

    /// Explicit upper y bound
    #[arg(long)]
    u: Option<f64>,

    /// Legend sort: legend, min, max, avg, count, total, last
    #[arg(long)]
    sort: Option<String>,

    /// Legend sort direction: asc or desc
    #[arg(long, default_value = "asc")]
    order: String,

    /// Demo corpus to query: sps or alerts
    #[arg(long, default_value = "sps")]
    preset: String,

    /// PNG destination
    #[arg(long)]
    out: PathBuf,

    /// Optional graph definition destination; gzip iff it ends in .gz
    #[arg(long)]
    emit_v2: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "vellum=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR {}: {}", e.kind(), e);
            match e {
                GraphError::Usage(_) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(cli: &Cli) -> Result<(), GraphError> {
    let context = build_context(cli)?;
    let options = build_options(cli)?;
    let index = build_corpus(&cli.preset, &context)?;

    let result = render_graph(&cli.q, &context, &options, &index)?;

    write_atomic(&cli.out, &result.png)?;
    tracing::info!(path = %cli.out.display(), bytes = result.png.len(), "wrote graph");

    if let Some(v2_path) = &cli.emit_v2 {
        let name = v2_path.to_string_lossy();
        let bytes = chart::encode_for_name(&result.graph_def, &name)?;
        write_atomic(v2_path, &bytes)?;
        tracing::info!(path = %v2_path.display(), "wrote graph definition");
    }
    Ok(())
}

fn build_context(cli: &Cli) -> Result<EvalContext, GraphError> {
    let usage = |e: vellum::timeparse::TimeParseError| {
        GraphError::Usage(UsageError::InvalidTime(e.to_string()))
    };
    let step = parse_step(&cli.step).map_err(usage)?;
    let now = timeparse::now_millis();
    let end = parse_time(&cli.e, now, None).map_err(usage)?;
    let start = parse_time(&cli.s, now, Some(end)).map_err(usage)?;
    // Boundaries snap down to the step grid before validation
    let start = timeparse::align_down(start, step);
    let end = timeparse::align_down(end, step);
    Ok(EvalContext::new(start, end, step, &cli.tz)?)
}

fn build_options(cli: &Cli) -> Result<GraphOptions, GraphError> {
    let usage = |m: String| GraphError::Usage(UsageError::InvalidFlag(m));
    Ok(GraphOptions {
        width: cli.w,
        height: cli.h,
        theme: cli.theme.parse().map_err(usage)?,
        layout: cli.layout.parse().map_err(usage)?,
        palette: cli.palette.clone(),
        show_legend: !cli.no_legend,
        legend_stats: !cli.no_legend_stats,
        only_graph: cli.only_graph,
        title: cli.title.clone(),
        ylabel: cli.ylabel.clone(),
        lower: cli.l,
        upper: cli.u,
        sort: match &cli.sort {
            Some(s) => Some(s.parse().map_err(usage)?),
            None => None,
        },
        order: cli.order.parse().map_err(usage)?,
        keep_empty_stack_layers: false,
    })
}

/// Generate the demo corpus over the evaluation window
///
/// Day-period waves per cluster for `sps`; the `alerts` preset adds an
/// outage dropping one cluster to zero for a stretch mid-window.
fn build_corpus(preset: &str, ctx: &EvalContext) -> Result<MemoryTagIndex, GraphError> {
    let clusters: &[(&str, f64, f64)] = &[
        ("nccp-silverlight", 20_000.0, 80_000.0),
        ("nccp-xbox", 10_000.0, 30_000.0),
        ("nccp-wii", 5_000.0, 15_000.0),
        ("nccp-ps3", 8_000.0, 20_000.0),
    ];

    // Outage covers the middle third of the window for the first cluster
    let outage = match preset {
        "sps" => None,
        "alerts" => {
            let span = ctx.end() - ctx.start();
            Some((ctx.start() + span / 3, ctx.start() + 2 * span / 3))
        }
        other => {
            return Err(GraphError::Usage(UsageError::InvalidFlag(format!(
                "unknown preset: {:?}",
                other
            ))))
        }
    };

    let lambda = 2.0 * std::f64::consts::PI / 86_400_000.0;
    let mut series = Vec::new();
    for (i, (cluster, min, max)) in clusters.iter().enumerate() {
        let amp = (max - min) / 2.0;
        let offset = min + amp;
        let values: Vec<f64> = ctx
            .timestamps()
            .map(|t| {
                if i == 0 {
                    if let Some((o_start, o_end)) = outage {
                        if t >= o_start && t < o_end {
                            return 0.0;
                        }
                    }
                }
                amp * (t as f64 * lambda).sin() + offset
            })
            .collect();
        let mut tags = TagMap::new();
        tags.insert("name".to_string(), "sps".to_string());
        tags.insert("nf.cluster".to_string(), cluster.to_string());
        series.push(TimeSeries::new(
            tags,
            TimeSeq::new(ctx.start(), ctx.step(), values)?,
        ));
    }
    Ok(MemoryTagIndex::new(series))
}

/// Write through a temp file and rename, so a failure never leaves a
/// partial file at the requested path
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    let result = std::fs::write(&tmp, bytes).and_then(|_| std::fs::rename(&tmp, path));
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}
