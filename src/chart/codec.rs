//! Graph definition codec (V2)
//!
//! Round-trippable JSON for [`GraphDef`] inside a versioned envelope.
//! Keys are emitted in declaration order and floats round-trip exactly,
//! so encoding the same definition always yields the same bytes. Gzip is
//! applied transparently when the target name ends in `.gz`.

use crate::chart::GraphDef;
use crate::model::DataError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

/// Envelope version this codec reads and writes
pub const FORMAT_VERSION: u32 = 2;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Codec failures
#[derive(Error, Debug)]
pub enum CodecError {
    /// Structurally invalid JSON
    #[error("malformed graph definition: {0}")]
    Json(#[from] serde_json::Error),

    /// Envelope version this codec does not understand
    #[error("unsupported version {found}, expected {FORMAT_VERSION}")]
    Version { found: u32 },

    /// Decoded definition violates graph invariants
    #[error("invalid graph definition: {0}")]
    Invalid(#[from] DataError),

    /// Compressed stream failure
    #[error("gzip stream: {0}")]
    Gzip(#[from] std::io::Error),
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    #[serde(flatten)]
    graph: GraphDef,
}

/// Encode to JSON bytes
pub fn encode(graph: &GraphDef) -> CodecResult<Vec<u8>> {
    let envelope = Envelope {
        version: FORMAT_VERSION,
        graph: graph.clone(),
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Encode to gzip-wrapped JSON bytes
pub fn encode_gzip(graph: &GraphDef) -> CodecResult<Vec<u8>> {
    let json = encode(graph)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Encode for a target name, gzip iff it ends in `.gz`
pub fn encode_for_name(graph: &GraphDef, name: &str) -> CodecResult<Vec<u8>> {
    if name.ends_with(".gz") {
        encode_gzip(graph)
    } else {
        encode(graph)
    }
}

/// Decode from plain or gzip-wrapped JSON bytes
pub fn decode(bytes: &[u8]) -> CodecResult<GraphDef> {
    let json: Vec<u8> = if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(bytes);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        out
    } else {
        bytes.to_vec()
    };

    // Check the version before committing to the full structure, so a
    // format bump reports cleanly instead of as a field mismatch.
    #[derive(Deserialize)]
    struct VersionProbe {
        version: u32,
    }
    let probe: VersionProbe = serde_json::from_slice(&json)?;
    if probe.version != FORMAT_VERSION {
        return Err(CodecError::Version {
            found: probe.version,
        });
    }

    let envelope: Envelope = serde_json::from_slice(&json)?;
    envelope.graph.validate()?;
    Ok(envelope.graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{Color, Layout, LineDef, LineStyle, PlotDef, Theme, VSpanDef};
    use crate::model::TimeSeq;

    fn sample_graph() -> GraphDef {
        GraphDef {
            start_time: 0,
            end_time: 180_000,
            step: 60_000,
            width: 700,
            height: 300,
            theme: Theme::Light,
            layout: Layout::Single,
            timezone: "UTC".to_string(),
            title: Some("sps by cluster".to_string()),
            ylabel: None,
            show_legend: true,
            legend_stats: true,
            only_graph: false,
            plots: vec![PlotDef {
                ylabel: None,
                lower: 0.0,
                upper: 66.0,
                lines: vec![LineDef {
                    label: "input".to_string(),
                    color: Color::rgb(255, 0, 0),
                    style: LineStyle::Line,
                    line_width: 1,
                    alpha: 100,
                    data: TimeSeq::new(0, 60_000, vec![11.0, f64::NAN, 66.0]).unwrap(),
                    axis: 0,
                }],
                vspans: vec![VSpanDef {
                    t1: 60_000,
                    t2: 120_000,
                    color: Color::rgb(0, 0, 255),
                    alpha: 40,
                    label: "triggered".to_string(),
                }],
            }],
        }
    }

    #[test]
    fn test_round_trip() {
        let graph = sample_graph();
        let bytes = encode(&graph).unwrap();
        let back = decode(&bytes).unwrap();
        assert_eq!(back, graph);
    }

    #[test]
    fn test_round_trip_gzip() {
        let graph = sample_graph();
        let bytes = encode_gzip(&graph).unwrap();
        assert_eq!(&bytes[..2], &GZIP_MAGIC);
        let back = decode(&bytes).unwrap();
        assert_eq!(back, graph);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let graph = sample_graph();
        assert_eq!(encode(&graph).unwrap(), encode(&graph).unwrap());
        assert_eq!(encode_gzip(&graph).unwrap(), encode_gzip(&graph).unwrap());
    }

    #[test]
    fn test_envelope_shape() {
        let graph = sample_graph();
        let bytes = encode(&graph).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("{\"version\":2,\"startTime\":0,"));
        assert!(text.contains("\"theme\":\"light\""));
    }

    #[test]
    fn test_encode_for_name_picks_gzip() {
        let graph = sample_graph();
        let plain = encode_for_name(&graph, "out.v2.json").unwrap();
        assert_eq!(plain[0], b'{');
        let zipped = encode_for_name(&graph, "out.v2.json.gz").unwrap();
        assert_eq!(&zipped[..2], &GZIP_MAGIC);
    }

    #[test]
    fn test_decode_rejects_wrong_version() {
        let graph = sample_graph();
        let text = String::from_utf8(encode(&graph).unwrap()).unwrap();
        let bumped = text.replacen("\"version\":2", "\"version\":1", 1);
        assert!(matches!(
            decode(bumped.as_bytes()),
            Err(CodecError::Version { found: 1 })
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(b"not json"), Err(CodecError::Json(_))));
    }

    #[test]
    fn test_decode_rejects_misaligned_graph() {
        let mut graph = sample_graph();
        graph.plots[0].lines[0].data = TimeSeq::new(0, 60_000, vec![1.0]).unwrap();
        let envelope = Envelope {
            version: FORMAT_VERSION,
            graph,
        };
        let bytes = serde_json::to_vec(&envelope).unwrap();
        assert!(matches!(decode(&bytes), Err(CodecError::Invalid(_))));
    }
}
