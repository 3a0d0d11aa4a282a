//! Graph model and construction
//!
//! Everything between the evaluator and the raster engine: the
//! self-describing [`GraphDef`] tree, colour palettes and themes, the
//! builder that shapes evaluator output into plots, and the V2 codec.

mod builder;
mod codec;
mod color;
mod def;
mod palette;

pub use builder::{build_graph_def, vspan_bands, LineStats, SortMode, SortOrder};
pub use codec::{
    decode, encode, encode_for_name, encode_gzip, CodecError, CodecResult, FORMAT_VERSION,
};
pub use color::Color;
pub use def::{GraphDef, Layout, LineDef, LineStyle, PlotDef, Theme, VSpanDef};
pub use palette::{hash_label, Palette, PaletteSelection, ThemeColors};
