//! PNG raster engine
//!
//! Deterministic rasterisation of graph definitions: a pixel canvas, an
//! embedded bitmap font, tick selection, and the layout engine. The same
//! [`crate::chart::GraphDef`] and theme always produce identical bytes.

mod canvas;
mod engine;
mod error;
mod font;
mod ticks;

pub use canvas::Canvas;
pub use engine::render;
pub use error::{RenderError, RenderResult};
pub use font::{draw_text, draw_text_rot90, text_width};
pub use ticks::{fmt_value, time_ticks, value_ticks, TimeTick, ValueTick};
