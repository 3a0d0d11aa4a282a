//! Raster engine error types

use thiserror::Error;

/// Rendering failures
///
/// Rendering either completes or fails atomically; a partial image is
/// never returned.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Canvas below the layout minimum
    #[error("canvas {width}x{height} is below the minimum {min_width}x{min_height}")]
    InvalidCanvas {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },

    /// Chrome left no room for the plot area
    #[error("layout overflow: {0}")]
    LayoutOverflow(String),

    /// PNG encoder failure
    #[error("png encoding: {0}")]
    Encode(#[from] image::ImageError),
}

/// Result type for rendering
pub type RenderResult<T> = Result<T, RenderError>;
