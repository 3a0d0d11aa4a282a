//! Pixel canvas
//!
//! An RGB buffer with the drawing primitives the engine needs: blended
//! pixels, rectangles, vertical fills, and stroked polyline segments
//! with a round brush. Coordinates are signed; anything off-canvas is
//! silently clipped.

use crate::chart::Color;
use crate::render::error::RenderResult;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};

/// An RGB raster the size of the requested graph
pub struct Canvas {
    img: RgbImage,
}

impl Canvas {
    /// A canvas filled with the background colour
    pub fn new(width: u32, height: u32, background: Color) -> Canvas {
        let img = RgbImage::from_pixel(width, height, rgb(background));
        Canvas { img }
    }

    /// Canvas width in pixels
    pub fn width(&self) -> i64 {
        self.img.width() as i64
    }

    /// Canvas height in pixels
    pub fn height(&self) -> i64 {
        self.img.height() as i64
    }

    /// Pixel at `(x, y)`, for tests and inspection
    pub fn pixel(&self, x: i64, y: i64) -> Option<Color> {
        if x < 0 || y < 0 || x >= self.width() || y >= self.height() {
            return None;
        }
        let p = self.img.get_pixel(x as u32, y as u32);
        Some(Color::rgb(p[0], p[1], p[2]))
    }

    /// Blend a pixel over the existing one; `alpha` in `[0, 1]`
    pub fn blend_pixel(&mut self, x: i64, y: i64, color: Color, alpha: f64) {
        if x < 0 || y < 0 || x >= self.width() || y >= self.height() {
            return;
        }
        let (xu, yu) = (x as u32, y as u32);
        let base = self.img.get_pixel(xu, yu);
        let blended = color.over(Color::rgb(base[0], base[1], base[2]), alpha);
        self.img.put_pixel(xu, yu, rgb(blended));
    }

    /// Fill the half-open rectangle `[x0, x1) x [y0, y1)`
    pub fn fill_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Color, alpha: f64) {
        for y in y0.max(0)..y1.min(self.height()) {
            for x in x0.max(0)..x1.min(self.width()) {
                self.blend_pixel(x, y, color, alpha);
            }
        }
    }

    /// Fill one pixel column between two y values, order-insensitive
    pub fn fill_vertical(&mut self, x: i64, ya: i64, yb: i64, color: Color, alpha: f64) {
        let (top, bottom) = if ya <= yb { (ya, yb) } else { (yb, ya) };
        for y in top..=bottom {
            self.blend_pixel(x, y, color, alpha);
        }
    }

    /// Horizontal one-pixel line, inclusive ends
    pub fn hline(&mut self, x0: i64, x1: i64, y: i64, color: Color) {
        let (a, b) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        for x in a..=b {
            self.blend_pixel(x, y, color, 1.0);
        }
    }

    /// Vertical one-pixel line, inclusive ends
    pub fn vline(&mut self, x: i64, y0: i64, y1: i64, color: Color) {
        let (a, b) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        for y in a..=b {
            self.blend_pixel(x, y, color, 1.0);
        }
    }

    /// Stroke a segment with a round brush of the given width
    pub fn draw_line(
        &mut self,
        x0: i64,
        y0: i64,
        x1: i64,
        y1: i64,
        color: Color,
        width: u32,
        alpha: f64,
    ) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);
        loop {
            self.stamp(x, y, color, width, alpha);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Stamp a filled disc of diameter `width`, the joint shape of strokes
    pub fn stamp(&mut self, x: i64, y: i64, color: Color, width: u32, alpha: f64) {
        if width <= 1 {
            self.blend_pixel(x, y, color, alpha);
            return;
        }
        let r = width as i64 / 2;
        let r2 = r * r + 1;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r2 {
                    self.blend_pixel(x + dx, y + dy, color, alpha);
                }
            }
        }
    }

    /// Encode as PNG bytes
    ///
    /// Plain 8-bit RGB with no ancillary chunks or timestamps; identical
    /// canvases always encode to identical bytes.
    pub fn encode_png(&self) -> RenderResult<Vec<u8>> {
        let mut out = Vec::new();
        let encoder = PngEncoder::new(&mut out);
        encoder.write_image(
            self.img.as_raw(),
            self.img.width(),
            self.img.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(out)
    }
}

fn rgb(c: Color) -> Rgb<u8> {
    Rgb([c.r, c.g, c.b])
}
