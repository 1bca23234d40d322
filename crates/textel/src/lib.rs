//! # textel
//!
//! Renders an in-memory RGB raster as colored terminal text. Every output
//! cell is matched against a fixed palette in CIELAB space and emitted as
//! escape-coded text, suppressing escapes that repeat the previous cell's
//! colors.
//!
//! ## Features
//!
//! - **Palettes**: 16-color ANSI, the 16 mIRC colors, the xterm-256 color
//!   cube, and the xterm grayscale ramp
//! - **Half-block mode**: two vertically stacked pixels per cell using
//!   U+2580 with independent foreground/background colors
//! - **Redundancy elimination**: a color escape is only written when it
//!   differs from the immediately preceding cell
//!
//! ## Quick Start
//!
//! ```
//! use textel::{render, RenderOptions};
//!
//! // 2x2 raster, 3 bytes per pixel: red, green / blue, white
//! let rgb = [
//!     255, 0, 0, 0, 255, 0, //
//!     0, 0, 255, 255, 255, 255,
//! ];
//! let opts = RenderOptions {
//!     high_res: true,
//!     ..RenderOptions::default()
//! };
//! let text = render(&rgb, 2, 2, &opts)?;
//! print!("{text}");
//! # Ok::<(), textel::RenderError>(())
//! ```
//!
//! The caller owns image acquisition, decoding, resizing and contrast
//! adjustment; the raster handed to [`render`] is used as-is.

use thiserror::Error;

pub mod color;
pub mod encoder;
pub mod palette;

pub use color::Lab;
pub use encoder::{render, render_lines, Lines, RenderOptions, UPPER_HALF_BLOCK};
pub use palette::{Palette, PaletteEntry, RenderCode, Thresholds};

/// Errors that can occur when rendering a raster to terminal text.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Invalid image dimensions (width or height is zero)
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// Buffer size doesn't match expected size for dimensions
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Row stride of zero would never advance through the image
    #[error("row step must be at least 1")]
    InvalidStep,
}

/// Result type for render operations.
pub type Result<T> = core::result::Result<T, RenderError>;

/// Fits `width` x `height` into a bounding box, preserving aspect ratio.
///
/// The scale is `min(max_width / width, max_height / height)` and each
/// output dimension is rounded, with a floor of one pixel. Use this to
/// size a raster before resizing it for [`render`].
///
/// ```
/// assert_eq!(textel::fit_dimensions(200, 100, 100, 100), (100, 50));
/// ```
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let ratio = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let w = (width as f64 * ratio).round() as u32;
    let h = (height as f64 * ratio).round() as u32;
    (w.max(1), h.max(1))
}
