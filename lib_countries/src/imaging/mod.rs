//! # Imaging Module
//!
//! Raster renderings of the refresh summary.

/// PNG summary card with a built-in bitmap font.
pub mod png_summary;

mod font;

pub use png_summary::PngSummaryRenderer;
