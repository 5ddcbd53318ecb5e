//! # PNG Summary Renderer
//!
//! Draws a [`SummarySnapshot`] as a 600×400 PNG card:
//!
//! - a title band,
//! - the total number of countries,
//! - the top countries by estimated GDP with proportional bars,
//! - the last refresh timestamp.
//!
//! Text uses the built-in 5×7 bitmap font scaled up, so no font files are
//! needed at runtime.

use super::font::{self, ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};
use crate::errors::ImageError;
use crate::summary::{SummaryRenderer, SummarySnapshot};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

pub const WIDTH: u32 = 600;
pub const HEIGHT: u32 = 400;

const BACKGROUND: Rgb<u8> = Rgb([245, 247, 250]);
const BAND: Rgb<u8> = Rgb([30, 60, 114]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([33, 37, 41]);
const MUTED: Rgb<u8> = Rgb([108, 117, 125]);
const BAR: Rgb<u8> = Rgb([52, 152, 219]);

const MARGIN: u32 = 20;
const BAND_HEIGHT: u32 = 60;
const ROW_HEIGHT: u32 = 36;
const NAME_CHARS: usize = 17;
const BAR_X: u32 = 250;
const BAR_MAX_WIDTH: u32 = 200;
const VALUE_X: u32 = 466;

/// Renders summary snapshots as PNG bytes.
#[derive(Debug, Clone, Default)]
pub struct PngSummaryRenderer;

impl PngSummaryRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl SummaryRenderer for PngSummaryRenderer {
    fn render(&self, snapshot: &SummarySnapshot) -> Result<Vec<u8>, ImageError> {
        let mut canvas = Canvas::new();

        canvas.fill_rect(0, 0, WIDTH, BAND_HEIGHT, BAND);
        canvas.text(MARGIN, 19, "Country Summary", 3, WHITE);

        canvas.text(MARGIN, 80, &format!("Total countries: {}", snapshot.total_countries), 2, INK);
        canvas.text(MARGIN, 114, &format!("Top {} by estimated GDP", snapshot.top.len()), 2, MUTED);

        if snapshot.top.is_empty() {
            canvas.text(MARGIN, 150, "No GDP data yet", 2, INK);
        }

        let max_gdp = snapshot
            .top
            .iter()
            .map(|t| t.estimated_gdp)
            .fold(0.0_f64, f64::max);

        for (rank, entry) in snapshot.top.iter().enumerate() {
            let y = 150 + rank as u32 * ROW_HEIGHT;
            let label = format!("{}. {}", rank + 1, truncate(&entry.name, NAME_CHARS));
            canvas.text(MARGIN, y, &label, 2, INK);

            let width = if max_gdp > 0.0 {
                ((entry.estimated_gdp / max_gdp) * BAR_MAX_WIDTH as f64).round() as u32
            } else {
                0
            };
            canvas.fill_rect(BAR_X, y, width.max(1), GLYPH_HEIGHT * 2, BAR);
            canvas.text(VALUE_X, y, &compact_usd(entry.estimated_gdp), 2, INK);
        }

        let refreshed = snapshot
            .last_refreshed_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        canvas.text(MARGIN, HEIGHT - 36, &format!("Last refresh: {refreshed}"), 2, MUTED);

        canvas.encode()
    }
}

/// `1234567.0` → `"$1.23M"`.
pub fn compact_usd(value: f64) -> String {
    const UNITS: [(f64, &str); 4] = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")];
    for (scale, suffix) in UNITS {
        if value.abs() >= scale {
            return format!("${:.2}{suffix}", value / scale);
        }
    }
    format!("${value:.2}")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(2)).collect();
    cut.push_str("..");
    cut
}

/// A fixed-size RGB canvas with clipped drawing.
struct Canvas {
    image: RgbImage,
}

impl Canvas {
    fn new() -> Self {
        Self {
            image: RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND),
        }
    }

    fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: Rgb<u8>) {
        for py in y..(y + height).min(HEIGHT) {
            for px in x..(x + width).min(WIDTH) {
                self.image.put_pixel(px, py, color);
            }
        }
    }

    fn text(&mut self, x: u32, y: u32, text: &str, scale: u32, color: Rgb<u8>) {
        for (i, c) in text.chars().enumerate() {
            let origin_x = x + i as u32 * ADVANCE * scale;
            if origin_x >= WIDTH {
                break;
            }
            for row in 0..GLYPH_HEIGHT {
                for col in 0..GLYPH_WIDTH {
                    if font::is_set(c, col, row) {
                        self.fill_rect(origin_x + col * scale, y + row * scale, scale, scale, color);
                    }
                }
            }
        }
    }

    fn encode(self) -> Result<Vec<u8>, ImageError> {
        let mut bytes = Cursor::new(Vec::new());
        self.image
            .write_to(&mut bytes, ImageFormat::Png)
            .map_err(|e| ImageError::Encode(e.to_string()))?;
        Ok(bytes.into_inner())
    }
}
