//! Renders a single decoded frame into ASCII lines.

use crate::error::{ConvertError, Result};
use crate::luminance::{char_for, luminance, ASCII_CHARS};
use image::imageops::FilterType;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Character cells are taller than wide; rows = floor(columns * FONT_RATIO).
pub const FONT_RATIO: f64 = 0.44;

/// Text color used by the monochrome markup modes.
const MONOCHROME_COLOR: &str = "#ffffff";

/// Output style of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Every glyph wrapped in a span carrying its source RGB color
    Colored,
    /// Every glyph wrapped in a white span
    MonochromeBrowser,
    /// Same encoding as `MonochromeBrowser`, meant for a high threshold
    TransparentBrowser,
    /// Plain text, fixed-width lines
    MonochromeFull,
    /// Plain text with a high threshold
    TransparentFull,
}

impl RenderMode {
    pub const ALL: [RenderMode; 5] = [
        RenderMode::Colored,
        RenderMode::MonochromeBrowser,
        RenderMode::TransparentBrowser,
        RenderMode::MonochromeFull,
        RenderMode::TransparentFull,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RenderMode::Colored => "colored",
            RenderMode::MonochromeBrowser => "monochrome_browser",
            RenderMode::TransparentBrowser => "transparent_browser",
            RenderMode::MonochromeFull => "monochrome_full",
            RenderMode::TransparentFull => "transparent_full",
        }
    }

    /// Whether glyphs are wrapped in `<span>` markup.
    pub fn is_markup(self) -> bool {
        matches!(
            self,
            RenderMode::Colored | RenderMode::MonochromeBrowser | RenderMode::TransparentBrowser
        )
    }

    /// Threshold used when neither the user nor a preset picks one.
    pub fn default_threshold(self) -> u8 {
        match self {
            RenderMode::TransparentBrowser | RenderMode::TransparentFull => 100,
            _ => 15,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RenderMode::Colored => "Full RGB color with HTML spans (for browser)",
            RenderMode::MonochromeBrowser => "Grayscale with HTML spans (for browser)",
            RenderMode::TransparentBrowser => "High threshold with HTML spans (for browser)",
            RenderMode::MonochromeFull => "Pure ASCII text (for terminal/console)",
            RenderMode::TransparentFull => "Pure ASCII with high threshold (for terminal/console)",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RenderMode {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        RenderMode::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let available = RenderMode::ALL.map(RenderMode::name).join(", ");
                ConvertError::invalid(format!("unknown mode '{}'. Available modes: {}", s, available))
            })
    }
}

/// Number of text rows produced for `columns` character columns.
pub fn rows_for(columns: u32) -> u32 {
    (columns as f64 * FONT_RATIO) as u32
}

/// Checks that `columns` yields a non-empty character grid and returns its row count.
pub fn validate_columns(columns: u32) -> Result<u32> {
    if columns == 0 {
        return Err(ConvertError::invalid("columns must be a positive integer"));
    }
    let rows = rows_for(columns);
    if rows == 0 {
        return Err(ConvertError::invalid(format!(
            "{} columns produce zero rows (need at least {})",
            columns,
            (1.0 / FONT_RATIO).ceil() as u32
        )));
    }
    Ok(rows)
}

/// Converts `frame` into `rows_for(columns)` lines of ASCII art.
pub fn render_frame(frame: &RgbImage, mode: RenderMode, threshold: u8, columns: u32) -> Result<Vec<String>> {
    let rows = validate_columns(columns)?;
    let (w, h) = frame.dimensions();
    if w == 0 || h == 0 {
        return Err(ConvertError::invalid("frame has no pixels"));
    }

    let resized;
    let grid = if (w, h) == (columns, rows) {
        frame
    } else {
        resized = image::imageops::resize(frame, columns, rows, FilterType::Lanczos3);
        &resized
    };

    let ascii_chars = ASCII_CHARS.as_bytes();
    let mut lines = Vec::with_capacity(rows as usize);
    for y in 0..rows {
        let mut line = String::with_capacity(line_capacity(mode, columns));
        for x in 0..columns {
            let px = grid.get_pixel(x, y);
            let [r, g, b] = px.0;
            let ch = char_for(luminance(r, g, b), threshold, ascii_chars);
            match mode {
                RenderMode::Colored => {
                    push_span(&mut line, &format!("rgb({},{},{})", r, g, b), ch);
                }
                RenderMode::MonochromeBrowser | RenderMode::TransparentBrowser => {
                    push_span(&mut line, MONOCHROME_COLOR, ch);
                }
                RenderMode::MonochromeFull | RenderMode::TransparentFull => line.push(ch),
            }
        }
        if !mode.is_markup() {
            pad_to_width(&mut line, columns as usize);
        }
        lines.push(line);
    }
    Ok(lines)
}

/// [`render_frame`] joined into the on-disk frame format.
pub fn render_to_string(frame: &RgbImage, mode: RenderMode, threshold: u8, columns: u32) -> Result<String> {
    Ok(render_frame(frame, mode, threshold, columns)?.join("\n"))
}

fn line_capacity(mode: RenderMode, columns: u32) -> usize {
    if mode.is_markup() {
        columns as usize * 48
    } else {
        columns as usize
    }
}

fn push_span(line: &mut String, color: &str, ch: char) {
    line.push_str("<span style=\"color:");
    line.push_str(color);
    line.push_str("\">");
    match ch {
        '<' => line.push_str("&lt;"),
        '>' => line.push_str("&gt;"),
        '&' => line.push_str("&amp;"),
        _ => line.push(ch),
    }
    line.push_str("</span>");
}

fn pad_to_width(line: &mut String, width: usize) {
    let len = line.chars().count();
    if len < width {
        line.extend(std::iter::repeat(' ').take(width - len));
    }
}
