//! Brightness computation and brightness-to-glyph mapping.

/// Glyphs ordered from darkest to brightest.
pub const ASCII_CHARS: &str =
    " .'\"`^,:;Il!i><~+_-?][}{1)(|/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$";

/// Perceptual brightness of an RGB triple using the Rec. 601 luma weights.
///
/// The result lies in `[0.0, 255.0]`.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// Picks the glyph whose position in `ascii_chars` is proportional to `luma`.
///
/// The index is clamped to the last glyph so `luma == 255.0` (or float
/// overshoot above it) never reads past the end.
pub fn glyph_for(luma: f64, ascii_chars: &[u8]) -> char {
    let Some(last) = ascii_chars.len().checked_sub(1) else {
        return ' ';
    };
    let idx = ((luma / 255.0) * last as f64) as usize;
    ascii_chars[idx.min(last)] as char
}

/// Like [`glyph_for`], but anything darker than `threshold` becomes a blank.
#[inline]
pub fn char_for(luma: f64, threshold: u8, ascii_chars: &[u8]) -> char {
    if luma < threshold as f64 {
        return ' ';
    }
    glyph_for(luma, ascii_chars)
}
