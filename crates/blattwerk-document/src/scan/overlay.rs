// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Coordinate reconciliation between OCR pixel space and page space.
//
// OCR reports word boxes in the pixel grid of the image it actually looked at
// (origin top-left, Y down), which may be a rescaled copy of the image we
// embed. Page space has its origin bottom-left with Y up. Every function here
// is pure arithmetic so alignment can be checked without an OCR engine.

use blattwerk_core::{BoundingBox, ImageSize, RecognizedWord};

/// Smallest font size used for the invisible text layer.
pub const MIN_FONT_SIZE: f32 = 6.0;

/// Fraction of a word box's height taken by the font size.
pub const GLYPH_FILL: f32 = 0.9;

/// Factors that map OCR pixel coordinates onto the embedded image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub x: f32,
    pub y: f32,
}

/// `embedded / recognized` per axis. Returns `None` when the recognised image
/// has no area, in which case no word can be placed.
pub fn scale_factors(embedded_w: f32, embedded_h: f32, recognized: ImageSize) -> Option<ScaleFactors> {
    if recognized.is_empty() {
        return None;
    }
    Some(ScaleFactors {
        x: embedded_w / recognized.width as f32,
        y: embedded_h / recognized.height as f32,
    })
}

/// One word positioned in page space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPlacement {
    pub text: String,
    /// Left edge of the word.
    pub x: f32,
    /// Baseline, measured up from the bottom of the page.
    pub y: f32,
    pub font_size: f32,
    /// Height of the word box after scaling.
    pub glyph_height: f32,
}

/// Scale a pixel-space box and flip it into page space.
///
/// `x = x0·sx`, `y = embedded_h − y1·sy`, `height = (y1 − y0)·sy`, and the
/// font size is `max(height·0.9, 6)`.
pub fn place_box(bbox: &BoundingBox, scale: ScaleFactors, embedded_h: f32) -> (f32, f32, f32, f32) {
    let x = bbox.x0 * scale.x;
    let y = embedded_h - bbox.y1 * scale.y;
    let glyph_height = bbox.height() * scale.y;
    let font_size = (glyph_height * GLYPH_FILL).max(MIN_FONT_SIZE);
    (x, y, glyph_height, font_size)
}

/// Place one word, or `None` if its trimmed text is empty.
pub fn place_word(word: &RecognizedWord, scale: ScaleFactors, embedded_h: f32) -> Option<TextPlacement> {
    let text = word.text.trim();
    if text.is_empty() {
        return None;
    }
    let (x, y, glyph_height, font_size) = place_box(&word.bbox, scale, embedded_h);
    Some(TextPlacement {
        text: text.to_string(),
        x,
        y,
        font_size,
        glyph_height,
    })
}

/// Place every non-empty word recognised on an image embedded at
/// `embedded_w`×`embedded_h` page units.
pub fn place_words(
    words: &[RecognizedWord],
    recognized: ImageSize,
    embedded_w: f32,
    embedded_h: f32,
) -> Vec<TextPlacement> {
    let Some(scale) = scale_factors(embedded_w, embedded_h, recognized) else {
        return Vec::new();
    };
    words
        .iter()
        .filter_map(|word| place_word(word, scale, embedded_h))
        .collect()
}
