// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Blattwerk document pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BlattwerkError;

/// Named Ghostscript quality/size trade-off.
///
/// Parsing is strict: an unknown name is [`BlattwerkError::UnknownPreset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionPreset {
    /// Smallest output, 72 dpi images.
    Screen,
    /// Medium output, 150 dpi images.
    Ebook,
    /// High quality, 300 dpi images.
    Printer,
    /// Maximum quality, colour preserving.
    Prepress,
    /// Ghostscript's general-purpose defaults.
    Default,
}

impl CompressionPreset {
    pub const ALL: [CompressionPreset; 5] = [
        Self::Screen,
        Self::Ebook,
        Self::Printer,
        Self::Prepress,
        Self::Default,
    ];

    /// Preset name as Ghostscript spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::Ebook => "ebook",
            Self::Printer => "printer",
            Self::Prepress => "prepress",
            Self::Default => "default",
        }
    }

    /// The `-dPDFSETTINGS=/<preset>` argument fragment.
    pub fn settings_arg(&self) -> String {
        format!("-dPDFSETTINGS=/{}", self.as_str())
    }
}

impl fmt::Display for CompressionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionPreset {
    type Err = BlattwerkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| BlattwerkError::UnknownPreset(s.to_string()))
    }
}

/// Pixel dimensions of a raster image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Zero-area images cannot be placed on a page.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Rectangle around a recognised word, in raster pixel space (origin
/// top-left, Y increasing downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Build from a left/top origin plus width and height, as tesseract reports.
    pub fn from_origin_size(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// A single word produced by the OCR engine for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedWord {
    pub text: String,
    /// Engine confidence in the range 0–100, when the engine reports one.
    pub confidence: Option<f32>,
    pub bbox: BoundingBox,
}

impl RecognizedWord {
    pub fn new(text: impl Into<String>, confidence: Option<f32>, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            confidence,
            bbox,
        }
    }
}

/// OCR output for one page: the words and the size of the image the engine
/// actually worked on, which may be a rescaled copy of its input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecognition {
    pub words: Vec<RecognizedWord>,
    pub image_size: ImageSize,
}

impl PageRecognition {
    pub fn empty(image_size: ImageSize) -> Self {
        Self {
            words: Vec::new(),
            image_size,
        }
    }
}

/// Reference to one page of one source document: (source index, zero-based
/// page index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: usize,
    pub page: usize,
}

impl SourceRef {
    pub fn new(source: usize, page: usize) -> Self {
        Self { source, page }
    }
}

/// Supported input document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    Pdf,
    Jpeg,
    Png,
    Tiff,
}

impl DocumentType {
    /// Sniff the document type from its leading bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF-") {
            Some(Self::Pdf)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
            Some(Self::Tiff)
        } else {
            None
        }
    }

    pub fn is_raster(&self) -> bool {
        !matches!(self, Self::Pdf)
    }
}

/// Standard paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Custom { width_mm: u32, height_mm: u32 },
}

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A4 => (210, 297),
            Self::A3 => (297, 420),
            Self::A5 => (148, 210),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }

    /// Dimensions in PDF points (1/72 inch).
    pub fn dimensions_pt(&self) -> (f32, f32) {
        let (w, h) = self.dimensions_mm();
        (mm_to_pt(w as f32), mm_to_pt(h as f32))
    }
}

/// Convert millimetres to points.
pub fn mm_to_pt(mm: f32) -> f32 {
    mm * 72.0 / 25.4
}

/// Convert points to millimetres.
pub fn pt_to_mm(pt: f32) -> f32 {
    pt * 25.4 / 72.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_parses_known_names() {
        assert_eq!("screen".parse::<CompressionPreset>().unwrap(), CompressionPreset::Screen);
        assert_eq!(" Ebook ".parse::<CompressionPreset>().unwrap(), CompressionPreset::Ebook);
        assert_eq!("default".parse::<CompressionPreset>().unwrap(), CompressionPreset::Default);
    }

    #[test]
    fn preset_rejects_unknown_names() {
        let err = "tiny".parse::<CompressionPreset>().unwrap_err();
        assert!(matches!(err, BlattwerkError::UnknownPreset(ref name) if name == "tiny"));
        assert!("".parse::<CompressionPreset>().is_err());
    }

    #[test]
    fn preset_settings_fragment() {
        assert_eq!(CompressionPreset::Prepress.settings_arg(), "-dPDFSETTINGS=/prepress");
    }

    #[test]
    fn preset_serde_is_lowercase() {
        let json = serde_json::to_string(&CompressionPreset::Printer).unwrap();
        assert_eq!(json, "\"printer\"");
    }

    #[test]
    fn sniff_document_types() {
        assert_eq!(DocumentType::from_magic(b"%PDF-1.7\n"), Some(DocumentType::Pdf));
        assert_eq!(
            DocumentType::from_magic(b"\x89PNG\r\n\x1a\n\0\0"),
            Some(DocumentType::Png)
        );
        assert_eq!(DocumentType::from_magic(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(DocumentType::Jpeg));
        assert_eq!(DocumentType::from_magic(b"hello"), None);
    }

    #[test]
    fn bbox_from_origin_size() {
        let bbox = BoundingBox::from_origin_size(10.0, 20.0, 30.0, 5.0);
        assert_eq!(bbox, BoundingBox::new(10.0, 20.0, 40.0, 25.0));
        assert_eq!(bbox.height(), 5.0);
    }

    #[test]
    fn a4_in_points() {
        let (w, h) = PaperSize::A4.dimensions_pt();
        assert!((w - 595.28).abs() < 0.01);
        assert!((h - 841.89).abs() < 0.01);
    }
}
