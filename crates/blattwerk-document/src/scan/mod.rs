// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanned-page pipeline: OCR engines, pixel-to-page coordinate
// reconciliation, and composition of searchable image PDFs.

pub mod compositor;
pub mod overlay;
pub mod recognizer;
pub mod tesseract;

#[cfg(feature = "ocr")]
pub mod ocr;

pub use compositor::{ComposedPage, OcrCompositor, OcrProgress, render_searchable};
pub use overlay::{ScaleFactors, TextPlacement};
pub use recognizer::TextRecognizer;
pub use tesseract::TesseractRecognizer;

#[cfg(feature = "ocr")]
pub use ocr::OcrsRecognizer;
