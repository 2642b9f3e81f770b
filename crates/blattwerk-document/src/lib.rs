// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// blattwerk-document: Page-structured document operations.
//
// Provides page selection and page-level assembly (merge, split, reorder)
// over `lopdf`, image-to-PDF conversion with `printpdf`, and the OCR
// compositor that lays an invisible, aligned text layer over scanned pages.

pub mod pdf;
pub mod scan;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use pdf::assembler::DocumentAssembler;
pub use pdf::document::Pdf;
pub use pdf::selector::{PageIndexSet, PageSelector};
pub use pdf::writer::PdfWriter;
pub use scan::compositor::{OcrCompositor, OcrProgress, render_searchable};
pub use scan::recognizer::TextRecognizer;
pub use scan::tesseract::TesseractRecognizer;

#[cfg(feature = "ocr")]
pub use scan::ocr::OcrsRecognizer;
