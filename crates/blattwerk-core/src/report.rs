// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structured error reports returned to callers.
//
// Every technical error is mapped to a kind, a plain English message, and the
// technical detail (tool stderr included) for diagnosis.

use serde::Serialize;

use crate::error::{BlattwerkError, ErrorKind};

/// A caller-facing error: `{ kind, message, detail }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    /// Plain English summary.
    pub message: String,
    /// Technical detail: the error's display text.
    pub detail: String,
}

impl ErrorReport {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"detail\":{:?}}}", self.detail))
    }
}

impl From<&BlattwerkError> for ErrorReport {
    fn from(err: &BlattwerkError) -> Self {
        Self {
            kind: err.kind(),
            message: summarize(err),
            detail: err.to_string(),
        }
    }
}

impl From<BlattwerkError> for ErrorReport {
    fn from(err: BlattwerkError) -> Self {
        Self::from(&err)
    }
}

fn summarize(err: &BlattwerkError) -> String {
    match err {
        BlattwerkError::InvalidInput(_) => "The request is missing something or is malformed.".into(),
        BlattwerkError::InvalidRange(_) => {
            "The page range could not be read. Use page numbers and ranges like 1-3,5,8-10.".into()
        }
        BlattwerkError::OutOfBounds { page_count, .. } => {
            format!("A requested page does not exist; the document has {page_count} pages.")
        }
        BlattwerkError::EmptyInput => "No documents were uploaded.".into(),
        BlattwerkError::UnknownPreset(_) => {
            "Unknown compression level. Choose screen, ebook, printer, prepress, or default.".into()
        }
        BlattwerkError::PdfError(_) => "This PDF could not be read; it may be damaged.".into(),
        BlattwerkError::ImageError(_) => {
            "This image could not be read; try saving it as JPEG or PNG first.".into()
        }
        BlattwerkError::OcrError(_) => "Text recognition failed on this document.".into(),
        BlattwerkError::OcrEngineUnavailable(_) => {
            "Text recognition is not available on this server.".into()
        }
        BlattwerkError::ToolUnavailable { tool, .. } => {
            format!("The {tool} program needed for this operation is not installed.")
        }
        BlattwerkError::CompressionFailed { .. } => "Compressing the document failed.".into(),
        BlattwerkError::RasterizeFailed { .. } => {
            "Rendering the PDF pages for text recognition failed.".into()
        }
        BlattwerkError::Timeout { .. } => "The operation took too long and was stopped.".into(),
        BlattwerkError::Io(_) | BlattwerkError::Serialization(_) => {
            "An internal storage error occurred.".into()
        }
    }
}
