// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Blattwerk.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all Blattwerk operations.
#[derive(Debug, Error)]
pub enum BlattwerkError {
    // -- Request validation --
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid page range: {0}")]
    InvalidRange(String),

    #[error("page index {index} out of bounds (document has {page_count} pages)")]
    OutOfBounds { index: i64, page_count: usize },

    #[error("no input documents supplied")]
    EmptyInput,

    #[error("unknown compression preset: {0:?}")]
    UnknownPreset(String),

    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("OCR failed: {0}")]
    OcrError(String),

    #[error("OCR engine unavailable: {0}")]
    OcrEngineUnavailable(String),

    // -- External tools --
    #[error("{tool} is unavailable: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("compression failed ({}): {stderr}", describe_exit(.exit_code))]
    CompressionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("rasterisation failed ({}): {stderr}", describe_exit(.exit_code))]
    RasterizeFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("{tool} timed out after {after:?}")]
    Timeout { tool: String, after: Duration },

    // -- Storage --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Caller-facing classification of a [`BlattwerkError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing file, malformed range/order, unknown preset, undecodable upload.
    InvalidInput,
    /// A page index outside the document.
    OutOfBounds,
    /// The compression or rasterisation binary could not be started.
    ToolUnavailable,
    /// Ghostscript ran and exited non-zero while compressing.
    CompressionFailed,
    /// Ghostscript ran and exited non-zero while rendering pages for OCR.
    RasterizeFailed,
    /// OCR models or language data are missing.
    OcrEngineUnavailable,
    /// The external tool exceeded its configured deadline.
    Timeout,
    /// Temp file read/write failure or other internal fault.
    IoFailure,
}

impl BlattwerkError {
    /// Map this error onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_)
            | Self::InvalidRange(_)
            | Self::EmptyInput
            | Self::UnknownPreset(_)
            | Self::PdfError(_)
            | Self::ImageError(_) => ErrorKind::InvalidInput,
            Self::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            Self::ToolUnavailable { .. } => ErrorKind::ToolUnavailable,
            Self::CompressionFailed { .. } => ErrorKind::CompressionFailed,
            Self::RasterizeFailed { .. } => ErrorKind::RasterizeFailed,
            Self::OcrEngineUnavailable(_) => ErrorKind::OcrEngineUnavailable,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::OcrError(_) | Self::Io(_) | Self::Serialization(_) => ErrorKind::IoFailure,
        }
    }

    /// True for errors detected before any subprocess or OCR work begins.
    pub fn is_rejection(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidInput | ErrorKind::OutOfBounds)
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BlattwerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_failure_mentions_exit_code() {
        let err = BlattwerkError::CompressionFailed {
            exit_code: Some(1),
            stderr: "Unrecoverable error".into(),
        };
        assert_eq!(
            err.to_string(),
            "compression failed (exit code 1): Unrecoverable error"
        );
        assert_eq!(err.kind(), ErrorKind::CompressionFailed);
    }

    #[test]
    fn signal_exit_is_described() {
        let err = BlattwerkError::RasterizeFailed {
            exit_code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("terminated by signal"));
        assert_eq!(err.kind(), ErrorKind::RasterizeFailed);
    }

    #[test]
    fn validation_errors_are_rejections() {
        assert!(BlattwerkError::InvalidRange("x".into()).is_rejection());
        assert!(BlattwerkError::OutOfBounds { index: 9, page_count: 3 }.is_rejection());
        assert!(!BlattwerkError::OcrEngineUnavailable("no eng".into()).is_rejection());
    }

    #[test]
    fn io_errors_are_io_failures() {
        let err: BlattwerkError = std::io::Error::other("disk full").into();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }
}
