// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Uploaded files.

use std::path::Path;

use blattwerk_core::DocumentType;
use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_document::Pdf;
use tracing::debug;

/// One uploaded file: a display name plus its bytes.
#[derive(Clone)]
pub struct InputFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from disk. A missing file is [`BlattwerkError::InvalidInput`].
    pub async fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => {
                BlattwerkError::InvalidInput(format!("no such file: {}", path.display()))
            }
            _ => BlattwerkError::Io(err),
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "Input read");
        Ok(Self::new(path.display().to_string(), bytes))
    }

    /// Type sniffed from the leading bytes.
    pub fn document_type(&self) -> Option<DocumentType> {
        DocumentType::from_magic(&self.bytes)
    }

    /// Parse as a PDF. Empty or unparseable uploads are rejected as input
    /// errors naming the file.
    pub fn to_pdf(&self) -> Result<Pdf> {
        if self.bytes.is_empty() {
            return Err(BlattwerkError::InvalidInput(format!("{} is empty", self.name)));
        }
        Pdf::from_bytes(&self.bytes).map_err(|err| match err {
            BlattwerkError::PdfError(reason) => {
                BlattwerkError::InvalidInput(format!("{} is not a readable PDF: {}", self.name, reason))
            }
            other => other,
        })
    }
}

impl std::fmt::Debug for InputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputFile")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}
