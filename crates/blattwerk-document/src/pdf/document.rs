// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// A loaded PDF document: open, inspect, and serialise using the `lopdf`
// crate.

use std::path::Path;

use blattwerk_core::error::{BlattwerkError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, info, instrument};

/// Page attributes a page may inherit from its ancestors in the page tree.
pub(crate) const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guards against malformed page trees whose /Parent chain loops.
const MAX_TREE_DEPTH: usize = 64;

/// A PDF document held in memory.
///
/// Wraps `lopdf::Document` and caches the page object ids in page order, so
/// pages can be addressed by zero-based index.
pub struct Pdf {
    /// The underlying lopdf document.
    document: Document,
    /// Page object ids, in page order.
    page_ids: Vec<ObjectId>,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<String>,
}

impl Pdf {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| {
            BlattwerkError::PdfError(format!("failed to open {}: {}", path_ref.display(), err))
        })?;

        let mut pdf = Self::from_document(document);
        pdf.source_path = Some(path_ref.display().to_string());
        Ok(pdf)
    }

    /// Load a PDF from raw bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(BlattwerkError::InvalidInput("PDF payload is empty".into()));
        }
        let document = Document::load_mem(data).map_err(|err| {
            BlattwerkError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;
        Ok(Self::from_document(document))
    }

    /// Wrap an already-built lopdf document.
    pub(crate) fn from_document(document: Document) -> Self {
        // get_pages() is keyed by 1-based page number, so values come out in page order.
        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
        debug!(pages = page_ids.len(), "PDF loaded");
        Self {
            document,
            page_ids,
            source_path: None,
        }
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Return the source path if the document was created via [`Pdf::open`].
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    /// PDF header version, e.g. `1.5`.
    pub fn version(&self) -> &str {
        &self.document.version
    }

    /// Object id of the page at zero-based `index`.
    pub fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(BlattwerkError::OutOfBounds {
                index: index as i64,
                page_count: self.page_count(),
            })
    }

    /// Page width and height in points, from the (possibly inherited) /MediaBox.
    pub fn page_size(&self, index: usize) -> Result<(f32, f32)> {
        let page_id = self.page_id(index)?;
        let page = self.page_dictionary(page_id)?;
        let media_box = page_attribute(&self.document, page, b"MediaBox")
            .ok_or_else(|| BlattwerkError::PdfError(format!("page {} has no /MediaBox", index + 1)))?;

        let corners = self
            .resolve(media_box)
            .as_array()
            .map_err(|err| BlattwerkError::PdfError(format!("malformed /MediaBox: {err}")))?;
        let values: Vec<f32> = corners
            .iter()
            .filter_map(|value| self.resolve(value).as_float().ok())
            .collect();
        match values.as_slice() {
            [x0, y0, x1, y1] => Ok(((x1 - x0).abs(), (y1 - y0).abs())),
            _ => Err(BlattwerkError::PdfError(format!(
                "page {} /MediaBox does not have four numbers",
                index + 1
            ))),
        }
    }

    /// Decoded content stream(s) of the page at zero-based `index`.
    pub fn page_content(&self, index: usize) -> Result<Vec<u8>> {
        let page_id = self.page_id(index)?;
        self.document.get_page_content(page_id).map_err(|err| {
            BlattwerkError::PdfError(format!("cannot read content of page {}: {}", index + 1, err))
        })
    }

    /// Borrow the underlying lopdf document.
    pub fn as_lopdf(&self) -> &Document {
        &self.document
    }

    // -- Output ---------------------------------------------------------------

    /// Serialise the document to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        // save_to needs &mut for xref bookkeeping; serialise a clone to keep &self.
        let mut document = self.document.clone();
        document.save_to(&mut output).map_err(serialise_error)?;
        debug!(output_bytes = output.len(), "PDF serialised");
        Ok(output)
    }

    /// Serialise the document, consuming it.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.document.save_to(&mut output).map_err(serialise_error)?;
        Ok(output)
    }

    /// Write the document to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!("Wrote PDF to {}", path.as_ref().display());
        Ok(())
    }

    // -- Helpers --------------------------------------------------------------

    pub(crate) fn page_dictionary(&self, page_id: ObjectId) -> Result<&Dictionary> {
        self.document.get_dictionary(page_id).map_err(|err| {
            BlattwerkError::PdfError(format!("cannot read page object {:?}: {}", page_id, err))
        })
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        match object {
            Object::Reference(id) => self.document.get_object(*id).unwrap_or(object),
            other => other,
        }
    }
}

impl std::fmt::Debug for Pdf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pdf")
            .field("version", &self.document.version)
            .field("pages", &self.page_ids.len())
            .field("source_path", &self.source_path)
            .finish()
    }
}

/// Look up `key` on a page, walking up the /Parent chain for inheritable
/// attributes.
/// Writing output is an I/O failure, never a fault of the caller's input.
fn serialise_error(err: impl std::fmt::Display) -> BlattwerkError {
    BlattwerkError::Io(std::io::Error::other(format!("failed to serialise PDF: {err}")))
}

pub(crate) fn page_attribute<'a>(
    document: &'a Document,
    page: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    if let Ok(value) = page.get(key) {
        return Some(value);
    }
    if !INHERITABLE_KEYS.contains(&key) {
        return None;
    }

    let mut parent = page.get(b"Parent").ok()?.as_reference().ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        let node = document.get_dictionary(parent).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        parent = node.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}
