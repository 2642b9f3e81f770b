// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document assembly: builds a new PDF from (source, page) references.
//
// Merge, split/extract, and reorder all go through `assemble`, so every
// caller gets the same page-copy semantics: page objects are copied at the
// object level (content streams byte-for-byte, filters preserved), never
// re-rendered.

use std::collections::{HashMap, HashSet};

use blattwerk_core::SourceRef;
use blattwerk_core::error::{BlattwerkError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, info, instrument, warn};

use super::document::{INHERITABLE_KEYS, Pdf, page_attribute};
use super::selector::PageIndexSet;

/// Builds new documents out of pages of existing ones.
pub struct DocumentAssembler;

impl DocumentAssembler {
    /// Produce a document whose page N is a copy of the page `order[N]`
    /// refers to.
    ///
    /// Fails with [`BlattwerkError::EmptyInput`] when `sources` is empty and
    /// [`BlattwerkError::OutOfBounds`] when a reference names a page the
    /// source does not have.
    #[instrument(skip_all, fields(sources = sources.len(), pages = order.len()))]
    pub fn assemble(sources: &[Pdf], order: &[SourceRef]) -> Result<Pdf> {
        if sources.is_empty() {
            return Err(BlattwerkError::EmptyInput);
        }
        Self::validate(sources, order)?;

        let version = sources
            .iter()
            .map(|source| source.version())
            .max()
            .unwrap_or("1.5")
            .to_string();
        let mut target = Document::with_version(version);
        let pages_id = target.new_object_id();

        // One copier per source so objects shared between pages of the same
        // source (fonts, images) are copied once.
        let mut copiers: Vec<PageCopier> = sources.iter().map(PageCopier::new).collect();

        // Every output page gets its id before any page is copied, so a link
        // to a later page resolves to that page's copy.
        let mut placed = Vec::with_capacity(order.len());
        for reference in order {
            let page_id = sources[reference.source].page_id(reference.page)?;
            let new_id = target.new_object_id();
            copiers[reference.source].reserve(page_id, new_id);
            placed.push((reference.source, page_id, new_id));
        }

        let mut kids = Vec::with_capacity(placed.len());
        for (source, page_id, new_id) in placed {
            copiers[source].copy_page(&sources[source], &mut target, page_id, new_id, pages_id)?;
            kids.push(Object::Reference(new_id));
        }

        let page_count = kids.len() as i64;
        target.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count,
            }),
        );
        let catalog_id = target.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        target.trailer.set("Root", catalog_id);

        info!(page_count, objects = target.objects.len(), "Document assembled");
        Ok(Pdf::from_document(target))
    }

    /// Concatenate every page of every source, in upload order.
    pub fn merge(sources: &[Pdf]) -> Result<Pdf> {
        info!(documents = sources.len(), "Merging PDFs");
        Self::assemble(sources, &Self::concatenation_order(sources))
    }

    /// Copy the selected pages of one document, in selection order. Serves
    /// both split/extract and reorder.
    pub fn select(source: &Pdf, pages: &PageIndexSet) -> Result<Pdf> {
        Self::assemble(std::slice::from_ref(source), &pages.to_source_refs(0))
    }

    /// All pages of source 0, then all pages of source 1, and so on.
    pub fn concatenation_order(sources: &[Pdf]) -> Vec<SourceRef> {
        sources
            .iter()
            .enumerate()
            .flat_map(|(source, pdf)| (0..pdf.page_count()).map(move |page| SourceRef::new(source, page)))
            .collect()
    }

    fn validate(sources: &[Pdf], order: &[SourceRef]) -> Result<()> {
        for reference in order {
            let source = sources.get(reference.source).ok_or_else(|| {
                BlattwerkError::InvalidInput(format!(
                    "page reference names document #{} but only {} were supplied",
                    reference.source + 1,
                    sources.len()
                ))
            })?;
            if reference.page >= source.page_count() {
                return Err(BlattwerkError::OutOfBounds {
                    index: reference.page as i64,
                    page_count: source.page_count(),
                });
            }
        }
        Ok(())
    }
}

/// Copies objects from one source document into a target, remembering what
/// it has already copied.
struct PageCopier {
    /// Source object id -> target object id.
    copied: HashMap<ObjectId, ObjectId>,
    /// Every page object of the source, selected or not.
    pages: HashSet<ObjectId>,
}

impl PageCopier {
    fn new(source: &Pdf) -> Self {
        Self {
            copied: HashMap::new(),
            pages: source.as_lopdf().get_pages().into_values().collect(),
        }
    }

    /// Record where a selected page will land. A page selected twice gets
    /// two page objects; references to it resolve to the first copy.
    fn reserve(&mut self, page_id: ObjectId, new_id: ObjectId) {
        self.copied.entry(page_id).or_insert(new_id);
    }

    /// Copy a page dictionary (and everything it references) into `target`
    /// as `new_id`, parented to `pages_id`. Inherited attributes are made
    /// explicit so the copy does not depend on the source page tree.
    fn copy_page(
        &mut self,
        source: &Pdf,
        target: &mut Document,
        page_id: ObjectId,
        new_id: ObjectId,
        pages_id: ObjectId,
    ) -> Result<()> {
        let page = source.page_dictionary(page_id)?;
        let document = source.as_lopdf();

        let mut copy = self.copy_dictionary(document, target, page)?;
        for key in INHERITABLE_KEYS {
            if copy.has(key) {
                continue;
            }
            if let Some(value) = page_attribute(document, page, key) {
                let value = self.copy_object(document, target, value)?;
                copy.set(key.to_vec(), value);
            }
        }
        copy.set("Parent", Object::Reference(pages_id));

        target.objects.insert(new_id, Object::Dictionary(copy));
        debug!(?page_id, ?new_id, "Page copied");
        Ok(())
    }

    fn copy_object(&mut self, source: &Document, target: &mut Document, object: &Object) -> Result<Object> {
        match object {
            Object::Reference(id) => self.copy_reference(source, target, *id),
            Object::Dictionary(dict) => Ok(Object::Dictionary(self.copy_dictionary(source, target, dict)?)),
            Object::Array(items) => {
                let mut copied = Vec::with_capacity(items.len());
                for item in items {
                    copied.push(self.copy_object(source, target, item)?);
                }
                Ok(Object::Array(copied))
            }
            Object::Stream(stream) => {
                let dict = self.copy_dictionary(source, target, &stream.dict)?;
                // Content is copied verbatim; /Filter and /DecodeParms travel in `dict`.
                Ok(Object::Stream(Stream::new(dict, stream.content.clone()).with_compression(false)))
            }
            // Booleans, numbers, strings, names, and null are plain values.
            other => Ok(other.clone()),
        }
    }

    /// Skips /Parent: page-tree back-references are rebuilt by the caller,
    /// and following them would drag the whole source tree along.
    fn copy_dictionary(&mut self, source: &Document, target: &mut Document, dict: &Dictionary) -> Result<Dictionary> {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            if key == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.copy_object(source, target, value)?);
        }
        Ok(copy)
    }

    /// Pages that were not selected are never pulled in through a
    /// reference; links and outlines pointing at them become null.
    fn copy_reference(&mut self, source: &Document, target: &mut Document, id: ObjectId) -> Result<Object> {
        if let Some(&existing) = self.copied.get(&id) {
            return Ok(Object::Reference(existing));
        }
        if self.pages.contains(&id) {
            debug!(?id, "Reference to an unselected page dropped");
            return Ok(Object::Null);
        }

        // Reserve the target id before recursing so reference cycles terminate.
        let new_id = target.new_object_id();
        self.copied.insert(id, new_id);

        let copied = match source.get_object(id) {
            Ok(object) => self.copy_object(source, target, object)?,
            Err(err) => {
                warn!(?id, %err, "Cannot resolve reference, using Null");
                Object::Null
            }
        };
        target.objects.insert(new_id, copied);
        Ok(Object::Reference(new_id))
    }
}
