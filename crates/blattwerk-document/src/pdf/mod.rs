// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: loading, page selection, page assembly, and image-to-PDF.

pub mod assembler;
pub mod document;
pub mod selector;
pub mod writer;

pub use assembler::DocumentAssembler;
pub use document::Pdf;
pub use selector::{PageIndexSet, PageSelector};
pub use writer::PdfWriter;
