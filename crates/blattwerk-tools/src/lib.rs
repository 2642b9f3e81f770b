// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// blattwerk-tools: External programs driven as async subprocesses.
//
// Ghostscript does the heavy lifting for size compression (`pdfwrite`) and
// for rasterising PDF pages ahead of OCR (`png16m`). Both go through one
// runner that drains stderr while waiting, honours an optional deadline, and
// kills the child if the caller goes away.

pub mod ghostscript;
pub mod subprocess;

pub use ghostscript::{CompressionInvoker, PageRasterizer, RasterizedPages};
pub use subprocess::{ToolOutcome, run_tool, run_tool_capturing};
