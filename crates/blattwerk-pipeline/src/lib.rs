// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// blattwerk-pipeline: Request orchestration.
//
// Each request is validated, transformed (page assembly, image layout, or
// OCR composition), optionally compressed with Ghostscript, and delivered as
// bytes. Every temporary file a request touches is scoped to that request
// and removed on every exit path.

pub mod input;
pub mod lifecycle;
pub mod orchestrator;

pub use input::InputFile;
pub use lifecycle::{IllegalTransition, RequestLifecycle, RequestState};
pub use orchestrator::{PipelineOrchestrator, PipelineRequest};
