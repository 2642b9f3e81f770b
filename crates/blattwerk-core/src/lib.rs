// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blattwerk: Core types, error taxonomy, configuration, and request-scoped
// temporary artifacts shared across all crates.

pub mod config;
pub mod error;
pub mod report;
pub mod temp;
pub mod types;

pub use config::PipelineConfig;
pub use error::BlattwerkError;
pub use report::ErrorReport;
pub use temp::{TempArtifact, TempArtifactStore};
pub use types::*;
