// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BlattwerkError, Result};

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "BLATTWERK_CONFIG";
/// Environment variable overriding the Ghostscript program.
pub const GHOSTSCRIPT_ENV: &str = "BLATTWERK_GS";

/// Settings for the document pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ghostscript, used for compression and PDF rasterisation.
    pub ghostscript: ToolConfig,
    /// Resolution used when rasterising PDF pages for OCR.
    pub raster_dpi: u32,
    /// OCR backend selection and tuning.
    pub ocr: OcrSettings,
    /// Directory for temporary artifacts (OS temp dir when unset).
    pub temp_dir: Option<PathBuf>,
    /// Page size used when converting images to PDF.
    pub image_paper_size: crate::PaperSize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ghostscript: ToolConfig::new(default_ghostscript_program()),
            raster_dpi: 144,
            ocr: OcrSettings::default(),
            temp_dir: None,
            image_paper_size: crate::PaperSize::A4,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        info!(path = %path.display(), "loaded pipeline config");
        Ok(config)
    }

    /// Build a config from `BLATTWERK_CONFIG` (if set) plus the
    /// `BLATTWERK_GS` program override.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(PathBuf::from(path))?,
            None => Self::default(),
        };
        if let Some(program) = std::env::var_os(GHOSTSCRIPT_ENV) {
            debug!(program = ?program, "ghostscript program overridden from environment");
            config.ghostscript.program = PathBuf::from(program);
        }
        Ok(config)
    }

    /// Reject settings that would make every request fail.
    pub fn validate(&self) -> Result<()> {
        if self.raster_dpi == 0 || self.raster_dpi > 1200 {
            return Err(BlattwerkError::InvalidInput(format!(
                "raster_dpi must be between 1 and 1200, got {}",
                self.raster_dpi
            )));
        }
        if self.ocr.max_dimension == Some(0) {
            return Err(BlattwerkError::InvalidInput(
                "ocr.max_dimension must be positive".into(),
            ));
        }
        if self.ocr.language.trim().is_empty() {
            return Err(BlattwerkError::InvalidInput("ocr.language is empty".into()));
        }
        Ok(())
    }
}

/// How to run one external program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Program name (looked up on `PATH`) or absolute path.
    pub program: PathBuf,
    /// Kill the process after this many seconds. No deadline when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ToolConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout_secs: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Short name for logs and error messages.
    pub fn display_name(&self) -> String {
        self.program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

/// Which OCR engine recognises words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackend {
    /// The `tesseract` command-line program.
    Tesseract,
    /// The pure-Rust `ocrs` engine (requires the `ocr` cargo feature).
    Ocrs,
}

/// OCR settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub backend: OcrBackend,
    /// Tesseract language code(s), e.g. `eng` or `eng+deu`.
    pub language: String,
    pub tesseract: ToolConfig,
    /// Directory holding the `ocrs` detection/recognition models.
    pub model_dir: Option<PathBuf>,
    /// Downscale images whose longest edge exceeds this before recognition.
    pub max_dimension: Option<u32>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            backend: OcrBackend::Tesseract,
            language: "eng".to_string(),
            tesseract: ToolConfig::new("tesseract"),
            model_dir: None,
            max_dimension: None,
        }
    }
}

fn default_ghostscript_program() -> &'static str {
    if cfg!(windows) { "gswin64c" } else { "gs" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.raster_dpi, 144);
        assert_eq!(config.ocr.backend, OcrBackend::Tesseract);
        assert!(config.ghostscript.timeout().is_none());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{ "ghostscript": { "program": "/opt/gs/bin/gs", "timeout_secs": 30 },
                 "ocr": { "backend": "ocrs", "max_dimension": 2000 } }"#,
        )
        .unwrap();
        assert_eq!(config.ghostscript.program, PathBuf::from("/opt/gs/bin/gs"));
        assert_eq!(config.ghostscript.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.ghostscript.display_name(), "gs");
        assert_eq!(config.ocr.backend, OcrBackend::Ocrs);
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.ocr.max_dimension, Some(2000));
        assert_eq!(config.raster_dpi, 144);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blattwerk.json");
        std::fs::write(&path, r#"{ "raster_dpi": 200 }"#).unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.raster_dpi, 200);
    }

    #[test]
    fn load_rejects_zero_dpi() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "raster_dpi": 0 }"#).unwrap();
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(BlattwerkError::InvalidInput(_))
        ));
    }

    #[test]
    fn load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(BlattwerkError::Serialization(_))
        ));
    }
}
