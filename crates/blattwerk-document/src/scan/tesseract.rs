// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tesseract backend: runs the `tesseract` command-line program and parses
// its TSV output.
//
// Each image is written to a request-scoped PNG artifact, recognised with
// `tesseract <png> stdout -l <lang> tsv`, and the artifact is removed when the
// call returns. Runs go through the shared subprocess runner, so the tool's
// `timeout_secs` applies and a dropped request kills the process.

use std::ffi::OsStr;

use async_trait::async_trait;
use blattwerk_core::config::ToolConfig;
use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{BoundingBox, ImageSize, PageRecognition, RecognizedWord, TempArtifactStore};
use blattwerk_tools::{ToolOutcome, run_tool_capturing};
use image::{DynamicImage, ImageFormat};
use tracing::{debug, info, instrument};

use super::recognizer::{TextRecognizer, working_copy};

/// TSV `level` value for word rows.
const WORD_LEVEL: &str = "5";

/// Column positions in tesseract's TSV output.
const COL_LEVEL: usize = 0;
const COL_LEFT: usize = 6;
const COL_TOP: usize = 7;
const COL_WIDTH: usize = 8;
const COL_HEIGHT: usize = 9;
const COL_CONF: usize = 10;
const COL_TEXT: usize = 11;

/// OCR through the `tesseract` program.
#[derive(Debug)]
pub struct TesseractRecognizer {
    tool: ToolConfig,
    language: String,
    max_dimension: Option<u32>,
    store: TempArtifactStore,
}

impl TesseractRecognizer {
    /// Check that tesseract runs and has data for every language in
    /// `language` (`eng`, `eng+deu`, ...).
    #[instrument(skip(tool, store), fields(program = %tool.display_name()))]
    pub async fn new(
        tool: ToolConfig,
        language: &str,
        max_dimension: Option<u32>,
        store: TempArtifactStore,
    ) -> Result<Self> {
        let requested = parse_languages(language)?;
        let installed = list_languages(&tool).await?;

        if let Some(missing) = requested.iter().find(|lang| !installed.contains(lang)) {
            return Err(BlattwerkError::OcrEngineUnavailable(format!(
                "tesseract has no language data for {missing:?} (installed: {})",
                installed.join(", ")
            )));
        }

        info!(language, "Tesseract ready");
        Ok(Self {
            tool,
            language: language.to_string(),
            max_dimension,
            store,
        })
    }

    async fn run(&self, image: &DynamicImage) -> Result<ToolOutcome> {
        let input = self.store.acquire("png")?;
        image
            .save_with_format(input.path(), ImageFormat::Png)
            .map_err(|err| BlattwerkError::ImageError(format!("cannot write OCR input image: {err}")))?;

        let args = [
            input.path().as_os_str(),
            OsStr::new("stdout"),
            OsStr::new("-l"),
            OsStr::new(&self.language),
            OsStr::new("tsv"),
        ];
        run_tool_capturing(&self.tool, &args).await.map_err(engine_error)
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    async fn recognize(&self, image: &DynamicImage) -> Result<PageRecognition> {
        let working = working_copy(image, self.max_dimension);
        let image_size = ImageSize::new(working.width(), working.height());

        let output = self.run(&working).await?;
        if !output.success() {
            return Err(BlattwerkError::OcrError(format!(
                "tesseract exited with {}: {}",
                output.status,
                output.stderr.trim()
            )));
        }

        let words = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!(words = words.len(), "Tesseract recognition complete");
        Ok(PageRecognition { words, image_size })
    }
}

/// Word rows of tesseract TSV output. Rows with blank text or fewer than
/// twelve columns are skipped; a negative confidence becomes `None`.
pub fn parse_tsv(tsv: &str) -> Vec<RecognizedWord> {
    tsv.lines()
        .filter_map(|line| {
            let columns: Vec<&str> = line.splitn(COL_TEXT + 1, '\t').collect();
            if columns.len() <= COL_TEXT || columns[COL_LEVEL] != WORD_LEVEL {
                return None;
            }
            let text = columns[COL_TEXT].trim();
            if text.is_empty() {
                return None;
            }
            let number = |index: usize| columns[index].trim().parse::<f32>().ok();
            let bbox = BoundingBox::from_origin_size(
                number(COL_LEFT)?,
                number(COL_TOP)?,
                number(COL_WIDTH)?,
                number(COL_HEIGHT)?,
            );
            let confidence = number(COL_CONF).filter(|conf| *conf >= 0.0);
            Some(RecognizedWord::new(text, confidence, bbox))
        })
        .collect()
}

/// Split `eng+deu` into its language codes, rejecting anything that could
/// be mistaken for a command-line flag.
fn parse_languages(language: &str) -> Result<Vec<String>> {
    let codes: Vec<String> = language.split('+').map(|code| code.trim().to_string()).collect();
    let valid = codes
        .iter()
        .all(|code| !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    if !valid {
        return Err(BlattwerkError::InvalidInput(format!("invalid OCR language {language:?}")));
    }
    Ok(codes)
}

async fn list_languages(tool: &ToolConfig) -> Result<Vec<String>> {
    let output = run_tool_capturing(tool, &["--list-langs"]).await.map_err(engine_error)?;
    if !output.success() {
        return Err(BlattwerkError::OcrEngineUnavailable(format!(
            "{} --list-langs exited with {}",
            tool.display_name(),
            output.status
        )));
    }

    // Older releases print the list on stderr.
    let listing = if output.stdout.is_empty() {
        output.stderr
    } else {
        String::from_utf8_lossy(&output.stdout).into_owned()
    };
    Ok(listing
        .lines()
        .skip_while(|line| !line.starts_with("List of available languages"))
        .skip(1)
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}

/// A tesseract that cannot be started means no OCR engine; a deadline
/// overrun stays a timeout.
fn engine_error(err: BlattwerkError) -> BlattwerkError {
    match err {
        BlattwerkError::ToolUnavailable { tool, reason } => {
            BlattwerkError::OcrEngineUnavailable(format!("cannot run {tool}: {reason}"))
        }
        other => other,
    }
}
