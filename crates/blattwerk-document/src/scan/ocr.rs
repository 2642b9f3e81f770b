// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ocrs backend: pure-Rust OCR using neural network models executed via `rten`.
//
// # Feature Gate
//
// Only available with the `ocr` feature:
//
// ```toml
// blattwerk-document = { path = "crates/blattwerk-document", features = ["ocr"] }
// ```
//
// # Model Setup
//
// The engine needs two model files in one directory:
//
// - `text-detection.rten`: locates words in the image.
// - `text-recognition.rten`: decodes characters from detected lines.
//
// Running `ocrs-cli` once downloads both to `$XDG_CACHE_HOME/ocrs`
// (typically `~/.cache/ocrs`), which is used when no directory is configured.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use blattwerk_core::config::OcrSettings;
use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{BoundingBox, ImageSize, PageRecognition, RecognizedWord};
use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use tracing::{Span, debug, info, instrument};

use super::recognizer::{TextRecognizer, working_copy};

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs`.
pub fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// OCR through the `ocrs` engine.
///
/// Model loading is the expensive step; build one recognizer and reuse it for
/// every page. Inference runs on the blocking pool.
pub struct OcrsRecognizer {
    engine: Arc<OcrEngine>,
    max_dimension: Option<u32>,
}

impl OcrsRecognizer {
    /// Load models from `settings.model_dir` (or the default cache directory).
    pub fn from_settings(settings: &OcrSettings) -> Result<Self> {
        let dir = settings.model_dir.clone().unwrap_or_else(default_model_dir);
        Self::from_model_dir(dir, settings.max_dimension)
    }

    /// Load `text-detection.rten` and `text-recognition.rten` from `dir`.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn from_model_dir(dir: impl AsRef<Path>, max_dimension: Option<u32>) -> Result<Self> {
        let dir = dir.as_ref();
        info!("Loading OCR detection model");
        let detection_model = load_model(&dir.join(DETECTION_MODEL_FILENAME))?;
        info!("Loading OCR recognition model");
        let recognition_model = load_model(&dir.join(RECOGNITION_MODEL_FILENAME))?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| BlattwerkError::OcrEngineUnavailable(format!("failed to initialise OCR engine: {err}")))?;

        info!("OCR engine initialised");
        Ok(Self {
            engine: Arc::new(engine),
            max_dimension,
        })
    }
}

#[async_trait]
impl TextRecognizer for OcrsRecognizer {
    fn name(&self) -> &str {
        "ocrs"
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    async fn recognize(&self, image: &DynamicImage) -> Result<PageRecognition> {
        let rgb = working_copy(image, self.max_dimension).to_rgb8();
        let engine = Arc::clone(&self.engine);
        let span = Span::current();
        tokio::task::spawn_blocking(move || span.in_scope(|| recognize_pixels(&engine, &rgb)))
            .await
            .map_err(|err| BlattwerkError::OcrError(format!("OCR worker failed: {err}")))?
    }
}

fn recognize_pixels(engine: &OcrEngine, rgb: &image::RgbImage) -> Result<PageRecognition> {
    let (width, height) = rgb.dimensions();

    let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
        BlattwerkError::OcrError(format!("failed to create image source ({width}x{height}): {err}"))
    })?;
    let input = engine
        .prepare_input(source)
        .map_err(|err| BlattwerkError::OcrError(format!("OCR preprocessing failed: {err}")))?;

    let word_rects = engine
        .detect_words(&input)
        .map_err(|err| BlattwerkError::OcrError(format!("word detection failed: {err}")))?;
    let line_rects = engine.find_text_lines(&input, &word_rects);
    let lines = engine
        .recognize_text(&input, &line_rects)
        .map_err(|err| BlattwerkError::OcrError(format!("line recognition failed: {err}")))?;

    let words: Vec<RecognizedWord> = lines
        .iter()
        .flatten()
        .flat_map(|line| line.words())
        .filter_map(|word| {
            let text = word.to_string();
            if text.trim().is_empty() {
                return None;
            }
            let rect = word.bounding_rect();
            let bbox = BoundingBox::new(
                rect.left() as f32,
                rect.top() as f32,
                rect.right() as f32,
                rect.bottom() as f32,
            );
            // ocrs does not score its output.
            Some(RecognizedWord::new(text, None, bbox))
        })
        .collect();

    debug!(words = words.len(), lines = line_rects.len(), "ocrs recognition complete");
    Ok(PageRecognition {
        words,
        image_size: ImageSize::new(width, height),
    })
}

fn load_model(path: &Path) -> Result<Model> {
    if !path.exists() {
        return Err(BlattwerkError::OcrEngineUnavailable(format!(
            "OCR model not found at {}; run `ocrs-cli` once to download models",
            path.display()
        )));
    }
    Model::load_file(path).map_err(|err| {
        BlattwerkError::OcrEngineUnavailable(format!("failed to load model from {}: {}", path.display(), err))
    })
}
