// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The OCR engine boundary.

use std::borrow::Cow;

use async_trait::async_trait;
use blattwerk_core::config::{OcrBackend, OcrSettings};
use blattwerk_core::error::Result;
use blattwerk_core::{PageRecognition, TempArtifactStore};
use image::DynamicImage;
use image::imageops::FilterType;
use tracing::{debug, info};

/// An OCR engine: finds words and their pixel boxes in a raster image.
///
/// Implementations report boxes in the pixel space of the image they
/// actually processed, along with that image's size, so callers can map the
/// boxes back onto the original.
///
/// Recognition is async so an engine that shells out can be cancelled and
/// held to a deadline; dropping the future stops the work.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    async fn recognize(&self, image: &DynamicImage) -> Result<PageRecognition>;
}

/// The image an engine should work on: the input itself, or a copy whose
/// longest edge is at most `max_dimension` pixels.
pub fn working_copy(image: &DynamicImage, max_dimension: Option<u32>) -> Cow<'_, DynamicImage> {
    match max_dimension {
        Some(limit) if image.width().max(image.height()) > limit => {
            let resized = image.resize(limit, limit, FilterType::Lanczos3);
            debug!(
                from_w = image.width(),
                from_h = image.height(),
                to_w = resized.width(),
                to_h = resized.height(),
                "Downscaled image for OCR"
            );
            Cow::Owned(resized)
        }
        _ => Cow::Borrowed(image),
    }
}

/// Build the recognizer selected in `settings`.
///
/// Fails with [`BlattwerkError::OcrEngineUnavailable`] when the engine cannot
/// be initialised (missing binary, language data, or models).
pub async fn from_settings(settings: &OcrSettings, store: &TempArtifactStore) -> Result<Box<dyn TextRecognizer>> {
    info!(backend = ?settings.backend, language = %settings.language, "Initialising OCR engine");
    match settings.backend {
        OcrBackend::Tesseract => Ok(Box::new(
            super::tesseract::TesseractRecognizer::new(
                settings.tesseract.clone(),
                &settings.language,
                settings.max_dimension,
                store.clone(),
            )
            .await?,
        )),
        #[cfg(feature = "ocr")]
        OcrBackend::Ocrs => {
            let settings = settings.clone();
            let loaded = tokio::task::spawn_blocking(move || super::ocr::OcrsRecognizer::from_settings(&settings))
                .await
                .map_err(|err| {
                    blattwerk_core::BlattwerkError::OcrEngineUnavailable(format!("model loading task failed: {err}"))
                })??;
            Ok(Box::new(loaded))
        }
        #[cfg(not(feature = "ocr"))]
        OcrBackend::Ocrs => Err(blattwerk_core::BlattwerkError::OcrEngineUnavailable(
            "the ocrs backend requires building with the `ocr` feature".into(),
        )),
    }
}
