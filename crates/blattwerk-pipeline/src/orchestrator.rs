// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline orchestrator: drives one request through every stage.
//
// Validation happens before any subprocess or OCR work, so malformed
// requests are rejected cheaply. CPU-bound document work runs on the
// blocking pool; Ghostscript runs as an async subprocess. Requests share
// nothing but the temp directory, in which every artifact name is unique.

use blattwerk_core::config::PipelineConfig;
use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{CompressionPreset, DocumentType, SourceRef, TempArtifactStore};
use blattwerk_document::scan::recognizer;
use blattwerk_document::{DocumentAssembler, OcrCompositor, PageSelector, Pdf, PdfWriter, render_searchable};
use blattwerk_tools::{CompressionInvoker, PageRasterizer, RasterizedPages};
use image::DynamicImage;
use tracing::{Instrument, Span, debug, info, info_span};

use crate::input::InputFile;
use crate::lifecycle::{IllegalTransition, RequestLifecycle, RequestState};

/// One caller request.
#[derive(Debug, Clone)]
pub enum PipelineRequest {
    /// Concatenate every page of every file, in upload order.
    Merge {
        files: Vec<InputFile>,
        preset: Option<CompressionPreset>,
    },
    /// Keep the pages named by a range spec such as `"1-3,5"`.
    Split {
        file: InputFile,
        range: String,
        preset: Option<CompressionPreset>,
    },
    /// Rearrange pages by a JSON array of zero-based indices.
    Reorder {
        file: InputFile,
        order: String,
        preset: Option<CompressionPreset>,
    },
    Compress {
        file: InputFile,
        preset: CompressionPreset,
    },
    /// Make a scanned PDF or image searchable.
    Ocrize {
        file: InputFile,
        preset: Option<CompressionPreset>,
    },
    /// One page per image.
    ImagesToPdf {
        files: Vec<InputFile>,
        preset: Option<CompressionPreset>,
    },
}

impl PipelineRequest {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Merge { .. } => "merge",
            Self::Split { .. } => "split",
            Self::Reorder { .. } => "reorder",
            Self::Compress { .. } => "compress",
            Self::Ocrize { .. } => "ocrize",
            Self::ImagesToPdf { .. } => "images_to_pdf",
        }
    }

    pub fn preset(&self) -> Option<CompressionPreset> {
        match self {
            Self::Merge { preset, .. }
            | Self::Split { preset, .. }
            | Self::Reorder { preset, .. }
            | Self::Ocrize { preset, .. }
            | Self::ImagesToPdf { preset, .. } => *preset,
            Self::Compress { preset, .. } => Some(*preset),
        }
    }
}

/// A request that passed validation, reduced to the work it needs.
enum Plan {
    /// Copy pages out of parsed sources.
    Assemble {
        sources: Vec<Pdf>,
        order: Vec<SourceRef>,
    },
    /// The upload is the document; only the compression stage runs.
    PassThrough { bytes: Vec<u8> },
    Ocr { file: InputFile, kind: DocumentType },
    Images { files: Vec<InputFile> },
}

/// Runs requests end to end.
#[derive(Debug, Clone)]
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    store: TempArtifactStore,
    compressor: CompressionInvoker,
    rasterizer: PageRasterizer,
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: TempArtifactStore::from_config(&config),
            compressor: CompressionInvoker::new(config.ghostscript.clone()),
            rasterizer: PageRasterizer::new(config.ghostscript.clone(), config.raster_dpi),
            config,
        })
    }

    // -- Entry points ---------------------------------------------------------

    pub async fn merge(&self, files: Vec<InputFile>, preset: Option<CompressionPreset>) -> Result<Vec<u8>> {
        self.execute(PipelineRequest::Merge { files, preset }).await
    }

    pub async fn split(&self, file: InputFile, range: &str, preset: Option<CompressionPreset>) -> Result<Vec<u8>> {
        self.execute(PipelineRequest::Split {
            file,
            range: range.to_string(),
            preset,
        })
        .await
    }

    pub async fn reorder(&self, file: InputFile, order: &str, preset: Option<CompressionPreset>) -> Result<Vec<u8>> {
        self.execute(PipelineRequest::Reorder {
            file,
            order: order.to_string(),
            preset,
        })
        .await
    }

    pub async fn compress(&self, file: InputFile, preset: CompressionPreset) -> Result<Vec<u8>> {
        self.execute(PipelineRequest::Compress { file, preset }).await
    }

    pub async fn ocrize(&self, file: InputFile, preset: Option<CompressionPreset>) -> Result<Vec<u8>> {
        self.execute(PipelineRequest::Ocrize { file, preset }).await
    }

    pub async fn images_to_pdf(&self, files: Vec<InputFile>, preset: Option<CompressionPreset>) -> Result<Vec<u8>> {
        self.execute(PipelineRequest::ImagesToPdf { files, preset }).await
    }

    /// Run one request under its own `request_id` span.
    pub async fn execute(&self, request: PipelineRequest) -> Result<Vec<u8>> {
        let mut lifecycle = RequestLifecycle::new(request.operation());
        let span = info_span!(
            "request",
            request_id = %lifecycle.request_id(),
            operation = request.operation()
        );

        let result = self.run(request, &mut lifecycle).instrument(span).await;
        if let Err(err) = &result {
            lifecycle.fail(err);
        }
        result
    }

    async fn run(&self, request: PipelineRequest, lifecycle: &mut RequestLifecycle) -> Result<Vec<u8>> {
        let preset = request.preset();
        info!(?preset, "Request received");

        let plan = self.validate(request)?;
        lifecycle.advance(RequestState::Validated)?;

        let transformed = self.transform(plan).await?;
        lifecycle.advance(RequestState::Transformed)?;

        let bytes = match preset {
            Some(preset) => {
                let compressed = self.compressor.compress_bytes(&transformed, preset, &self.store).await?;
                lifecycle.advance(RequestState::Compressed)?;
                compressed
            }
            None => transformed,
        };

        lifecycle.advance(RequestState::Delivered)?;
        info!(output_bytes = bytes.len(), "Request delivered");
        Ok(bytes)
    }

    // -- Validation -----------------------------------------------------------

    fn validate(&self, request: PipelineRequest) -> Result<Plan> {
        match request {
            PipelineRequest::Merge { files, .. } => {
                if files.is_empty() {
                    return Err(BlattwerkError::EmptyInput);
                }
                let sources = files.iter().map(InputFile::to_pdf).collect::<Result<Vec<_>>>()?;
                Ok(Plan::Assemble {
                    order: DocumentAssembler::concatenation_order(&sources),
                    sources,
                })
            }
            PipelineRequest::Split { file, range, .. } => {
                let source = file.to_pdf()?;
                let pages = PageSelector::parse_range(&range, source.page_count())?;
                if pages.is_empty() {
                    return Err(BlattwerkError::InvalidInput(format!(
                        "page range {range:?} selects no pages of a {}-page document",
                        source.page_count()
                    )));
                }
                Ok(Plan::Assemble {
                    order: pages.to_source_refs(0),
                    sources: vec![source],
                })
            }
            PipelineRequest::Reorder { file, order, .. } => {
                let source = file.to_pdf()?;
                let pages = PageSelector::parse_order(&order, source.page_count())?;
                Ok(Plan::Assemble {
                    order: pages.to_source_refs(0),
                    sources: vec![source],
                })
            }
            PipelineRequest::Compress { file, .. } => match file.document_type() {
                Some(DocumentType::Pdf) => Ok(Plan::PassThrough { bytes: file.bytes }),
                _ => Err(BlattwerkError::InvalidInput(format!("{} is not a PDF", file.name))),
            },
            PipelineRequest::Ocrize { file, .. } => match file.document_type() {
                Some(kind) => Ok(Plan::Ocr { file, kind }),
                None => Err(BlattwerkError::InvalidInput(format!(
                    "{} is neither a PDF nor a supported image",
                    file.name
                ))),
            },
            PipelineRequest::ImagesToPdf { files, .. } => {
                if files.is_empty() {
                    return Err(BlattwerkError::InvalidInput("no images supplied".into()));
                }
                if let Some(file) = files
                    .iter()
                    .find(|file| !file.document_type().is_some_and(|kind| kind.is_raster()))
                {
                    return Err(BlattwerkError::InvalidInput(format!("{} is not a supported image", file.name)));
                }
                Ok(Plan::Images { files })
            }
        }
    }

    // -- Transformation -------------------------------------------------------

    async fn transform(&self, plan: Plan) -> Result<Vec<u8>> {
        match plan {
            Plan::Assemble { sources, order } => {
                blocking(move || DocumentAssembler::assemble(&sources, &order)?.into_bytes()).await
            }
            Plan::PassThrough { bytes } => Ok(bytes),
            Plan::Ocr { file, kind } => self.ocr(file, kind).await,
            Plan::Images { files } => {
                let writer = PdfWriter::new(self.config.image_paper_size);
                blocking(move || {
                    let encoded: Vec<Vec<u8>> = files.into_iter().map(|file| file.bytes).collect();
                    writer.images_to_pdf(&encoded)
                })
                .await
            }
        }
    }

    /// The engine is brought up before any page is rendered, so a missing
    /// tesseract fails the request without running Ghostscript.
    async fn ocr(&self, file: InputFile, kind: DocumentType) -> Result<Vec<u8>> {
        let engine = recognizer::from_settings(&self.config.ocr, &self.store).await?;

        let pages = match kind {
            DocumentType::Pdf => {
                let input = self.store.acquire("pdf")?;
                tokio::fs::write(input.path(), &file.bytes).await?;
                let rendered = self.rasterizer.rasterize(input.path(), &self.store).await?;
                blocking(move || load_rendered(rendered)).await?
            }
            _ => blocking(move || {
                image::load_from_memory(&file.bytes)
                    .map(|image| vec![image])
                    .map_err(|err| BlattwerkError::ImageError(format!("{} cannot be decoded: {}", file.name, err)))
            })
            .await?,
        };
        info!(pages = pages.len(), "Pages ready for OCR");

        let planned = OcrCompositor::new(engine.as_ref())
            .plan_pages(&pages, |progress| {
                info!(
                    page = progress.page,
                    total = progress.total_pages,
                    percent = progress.percent,
                    "OCR progress"
                );
            })
            .await?;
        blocking(move || render_searchable(&pages, &planned)).await
    }
}

/// Decode rasterised pages; the temp directory goes away with `rendered`.
fn load_rendered(rendered: RasterizedPages) -> Result<Vec<DynamicImage>> {
    rendered
        .pages
        .iter()
        .map(|path| {
            debug!(path = %path.display(), "Loading rendered page");
            image::open(path).map_err(|err| {
                BlattwerkError::ImageError(format!("cannot read rendered page {}: {}", path.display(), err))
            })
        })
        .collect()
}

/// Run CPU-bound work on the blocking pool inside the caller's span.
async fn blocking<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let span = Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(task))
        .await
        .map_err(|err| BlattwerkError::Io(std::io::Error::other(format!("worker task failed: {err}"))))?
}

impl From<IllegalTransition> for BlattwerkError {
    fn from(err: IllegalTransition) -> Self {
        BlattwerkError::Io(std::io::Error::other(err))
    }
}
