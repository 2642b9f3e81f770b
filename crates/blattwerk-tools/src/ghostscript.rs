// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ghostscript invocations.
//
// Compression re-distills PDFs through the `pdfwrite` device with one of the
// named `-dPDFSETTINGS` presets. Rasterisation renders every page to a PNG
// with the `png16m` device so scanned PDFs can be fed to OCR.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use blattwerk_core::config::ToolConfig;
use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{CompressionPreset, TempArtifact, TempArtifactStore};
use tracing::{debug, info, instrument, warn};

use crate::subprocess::run_tool;

/// Flags that do not depend on the preset. Font and image handling are
/// pinned so output only varies with the preset.
const FIXED_PDFWRITE_FLAGS: [&str; 7] = [
    "-dEmbedAllFonts=true",
    "-dSubsetFonts=true",
    "-dCompressFonts=true",
    "-dDetectDuplicateImages=true",
    "-dColorImageDownsampleType=/Bicubic",
    "-dGrayImageDownsampleType=/Bicubic",
    "-dMonoImageDownsampleType=/Subsample",
];

/// Output name pattern for rasterised pages; Ghostscript substitutes the
/// one-based page number.
const RASTER_PAGE_PATTERN: &str = "page-%04d.png";

/// Argument list for compressing `inputs` into `output`:
/// `-sDEVICE=pdfwrite -dCompatibilityLevel=1.4 -dPDFSETTINGS=/{preset}
/// -dNOPAUSE -dQUIET -dBATCH <fixed flags> -sOutputFile={out} {in...}`.
pub fn compression_args(preset: CompressionPreset, output: &Path, inputs: &[&Path]) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-sDEVICE=pdfwrite".into(),
        "-dCompatibilityLevel=1.4".into(),
        preset.settings_arg().into(),
        "-dNOPAUSE".into(),
        "-dQUIET".into(),
        "-dBATCH".into(),
    ];
    args.extend(FIXED_PDFWRITE_FLAGS.iter().map(OsString::from));
    args.push(output_file_arg(output));
    args.extend(inputs.iter().map(|input| input.as_os_str().to_owned()));
    args
}

/// Argument list for rendering every page of `input` to PNGs in `output_dir`.
pub fn raster_args(dpi: u32, output_dir: &Path, input: &Path) -> Vec<OsString> {
    vec![
        "-sDEVICE=png16m".into(),
        format!("-r{dpi}").into(),
        "-dTextAlphaBits=4".into(),
        "-dGraphicsAlphaBits=4".into(),
        "-dNOPAUSE".into(),
        "-dQUIET".into(),
        "-dBATCH".into(),
        output_file_arg(&output_dir.join(RASTER_PAGE_PATTERN)),
        input.as_os_str().to_owned(),
    ]
}

fn output_file_arg(path: &Path) -> OsString {
    let mut arg = OsString::from("-sOutputFile=");
    arg.push(path.as_os_str());
    arg
}

/// Shrinks PDFs with Ghostscript `pdfwrite`.
#[derive(Debug, Clone)]
pub struct CompressionInvoker {
    tool: ToolConfig,
}

impl CompressionInvoker {
    pub fn new(tool: ToolConfig) -> Self {
        Self { tool }
    }

    /// Compress `input` into `output`.
    ///
    /// A non-zero exit is [`BlattwerkError::CompressionFailed`] carrying the
    /// captured stderr; `output` must not be trusted in that case.
    pub async fn compress(&self, input: &Path, output: &Path, preset: CompressionPreset) -> Result<()> {
        self.compress_many(&[input], output, preset).await
    }

    /// Compress several inputs, concatenated in order, into one `output`.
    #[instrument(skip_all, fields(inputs = inputs.len(), %preset))]
    pub async fn compress_many(&self, inputs: &[&Path], output: &Path, preset: CompressionPreset) -> Result<()> {
        if inputs.is_empty() {
            return Err(BlattwerkError::EmptyInput);
        }
        let args = compression_args(preset, output, inputs);
        let outcome = run_tool(&self.tool, &args).await?;

        if !outcome.success() {
            warn!(exit_code = ?outcome.exit_code(), "Compression failed");
            return Err(BlattwerkError::CompressionFailed {
                exit_code: outcome.exit_code(),
                stderr: outcome.stderr.trim().to_string(),
            });
        }
        info!(output = %output.display(), "Compression finished");
        Ok(())
    }

    /// Compress an in-memory PDF through request-scoped temp files.
    ///
    /// Both temp files are removed before this returns, on every path.
    pub async fn compress_bytes(
        &self,
        pdf: &[u8],
        preset: CompressionPreset,
        store: &TempArtifactStore,
    ) -> Result<Vec<u8>> {
        let input = store.acquire("pdf")?;
        let output = store.acquire("pdf")?;
        tokio::fs::write(input.path(), pdf).await?;

        self.compress(input.path(), output.path(), preset).await?;

        let compressed = tokio::fs::read(output.path()).await?;
        debug!(before = pdf.len(), after = compressed.len(), "Compressed in memory");
        Ok(compressed)
    }
}

/// Renders PDF pages to PNG files with Ghostscript `png16m`.
#[derive(Debug, Clone)]
pub struct PageRasterizer {
    tool: ToolConfig,
    dpi: u32,
}

/// Pages rendered into a temp directory; the directory (and every page in
/// it) is removed when this is dropped.
#[derive(Debug)]
pub struct RasterizedPages {
    pub pages: Vec<PathBuf>,
    _dir: TempArtifact,
}

impl PageRasterizer {
    pub fn new(tool: ToolConfig, dpi: u32) -> Self {
        Self { tool, dpi }
    }

    /// Render every page of `input` at the configured resolution, returning
    /// the PNG paths in page order.
    #[instrument(skip_all, fields(input = %input.display(), dpi = self.dpi))]
    pub async fn rasterize(&self, input: &Path, store: &TempArtifactStore) -> Result<RasterizedPages> {
        let dir = store.acquire_dir()?;
        let outcome = run_tool(&self.tool, &raster_args(self.dpi, dir.path(), input)).await?;

        if !outcome.success() {
            return Err(BlattwerkError::RasterizeFailed {
                exit_code: outcome.exit_code(),
                stderr: outcome.stderr.trim().to_string(),
            });
        }

        let mut pages = Vec::new();
        let mut entries = tokio::fs::read_dir(dir.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "png") {
                pages.push(path);
            }
        }
        // Zero-padded names sort into page order.
        pages.sort();

        if pages.is_empty() {
            return Err(BlattwerkError::RasterizeFailed {
                exit_code: outcome.exit_code(),
                stderr: "no pages were rendered".into(),
            });
        }
        info!(pages = pages.len(), "Rasterisation finished");
        Ok(RasterizedPages { pages, _dir: dir })
    }
}
