// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end requests through the orchestrator.
//
// Ghostscript and tesseract are replaced by small shell scripts, so these
// run without either installed. Every test checks that the request left
// nothing behind in its temp directory.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use blattwerk_core::config::{PipelineConfig, ToolConfig};
use blattwerk_core::{BlattwerkError, CompressionPreset, ErrorReport, error::ErrorKind};
use blattwerk_document::Pdf;
use blattwerk_document::fixtures::{numbered_pdf, page_label, png_bytes, sample_image};
use blattwerk_pipeline::{InputFile, PipelineOrchestrator};
use lopdf::Object;
use lopdf::content::Content;
use tempfile::TempDir;
use tokio::task::JoinSet;

/// Records its arguments and copies the last input to -sOutputFile.
const FAKE_GS: &str = r#"#!/bin/sh
printf '%s\n' "$@" > "$(dirname "$0")/gs-args.txt"
out=""
for arg in "$@"; do
  case "$arg" in -sOutputFile=*) out="${arg#-sOutputFile=}" ;; esac
  last="$arg"
done
cat "$last" > "$out"
"#;

/// Stands in for `png16m` rendering: drops two pre-made pages into the
/// directory of the -sOutputFile pattern.
const RASTER_GS: &str = r#"#!/bin/sh
bin="$(dirname "$0")"
printf '%s\n' "$@" > "$bin/gs-args.txt"
for arg in "$@"; do
  case "$arg" in -sOutputFile=*) out="${arg#-sOutputFile=}" ;; esac
done
cp "$bin/page-a.png" "$(dirname "$out")/page-0001.png"
cp "$bin/page-b.png" "$(dirname "$out")/page-0002.png"
"#;

const FAILING_GS: &str = "#!/bin/sh\necho 'Error: /syntaxerror in pdf_process_Encoding' >&2\nexit 1\n";

/// Knows English and always reads one word.
const FAKE_TESSERACT: &str = r#"#!/bin/sh
if [ "$1" = "--list-langs" ]; then
  echo 'List of available languages in "/usr/share/tessdata/" (1):'
  echo eng
  exit 0
fi
printf 'level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n'
printf '5\t1\t1\t1\t1\t1\t10\t10\t40\t12\t95.5\tInvoice\n'
"#;

/// Knows English, then takes longer than any deadline to read a page.
const STALLING_TESSERACT: &str = r#"#!/bin/sh
if [ "$1" = "--list-langs" ]; then
  echo 'List of available languages in "/usr/share/tessdata/" (1):'
  echo eng
  exit 0
fi
sleep 4
"#;

/// Leaves a marker behind if it is allowed to finish a page.
const SLOW_TESSERACT: &str = r#"#!/bin/sh
if [ "$1" = "--list-langs" ]; then
  echo 'List of available languages in "/usr/share/tessdata/" (1):'
  echo eng
  exit 0
fi
sleep 2
touch "$(dirname "$0")/tesseract-finished"
"#;

struct Harness {
    dir: TempDir,
    orchestrator: PipelineOrchestrator,
}

impl Harness {
    fn new(gs: Option<&str>) -> Self {
        Self::with_tools(gs, Some(FAKE_TESSERACT), None)
    }

    /// `None` for a tool leaves its configured program missing.
    fn with_tools(gs: Option<&str>, tesseract: Option<&str>, tesseract_timeout: Option<u64>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir(&bin).unwrap();

        let mut config = PipelineConfig::default();
        config.temp_dir = Some(dir.path().join("tmp"));
        config.ghostscript = match gs {
            Some(body) => ToolConfig::new(install(&bin, "gs", body)),
            None => ToolConfig::new(bin.join("missing-gs")),
        };
        config.ocr.tesseract = match tesseract {
            Some(body) => ToolConfig::new(install(&bin, "tesseract", body)),
            None => ToolConfig::new(bin.join("missing-tesseract")),
        };
        config.ocr.tesseract.timeout_secs = tesseract_timeout;

        let orchestrator = PipelineOrchestrator::new(config).unwrap();
        Self { dir, orchestrator }
    }

    fn bin(&self) -> PathBuf {
        self.dir.path().join("bin")
    }

    fn gs_args(&self) -> Option<Vec<String>> {
        let log = self.dir.path().join("bin/gs-args.txt");
        std::fs::read_to_string(log).ok().map(|text| text.lines().map(String::from).collect())
    }

    fn leftover_artifacts(&self) -> usize {
        match std::fs::read_dir(self.dir.path().join("tmp")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

fn install(bin: &Path, name: &str, body: &str) -> PathBuf {
    let path = bin.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn pdf_file(name: &str, pages: usize) -> InputFile {
    InputFile::new(name, numbered_pdf(pages).unwrap())
}

/// Strings drawn by Tj/TJ operators in a content stream.
fn shown_text(content: &[u8]) -> Vec<String> {
    let content = Content::decode(content).unwrap();
    content
        .operations
        .iter()
        .filter(|op| op.operator == "Tj" || op.operator == "TJ")
        .map(|op| {
            let mut bytes = Vec::new();
            for operand in &op.operands {
                match operand {
                    Object::String(text, _) => bytes.extend_from_slice(text),
                    Object::Array(items) => items.iter().for_each(|item| {
                        if let Object::String(text, _) = item {
                            bytes.extend_from_slice(text);
                        }
                    }),
                    _ => {}
                }
            }
            String::from_utf8_lossy(&bytes).into_owned()
        })
        .collect()
}

fn labels(bytes: &[u8]) -> Vec<String> {
    let pdf = Pdf::from_bytes(bytes).unwrap();
    (0..pdf.page_count()).filter_map(|index| page_label(&pdf, index)).collect()
}

#[tokio::test]
async fn merge_without_preset_needs_no_subprocess() {
    let harness = Harness::new(None);
    let output = harness
        .orchestrator
        .merge(vec![pdf_file("a.pdf", 2), pdf_file("b.pdf", 1)], None)
        .await
        .unwrap();
    assert_eq!(labels(&output), ["Page 1", "Page 2", "Page 1"]);
    assert_eq!(harness.leftover_artifacts(), 0);
}

#[tokio::test]
async fn merge_with_preset_compresses_the_assembled_document() {
    let harness = Harness::new(Some(FAKE_GS));
    let output = harness
        .orchestrator
        .merge(vec![pdf_file("a.pdf", 2), pdf_file("b.pdf", 3)], Some(CompressionPreset::Screen))
        .await
        .unwrap();

    let args = harness.gs_args().unwrap();
    assert!(args.contains(&"-dPDFSETTINGS=/screen".to_string()));
    let inputs: Vec<&String> = args.iter().filter(|arg| arg.ends_with(".pdf") && !arg.starts_with('-')).collect();
    assert_eq!(inputs.len(), 1, "Ghostscript should see one merged document: {args:?}");
    // The fake compressor copies its input, so this is the assembler's output.
    assert_eq!(labels(&output), ["Page 1", "Page 2", "Page 1", "Page 2", "Page 3"]);
    assert_eq!(harness.leftover_artifacts(), 0);
}

#[tokio::test]
async fn split_keeps_selected_pages() {
    let harness = Harness::new(None);
    let output = harness
        .orchestrator
        .split(pdf_file("doc.pdf", 6), "1-3,5", None)
        .await
        .unwrap();
    assert_eq!(labels(&output), ["Page 1", "Page 2", "Page 3", "Page 5"]);
}

#[tokio::test]
async fn split_selecting_nothing_is_rejected() {
    let harness = Harness::new(Some(FAKE_GS));
    let err = harness
        .orchestrator
        .split(pdf_file("doc.pdf", 3), "7-9", Some(CompressionPreset::Ebook))
        .await
        .unwrap_err();
    assert!(matches!(err, BlattwerkError::InvalidInput(_)));
    assert!(harness.gs_args().is_none(), "Ghostscript must not run for rejected requests");
}

#[tokio::test]
async fn reorder_out_of_bounds_is_rejected_before_compression() {
    let harness = Harness::new(Some(FAKE_GS));
    let err = harness
        .orchestrator
        .reorder(pdf_file("doc.pdf", 3), "[2, 0, 3]", Some(CompressionPreset::Screen))
        .await
        .unwrap_err();
    assert!(matches!(err, BlattwerkError::OutOfBounds { index: 3, page_count: 3 }));
    assert_eq!(ErrorReport::from(&err).kind, ErrorKind::OutOfBounds);
    assert!(harness.gs_args().is_none());
}

#[tokio::test]
async fn reorder_then_compress() {
    let harness = Harness::new(Some(FAKE_GS));
    let output = harness
        .orchestrator
        .reorder(pdf_file("doc.pdf", 3), "[2, 0, 1]", Some(CompressionPreset::Prepress))
        .await
        .unwrap();
    // The fake compressor copies its input, so the page order survives.
    assert_eq!(labels(&output), ["Page 3", "Page 1", "Page 2"]);
    assert!(harness.gs_args().unwrap().contains(&"-dPDFSETTINGS=/prepress".to_string()));
    assert_eq!(harness.leftover_artifacts(), 0);
}

#[tokio::test]
async fn compress_failure_carries_stderr_and_cleans_up() {
    let harness = Harness::new(Some(FAILING_GS));
    let err = harness
        .orchestrator
        .compress(pdf_file("doc.pdf", 1), CompressionPreset::Screen)
        .await
        .unwrap_err();

    let report = ErrorReport::from(&err);
    assert_eq!(report.kind, ErrorKind::CompressionFailed);
    assert!(report.detail.contains("syntaxerror"));
    assert_eq!(harness.leftover_artifacts(), 0);
}

#[tokio::test]
async fn missing_ghostscript_is_tool_unavailable() {
    let harness = Harness::new(None);
    let err = harness
        .orchestrator
        .compress(pdf_file("doc.pdf", 1), CompressionPreset::Default)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ToolUnavailable);
    assert_eq!(harness.leftover_artifacts(), 0);
}

#[tokio::test]
async fn compress_rejects_non_pdf() {
    let harness = Harness::new(Some(FAKE_GS));
    let err = harness
        .orchestrator
        .compress(InputFile::new("notes.txt", b"hello".to_vec()), CompressionPreset::Screen)
        .await
        .unwrap_err();
    assert!(err.is_rejection());
    assert!(harness.gs_args().is_none());
}

#[tokio::test]
async fn images_become_pages() {
    let harness = Harness::new(None);
    let images = vec![
        InputFile::new("a.png", png_bytes(&sample_image(80, 40)).unwrap()),
        InputFile::new("b.png", png_bytes(&sample_image(40, 80)).unwrap()),
    ];
    let output = harness.orchestrator.images_to_pdf(images, None).await.unwrap();
    assert_eq!(Pdf::from_bytes(&output).unwrap().page_count(), 2);
}

#[tokio::test]
async fn ocr_of_an_image_produces_a_searchable_page() {
    let harness = Harness::new(None);
    let scan = InputFile::new("scan.png", png_bytes(&sample_image(120, 60)).unwrap());
    let output = harness.orchestrator.ocrize(scan, None).await.unwrap();

    let pdf = Pdf::from_bytes(&output).unwrap();
    assert_eq!(pdf.page_count(), 1);
    let (width, height) = pdf.page_size(0).unwrap();
    assert!((width - 120.0).abs() < 0.5 && (height - 60.0).abs() < 0.5);
    assert_eq!(shown_text(&pdf.page_content(0).unwrap()), ["Invoice"]);
    assert_eq!(harness.leftover_artifacts(), 0);
}

#[tokio::test]
async fn ocr_of_a_pdf_recognises_every_rendered_page() {
    let harness = Harness::new(Some(RASTER_GS));
    std::fs::write(harness.bin().join("page-a.png"), png_bytes(&sample_image(90, 60)).unwrap()).unwrap();
    std::fs::write(harness.bin().join("page-b.png"), png_bytes(&sample_image(50, 70)).unwrap()).unwrap();

    let output = harness.orchestrator.ocrize(pdf_file("scan.pdf", 2), None).await.unwrap();

    let args = harness.gs_args().unwrap();
    assert!(args.contains(&"-sDEVICE=png16m".to_string()), "{args:?}");
    let pdf = Pdf::from_bytes(&output).unwrap();
    assert_eq!(pdf.page_count(), 2);
    for (index, expected) in [(90.0, 60.0), (50.0, 70.0)].into_iter().enumerate() {
        let (width, height) = pdf.page_size(index).unwrap();
        assert!(
            (width - expected.0).abs() < 0.5 && (height - expected.1).abs() < 0.5,
            "page {index} is {width}x{height}"
        );
        assert_eq!(shown_text(&pdf.page_content(index).unwrap()), ["Invoice"]);
    }
    assert_eq!(harness.leftover_artifacts(), 0);
}

#[tokio::test]
async fn ocr_engine_is_checked_before_rendering() {
    let harness = Harness::with_tools(Some(RASTER_GS), None, None);
    let err = harness
        .orchestrator
        .ocrize(pdf_file("scan.pdf", 2), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OcrEngineUnavailable);
    assert!(harness.gs_args().is_none(), "Ghostscript must not run without an OCR engine");
    assert_eq!(harness.leftover_artifacts(), 0);
}

#[tokio::test]
async fn stalled_tesseract_times_out() {
    let harness = Harness::with_tools(None, Some(STALLING_TESSERACT), Some(1));
    let scan = InputFile::new("scan.png", png_bytes(&sample_image(40, 40)).unwrap());

    let started = Instant::now();
    let err = harness.orchestrator.ocrize(scan, None).await.unwrap_err();
    assert!(matches!(err, BlattwerkError::Timeout { ref tool, .. } if tool == "tesseract"), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    assert_eq!(harness.leftover_artifacts(), 0);
}

#[tokio::test]
async fn dropping_an_ocr_request_kills_tesseract() {
    let harness = Harness::with_tools(None, Some(SLOW_TESSERACT), None);
    let scan = InputFile::new("scan.png", png_bytes(&sample_image(40, 40)).unwrap());

    let abandoned = tokio::time::timeout(Duration::from_millis(500), harness.orchestrator.ocrize(scan, None)).await;
    assert!(abandoned.is_err(), "request should still be running");

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!harness.bin().join("tesseract-finished").exists(), "tesseract outlived its request");
    assert_eq!(harness.leftover_artifacts(), 0);
}

#[tokio::test]
async fn ocr_without_tesseract_fails_whole_request() {
    let mut config = PipelineConfig::default();
    let dir = tempfile::tempdir().unwrap();
    config.temp_dir = Some(dir.path().join("tmp"));
    config.ocr.tesseract = ToolConfig::new(dir.path().join("no-tesseract"));
    let orchestrator = PipelineOrchestrator::new(config).unwrap();

    let scan = InputFile::new("scan.png", png_bytes(&sample_image(20, 20)).unwrap());
    let err = orchestrator.ocrize(scan, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OcrEngineUnavailable);
}

#[tokio::test]
async fn ocr_rejects_unknown_content() {
    let harness = Harness::new(None);
    let err = harness
        .orchestrator
        .ocrize(InputFile::new("mystery.bin", vec![0, 1, 2, 3]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, BlattwerkError::InvalidInput(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_do_not_share_artifacts() {
    let harness = Harness::new(Some(FAKE_GS));
    let mut requests = JoinSet::new();
    for pages in 1..=8 {
        let orchestrator = harness.orchestrator.clone();
        requests.spawn(async move {
            let output = orchestrator
                .compress(pdf_file("doc.pdf", pages), CompressionPreset::Ebook)
                .await;
            (pages, output)
        });
    }
    while let Some(joined) = requests.join_next().await {
        let (pages, output) = joined.unwrap();
        let pdf = Pdf::from_bytes(&output.unwrap()).unwrap();
        assert_eq!(pdf.page_count(), pages);
    }
    assert_eq!(harness.leftover_artifacts(), 0);
}
