// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Searchable-PDF composition.
//
// Every output page is sized to its scan (one pixel = one point), shows the
// scan as an image XObject, and carries the recognised words as invisible
// text (render mode 3) positioned over the matching pixels. The page looks
// exactly like the scan but can be searched and selected.

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::pt_to_mm;
use image::DynamicImage;
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, Point, Pt, TextItem, TextRenderingMode, XObjectId,
    XObjectTransform,
};
use tracing::{debug, info, instrument, warn};

use super::overlay::{TextPlacement, place_words};
use super::recognizer::TextRecognizer;
use crate::pdf::writer::{POINT_DPI, raw_image, save};

const OVERLAY_FONT: BuiltinFont = BuiltinFont::Helvetica;
const DOCUMENT_TITLE: &str = "Blattwerk OCR";

/// Reported after each page is composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcrProgress {
    /// One-based number of the page just finished.
    pub page: usize,
    pub total_pages: usize,
    /// Share of pages done, 0–100.
    pub percent: u8,
}

impl OcrProgress {
    fn after(page: usize, total_pages: usize) -> Self {
        Self {
            page,
            total_pages,
            percent: (page * 100 / total_pages.max(1)) as u8,
        }
    }
}

/// What one output page will contain.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPage {
    /// Page size in points, equal to the scan's pixel size.
    pub width: f32,
    pub height: f32,
    pub placements: Vec<TextPlacement>,
    /// OCR failed on this page; it is emitted as a plain image page.
    pub ocr_failed: bool,
}

/// Turns scanned page images into a searchable PDF using a [`TextRecognizer`].
///
/// Recognition is async and runs page by page; writing the PDF is CPU work
/// done by [`render_searchable`], which callers can move off the runtime.
pub struct OcrCompositor<'a> {
    recognizer: &'a dyn TextRecognizer,
}

impl<'a> OcrCompositor<'a> {
    pub fn new(recognizer: &'a dyn TextRecognizer) -> Self {
        Self { recognizer }
    }

    /// Compose one searchable page per image, in order.
    pub async fn compose(&self, pages: &[DynamicImage]) -> Result<Vec<u8>> {
        self.compose_with_progress(pages, |_| {}).await
    }

    /// Like [`compose`](Self::compose), calling `progress` after every page.
    pub async fn compose_with_progress(
        &self,
        pages: &[DynamicImage],
        progress: impl FnMut(OcrProgress) + Send,
    ) -> Result<Vec<u8>> {
        let planned = self.plan_pages(pages, progress).await?;
        render_searchable(pages, &planned)
    }

    /// Recognise every page, calling `progress` after each one.
    ///
    /// A page whose recognition fails keeps its image but gets no text layer.
    /// An engine that cannot run at all ([`BlattwerkError::OcrEngineUnavailable`])
    /// or overruns its deadline ([`BlattwerkError::Timeout`]) fails the whole
    /// document.
    #[instrument(skip_all, fields(pages = pages.len(), engine = self.recognizer.name()))]
    pub async fn plan_pages(
        &self,
        pages: &[DynamicImage],
        mut progress: impl FnMut(OcrProgress) + Send,
    ) -> Result<Vec<ComposedPage>> {
        if pages.is_empty() {
            return Err(BlattwerkError::InvalidInput("no pages to recognise".into()));
        }
        info!(pages = pages.len(), "Recognising pages");

        let mut planned = Vec::with_capacity(pages.len());
        for (index, image) in pages.iter().enumerate() {
            planned.push(self.plan_page(index, image).await?);
            progress(OcrProgress::after(index + 1, pages.len()));
        }
        Ok(planned)
    }

    /// Recognise one page and position its words in page space.
    pub async fn plan_page(&self, index: usize, image: &DynamicImage) -> Result<ComposedPage> {
        let (width, height) = (image.width() as f32, image.height() as f32);
        if width == 0.0 || height == 0.0 {
            return Err(BlattwerkError::ImageError(format!("page {} has no pixels", index + 1)));
        }

        match self.recognizer.recognize(image).await {
            Ok(recognition) => {
                let placements = place_words(&recognition.words, recognition.image_size, width, height);
                debug!(
                    page = index + 1,
                    recognized = recognition.words.len(),
                    placed = placements.len(),
                    ocr_w = recognition.image_size.width,
                    ocr_h = recognition.image_size.height,
                    "Page recognised"
                );
                Ok(ComposedPage {
                    width,
                    height,
                    placements,
                    ocr_failed: false,
                })
            }
            Err(err @ (BlattwerkError::OcrEngineUnavailable(_) | BlattwerkError::Timeout { .. })) => Err(err),
            Err(err) => {
                warn!(page = index + 1, error = %err, "OCR failed, page kept without text layer");
                Ok(ComposedPage {
                    width,
                    height,
                    placements: Vec::new(),
                    ocr_failed: true,
                })
            }
        }
    }
}

/// Write the searchable PDF: page N shows `pages[N]` under the words
/// planned for it in `planned[N]`.
#[instrument(skip_all, fields(pages = pages.len()))]
pub fn render_searchable(pages: &[DynamicImage], planned: &[ComposedPage]) -> Result<Vec<u8>> {
    if pages.is_empty() || pages.len() != planned.len() {
        return Err(BlattwerkError::InvalidInput(format!(
            "{} page images but {} planned pages",
            pages.len(),
            planned.len()
        )));
    }

    let mut doc = PdfDocument::new(DOCUMENT_TITLE);
    let mut output_pages = Vec::with_capacity(pages.len());
    for (image, page) in pages.iter().zip(planned) {
        let xobject_id = doc.add_image(&raw_image(image));
        output_pages.push(PdfPage::new(
            Mm(pt_to_mm(page.width)),
            Mm(pt_to_mm(page.height)),
            page_ops(xobject_id, &page.placements),
        ));
    }

    doc.with_pages(output_pages);
    let words: usize = planned.iter().map(|page| page.placements.len()).sum();
    info!(words, "Searchable PDF composed");
    Ok(save(&doc))
}

/// Draw the scan at 1:1, then each word as invisible text at its position.
fn page_ops(xobject_id: XObjectId, placements: &[TextPlacement]) -> Vec<Op> {
    let mut ops = Vec::with_capacity(1 + placements.len() * 6);
    ops.push(Op::UseXobject {
        id: xobject_id,
        transform: XObjectTransform {
            translate_x: Some(Pt(0.0)),
            translate_y: Some(Pt(0.0)),
            scale_x: Some(1.0),
            scale_y: Some(1.0),
            dpi: Some(POINT_DPI),
            rotate: None,
        },
    });

    for placement in placements {
        ops.push(Op::StartTextSection);
        ops.push(Op::SetTextRenderingMode {
            mode: TextRenderingMode::Invisible,
        });
        ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(placement.font_size),
            font: OVERLAY_FONT,
        });
        ops.push(Op::SetTextCursor {
            pos: Point {
                x: Pt(placement.x),
                y: Pt(placement.y),
            },
        });
        ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(placement.text.clone())],
            font: OVERLAY_FONT,
        });
        ops.push(Op::EndTextSection);
    }
    ops
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use blattwerk_core::{BoundingBox, ImageSize, PageRecognition, RecognizedWord};
    use lopdf::content::Content;

    use super::*;
    use crate::fixtures::sample_image;
    use crate::pdf::document::Pdf;

    /// Returns canned results, one per call, in order.
    struct ScriptedRecognizer {
        results: Mutex<Vec<Result<PageRecognition>>>,
    }

    impl ScriptedRecognizer {
        fn new(mut results: Vec<Result<PageRecognition>>) -> Self {
            results.reverse();
            Self {
                results: Mutex::new(results),
            }
        }
    }

    #[async_trait::async_trait]
    impl TextRecognizer for ScriptedRecognizer {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn recognize(&self, _image: &DynamicImage) -> Result<PageRecognition> {
            self.results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(PageRecognition::empty(ImageSize::new(1, 1))))
        }
    }

    fn recognition(size: (u32, u32), words: &[(&str, [f32; 4])]) -> Result<PageRecognition> {
        Ok(PageRecognition {
            words: words
                .iter()
                .map(|(text, [x0, y0, x1, y1])| {
                    RecognizedWord::new(*text, Some(90.0), BoundingBox::new(*x0, *y0, *x1, *y1))
                })
                .collect(),
            image_size: ImageSize::new(size.0, size.1),
        })
    }

    /// (operator, operands) pairs of one page's content stream.
    fn operations(pdf: &Pdf, index: usize) -> Vec<(String, Vec<lopdf::Object>)> {
        let content = Content::decode(&pdf.page_content(index).unwrap()).unwrap();
        content
            .operations
            .into_iter()
            .map(|op| (op.operator, op.operands))
            .collect()
    }

    /// Strings shown with `Tj` or `TJ`, one entry per operation.
    fn shown_text(ops: &[(String, Vec<lopdf::Object>)]) -> Vec<String> {
        fn collect(object: &lopdf::Object, out: &mut Vec<u8>) {
            match object {
                lopdf::Object::String(bytes, _) => out.extend_from_slice(bytes),
                lopdf::Object::Array(items) => items.iter().for_each(|item| collect(item, out)),
                _ => {}
            }
        }

        ops.iter()
            .filter(|(operator, _)| operator == "Tj" || operator == "TJ")
            .map(|(_, operands)| {
                let mut bytes = Vec::new();
                operands.iter().for_each(|operand| collect(operand, &mut bytes));
                String::from_utf8_lossy(&bytes).into_owned()
            })
            .collect()
    }

    #[tokio::test]
    async fn pages_match_image_size_and_carry_invisible_text() {
        let recognizer = ScriptedRecognizer::new(vec![recognition(
            (200, 100),
            &[("Hello", [10.0, 20.0, 60.0, 40.0]), ("World", [70.0, 20.0, 130.0, 40.0])],
        )]);
        let bytes = OcrCompositor::new(&recognizer)
            .compose(&[sample_image(200, 100)])
            .await
            .unwrap();

        let pdf = Pdf::from_bytes(&bytes).unwrap();
        assert_eq!(pdf.page_count(), 1);
        let (w, h) = pdf.page_size(0).unwrap();
        assert!((w - 200.0).abs() < 0.5 && (h - 100.0).abs() < 0.5, "page is {w}x{h}");

        let ops = operations(&pdf, 0);
        assert_eq!(shown_text(&ops), ["Hello", "World"]);
        assert!(ops.iter().any(|(operator, operands)| operator == "Tr"
            && operands.first().and_then(|o| o.as_i64().ok()) == Some(3)));
        assert!(ops.iter().any(|(operator, _)| operator == "Do"));
    }

    #[tokio::test]
    async fn rescaled_recognition_is_mapped_onto_the_page() {
        // The engine saw a half-size copy of a 400x200 scan.
        let recognizer = ScriptedRecognizer::new(vec![recognition((200, 100), &[("Total", [10.0, 20.0, 60.0, 40.0])])]);
        let compositor = OcrCompositor::new(&recognizer);
        let page = compositor.plan_page(0, &sample_image(400, 200)).await.unwrap();

        assert_eq!((page.width, page.height), (400.0, 200.0));
        let placed = &page.placements[0];
        assert_eq!(placed.x, 20.0);
        assert_eq!(placed.y, 200.0 - 40.0 * 2.0);
        assert_eq!(placed.glyph_height, 40.0);
        assert_eq!(placed.font_size, 36.0);
    }

    #[tokio::test]
    async fn failed_page_keeps_image_without_text() {
        let recognizer = ScriptedRecognizer::new(vec![
            Err(BlattwerkError::OcrError("engine crashed on page".into())),
            recognition((50, 50), &[("ok", [1.0, 1.0, 20.0, 12.0])]),
        ]);
        let bytes = OcrCompositor::new(&recognizer)
            .compose(&[sample_image(50, 50), sample_image(50, 50)])
            .await
            .unwrap();

        let pdf = Pdf::from_bytes(&bytes).unwrap();
        assert_eq!(pdf.page_count(), 2);
        assert!(shown_text(&operations(&pdf, 0)).is_empty());
        assert_eq!(shown_text(&operations(&pdf, 1)), ["ok"]);
    }

    #[tokio::test]
    async fn unavailable_engine_fails_the_document() {
        let recognizer = ScriptedRecognizer::new(vec![Err(BlattwerkError::OcrEngineUnavailable(
            "no eng.traineddata".into(),
        ))]);
        let err = OcrCompositor::new(&recognizer)
            .compose(&[sample_image(10, 10)])
            .await
            .unwrap_err();
        assert!(matches!(err, BlattwerkError::OcrEngineUnavailable(_)));
    }

    #[tokio::test]
    async fn deadline_overrun_fails_the_document() {
        let recognizer = ScriptedRecognizer::new(vec![
            recognition((10, 10), &[]),
            Err(BlattwerkError::Timeout {
                tool: "tesseract".into(),
                after: std::time::Duration::from_secs(1),
            }),
        ]);
        let err = OcrCompositor::new(&recognizer)
            .compose(&[sample_image(10, 10), sample_image(10, 10)])
            .await
            .unwrap_err();
        assert!(matches!(err, BlattwerkError::Timeout { .. }));
    }

    #[test]
    fn rendering_needs_a_plan_for_every_page() {
        let err = render_searchable(&[sample_image(10, 10)], &[]).unwrap_err();
        assert!(matches!(err, BlattwerkError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn page_without_words_is_not_an_error() {
        let recognizer = ScriptedRecognizer::new(vec![recognition((30, 30), &[])]);
        let page = OcrCompositor::new(&recognizer)
            .plan_page(0, &sample_image(30, 30))
            .await
            .unwrap();
        assert!(page.placements.is_empty());
        assert!(!page.ocr_failed);
    }

    #[tokio::test]
    async fn progress_reaches_one_hundred() {
        let recognizer = ScriptedRecognizer::new(Vec::new());
        let mut seen = Vec::new();
        OcrCompositor::new(&recognizer)
            .compose_with_progress(&[sample_image(8, 8), sample_image(8, 8), sample_image(8, 8)], |p| {
                seen.push(p)
            })
            .await
            .unwrap();
        let percents: Vec<u8> = seen.iter().map(|p| p.percent).collect();
        assert_eq!(percents, [33, 66, 100]);
        assert!(seen.iter().all(|p| p.total_pages == 3));
        assert_eq!(seen.last().unwrap().page, 3);
    }

    #[tokio::test]
    async fn no_pages_is_invalid_input() {
        let recognizer = ScriptedRecognizer::new(Vec::new());
        assert!(matches!(
            OcrCompositor::new(&recognizer).compose(&[]).await,
            Err(BlattwerkError::InvalidInput(_))
        ));
    }
}
