// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: build new PDF documents from raster images using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{PaperSize, pt_to_mm};
use image::DynamicImage;
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument, warn};

/// At 72 dpi one image pixel covers one PDF point.
pub(crate) const POINT_DPI: f32 = 72.0;

/// Title metadata embedded in image PDFs.
const IMAGES_TITLE: &str = "Blattwerk Images";

/// Creates image PDFs, one image per page of a fixed paper size.
pub struct PdfWriter {
    /// Paper size for page creation.
    paper_size: PaperSize,
}

impl PdfWriter {
    /// Create a new writer targeting the given paper size.
    pub fn new(paper_size: PaperSize) -> Self {
        Self { paper_size }
    }

    /// Create a new writer defaulting to A4.
    pub fn a4() -> Self {
        Self::new(PaperSize::A4)
    }

    /// Decode each encoded image (JPEG, PNG, ...) and lay them out one per page.
    #[instrument(skip_all, fields(images = encoded.len()))]
    pub fn images_to_pdf(&self, encoded: &[Vec<u8>]) -> Result<Vec<u8>> {
        let mut images = Vec::with_capacity(encoded.len());
        for (position, bytes) in encoded.iter().enumerate() {
            let image = image::load_from_memory(bytes).map_err(|err| {
                BlattwerkError::ImageError(format!("image #{} cannot be decoded: {}", position + 1, err))
            })?;
            images.push(image);
        }
        self.render_images(&images)
    }

    /// Place each image on its own page, scaled to fit the paper (upscaling
    /// small images) and centred.
    #[instrument(skip_all, fields(images = images.len(), paper = ?self.paper_size))]
    pub fn render_images(&self, images: &[DynamicImage]) -> Result<Vec<u8>> {
        if images.is_empty() {
            return Err(BlattwerkError::InvalidInput("no images supplied".into()));
        }

        let (page_w_pt, page_h_pt) = self.paper_size.dimensions_pt();
        info!(pages = images.len(), paper = ?self.paper_size, "Creating image PDF");

        let mut doc = PdfDocument::new(IMAGES_TITLE);
        let mut pages = Vec::with_capacity(images.len());

        for (position, image) in images.iter().enumerate() {
            let (img_w, img_h) = (image.width() as f32, image.height() as f32);
            if img_w == 0.0 || img_h == 0.0 {
                return Err(BlattwerkError::ImageError(format!(
                    "image #{} has no pixels",
                    position + 1
                )));
            }

            let placement = fit_to_page(img_w, img_h, page_w_pt, page_h_pt);
            let xobject_id = doc.add_image(&raw_image(image));

            let ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(placement.x)),
                    translate_y: Some(Pt(placement.y)),
                    scale_x: Some(placement.scale),
                    scale_y: Some(placement.scale),
                    dpi: Some(POINT_DPI),
                    rotate: None,
                },
            }];
            debug!(position, scale = placement.scale, "Image placed on page");
            pages.push(PdfPage::new(Mm(pt_to_mm(page_w_pt)), Mm(pt_to_mm(page_h_pt)), ops));
        }

        doc.with_pages(pages);
        Ok(save(&doc))
    }
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::a4()
    }
}

/// Where and how large an image lands on a page, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Placement {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

/// Uniform scale `min(pageW/imgW, pageH/imgH)`, centred on the page.
pub(crate) fn fit_to_page(img_w: f32, img_h: f32, page_w: f32, page_h: f32) -> Placement {
    let scale = (page_w / img_w).min(page_h / img_h);
    Placement {
        x: (page_w - img_w * scale) / 2.0,
        y: (page_h - img_h * scale) / 2.0,
        scale,
    }
}

/// RGB8 pixel buffer for `printpdf`.
pub(crate) fn raw_image(image: &DynamicImage) -> RawImage {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    RawImage {
        pixels: RawImageData::U8(rgb.into_raw()),
        width: width as usize,
        height: height as usize,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    }
}

/// Serialise a printpdf document, logging anything it warns about.
pub(crate) fn save(doc: &PdfDocument) -> Vec<u8> {
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
    for warning in &warnings {
        warn!(?warning, "printpdf warning");
    }
    debug!(output_bytes = output.len(), "PDF serialised");
    output
}
