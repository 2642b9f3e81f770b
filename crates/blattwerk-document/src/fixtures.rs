// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Generated test documents and images.
//
// Built in memory so tests never depend on checked-in binaries. Each
// numbered page draws "Page N" and inherits its /MediaBox and /Resources
// from the page-tree root, which exercises attribute inheritance on copy.

use std::io::Cursor;

use blattwerk_core::error::{BlattwerkError, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::{Document, Object, Stream, dictionary};

use crate::pdf::document::Pdf;

/// A4 portrait, in points.
pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;

/// Serialised PDF with `pages` pages labelled "Page 1" through "Page N".
pub fn numbered_pdf(pages: usize) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::with_capacity(pages);
    for number in 1..=pages {
        let text = format!("BT /F1 24 Tf 72 720 Td (Page {number}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, text.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(PAGE_WIDTH),
                Object::Real(PAGE_HEIGHT),
            ],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|err| BlattwerkError::PdfError(format!("fixture serialisation failed: {err}")))?;
    Ok(bytes)
}

/// The "Page N" label drawn on page `index`, if the page carries one.
pub fn page_label(pdf: &Pdf, index: usize) -> Option<String> {
    let content = pdf.page_content(index).ok()?;
    let text = String::from_utf8_lossy(&content);
    let start = text.find("(Page ")? + 1;
    let end = start + text[start..].find(')')?;
    Some(text[start..end].to_string())
}

/// A `width`×`height` RGB image: white with a dark band across the middle
/// third, so recognisers and encoders see non-uniform content.
pub fn sample_image(width: u32, height: u32) -> DynamicImage {
    let band = height / 3..height.saturating_mul(2) / 3;
    let pixels = RgbImage::from_fn(width, height, |_, y| {
        if band.contains(&y) { Rgb([32, 32, 32]) } else { Rgb([255, 255, 255]) }
    });
    DynamicImage::ImageRgb8(pixels)
}

/// Encode an image as PNG.
pub fn png_bytes(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(|err| BlattwerkError::ImageError(format!("fixture PNG encoding failed: {err}")))?;
    Ok(bytes.into_inner())
}

/// Encode an image as JPEG.
pub fn jpeg_bytes(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_to(&mut bytes, ImageFormat::Jpeg)
        .map_err(|err| BlattwerkError::ImageError(format!("fixture JPEG encoding failed: {err}")))?;
    Ok(bytes.into_inner())
}
