//! PDFium-backed operations: rasterisation and content authoring
//!
//! PDFium is not thread-safe, so every public function binds a fresh
//! instance and drops it before returning.

use crate::error::{Error, Result};
use crate::pdf::markup::{self, MarkupLayout};
use crate::task::TaskContext;
use pdfium_render::prelude::*;

/// Default rasterisation scale for page snapshots
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// A4 width in points
pub const A4_WIDTH: f32 = 595.28;

/// A4 height in points
pub const A4_HEIGHT: f32 = 841.89;

/// Watermark font size in points
const WATERMARK_FONT_SIZE: f32 = 50.0;

/// Watermark colour: mid gray at 30% opacity
fn watermark_color() -> PdfColor {
    PdfColor::new(128, 128, 128, 77)
}

/// Counter-clockwise tilt of the watermark text
const WATERMARK_ANGLE: f32 = 45.0;

/// Rasterisation limits for a single page or snapshot
#[derive(Debug, Clone, Copy)]
pub struct RenderLimits {
    /// Scale factor applied to page points
    pub scale: f32,
    /// Maximum width x height of one bitmap
    pub max_pixels: u64,
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self {
            scale: DEFAULT_RENDER_SCALE,
            max_pixels: 100_000_000,
        }
    }
}

impl RenderLimits {
    fn check(&self, width_pts: f32, height_pts: f32) -> Result<()> {
        let w = (width_pts * self.scale).ceil() as u64;
        let h = (height_pts * self.scale).ceil() as u64;
        let area = w.saturating_mul(h);
        if area > self.max_pixels {
            return Err(Error::ImageDimensionExceeded {
                detail: format!(
                    "{}x{} = {} pixels exceeds limit of {}",
                    w, h, area, self.max_pixels
                ),
            });
        }
        Ok(())
    }
}

/// One rasterised page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Page number (1-indexed)
    pub page: u32,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// PNG bytes
    pub png: Vec<u8>,
}

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
pub fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

fn map_pdfium_error(err: PdfiumError) -> Error {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            Error::PasswordRequired
        }
        _ => Error::Pdfium {
            reason: format!("{}", err),
        },
    }
}

fn load_document<'a>(
    pdfium: &'a Pdfium,
    data: &'a [u8],
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }

    pdfium
        .load_pdf_from_byte_slice(data, password)
        .map_err(map_pdfium_error)
}

fn encode_png(image: &image::DynamicImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    image.write_to(
        &mut std::io::Cursor::new(&mut png_bytes),
        image::ImageFormat::Png,
    )?;
    Ok(png_bytes)
}

fn render_page(page: &PdfPage, limits: &RenderLimits) -> Result<image::DynamicImage> {
    limits.check(page.width().value, page.height().value)?;

    let config = PdfRenderConfig::new()
        .scale_page_by_factor(limits.scale)
        .render_form_data(true)
        .render_annotations(true);

    let bitmap = page.render_with_config(&config).map_err(map_pdfium_error)?;
    Ok(bitmap.as_image())
}

/// Render every page to PNG, in page order.
pub fn render_pages_to_png(
    data: &[u8],
    password: Option<&str>,
    limits: &RenderLimits,
    ctx: &mut TaskContext,
) -> Result<Vec<RenderedPage>> {
    let pdfium = create_pdfium()?;
    let document = load_document(&pdfium, data, password)?;

    let pages = document.pages();
    let total = pages.len() as usize;
    let mut rendered = Vec::with_capacity(total);

    for (idx, page) in pages.iter().enumerate() {
        ctx.checkpoint(idx, total)?;

        let image = render_page(&page, limits).map_err(|e| match e {
            Error::Pdfium { reason } => Error::Pdfium {
                reason: format!("Failed to render page {}: {}", idx + 1, reason),
            },
            other => other,
        })?;

        rendered.push(RenderedPage {
            page: idx as u32 + 1,
            width: image.width(),
            height: image.height(),
            png: encode_png(&image)?,
        });

        ctx.unit_done(idx + 1, total);
    }

    Ok(rendered)
}

/// Stamp `text` diagonally across every page.
///
/// The text sits at a quarter of the page width and half its height, in
/// 50pt Helvetica-Bold, 30% gray, tilted 45 degrees.
pub fn watermark(data: &[u8], text: &str, ctx: &mut TaskContext) -> Result<Vec<u8>> {
    let pdfium = create_pdfium()?;
    let mut document = load_document(&pdfium, data, None)?;
    let font = document.fonts_mut().helvetica_bold();

    let total = document.pages().len() as usize;

    for idx in 0..total {
        ctx.checkpoint(idx, total)?;

        let mut page = document
            .pages()
            .get(idx as u16)
            .map_err(map_pdfium_error)?;
        let x = page.width().value / 4.0;
        let y = page.height().value / 2.0;

        let mut stamp = PdfPageTextObject::new(
            &document,
            text,
            font,
            PdfPoints::new(WATERMARK_FONT_SIZE),
        )
        .map_err(map_pdfium_error)?;
        stamp
            .set_fill_color(watermark_color())
            .map_err(map_pdfium_error)?;
        stamp
            .rotate_counter_clockwise_degrees(WATERMARK_ANGLE)
            .map_err(map_pdfium_error)?;
        stamp
            .translate(PdfPoints::new(x), PdfPoints::new(y))
            .map_err(map_pdfium_error)?;

        page.objects_mut()
            .add_text_object(stamp)
            .map_err(map_pdfium_error)?;

        ctx.unit_done(idx + 1, total);
    }

    document.save_to_bytes().map_err(map_pdfium_error)
}

/// Height in points of an A4-wide page showing a `width` x `height` image
fn image_page_height(width: u32, height: u32) -> f32 {
    A4_WIDTH * height as f32 / width as f32
}

/// One A4-wide page per image, height following the image's aspect ratio.
pub fn images_to_pdf(images: &[&[u8]], ctx: &mut TaskContext) -> Result<Vec<u8>> {
    let pdfium = create_pdfium()?;
    let mut document = pdfium.create_new_pdf().map_err(map_pdfium_error)?;
    let total = images.len();

    for (idx, bytes) in images.iter().enumerate() {
        ctx.checkpoint(idx, total)?;

        let image = image::load_from_memory(bytes)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::RenderFailed {
                reason: format!("Image {} has no pixels", idx + 1),
            });
        }

        let width = PdfPoints::new(A4_WIDTH);
        let height = PdfPoints::new(image_page_height(image.width(), image.height()));

        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(width, height))
            .map_err(map_pdfium_error)?;
        page.objects_mut()
            .create_image_object(
                PdfPoints::new(0.0),
                PdfPoints::new(0.0),
                &image,
                Some(width),
                Some(height),
            )
            .map_err(map_pdfium_error)?;

        ctx.unit_done(idx + 1, total);
    }

    document.save_to_bytes().map_err(map_pdfium_error)
}

/// Draw the laid-out markup on one tall page and rasterise it.
fn snapshot_markup(
    pdfium: &Pdfium,
    layout: &MarkupLayout,
    limits: &RenderLimits,
) -> Result<image::DynamicImage> {
    let mut canvas = pdfium.create_new_pdf().map_err(map_pdfium_error)?;
    let font = canvas.fonts_mut().helvetica();

    let mut page = canvas
        .pages_mut()
        .create_page_at_end(PdfPagePaperSize::Custom(
            PdfPoints::new(layout.width),
            PdfPoints::new(layout.height),
        ))
        .map_err(map_pdfium_error)?;

    for (idx, line) in layout.lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        page.objects_mut()
            .create_text_object(
                PdfPoints::new(markup::CANVAS_PADDING),
                PdfPoints::new(layout.baseline(idx)),
                line,
                font,
                PdfPoints::new(markup::FONT_SIZE),
            )
            .map_err(map_pdfium_error)?;
    }

    render_page(&page, limits)
}

/// A horizontal band of a snapshot, placed at the top of one A4 page
#[derive(Debug, Clone, Copy, PartialEq)]
struct PageSlice {
    /// First pixel row
    top: u32,
    rows: u32,
    /// Drawn height in points
    height: f32,
}

/// Cut a `width_px` x `height_px` snapshot, scaled to A4 width, into
/// consecutive A4-high bands. The last band may be shorter.
fn page_slices(width_px: u32, height_px: u32) -> Vec<PageSlice> {
    if width_px == 0 {
        return Vec::new();
    }

    // Snapshot pixels per A4 page, at the width-fitted scale
    let px_per_point = width_px as f32 / A4_WIDTH;
    let slice_px = ((A4_HEIGHT * px_per_point).floor() as u32).max(1);

    let mut slices = Vec::new();
    let mut top = 0u32;
    while top < height_px {
        let rows = slice_px.min(height_px - top);
        slices.push(PageSlice {
            top,
            rows,
            height: rows as f32 / px_per_point,
        });
        top += rows;
    }
    slices
}

/// Render markup to a paginated A4 PDF of page images.
///
/// Progress: 30 after layout, 70 after the snapshot, 100 when the last
/// slice is placed.
pub fn html_to_pdf(markup: &str, limits: &RenderLimits, ctx: &mut TaskContext) -> Result<Vec<u8>> {
    let layout = markup::layout_markup(markup);
    ctx.progress.set(30.0);
    ctx.checkpoint(1, 3)?;

    let pdfium = create_pdfium()?;
    let snapshot = snapshot_markup(&pdfium, &layout, limits)?;
    if snapshot.width() == 0 || snapshot.height() == 0 {
        return Err(Error::RenderFailed {
            reason: "Snapshot has zero dimensions".to_string(),
        });
    }
    ctx.progress.set(70.0);
    ctx.checkpoint(2, 3)?;

    let mut document = pdfium.create_new_pdf().map_err(map_pdfium_error)?;

    for band in page_slices(snapshot.width(), snapshot.height()) {
        let slice = snapshot.crop_imm(0, band.top, snapshot.width(), band.rows);
        let slice_height = band.height;

        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .map_err(map_pdfium_error)?;
        page.objects_mut()
            .create_image_object(
                PdfPoints::new(0.0),
                PdfPoints::new(A4_HEIGHT - slice_height),
                &slice,
                Some(PdfPoints::new(A4_WIDTH)),
                Some(PdfPoints::new(slice_height)),
            )
            .map_err(map_pdfium_error)?;
    }

    tracing::debug!(
        lines = layout.lines.len(),
        pages = document.pages().len(),
        "markup rendered"
    );

    document.save_to_bytes().map_err(map_pdfium_error)
}

/// Extracted text of every page, in page order
pub fn page_texts(data: &[u8], password: Option<&str>) -> Result<Vec<String>> {
    let pdfium = create_pdfium()?;
    let document = load_document(&pdfium, data, password)?;

    let mut texts = Vec::new();
    for page in document.pages().iter() {
        let text = page.text().map_err(map_pdfium_error)?;
        texts.push(text.all());
    }
    Ok(texts)
}

/// Page sizes in points, in page order
pub fn page_sizes(data: &[u8], password: Option<&str>) -> Result<Vec<(f32, f32)>> {
    let pdfium = create_pdfium()?;
    let document = load_document(&pdfium, data, password)?;

    Ok(document
        .pages()
        .iter()
        .map(|page| (page.width().value, page.height().value))
        .collect())
}
