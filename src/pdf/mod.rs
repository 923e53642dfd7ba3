//! PDF processing layer
//!
//! Structural edits go through qpdf; rasterisation and drawn content go
//! through PDFium.

pub mod markup;
mod page_range;
mod pdfium;
mod qpdf;
mod rotation;

pub use page_range::{parse_page_selection, PageSelection};
pub use pdfium::{
    create_pdfium, html_to_pdf, images_to_pdf, page_sizes, page_texts, render_pages_to_png,
    watermark, RenderLimits, RenderedPage, A4_HEIGHT, A4_WIDTH, DEFAULT_RENDER_SCALE,
};
pub use qpdf::QpdfWrapper;
pub use rotation::{rotate_angle, Rotation};
