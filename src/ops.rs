//! Tool operations
//!
//! An [`Operation`] is one invocation of a tool with its parameters. Running
//! it is synchronous and CPU-bound; callers put it on a blocking worker.

use crate::error::{Error, Result};
use crate::pdf::{
    html_to_pdf, images_to_pdf, parse_page_selection, render_pages_to_png, watermark,
    QpdfWrapper, RenderLimits, Rotation,
};
use crate::state::{SelectedFile, ToolKind};
use crate::task::TaskContext;

pub const PDF_MIME: &str = "application/pdf";
pub const PNG_MIME: &str = "image/png";

/// Settings that shape how operations run, taken from server configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OpSettings {
    /// Reject page selections containing unparseable tokens
    pub strict_page_ranges: bool,
    /// Rasterisation limits for PDF to images and HTML to PDF
    pub render: RenderLimits,
}

/// A tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Merge,
    Split,
    Rotate { rotation: Rotation },
    DeletePages { range: String },
    Watermark { text: String },
    Encrypt { password: String },
    Decrypt { password: String },
    Compress,
    Organize { order: String },
    ImagesToPdf,
    PdfToImages,
    HtmlToPdf { markup: String },
}

/// Raw result of an operation, before naming
#[derive(Debug, Default)]
pub struct OpOutput {
    /// One buffer per output file
    pub parts: Vec<Vec<u8>>,
    /// Page-selection tokens that were skipped
    pub ignored_tokens: Vec<String>,
}

impl Operation {
    pub fn tool(&self) -> ToolKind {
        match self {
            Operation::Merge => ToolKind::Merge,
            Operation::Split => ToolKind::Split,
            Operation::Rotate { .. } => ToolKind::Rotate,
            Operation::DeletePages { .. } => ToolKind::DeletePages,
            Operation::Watermark { .. } => ToolKind::Watermark,
            Operation::Encrypt { .. } => ToolKind::Encrypt,
            Operation::Decrypt { .. } => ToolKind::Decrypt,
            Operation::Compress => ToolKind::Compress,
            Operation::Organize { .. } => ToolKind::Organize,
            Operation::ImagesToPdf => ToolKind::ImagesToPdf,
            Operation::PdfToImages => ToolKind::PdfToImages,
            Operation::HtmlToPdf { .. } => ToolKind::HtmlToPdf,
        }
    }

    /// Word placed in output file names
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Merge => "Merged",
            Operation::Split => "Split",
            Operation::Rotate { .. } => "Rotated",
            Operation::DeletePages { .. } => "Refined",
            Operation::Watermark { .. } => "Marked",
            Operation::Encrypt { .. } => "Secure",
            Operation::Decrypt { .. } => "Unlocked",
            Operation::Compress => "Compressed",
            Operation::Organize { .. } => "Organized",
            Operation::ImagesToPdf => "Vision",
            Operation::PdfToImages => "Pixels",
            Operation::HtmlToPdf { .. } => "Render",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Operation::PdfToImages => "png",
            _ => "pdf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Operation::PdfToImages => PNG_MIME,
            _ => PDF_MIME,
        }
    }

    /// Whether each output part is one page of the input
    pub fn is_paged(&self) -> bool {
        matches!(self, Operation::Split | Operation::PdfToImages)
    }

    /// Reason to skip the operation without running it, if any.
    ///
    /// Missing files or empty text parameters make the operation a no-op.
    pub fn skip_reason(&self, inputs: &[SelectedFile]) -> Option<&'static str> {
        match self {
            Operation::HtmlToPdf { markup } if markup.trim().is_empty() => Some("no markup"),
            Operation::HtmlToPdf { .. } => None,
            _ if inputs.is_empty() => Some("no files selected"),
            Operation::Watermark { text } if text.is_empty() => Some("no watermark text"),
            Operation::DeletePages { range } if range.trim().is_empty() => Some("no page range"),
            Operation::Encrypt { password } | Operation::Decrypt { password }
                if password.is_empty() =>
            {
                Some("no password")
            }
            _ => None,
        }
    }

    /// Run to completion on the current thread.
    ///
    /// Single-file tools use the first input. Progress ends at 100 on success.
    pub fn run(
        &self,
        inputs: &[SelectedFile],
        settings: &OpSettings,
        ctx: &mut TaskContext,
    ) -> Result<OpOutput> {
        let mut output = OpOutput::default();

        match self {
            Operation::Merge => {
                let buffers: Vec<&[u8]> = inputs.iter().map(|f| f.data.as_slice()).collect();
                output.parts.push(QpdfWrapper::merge(&buffers, ctx)?);
            }
            Operation::Split => {
                output.parts = QpdfWrapper::split(first(inputs)?, ctx)?;
            }
            Operation::Rotate { rotation } => {
                output
                    .parts
                    .push(QpdfWrapper::rotate(first(inputs)?, *rotation, ctx)?);
            }
            Operation::DeletePages { range } => {
                let data = first(inputs)?;
                let num_pages = QpdfWrapper::get_page_count(data, None)?;
                let selection = parse_page_selection(range, num_pages);
                check_ignored(range, &selection.ignored, settings)?;

                if num_pages > 0 && selection.distinct_len() >= num_pages as usize {
                    return Err(Error::InvalidPageRange {
                        range: format!("{} would remove every page", range),
                    });
                }

                output.parts.push(QpdfWrapper::remove_pages(
                    data,
                    &selection.removal_order(),
                    ctx,
                )?);
                output.ignored_tokens = selection.ignored;
            }
            Operation::Watermark { text } => {
                output.parts.push(watermark(first(inputs)?, text, ctx)?);
            }
            Operation::Encrypt { password } => {
                output
                    .parts
                    .push(QpdfWrapper::encrypt(first(inputs)?, password, ctx)?);
            }
            Operation::Decrypt { password } => {
                output
                    .parts
                    .push(QpdfWrapper::decrypt(first(inputs)?, password, ctx)?);
            }
            Operation::Compress => {
                output.parts.push(QpdfWrapper::compress(first(inputs)?, ctx)?);
            }
            Operation::Organize { order } => {
                let data = first(inputs)?;
                let num_pages = QpdfWrapper::get_page_count(data, None)?;
                let selection = parse_page_selection(order, num_pages);
                check_ignored(order, &selection.ignored, settings)?;

                if selection.is_empty() {
                    return Err(Error::InvalidPageRange {
                        range: format!("{} selects no pages", order),
                    });
                }

                output.parts.push(QpdfWrapper::reorder_pages(
                    data,
                    &selection.ordered,
                    ctx,
                )?);
                output.ignored_tokens = selection.ignored;
            }
            Operation::ImagesToPdf => {
                let buffers: Vec<&[u8]> = inputs.iter().map(|f| f.data.as_slice()).collect();
                output.parts.push(images_to_pdf(&buffers, ctx)?);
            }
            Operation::PdfToImages => {
                output.parts = render_pages_to_png(first(inputs)?, None, &settings.render, ctx)?
                    .into_iter()
                    .map(|page| page.png)
                    .collect();
            }
            Operation::HtmlToPdf { markup } => {
                output
                    .parts
                    .push(html_to_pdf(markup, &settings.render, ctx)?);
            }
        }

        ctx.progress.finish();
        Ok(output)
    }
}

fn first(inputs: &[SelectedFile]) -> Result<&[u8]> {
    inputs
        .first()
        .map(|f| f.data.as_slice())
        .ok_or_else(|| Error::SourceResolution {
            reason: "No input file".to_string(),
        })
}

fn check_ignored(range: &str, ignored: &[String], settings: &OpSettings) -> Result<()> {
    if ignored.is_empty() {
        return Ok(());
    }
    if settings.strict_page_ranges {
        return Err(Error::InvalidPageRange {
            range: range.to_string(),
        });
    }
    tracing::debug!(?ignored, "ignoring malformed page tokens");
    Ok(())
}
