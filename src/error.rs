//! Error types for the PDF toolbox

use thiserror::Error;

/// Result type alias for the PDF toolbox
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the PDF toolbox
#[derive(Error, Debug)]
pub enum Error {
    /// Input file not found
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is password protected and no password was provided
    #[error("PDF is password protected")]
    PasswordRequired,

    /// Incorrect password provided
    #[error("Incorrect password")]
    IncorrectPassword,

    /// Invalid page range
    #[error("Invalid page range: {range}")]
    InvalidPageRange { range: String },

    /// Page out of bounds
    #[error("Page {page} out of bounds (total: {total})")]
    PageOutOfBounds { page: u32, total: u32 },

    /// Rotation outside the allowed quarter turns
    #[error("Invalid rotation: {degrees} degrees (allowed: 90, 180, 270)")]
    InvalidRotation { degrees: i32 },

    /// File extension not accepted by the selected tool
    #[error("Unsupported file type for {tool}: {name}")]
    UnsupportedFileType { tool: String, name: String },

    /// Cache key not found
    #[error("Cache key not found: {key}")]
    CacheKeyNotFound { key: String },

    /// Source resolution error
    #[error("Failed to resolve source: {reason}")]
    SourceResolution { reason: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// qpdf error
    #[error("qpdf error: {reason}")]
    QpdfError { reason: String },

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Off-screen rendering produced nothing usable
    #[error("Render failed: {reason}")]
    RenderFailed { reason: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// Image dimension exceeded
    #[error("Image dimension exceeded: {detail}")]
    ImageDimensionExceeded { detail: String },

    /// Operation aborted through its cancellation flag
    #[error("Operation cancelled after {completed} of {total} units")]
    Cancelled { completed: usize, total: usize },

    /// Another operation already occupies the execution slot
    #[error("Another operation is already running: {running}")]
    Busy { running: String },

    /// Blocking worker failed to complete
    #[error("Worker task failed: {reason}")]
    Worker { reason: String },
}

impl Error {
    /// Whether the error came from the caller's input rather than processing.
    ///
    /// Used only for log levels; clients always get the generic failure message.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::FileNotFound { .. }
                | Error::InvalidPageRange { .. }
                | Error::InvalidRotation { .. }
                | Error::UnsupportedFileType { .. }
                | Error::CacheKeyNotFound { .. }
                | Error::Base64Decode(_)
                | Error::PathAccessDenied { .. }
                | Error::PasswordRequired
                | Error::IncorrectPassword
        )
    }
}
