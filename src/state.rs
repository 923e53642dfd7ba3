//! Session state: selected tool, file queue and processing status.
//!
//! Every setter is a plain state transition. The workbench owns the only
//! instance and is the only writer of the processing fields.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tools a session can select
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, schemars::JsonSchema,
)]
pub enum ToolKind {
    #[default]
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "merge")]
    Merge,
    #[serde(rename = "split")]
    Split,
    #[serde(rename = "compress")]
    Compress,
    #[serde(rename = "rotate")]
    Rotate,
    #[serde(rename = "pdf2img")]
    PdfToImages,
    #[serde(rename = "img2pdf")]
    ImagesToPdf,
    #[serde(rename = "organize")]
    Organize,
    #[serde(rename = "watermark")]
    Watermark,
    #[serde(rename = "encrypt")]
    Encrypt,
    #[serde(rename = "decrypt")]
    Decrypt,
    #[serde(rename = "html2pdf")]
    HtmlToPdf,
    #[serde(rename = "deletePages")]
    DeletePages,
}

/// What kind of file a tool consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Pdf,
    Image,
}

impl InputKind {
    /// Accepted file extensions, lowercase, without the dot
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            InputKind::Pdf => &["pdf"],
            InputKind::Image => &["jpg", "jpeg", "png", "webp"],
        }
    }

    /// Whether `name` ends in one of the accepted extensions (case-insensitive)
    pub fn accepts_name(self, name: &str) -> bool {
        std::path::Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions().contains(&ext.as_str())
            })
            .unwrap_or(false)
    }
}

impl ToolKind {
    pub const ALL: [ToolKind; 13] = [
        ToolKind::Idle,
        ToolKind::Merge,
        ToolKind::Split,
        ToolKind::Compress,
        ToolKind::Rotate,
        ToolKind::PdfToImages,
        ToolKind::ImagesToPdf,
        ToolKind::Organize,
        ToolKind::Watermark,
        ToolKind::Encrypt,
        ToolKind::Decrypt,
        ToolKind::HtmlToPdf,
        ToolKind::DeletePages,
    ];

    /// Identifier used on the wire (`"deletePages"`, `"pdf2img"`, ...)
    pub fn id(self) -> &'static str {
        match self {
            ToolKind::Idle => "idle",
            ToolKind::Merge => "merge",
            ToolKind::Split => "split",
            ToolKind::Compress => "compress",
            ToolKind::Rotate => "rotate",
            ToolKind::PdfToImages => "pdf2img",
            ToolKind::ImagesToPdf => "img2pdf",
            ToolKind::Organize => "organize",
            ToolKind::Watermark => "watermark",
            ToolKind::Encrypt => "encrypt",
            ToolKind::Decrypt => "decrypt",
            ToolKind::HtmlToPdf => "html2pdf",
            ToolKind::DeletePages => "deletePages",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.id() == id)
    }

    /// Input kind, or `None` for tools that take no files
    pub fn input_kind(self) -> Option<InputKind> {
        match self {
            ToolKind::Idle | ToolKind::HtmlToPdf => None,
            ToolKind::ImagesToPdf => Some(InputKind::Image),
            _ => Some(InputKind::Pdf),
        }
    }

    /// Tools that work on an ordered list of files rather than one
    pub fn accepts_multiple(self) -> bool {
        matches!(self, ToolKind::Merge | ToolKind::ImagesToPdf)
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// A file held in memory by the session queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub data: Arc<Vec<u8>>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data: Arc::new(data),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Session-wide state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    current_tool: ToolKind,
    files: Vec<SelectedFile>,
    is_processing: bool,
    progress: f32,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_tool(&self) -> ToolKind {
        self.current_tool
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Select a tool. Returning to idle clears the file queue.
    pub fn set_current_tool(&mut self, tool: ToolKind) {
        self.current_tool = tool;
        if tool == ToolKind::Idle {
            self.files.clear();
        }
    }

    pub fn set_files(&mut self, files: Vec<SelectedFile>) {
        self.files = files;
    }

    pub fn add_files(&mut self, files: Vec<SelectedFile>) {
        self.files.extend(files);
    }

    /// Accept dropped files for the current tool.
    ///
    /// Files whose extension the tool does not accept are filtered out.
    /// Multi-file tools append; single-file tools replace the queue with the
    /// first accepted file. Returns the names that were rejected.
    pub fn accept_files(&mut self, files: Vec<SelectedFile>) -> Vec<String> {
        let Some(kind) = self.current_tool.input_kind() else {
            return files.into_iter().map(|f| f.name).collect();
        };

        let (accepted, rejected): (Vec<_>, Vec<_>) =
            files.into_iter().partition(|f| kind.accepts_name(&f.name));

        if self.current_tool.accepts_multiple() {
            self.add_files(accepted);
        } else if let Some(first) = accepted.into_iter().next() {
            self.set_files(vec![first]);
        }

        rejected.into_iter().map(|f| f.name).collect()
    }

    /// Remove the file at `index`, if present
    pub fn remove_file(&mut self, index: usize) -> Option<SelectedFile> {
        (index < self.files.len()).then(|| self.files.remove(index))
    }

    pub fn clear_files(&mut self) {
        self.files.clear();
    }

    pub fn set_is_processing(&mut self, processing: bool) {
        self.is_processing = processing;
    }

    pub fn set_progress(&mut self, progress: f32) {
        self.progress = progress.clamp(0.0, 100.0);
    }

    /// Back to the initial state
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
