//! MCP Server implementation using rmcp

use crate::error::Error;
use crate::export::{name_artifacts, timestamp_millis, write_artifacts, DEFAULT_PACING, DEFAULT_PREFIX};
use crate::ops::{OpSettings, Operation, PDF_MIME};
use crate::pdf::{QpdfWrapper, RenderLimits, Rotation, DEFAULT_RENDER_SCALE};
use crate::source::{resolve_base64, resolve_cache, resolve_path, ArtifactCache, CachedArtifact};
use crate::state::{AppState, InputKind, SelectedFile, ToolKind};
use crate::workbench::{failure_message, RunOutcome, Workbench};
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Input file specification
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum FileSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the file
        path: String,
    },
    /// Base64 encoded file content
    Base64 {
        /// Base64 encoded content
        base64: String,
        /// File name, used for the extension check
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Reference to a previous tool output
    CacheRef {
        /// Cache key from previous operation
        cache_key: String,
    },
}

impl<'de> serde::Deserialize<'de> for FileSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        let Some(obj) = value.as_object() else {
            return Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\", \"base64\", or \"cache_key\", but got {}",
                match &value {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    serde_json::Value::Null => "null",
                    _ => "unknown type",
                }
            )));
        };

        let string_field = |key: &str| -> std::result::Result<Option<String>, D::Error> {
            match obj.get(key) {
                None => Ok(None),
                Some(v) => v.as_str().map(|s| Some(s.to_string())).ok_or_else(|| {
                    serde::de::Error::custom(format!("\"{}\" must be a string", key))
                }),
            }
        };

        if let Some(path) = string_field("path")? {
            return Ok(FileSource::Path { path });
        }
        if let Some(base64) = string_field("base64")? {
            return Ok(FileSource::Base64 {
                base64,
                name: string_field("name")?,
            });
        }
        if let Some(cache_key) = string_field("cache_key")? {
            return Ok(FileSource::CacheRef { cache_key });
        }

        let keys: Vec<&String> = obj.keys().collect();
        Err(serde::de::Error::custom(format!(
            "Invalid source: expected an object with one of \"path\", \"base64\", or \"cache_key\", but got keys: {:?}",
            keys
        )))
    }
}

/// Security and resource configuration for the PDF toolbox server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories inputs and outputs must live in (empty: unrestricted)
    pub resource_dirs: Vec<String>,
    /// Directory outputs are written to when a request names none
    pub output_dir: PathBuf,
    /// First component of every output file name
    pub file_prefix: String,
    /// Pause between consecutive output writes (default: 200ms)
    pub pacing: Duration,
    /// Maximum total bytes in cache (default: 512MB)
    pub cache_max_bytes: usize,
    /// Maximum number of cache entries (default: 100)
    pub cache_max_entries: usize,
    /// Reject page selections with unparseable tokens (default: false)
    pub strict_page_ranges: bool,
    /// Rasterisation scale for PDF to images and HTML to PDF (default: 2.0)
    pub render_scale: f32,
    /// Maximum pixel area of one rendered bitmap (default: 100_000_000)
    pub max_image_pixels: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            output_dir: PathBuf::from("output"),
            file_prefix: DEFAULT_PREFIX.to_string(),
            pacing: DEFAULT_PACING,
            cache_max_bytes: 512 * 1024 * 1024, // 512MB
            cache_max_entries: 100,
            strict_page_ranges: false,
            render_scale: DEFAULT_RENDER_SCALE,
            max_image_pixels: 100_000_000,
        }
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl ServerConfig {
    /// Defaults overlaid with `PDF_TOOLBOX_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dirs) = std::env::var_os("PDF_TOOLBOX_RESOURCE_DIRS") {
            config.resource_dirs = std::env::split_paths(&dirs)
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
        }
        if let Some(dir) = std::env::var_os("PDF_TOOLBOX_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Ok(prefix) = std::env::var("PDF_TOOLBOX_PREFIX") {
            if !prefix.trim().is_empty() {
                config.file_prefix = prefix.trim().to_string();
            }
        }
        if let Some(ms) = env_value::<u64>("PDF_TOOLBOX_PACING_MS") {
            config.pacing = Duration::from_millis(ms);
        }
        if let Some(bytes) = env_value("PDF_TOOLBOX_CACHE_MAX_BYTES") {
            config.cache_max_bytes = bytes;
        }
        if let Some(entries) = env_value("PDF_TOOLBOX_CACHE_MAX_ENTRIES") {
            config.cache_max_entries = entries;
        }
        if let Ok(raw) = std::env::var("PDF_TOOLBOX_STRICT_PAGE_RANGES") {
            match parse_flag(&raw) {
                Some(flag) => config.strict_page_ranges = flag,
                None => tracing::warn!(value = %raw, "ignoring PDF_TOOLBOX_STRICT_PAGE_RANGES"),
            }
        }
        if let Some(scale) = env_value::<f32>("PDF_TOOLBOX_RENDER_SCALE") {
            if scale > 0.0 && scale <= 10.0 {
                config.render_scale = scale;
            } else {
                tracing::warn!(scale, "render scale out of range (0, 10], keeping default");
            }
        }
        if let Some(pixels) = env_value("PDF_TOOLBOX_MAX_IMAGE_PIXELS") {
            config.max_image_pixels = pixels;
        }

        config
    }

    pub fn op_settings(&self) -> OpSettings {
        OpSettings {
            strict_page_ranges: self.strict_page_ranges,
            render: RenderLimits {
                scale: self.render_scale,
                max_pixels: self.max_image_pixels,
            },
        }
    }
}

/// PDF toolbox MCP server
#[derive(Clone)]
pub struct ToolboxServer {
    cache: Arc<ArtifactCache>,
    workbench: Workbench,
    tool_router: ToolRouter<Self>,
    /// Server configuration
    config: Arc<ServerConfig>,
}

// ============================================================================
// Request types for document tools
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MergePdfsParams {
    /// PDF sources, merged in this order
    pub sources: Vec<FileSource>,
    /// Directory to write the output to (default: configured output directory)
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SinglePdfParams {
    /// PDF source
    pub source: FileSource,
    /// Directory to write the output to (default: configured output directory)
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RotatePdfParams {
    /// PDF source
    pub source: FileSource,
    /// Clockwise rotation added to every page: 90, 180 or 270
    pub degrees: i32,
    /// Directory to write the output to (default: configured output directory)
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeletePagesParams {
    /// PDF source
    pub source: FileSource,
    /// Pages to remove, 1-based (e.g., "1, 3, 5-8")
    pub pages: String,
    /// Directory to write the output to (default: configured output directory)
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WatermarkPdfParams {
    /// PDF source
    pub source: FileSource,
    /// Text stamped on every page
    pub text: String,
    /// Directory to write the output to (default: configured output directory)
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PasswordPdfParams {
    /// PDF source
    pub source: FileSource,
    /// Document password
    pub password: String,
    /// Directory to write the output to (default: configured output directory)
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OrganizePagesParams {
    /// PDF source
    pub source: FileSource,
    /// New page order, 1-based; repeats allowed (e.g., "3, 1-2, 3")
    pub order: String,
    /// Directory to write the output to (default: configured output directory)
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ImagesToPdfParams {
    /// JPEG, PNG or WebP sources, one page each, in this order
    pub sources: Vec<FileSource>,
    /// Directory to write the output to (default: configured output directory)
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HtmlToPdfParams {
    /// HTML markup to render
    pub html: String,
    /// Directory to write the output to (default: configured output directory)
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InspectPdfParams {
    /// PDF sources to inspect
    pub sources: Vec<FileSource>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

// ============================================================================
// Request types for session tools
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SelectToolParams {
    /// Tool to select ("idle" clears the file queue)
    pub tool: ToolKind,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddFilesParams {
    /// Files to queue for the selected tool
    pub sources: Vec<FileSource>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RemoveFileParams {
    /// Queue position, 0-based
    pub index: usize,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct RunSelectedToolParams {
    /// Rotation for "rotate" (default: 90)
    #[serde(default)]
    pub degrees: Option<i32>,
    /// Page selection for "deletePages"
    #[serde(default)]
    pub pages: Option<String>,
    /// Page order for "organize"
    #[serde(default)]
    pub order: Option<String>,
    /// Text for "watermark"
    #[serde(default)]
    pub text: Option<String>,
    /// Password for "encrypt" and "decrypt"
    #[serde(default)]
    pub password: Option<String>,
    /// Markup for "html2pdf"
    #[serde(default)]
    pub html: Option<String>,
    /// Directory to write the output to (default: configured output directory)
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListFilesParams {
    /// Directory to search
    pub directory: String,
    /// Search subdirectories recursively (default: false)
    #[serde(default)]
    pub recursive: bool,
    /// Filename pattern to filter (e.g., "report*.pdf"). Supports glob patterns.
    #[serde(default)]
    pub pattern: Option<String>,
    /// File kind to list (default: pdf)
    #[serde(default)]
    pub kind: Option<InputKind>,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize, JsonSchema)]
pub struct OutputFile {
    pub file_name: String,
    pub mime_type: String,
    /// Size in bytes
    pub size: usize,
    /// Key for chaining into another tool; absent if the cache budget is exceeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    /// Where the file was written
    pub path: String,
    /// Page count of PDF outputs that open without a password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct OperationResult {
    /// Tool identifier (e.g., "merge", "deletePages")
    pub operation: String,
    /// "completed", "skipped" or "failed"
    pub status: String,
    pub outputs: Vec<OutputFile>,
    /// Page-selection tokens that were not understood and were skipped
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignored_tokens: Vec<String>,
    /// Why nothing ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationResult {
    fn skipped(tool: ToolKind, reason: &str) -> Self {
        Self {
            operation: tool.to_string(),
            status: "skipped".to_string(),
            outputs: vec![],
            ignored_tokens: vec![],
            reason: Some(reason.to_string()),
            error: None,
        }
    }

    fn failed(tool: ToolKind) -> Self {
        Self {
            operation: tool.to_string(),
            status: "failed".to_string(),
            outputs: vec![],
            ignored_tokens: vec![],
            reason: None,
            error: Some(failure_message(tool)),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct InspectResult {
    pub source: String,
    pub page_count: u32,
    /// Effective rotation of each page, in degrees
    pub rotations: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct QueuedFile {
    pub index: usize,
    pub name: String,
    pub size: usize,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct StateView {
    pub current_tool: ToolKind,
    pub files: Vec<QueuedFile>,
    pub is_processing: bool,
    pub progress: f32,
}

impl From<&AppState> for StateView {
    fn from(state: &AppState) -> Self {
        Self {
            current_tool: state.current_tool(),
            files: state
                .files()
                .iter()
                .enumerate()
                .map(|(index, f)| QueuedFile {
                    index,
                    name: f.name.clone(),
                    size: f.size(),
                })
                .collect(),
            is_processing: state.is_processing(),
            progress: state.progress(),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct AddFilesResult {
    /// Names of files now queued
    pub added: Vec<String>,
    /// Names the selected tool does not accept
    pub rejected: Vec<String>,
    /// Sources that could not be read
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub state: StateView,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct FileInfo {
    /// Full path to the file
    pub path: String,
    /// Filename only
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// Last modified time (ISO 8601 format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ListFilesResult {
    /// Directory that was searched
    pub directory: String,
    pub files: Vec<FileInfo>,
    pub total_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn to_json(value: serde_json::Value) -> String {
    serde_json::to_string_pretty(&value).unwrap_or_default()
}

fn single_result(result: OperationResult) -> String {
    to_json(serde_json::json!({ "results": [result] }))
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl ToolboxServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new server with full configuration
    pub fn with_config(config: ServerConfig) -> Self {
        let cache = ArtifactCache::new(config.cache_max_entries, config.cache_max_bytes);
        Self {
            cache: Arc::new(cache),
            workbench: Workbench::new(config.op_settings()),
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    /// Merge PDFs into one document
    #[tool(
        description = "Merge PDF files into one document, pages in source order.

The output is written to the output directory and cached (cache_key) for chaining with other tools.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\", \"name\": \"file.pdf\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn merge_pdfs(&self, Parameters(params): Parameters<MergePdfsParams>) -> String {
        let result = self
            .run_operation(Operation::Merge, &params.sources, params.output_dir.as_deref())
            .await;
        single_result(result)
    }

    /// Split a PDF into single pages
    #[tool(
        description = "Split a PDF into one single-page PDF per page (<prefix>_Split_<time>_Page_<n>.pdf).

Source format: must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn split_pdf(&self, Parameters(params): Parameters<SinglePdfParams>) -> String {
        let result = self
            .run_operation(
                Operation::Split,
                std::slice::from_ref(&params.source),
                params.output_dir.as_deref(),
            )
            .await;
        single_result(result)
    }

    /// Rotate every page
    #[tool(
        description = "Rotate every page of a PDF clockwise by 90, 180 or 270 degrees, relative to its current rotation.

Source format: must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn rotate_pdf(&self, Parameters(params): Parameters<RotatePdfParams>) -> String {
        let result = match Rotation::new(params.degrees) {
            Ok(rotation) => {
                self.run_operation(
                    Operation::Rotate { rotation },
                    std::slice::from_ref(&params.source),
                    params.output_dir.as_deref(),
                )
                .await
            }
            Err(e) => self.report_failure(ToolKind::Rotate, &e),
        };
        single_result(result)
    }

    /// Delete pages
    #[tool(
        description = "Remove pages from a PDF. Pages are 1-based, comma-separated, with inclusive ranges (e.g., \"1, 3, 5-8\"). Pages past the end are ignored; removing every page is refused.

Source format: must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn delete_pages(&self, Parameters(params): Parameters<DeletePagesParams>) -> String {
        let op = Operation::DeletePages {
            range: params.pages,
        };
        let result = self
            .run_operation(
                op,
                std::slice::from_ref(&params.source),
                params.output_dir.as_deref(),
            )
            .await;
        single_result(result)
    }

    /// Stamp a text watermark
    #[tool(
        description = "Stamp a diagonal, semi-transparent gray text watermark on every page of a PDF.

Source format: must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn watermark_pdf(&self, Parameters(params): Parameters<WatermarkPdfParams>) -> String {
        let op = Operation::Watermark { text: params.text };
        let result = self
            .run_operation(
                op,
                std::slice::from_ref(&params.source),
                params.output_dir.as_deref(),
            )
            .await;
        single_result(result)
    }

    /// Add password protection
    #[tool(
        description = "Encrypt a PDF with 256-bit AES. The password opens the document; permissions allow low-resolution printing and accessibility only.

Source format: must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn encrypt_pdf(&self, Parameters(params): Parameters<PasswordPdfParams>) -> String {
        let op = Operation::Encrypt {
            password: params.password,
        };
        let result = self
            .run_operation(
                op,
                std::slice::from_ref(&params.source),
                params.output_dir.as_deref(),
            )
            .await;
        single_result(result)
    }

    /// Remove password protection
    #[tool(
        description = "Remove password protection from an encrypted PDF. Requires the correct password.

Source format: must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn decrypt_pdf(&self, Parameters(params): Parameters<PasswordPdfParams>) -> String {
        let source = params.source;
        let password = params.password;
        let op = Operation::Decrypt {
            password: password.clone(),
        };
        let result = self
            .run_with_resolver(op, params.output_dir.as_deref(), |server| {
                server.resolve_encrypted(&source, &password)
            })
            .await;
        single_result(result)
    }

    /// Compress a PDF
    #[tool(
        description = "Re-write a PDF with compressed object streams and content streams, dropping unreferenced objects.

Source format: must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn compress_pdf(&self, Parameters(params): Parameters<SinglePdfParams>) -> String {
        let result = self
            .run_operation(
                Operation::Compress,
                std::slice::from_ref(&params.source),
                params.output_dir.as_deref(),
            )
            .await;
        single_result(result)
    }

    /// Reorder pages
    #[tool(
        description = "Build a PDF from the listed pages in the listed order. Same syntax as delete_pages; repeated pages are duplicated.

Source format: must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn organize_pages(&self, Parameters(params): Parameters<OrganizePagesParams>) -> String {
        let op = Operation::Organize {
            order: params.order,
        };
        let result = self
            .run_operation(
                op,
                std::slice::from_ref(&params.source),
                params.output_dir.as_deref(),
            )
            .await;
        single_result(result)
    }

    /// Convert images to a PDF
    #[tool(
        description = "Create a PDF with one A4-wide page per image (JPEG, PNG or WebP), keeping each image's aspect ratio.

Source format: each element must be one of {\"path\": \"/absolute/path.png\"}, {\"base64\": \"...\", \"name\": \"scan.jpg\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn images_to_pdf(&self, Parameters(params): Parameters<ImagesToPdfParams>) -> String {
        let result = self
            .run_operation(
                Operation::ImagesToPdf,
                &params.sources,
                params.output_dir.as_deref(),
            )
            .await;
        single_result(result)
    }

    /// Render pages to PNG
    #[tool(
        description = "Render every page of a PDF to a PNG image at 2x scale (<prefix>_Pixels_<time>_Page_<n>.png).

Source format: must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn pdf_to_images(&self, Parameters(params): Parameters<SinglePdfParams>) -> String {
        let result = self
            .run_operation(
                Operation::PdfToImages,
                std::slice::from_ref(&params.source),
                params.output_dir.as_deref(),
            )
            .await;
        single_result(result)
    }

    /// Render HTML to PDF
    #[tool(
        description = "Lay out HTML markup on an 800-unit wide canvas, rasterise it and paginate the image onto A4 pages. The output contains images of text."
    )]
    async fn html_to_pdf(&self, Parameters(params): Parameters<HtmlToPdfParams>) -> String {
        let op = Operation::HtmlToPdf {
            markup: params.html,
        };
        let result = self
            .run_operation(op, &[], params.output_dir.as_deref())
            .await;
        single_result(result)
    }

    /// Report page count and rotations
    #[tool(
        description = "Report page count and per-page rotation of PDF files without modifying them.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn inspect_pdf(&self, Parameters(params): Parameters<InspectPdfParams>) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_inspect(source, params.password.clone())
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "inspect_pdf failed");
                    InspectResult {
                        source: Self::source_name(source),
                        page_count: 0,
                        rotations: vec![],
                        error: Some(failure_message("inspect")),
                    }
                });
            results.push(result);
        }

        to_json(serde_json::json!({ "results": results }))
    }

    /// Select the session tool
    #[tool(
        description = "Select the session's current tool: merge, split, compress, rotate, pdf2img, img2pdf, organize, watermark, encrypt, decrypt, html2pdf, deletePages, or idle (clears queued files)."
    )]
    async fn select_tool(&self, Parameters(params): Parameters<SelectToolParams>) -> String {
        let view = self.workbench.update(|state| {
            state.set_current_tool(params.tool);
            StateView::from(&*state)
        });
        tracing::info!(tool = %params.tool, "tool selected");
        to_json(serde_json::json!({ "state": view }))
    }

    /// Queue files for the session tool
    #[tool(
        description = "Queue files for the selected tool. Files with extensions the tool does not accept are rejected. merge and img2pdf append; other tools keep only the first accepted file.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\", \"name\": \"file.pdf\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn add_files(&self, Parameters(params): Parameters<AddFilesParams>) -> String {
        let result = self.process_add_files(&params.sources);
        to_json(serde_json::json!({ "results": [result] }))
    }

    /// Remove one queued file
    #[tool(description = "Remove the queued file at a 0-based index.")]
    async fn remove_file(&self, Parameters(params): Parameters<RemoveFileParams>) -> String {
        let (removed, view) = self.workbench.update(|state| {
            let removed = state.remove_file(params.index).map(|f| f.name);
            (removed, StateView::from(&*state))
        });
        to_json(serde_json::json!({ "removed": removed, "state": view }))
    }

    /// Clear the queue
    #[tool(description = "Remove every queued file.")]
    async fn clear_files(&self) -> String {
        let view = self.workbench.update(|state| {
            state.clear_files();
            StateView::from(&*state)
        });
        to_json(serde_json::json!({ "state": view }))
    }

    /// Current session state
    #[tool(description = "Show the selected tool, queued files, processing flag and progress.")]
    async fn get_state(&self) -> String {
        let view = StateView::from(&self.workbench.snapshot());
        to_json(serde_json::json!({ "state": view }))
    }

    /// Run the selected tool on the queue
    #[tool(
        description = "Run the selected tool on the queued files. Parameters: degrees (rotate), pages (deletePages), order (organize), text (watermark), password (encrypt/decrypt), html (html2pdf), output_dir."
    )]
    async fn run_selected_tool(
        &self,
        Parameters(params): Parameters<RunSelectedToolParams>,
    ) -> String {
        single_result(self.process_run_selected(params).await)
    }

    /// Cancel the running operation
    #[tool(description = "Ask the running operation to stop after its current page or file.")]
    async fn cancel_operation(&self) -> String {
        let cancelled = self.workbench.cancel();
        to_json(serde_json::json!({
            "cancelled": cancelled.is_some(),
            "operation": cancelled.map(|t| t.to_string()),
        }))
    }

    /// List candidate input files
    #[tool(
        description = "List PDF (or image, with kind \"image\") files in a directory. Supports recursive search and glob patterns."
    )]
    async fn list_files(&self, Parameters(params): Parameters<ListFilesParams>) -> String {
        let result = self.process_list_files(&params).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "list_files failed");
            ListFilesResult {
                directory: params.directory.clone(),
                files: vec![],
                total_count: 0,
                error: Some(failure_message("list")),
            }
        });

        to_json(serde_json::json!({ "results": [result] }))
    }
}

impl Default for ToolboxServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolboxServer {
    fn source_name(source: &FileSource) -> String {
        match source {
            FileSource::Path { path } => path.clone(),
            FileSource::Base64 { name, .. } => name.clone().unwrap_or_else(|| "<base64>".to_string()),
            FileSource::CacheRef { cache_key } => format!("<cache:{}>", cache_key),
        }
    }

    /// Session state, for embedding and tests
    pub fn workbench(&self) -> &Workbench {
        &self.workbench
    }

    fn report_failure(&self, tool: ToolKind, e: &Error) -> OperationResult {
        if e.is_input_error() {
            tracing::info!(%tool, error = %e, "request rejected");
        } else {
            tracing::warn!(%tool, error = %e, "operation failed");
        }
        OperationResult::failed(tool)
    }

    fn resolve_source(&self, source: &FileSource, kind: InputKind) -> crate::error::Result<SelectedFile> {
        match source {
            FileSource::Path { path } => {
                let path = self.validate_path_access(path)?;
                resolve_path(path, kind)
            }
            FileSource::Base64 { base64, name } => resolve_base64(base64, name.as_deref(), kind),
            FileSource::CacheRef { cache_key } => resolve_cache(cache_key, &self.cache, kind),
        }
    }

    fn resolve_inputs(
        &self,
        tool: ToolKind,
        sources: &[FileSource],
    ) -> crate::error::Result<Vec<SelectedFile>> {
        let Some(kind) = tool.input_kind() else {
            return Ok(Vec::new());
        };
        sources
            .iter()
            .map(|source| self.resolve_source(source, kind))
            .collect()
    }

    /// Resolve a PDF that may be encrypted. The extension and `%PDF` header are
    /// checked like any source; a non-empty password is verified up front.
    fn resolve_encrypted(
        &self,
        source: &FileSource,
        password: &str,
    ) -> crate::error::Result<Vec<SelectedFile>> {
        let file = self.resolve_source(source, InputKind::Pdf)?;
        if password.is_empty() {
            return Ok(vec![file]);
        }
        // Fail early on a wrong password rather than inside the worker
        QpdfWrapper::get_page_count(&file.data, Some(password))?;
        Ok(vec![file])
    }

    /// Resolve `sources`, run `op` in the session slot, then write and cache
    /// the outputs. Failures are reported in the result, never returned.
    pub async fn run_operation(
        &self,
        op: Operation,
        sources: &[FileSource],
        output_dir: Option<&str>,
    ) -> OperationResult {
        let tool = op.tool();
        self.run_with_resolver(op, output_dir, |server| server.resolve_inputs(tool, sources))
            .await
    }

    async fn run_with_resolver<F>(
        &self,
        op: Operation,
        output_dir: Option<&str>,
        resolve: F,
    ) -> OperationResult
    where
        F: FnOnce(&Self) -> crate::error::Result<Vec<SelectedFile>>,
    {
        let tool = op.tool();
        let result = match resolve(self) {
            Ok(inputs) => self.process_operation(&op, inputs, output_dir).await,
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| self.report_failure(tool, &e))
    }

    async fn process_operation(
        &self,
        op: &Operation,
        inputs: Vec<SelectedFile>,
        output_dir: Option<&str>,
    ) -> crate::error::Result<OperationResult> {
        let tool = op.tool();
        let dir = self.validate_output_dir(output_dir)?;

        let output = match self.workbench.execute(op, inputs).await? {
            RunOutcome::Skipped { reason } => return Ok(OperationResult::skipped(tool, reason)),
            RunOutcome::Completed(output) => output,
        };

        let artifacts = name_artifacts(op, output.parts, &self.config.file_prefix, timestamp_millis());
        let paths = write_artifacts(&dir, &artifacts, self.config.pacing).await?;

        let outputs = artifacts
            .into_iter()
            .zip(paths)
            .map(|(artifact, path)| {
                let page_count = (artifact.mime_type == PDF_MIME)
                    .then(|| QpdfWrapper::get_page_count(&artifact.data, None).ok())
                    .flatten();
                let size = artifact.data.len();
                let file_name = artifact.file_name.clone();
                let mime_type = artifact.mime_type.clone();
                let cache_key = self.cache.insert(CachedArtifact {
                    file_name: artifact.file_name,
                    mime_type: artifact.mime_type,
                    data: artifact.data,
                });

                OutputFile {
                    file_name,
                    mime_type,
                    size,
                    cache_key,
                    path: path.to_string_lossy().into_owned(),
                    page_count,
                }
            })
            .collect();

        Ok(OperationResult {
            operation: tool.to_string(),
            status: "completed".to_string(),
            outputs,
            ignored_tokens: output.ignored_tokens,
            reason: None,
            error: None,
        })
    }

    async fn process_run_selected(&self, params: RunSelectedToolParams) -> OperationResult {
        let tool = self.workbench.snapshot().current_tool();
        let output_dir = params.output_dir.clone();

        let op = match Self::build_operation(tool, params) {
            Ok(Some(op)) => op,
            Ok(None) => return OperationResult::skipped(tool, "no tool selected"),
            Err(e) => return self.report_failure(tool, &e),
        };

        let inputs = self.workbench.queued_files();
        self.process_operation(&op, inputs, output_dir.as_deref())
            .await
            .unwrap_or_else(|e| self.report_failure(tool, &e))
    }

    /// Operation for the session tool, or `None` when idle
    fn build_operation(
        tool: ToolKind,
        params: RunSelectedToolParams,
    ) -> crate::error::Result<Option<Operation>> {
        let op = match tool {
            ToolKind::Idle => return Ok(None),
            ToolKind::Merge => Operation::Merge,
            ToolKind::Split => Operation::Split,
            ToolKind::Compress => Operation::Compress,
            ToolKind::Rotate => Operation::Rotate {
                rotation: Rotation::new(params.degrees.unwrap_or(90))?,
            },
            ToolKind::PdfToImages => Operation::PdfToImages,
            ToolKind::ImagesToPdf => Operation::ImagesToPdf,
            ToolKind::Organize => Operation::Organize {
                order: params.order.unwrap_or_default(),
            },
            ToolKind::Watermark => Operation::Watermark {
                text: params.text.unwrap_or_default(),
            },
            ToolKind::Encrypt => Operation::Encrypt {
                password: params.password.unwrap_or_default(),
            },
            ToolKind::Decrypt => Operation::Decrypt {
                password: params.password.unwrap_or_default(),
            },
            ToolKind::HtmlToPdf => Operation::HtmlToPdf {
                markup: params.html.unwrap_or_default(),
            },
            ToolKind::DeletePages => Operation::DeletePages {
                range: params.pages.unwrap_or_default(),
            },
        };
        Ok(Some(op))
    }

    fn process_add_files(&self, sources: &[FileSource]) -> AddFilesResult {
        let tool = self.workbench.snapshot().current_tool();
        let mut files = Vec::new();
        let mut rejected = Vec::new();
        let mut errors = Vec::new();

        match tool.input_kind() {
            None => rejected.extend(sources.iter().map(Self::source_name)),
            Some(kind) => {
                for source in sources {
                    match self.resolve_source(source, kind) {
                        Ok(file) => files.push(file),
                        Err(Error::UnsupportedFileType { .. }) => {
                            rejected.push(Self::source_name(source));
                        }
                        Err(e) => {
                            tracing::info!(error = %e, source = %Self::source_name(source), "file not queued");
                            errors.push(format!("Could not read {}", Self::source_name(source)));
                        }
                    }
                }
            }
        }

        let (added, state) = self.workbench.update(|state| {
            rejected.extend(state.accept_files(files));
            let added = state.files().iter().map(|f| f.name.clone()).collect();
            (added, StateView::from(&*state))
        });

        AddFilesResult {
            added,
            rejected,
            errors,
            state,
        }
    }

    async fn process_inspect(
        &self,
        source: &FileSource,
        password: Option<String>,
    ) -> crate::error::Result<InspectResult> {
        let file = self.resolve_source(source, InputKind::Pdf)?;

        let (page_count, rotations) = tokio::task::spawn_blocking(move || {
            let page_count = QpdfWrapper::get_page_count(&file.data, password.as_deref())?;
            let rotations = QpdfWrapper::page_rotations(&file.data, password.as_deref())?;
            Ok::<_, Error>((page_count, rotations))
        })
        .await
        .map_err(|e| Error::Worker {
            reason: format!("Task join error: {}", e),
        })??;

        Ok(InspectResult {
            source: Self::source_name(source),
            page_count,
            rotations,
            error: None,
        })
    }

    fn is_within_resource_dirs(&self, canonical: &Path) -> bool {
        self.config.resource_dirs.iter().any(|dir| {
            std::fs::canonicalize(dir)
                .map(|cd| canonical.starts_with(&cd))
                .unwrap_or(false)
        })
    }

    /// Validate that a path is within allowed resource directories.
    /// If no resource_dirs are configured, all paths are allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let canonical = std::fs::canonicalize(path).map_err(|_| Error::PathAccessDenied {
            path: path.to_string(),
        })?;

        if self.is_within_resource_dirs(&canonical) {
            Ok(canonical)
        } else {
            Err(Error::PathAccessDenied {
                path: path.to_string(),
            })
        }
    }

    /// Resolve the output directory and check it against the sandbox.
    ///
    /// The directory may not exist yet; its deepest existing ancestor is
    /// canonicalized and the remaining components must not climb out.
    fn validate_output_dir(&self, requested: Option<&str>) -> crate::error::Result<PathBuf> {
        let dir = requested
            .map(PathBuf::from)
            .unwrap_or_else(|| self.config.output_dir.clone());

        if self.config.resource_dirs.is_empty() {
            return Ok(dir);
        }

        let denied = || Error::PathAccessDenied {
            path: dir.display().to_string(),
        };

        let mut existing = dir.as_path();
        let mut rest = Vec::new();
        while !existing.exists() {
            rest.push(existing.file_name().ok_or_else(denied)?);
            existing = existing.parent().ok_or_else(denied)?;
            if existing.as_os_str().is_empty() {
                existing = Path::new(".");
            }
        }

        let mut target = std::fs::canonicalize(existing).map_err(|_| denied())?;
        for component in rest.into_iter().rev() {
            if Path::new(component)
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
            {
                return Err(denied());
            }
            target.push(component);
        }

        if self.is_within_resource_dirs(&target) {
            Ok(target)
        } else {
            Err(denied())
        }
    }

    fn process_list_files(&self, params: &ListFilesParams) -> crate::error::Result<ListFilesResult> {
        let dir_path = self.validate_path_access(&params.directory)?;

        if !dir_path.exists() {
            return Err(Error::FileNotFound {
                path: params.directory.clone(),
            });
        }

        if !dir_path.is_dir() {
            return Err(Error::SourceResolution {
                reason: format!("{} is not a directory", params.directory),
            });
        }

        let kind = params.kind.unwrap_or(InputKind::Pdf);
        let pattern = params
            .pattern
            .as_ref()
            .and_then(|p| glob::Pattern::new(p).ok());

        let mut files = Vec::new();
        Self::collect_files(&dir_path, params.recursive, kind, &pattern, &mut files)?;

        // Sort by path for consistent ordering
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let total_count = files.len() as u32;

        Ok(ListFilesResult {
            directory: params.directory.clone(),
            files,
            total_count,
            error: None,
        })
    }

    fn collect_files(
        dir: &Path,
        recursive: bool,
        kind: InputKind,
        pattern: &Option<glob::Pattern>,
        files: &mut Vec<FileInfo>,
    ) -> crate::error::Result<()> {
        for entry in std::fs::read_dir(dir)?.flatten() {
            let path = entry.path();

            if path.is_dir() {
                if recursive {
                    let _ = Self::collect_files(&path, recursive, kind, pattern, files);
                }
                continue;
            }

            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            if !path.is_file() || !kind.accepts_name(&name) {
                continue;
            }
            if let Some(ref pat) = pattern {
                if !pat.matches(&name) {
                    continue;
                }
            }

            let metadata = std::fs::metadata(&path).ok();
            let size = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
            let modified = metadata
                .as_ref()
                .and_then(|m| m.modified().ok())
                .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339());

            files.push(FileInfo {
                path: path.to_string_lossy().to_string(),
                name,
                size,
                modified,
            });
        }

        Ok(())
    }
}

#[tool_handler]
impl ServerHandler for ToolboxServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "PDF toolbox: merge, split, rotate, delete pages, organize, watermark, encrypt, \
                 decrypt, compress, images to PDF, PDF to images and HTML to PDF. Every output is \
                 written to the output directory and cached for chaining via cache_key. Session \
                 tools (select_tool, add_files, run_selected_tool) keep a file queue per connection."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with default configuration
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    tracing::info!(
        output_dir = %config.output_dir.display(),
        resource_dirs = ?config.resource_dirs,
        "PDF toolbox ready, waiting for connections..."
    );

    let server = ToolboxServer::with_config(config);
    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{blank_pdf, tagged_pdf};
    use base64::Engine;
    use pretty_assertions::assert_eq;

    fn server_in(dir: &Path) -> ToolboxServer {
        ToolboxServer::with_config(ServerConfig {
            output_dir: dir.to_path_buf(),
            pacing: Duration::ZERO,
            ..ServerConfig::default()
        })
    }

    fn write_pdf(dir: &Path, name: &str, data: &[u8]) -> FileSource {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        FileSource::Path {
            path: path.to_string_lossy().to_string(),
        }
    }

    #[test]
    fn test_source_name() {
        assert_eq!(
            ToolboxServer::source_name(&FileSource::Path {
                path: "/test.pdf".to_string()
            }),
            "/test.pdf"
        );
        assert_eq!(
            ToolboxServer::source_name(&FileSource::Base64 {
                base64: "...".to_string(),
                name: None,
            }),
            "<base64>"
        );
        assert_eq!(
            ToolboxServer::source_name(&FileSource::CacheRef {
                cache_key: "abc".to_string()
            }),
            "<cache:abc>"
        );
    }

    #[test]
    fn test_file_source_deserialize() {
        let source: FileSource = serde_json::from_str(r#"{"path": "/a.pdf"}"#).unwrap();
        assert!(matches!(source, FileSource::Path { .. }));

        let source: FileSource =
            serde_json::from_str(r#"{"base64": "AAAA", "name": "scan.png"}"#).unwrap();
        assert!(matches!(
            source,
            FileSource::Base64 { name: Some(ref n), .. } if n == "scan.png"
        ));

        let err = serde_json::from_str::<FileSource>(r#"{"url": "https://x"}"#).unwrap_err();
        assert!(err.to_string().contains("cache_key"));

        let err = serde_json::from_str::<FileSource>(r#"{"path": 3}"#).unwrap_err();
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_op_settings_from_config() {
        let config = ServerConfig {
            strict_page_ranges: true,
            render_scale: 1.5,
            ..ServerConfig::default()
        };
        let settings = config.op_settings();
        assert!(settings.strict_page_ranges);
        assert_eq!(settings.render.scale, 1.5);
    }

    #[tokio::test]
    async fn test_merge_writes_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_in(dir.path());
        let sources = vec![
            write_pdf(dir.path(), "a.pdf", &blank_pdf(1)),
            write_pdf(dir.path(), "b.pdf", &blank_pdf(2)),
        ];

        let result = server.run_operation(Operation::Merge, &sources, None).await;

        assert_eq!(result.status, "completed");
        assert_eq!(result.outputs.len(), 1);
        let output = &result.outputs[0];
        assert!(output.file_name.starts_with("v0pdftools_Merged_"));
        assert_eq!(output.page_count, Some(3));
        assert!(Path::new(&output.path).exists());
        assert!(server.cache.contains(output.cache_key.as_deref().unwrap()));
    }

    #[tokio::test]
    async fn test_cache_key_chains_into_next_tool() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_in(dir.path());
        let sources = vec![write_pdf(dir.path(), "a.pdf", &tagged_pdf(3))];

        let merged = server.run_operation(Operation::Merge, &sources, None).await;
        let key = merged.outputs[0].cache_key.clone().unwrap();

        let split = server
            .run_operation(Operation::Split, &[FileSource::CacheRef { cache_key: key }], None)
            .await;
        assert_eq!(split.status, "completed");
        assert_eq!(split.outputs.len(), 3);
        assert!(split.outputs[2].file_name.ends_with("_Page_3.pdf"));
    }

    #[tokio::test]
    async fn test_failure_uses_generic_message() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_in(dir.path());
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"%PDF-truncated");

        let result = server
            .run_operation(
                Operation::Split,
                &[FileSource::Base64 {
                    base64: encoded,
                    name: None,
                }],
                None,
            )
            .await;

        assert_eq!(result.status, "failed");
        assert_eq!(
            result.error.as_deref(),
            Some("Intelligence failure during split operation")
        );
        assert!(result.outputs.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_sources_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_in(dir.path());

        let result = server.run_operation(Operation::Merge, &[], None).await;

        assert_eq!(result.status, "skipped");
        assert_eq!(result.reason.as_deref(), Some("no files selected"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_session_flow() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_in(dir.path());

        server
            .workbench()
            .update(|s| s.set_current_tool(ToolKind::Merge));
        let added = server.process_add_files(&[
            write_pdf(dir.path(), "a.pdf", &blank_pdf(1)),
            write_pdf(dir.path(), "notes.txt", b"hello"),
            write_pdf(dir.path(), "b.pdf", &blank_pdf(2)),
        ]);
        assert_eq!(added.added, vec!["a.pdf", "b.pdf"]);
        assert_eq!(added.rejected.len(), 1);

        let result = server
            .process_run_selected(RunSelectedToolParams::default())
            .await;
        assert_eq!(result.status, "completed");
        assert_eq!(result.outputs[0].page_count, Some(3));

        let state = server.workbench().snapshot();
        assert!(!state.is_processing());
        assert_eq!(state.progress(), 0.0);
    }

    #[tokio::test]
    async fn test_run_selected_idle_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_in(dir.path());
        let result = server
            .process_run_selected(RunSelectedToolParams::default())
            .await;
        assert_eq!(result.status, "skipped");
    }

    #[test]
    fn test_build_operation_rotation_validated() {
        let params = RunSelectedToolParams {
            degrees: Some(45),
            ..RunSelectedToolParams::default()
        };
        assert!(matches!(
            ToolboxServer::build_operation(ToolKind::Rotate, params),
            Err(Error::InvalidRotation { degrees: 45 })
        ));
        assert!(matches!(
            ToolboxServer::build_operation(ToolKind::Rotate, RunSelectedToolParams::default()),
            Ok(Some(Operation::Rotate { .. }))
        ));
    }

    #[test]
    fn test_output_dir_sandbox() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let server = ToolboxServer::with_config(ServerConfig {
            resource_dirs: vec![root.path().to_string_lossy().to_string()],
            output_dir: root.path().join("out"),
            ..ServerConfig::default()
        });

        let default_dir = server.validate_output_dir(None).unwrap();
        assert!(default_dir.ends_with("out"));

        let nested = root.path().join("a/b");
        assert!(server
            .validate_output_dir(Some(&nested.to_string_lossy()))
            .is_ok());

        assert!(matches!(
            server.validate_output_dir(Some(&outside.path().to_string_lossy())),
            Err(Error::PathAccessDenied { .. })
        ));
    }

    #[test]
    fn test_list_files_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_in(dir.path());
        std::fs::write(dir.path().join("a.pdf"), blank_pdf(1)).unwrap();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();

        let params = ListFilesParams {
            directory: dir.path().to_string_lossy().to_string(),
            recursive: false,
            pattern: None,
            kind: Some(InputKind::Image),
        };
        let result = server.process_list_files(&params).unwrap();
        assert_eq!(result.total_count, 1);
        assert_eq!(result.files[0].name, "b.png");
    }
}
