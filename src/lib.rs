//! PDF Toolbox MCP Server Library
//!
//! This crate provides MCP tools for working with PDF files:
//! - `merge_pdfs`, `split_pdf`, `organize_pages`, `delete_pages`: page structure
//! - `rotate_pdf`, `watermark_pdf`: page appearance
//! - `encrypt_pdf`, `decrypt_pdf`, `compress_pdf`: document security and size
//! - `images_to_pdf`, `pdf_to_images`, `html_to_pdf`: conversions
//! - `select_tool`, `add_files`, `run_selected_tool`, ...: a per-connection session
//!   with a file queue, a processing flag and progress

pub mod error;
pub mod export;
pub mod ops;
pub mod pdf;
pub mod server;
pub mod source;
pub mod state;
pub mod task;
pub mod workbench;

#[cfg(test)]
#[path = "../tests/common/mod.rs"]
mod testing;

pub use error::{Error, Result};
pub use ops::{OpOutput, OpSettings, Operation};
pub use server::{run_server, run_server_with_config, FileSource, ServerConfig, ToolboxServer};
pub use state::{AppState, InputKind, SelectedFile, ToolKind};
pub use workbench::{RunOutcome, Workbench};
