//! qpdf FFI wrapper for structural PDF operations
//!
//! Page copying, removal, rotation, encryption and re-serialisation go
//! through the qpdf crate (vendored FFI). Every operation loads its input,
//! mutates a fresh or loaded document and writes a complete new file.

use crate::error::{Error, Result};
use crate::pdf::rotation::Rotation;
use crate::task::TaskContext;
use qpdf::{
    EncryptionParams, EncryptionParamsR6, ObjectStreamMode, PrintPermission, QPdf,
    QPdfDictionary, QPdfScalar,
};

/// Wrapper for qpdf operations via FFI
pub struct QpdfWrapper;

/// Guard against malformed page trees with cyclic /Parent links
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// Helper: open a QPdf from memory, optionally with password
fn open_qpdf(data: &[u8], password: Option<&str>) -> Result<QPdf> {
    match password {
        Some(pwd) => QPdf::read_from_memory_encrypted(data, pwd).map_err(map_qpdf_error),
        None => QPdf::read_from_memory(data).map_err(map_qpdf_error),
    }
}

/// Map qpdf crate errors to our error types
fn map_qpdf_error(e: qpdf::QPdfError) -> Error {
    match e.error_code() {
        qpdf::QPdfErrorCode::InvalidPassword => Error::IncorrectPassword,
        _ => Error::QpdfError {
            reason: e.to_string(),
        },
    }
}

/// Serialise without carrying over any input encryption
fn write_unencrypted(qpdf: &QPdf) -> Result<Vec<u8>> {
    let mut writer = qpdf.writer();
    writer.preserve_encryption(false);
    writer.write_to_memory().map_err(map_qpdf_error)
}

/// Effective /Rotate of a page, following /Parent for inherited values.
fn effective_rotation(page: &QPdfDictionary) -> i64 {
    if let Some(rotate) = page.get("/Rotate") {
        return QPdfScalar::from(rotate).as_i64();
    }

    let mut parent = page.get("/Parent");
    let mut depth = 0;
    while let Some(node) = parent {
        if depth >= MAX_PAGE_TREE_DEPTH {
            break;
        }
        let node = QPdfDictionary::from(node);
        if let Some(rotate) = node.get("/Rotate") {
            return QPdfScalar::from(rotate).as_i64();
        }
        parent = node.get("/Parent");
        depth += 1;
    }

    0
}

impl QpdfWrapper {
    /// Concatenate all pages of `inputs`, in order, into one document.
    ///
    /// Reports progress after each input file. The first unreadable input
    /// aborts the merge.
    pub fn merge(inputs: &[&[u8]], ctx: &mut TaskContext) -> Result<Vec<u8>> {
        if inputs.is_empty() {
            return Err(Error::QpdfError {
                reason: "No input PDFs provided".to_string(),
            });
        }

        let dest = QPdf::empty();
        let total = inputs.len();

        for (i, input_data) in inputs.iter().enumerate() {
            ctx.checkpoint(i, total)?;

            let source = QPdf::read_from_memory(input_data).map_err(|e| Error::QpdfError {
                reason: format!("Failed to read input PDF {}: {}", i + 1, e),
            })?;

            let pages = source.get_pages().map_err(|e| Error::QpdfError {
                reason: format!("Failed to get pages from input PDF {}: {}", i + 1, e),
            })?;

            for page in &pages {
                let copied = dest.copy_from_foreign(page);
                dest.add_page(&copied, false).map_err(map_qpdf_error)?;
            }

            ctx.unit_done(i + 1, total);
        }

        write_unencrypted(&dest)
    }

    /// Split a document into one single-page document per page.
    pub fn split(input_data: &[u8], ctx: &mut TaskContext) -> Result<Vec<Vec<u8>>> {
        let source = open_qpdf(input_data, None)?;
        let num_pages = source.get_num_pages().map_err(map_qpdf_error)?;
        let total = num_pages as usize;

        let mut outputs = Vec::with_capacity(total);

        for idx in 0..num_pages {
            ctx.checkpoint(idx as usize, total)?;

            let page = source.get_page(idx).ok_or(Error::PageOutOfBounds {
                page: idx + 1,
                total: num_pages,
            })?;

            let dest = QPdf::empty();
            let copied = dest.copy_from_foreign(&page);
            dest.add_page(&copied, false).map_err(map_qpdf_error)?;
            outputs.push(write_unencrypted(&dest)?);

            ctx.unit_done(idx as usize + 1, total);
        }

        Ok(outputs)
    }

    /// Add `rotation` to every page's current rotation.
    pub fn rotate(input_data: &[u8], rotation: Rotation, ctx: &mut TaskContext) -> Result<Vec<u8>> {
        let qpdf = open_qpdf(input_data, None)?;
        let pages = qpdf.get_pages().map_err(map_qpdf_error)?;
        let total = pages.len();

        for (i, page) in pages.iter().enumerate() {
            ctx.checkpoint(i, total)?;

            let angle = rotation.apply(effective_rotation(page));
            page.set("/Rotate", qpdf.new_integer(angle));

            ctx.unit_done(i + 1, total);
        }

        write_unencrypted(&qpdf)
    }

    /// Remove pages by 0-indexed position.
    ///
    /// `indices` must be distinct and sorted descending so that each removal
    /// leaves the positions of the remaining targets untouched. Indices past
    /// the end of the document are skipped.
    pub fn remove_pages(
        input_data: &[u8],
        indices: &[u32],
        ctx: &mut TaskContext,
    ) -> Result<Vec<u8>> {
        let qpdf = open_qpdf(input_data, None)?;
        let pages = qpdf.get_pages().map_err(map_qpdf_error)?;
        let total = indices.len();

        for (i, &idx) in indices.iter().enumerate() {
            ctx.checkpoint(i, total)?;

            if let Some(page) = pages.get(idx as usize) {
                qpdf.remove_page(page).map_err(map_qpdf_error)?;
            }

            ctx.unit_done(i + 1, total);
        }

        write_unencrypted(&qpdf)
    }

    /// Build a document from the given 0-indexed pages, in the given order.
    ///
    /// Repeated indices produce repeated pages.
    pub fn reorder_pages(
        input_data: &[u8],
        order: &[u32],
        ctx: &mut TaskContext,
    ) -> Result<Vec<u8>> {
        let source = open_qpdf(input_data, None)?;
        let num_pages = source.get_num_pages().map_err(map_qpdf_error)?;
        let total = order.len();

        let dest = QPdf::empty();

        for (i, &idx) in order.iter().enumerate() {
            ctx.checkpoint(i, total)?;

            let page = source.get_page(idx).ok_or(Error::PageOutOfBounds {
                page: idx + 1,
                total: num_pages,
            })?;
            let copied = dest.copy_from_foreign(&page);
            dest.add_page(&copied, false).map_err(map_qpdf_error)?;

            ctx.unit_done(i + 1, total);
        }

        write_unencrypted(&dest)
    }

    /// Encrypt with AES-256 using `password` as both user and owner password.
    ///
    /// The permission policy is fixed: low-resolution printing and
    /// accessibility extraction only.
    pub fn encrypt(input_data: &[u8], password: &str, ctx: &mut TaskContext) -> Result<Vec<u8>> {
        let qpdf = open_qpdf(input_data, None)?;
        ctx.progress.set(50.0);
        ctx.checkpoint(1, 2)?;

        let encryption = EncryptionParams::R6(EncryptionParamsR6 {
            user_password: password.to_string(),
            owner_password: password.to_string(),
            allow_accessibility: true,
            allow_extract: false,
            allow_assemble: false,
            allow_annotate_and_form: false,
            allow_form_filling: false,
            allow_modify_other: false,
            allow_print: PrintPermission::Low,
            encrypt_metadata: true,
        });

        let mut writer = qpdf.writer();
        writer
            .preserve_encryption(false)
            .encryption_params(encryption);
        writer.write_to_memory().map_err(map_qpdf_error)
    }

    /// Remove password protection
    pub fn decrypt(input_data: &[u8], password: &str, ctx: &mut TaskContext) -> Result<Vec<u8>> {
        let qpdf = open_qpdf(input_data, Some(password))?;
        ctx.progress.set(50.0);
        ctx.checkpoint(1, 2)?;

        write_unencrypted(&qpdf)
    }

    /// Re-write with generated object streams and compressed content streams
    pub fn compress(input_data: &[u8], ctx: &mut TaskContext) -> Result<Vec<u8>> {
        let qpdf = open_qpdf(input_data, None)?;
        ctx.progress.set(50.0);
        ctx.checkpoint(1, 2)?;

        let mut writer = qpdf.writer();
        writer
            .object_stream_mode(ObjectStreamMode::Generate)
            .compress_streams(true)
            .preserve_unreferenced_objects(false)
            .preserve_encryption(false);
        writer.write_to_memory().map_err(map_qpdf_error)
    }

    /// Get the page count of a PDF
    pub fn get_page_count(input_data: &[u8], password: Option<&str>) -> Result<u32> {
        let qpdf = open_qpdf(input_data, password)?;
        qpdf.get_num_pages().map_err(map_qpdf_error)
    }

    /// Effective rotation of every page, in page order
    pub fn page_rotations(input_data: &[u8], password: Option<&str>) -> Result<Vec<i64>> {
        let qpdf = open_qpdf(input_data, password)?;
        let pages = qpdf.get_pages().map_err(map_qpdf_error)?;
        Ok(pages
            .iter()
            .map(|page| effective_rotation(page).rem_euclid(360))
            .collect())
    }
}
