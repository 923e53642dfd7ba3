//! Source resolution for tool inputs

use crate::error::{Error, Result};
use crate::source::ArtifactCache;
use crate::state::{InputKind, SelectedFile};
use base64::Engine;
use std::path::Path;

/// Check the leading bytes of `data` against the expected input kind.
pub fn check_content(data: &[u8], kind: InputKind) -> Result<()> {
    match kind {
        InputKind::Pdf => {
            if data.len() < 4 || &data[0..4] != b"%PDF" {
                return Err(Error::InvalidPdf {
                    reason: "Not a valid PDF file".to_string(),
                });
            }
        }
        InputKind::Image => {
            let format = image::guess_format(data)?;
            if !matches!(
                format,
                image::ImageFormat::Png | image::ImageFormat::Jpeg | image::ImageFormat::WebP
            ) {
                return Err(Error::UnsupportedFileType {
                    tool: "img2pdf".to_string(),
                    name: format!("{:?} image", format),
                });
            }
        }
    }
    Ok(())
}

fn check_name(name: &str, kind: InputKind) -> Result<()> {
    if kind.accepts_name(name) {
        Ok(())
    } else {
        Err(Error::UnsupportedFileType {
            tool: format!("{:?} input", kind).to_lowercase(),
            name: name.to_string(),
        })
    }
}

/// Read a file from disk.
///
/// The extension must be on the allow-list for `kind` and the content must
/// look like that kind.
pub fn resolve_path<P: AsRef<Path>>(path: P, kind: InputKind) -> Result<SelectedFile> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    check_name(&name, kind)?;

    if !path.exists() {
        return Err(Error::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let data = std::fs::read(path)?;
    check_content(&data, kind)?;

    Ok(SelectedFile::new(name, data))
}

/// Decode inline base64 content.
///
/// `name` defaults to a generic name with the kind's first extension.
pub fn resolve_base64(
    base64_data: &str,
    name: Option<&str>,
    kind: InputKind,
) -> Result<SelectedFile> {
    let engine = base64::engine::general_purpose::STANDARD;
    let data = engine.decode(base64_data.trim())?;
    check_content(&data, kind)?;

    let name = match name {
        Some(n) => {
            check_name(n, kind)?;
            n.to_string()
        }
        None => format!("upload.{}", kind.extensions()[0]),
    };

    Ok(SelectedFile::new(name, data))
}

/// Fetch a previous tool output from the cache.
pub fn resolve_cache(cache_key: &str, cache: &ArtifactCache, kind: InputKind) -> Result<SelectedFile> {
    let artifact = cache.get(cache_key).ok_or_else(|| Error::CacheKeyNotFound {
        key: cache_key.to_string(),
    })?;

    check_name(&artifact.file_name, kind)?;
    check_content(&artifact.data, kind)?;

    Ok(SelectedFile::new(artifact.file_name, artifact.data))
}
