//! Output naming and paced writing of artifacts

use crate::error::Result;
use crate::ops::Operation;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default pause between consecutive artifact writes
pub const DEFAULT_PACING: Duration = Duration::from_millis(200);

/// Default file name prefix
pub const DEFAULT_PREFIX: &str = "v0pdftools";

/// A named output file held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Current unix time in milliseconds
pub fn timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// `<prefix>_<label>_<millis>.<ext>`, or `..._Page_<n>.<ext>` for a page.
pub fn artifact_name(
    prefix: &str,
    label: &str,
    millis: i64,
    page: Option<usize>,
    extension: &str,
) -> String {
    match page {
        Some(n) => format!("{}_{}_{}_Page_{}.{}", prefix, label, millis, n, extension),
        None => format!("{}_{}_{}.{}", prefix, label, millis, extension),
    }
}

/// Name the output parts of `op`.
///
/// Paged operations number their parts from 1; all parts of one run share
/// the same timestamp.
pub fn name_artifacts(op: &Operation, parts: Vec<Vec<u8>>, prefix: &str, millis: i64) -> Vec<Artifact> {
    parts
        .into_iter()
        .enumerate()
        .map(|(i, data)| Artifact {
            file_name: artifact_name(
                prefix,
                op.label(),
                millis,
                op.is_paged().then_some(i + 1),
                op.extension(),
            ),
            mime_type: op.mime_type().to_string(),
            data,
        })
        .collect()
}

/// Write artifacts into `dir` one after another, pausing `pacing` between
/// writes. Creates `dir` if missing.
///
/// All or nothing: if any write fails, files already written by this call
/// are removed before the error is returned.
pub async fn write_artifacts(
    dir: &Path,
    artifacts: &[Artifact],
    pacing: Duration,
) -> Result<Vec<PathBuf>> {
    if !dir.as_os_str().is_empty() && !dir.exists() {
        tokio::fs::create_dir_all(dir).await?;
    }

    let mut written = Vec::with_capacity(artifacts.len());
    for (i, artifact) in artifacts.iter().enumerate() {
        if i > 0 && !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }

        let path = dir.join(&artifact.file_name);
        if let Err(e) = tokio::fs::write(&path, &artifact.data).await {
            discard(&written).await;
            return Err(e.into());
        }
        tracing::debug!(path = %path.display(), bytes = artifact.data.len(), "artifact written");
        written.push(path);
    }

    Ok(written)
}

async fn discard(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "could not remove partial output");
        }
    }
}
