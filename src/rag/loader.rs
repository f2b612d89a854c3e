//! Plain-text document source.
//!
//! Reads `.txt` and `.md` files into [`SourceDocument`]s. Binary formats
//! (PDF, DOCX) are converted elsewhere before they reach the pipeline.

use std::path::{Path, PathBuf};

use super::error::{RagError, RagResult};
use super::types::{file_type_of, SourceDocument};

pub const SUPPORTED_EXTENSIONS: &[&str] = &[".txt", ".md"];

pub fn is_supported(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    SUPPORTED_EXTENSIONS.contains(&file_type_of(name).as_str())
}

/// Read one file. Invalid UTF-8 is replaced rather than rejected.
pub fn load_file(path: &Path) -> RagResult<SourceDocument> {
    if !is_supported(path) {
        return Err(RagError::InvalidArgument(format!(
            "unsupported document type: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(RagError::NotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(SourceDocument::new(text, name))
}

/// Read every supported file under `dir`, recursively, in path order.
///
/// Unreadable files are logged and skipped.
pub fn load_directory(dir: &Path) -> RagResult<Vec<SourceDocument>> {
    if !dir.is_dir() {
        return Err(RagError::NotFound(dir.to_path_buf()));
    }

    let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_supported(p))
        .collect();
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        match load_file(&path) {
            Ok(doc) => documents.push(doc),
            Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
        }
    }

    tracing::info!("Loaded {} documents from {}", documents.len(), dir.display());
    Ok(documents)
}
