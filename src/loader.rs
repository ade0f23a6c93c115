//! Document loading from the filesystem.
//!
//! Walks a documents directory and reads every `.txt` and `.md` file into a
//! [`Document`]. Files are visited in sorted relative-path order so repeated
//! builds over the same tree produce the same chunk sequence.

use std::path::{Path, PathBuf};

use anyhow::Result;
use doc_qa_core::models::Document;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::PipelineError;

/// File extensions accepted for ingestion and upload.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md"];

const INCLUDE_GLOBS: &[&str] = &["**/*.txt", "**/*.md"];
const EXCLUDE_GLOBS: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// Whether `path` has an extension the loader reads.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Load every supported file under `root`.
///
/// Fails with [`PipelineError::Ingestion`] when `root` is not a directory.
/// An existing directory without supported files yields no documents; the
/// caller decides whether an empty corpus is fatal. Unreadable files are
/// skipped with a warning.
pub fn load_directory(root: &Path) -> Result<Vec<Document>, PipelineError> {
    if !root.is_dir() {
        return Err(PipelineError::ingestion(
            root,
            "documents directory does not exist",
        ));
    }

    let include = build_globset(INCLUDE_GLOBS).map_err(|e| PipelineError::ingestion(root, e))?;
    let exclude = build_globset(EXCLUDE_GLOBS).map_err(|e| PipelineError::ingestion(root, e))?;

    let mut paths: Vec<(String, PathBuf)> = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude.is_match(&rel_str) || !include.is_match(&rel_str) {
            continue;
        }
        paths.push((rel_str, path.to_path_buf()));
    }

    paths.sort_by(|a, b| a.0.cmp(&b.0));

    let mut documents = Vec::with_capacity(paths.len());
    for (_, path) in paths {
        match load_file(&path, root) {
            Ok(doc) => documents.push(doc),
            Err(e) => warn!(error = %e, "skipping document"),
        }
    }

    debug!(count = documents.len(), path = %root.display(), "loaded documents");
    Ok(documents)
}

/// Load a single file as a [`Document`].
///
/// `source_path` is the path relative to `root` when the file lives under it,
/// otherwise the file name.
pub fn load_file(path: &Path, root: &Path) -> Result<Document, PipelineError> {
    if !is_supported(path) {
        return Err(PipelineError::ingestion(
            path,
            format!(
                "unsupported file type (expected one of: {})",
                SUPPORTED_EXTENSIONS.join(", ")
            ),
        ));
    }

    let bytes = std::fs::read(path).map_err(|e| PipelineError::ingestion(path, e))?;
    let content =
        String::from_utf8(bytes).map_err(|_| PipelineError::ingestion(path, "file is not valid UTF-8"))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let source_path = match path.strip_prefix(root) {
        Ok(relative) if !relative.as_os_str().is_empty() => {
            relative.to_string_lossy().replace('\\', "/")
        }
        _ => file_name.clone(),
    };
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let mut doc = Document::new(source_path, content);
    doc.metadata
        .insert("source".to_string(), path.display().to_string());
    doc.metadata.insert("file_name".to_string(), file_name);
    doc.metadata.insert("extension".to_string(), extension);
    Ok(doc)
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
