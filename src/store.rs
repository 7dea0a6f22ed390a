// Whole-document JSON persistence.
//
// Every registry and every ledger is one JSON document: fully read before
// use, fully rewritten on save. There is no incremental update path.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

fn document_path(base: &Path, collection: &str, name: &str) -> PathBuf {
    base.join(collection).join(format!("{name}.json"))
}

/// Read and decode one document.
pub fn open_document<T: DeserializeOwned>(base: &Path, collection: &str, name: &str) -> Result<T> {
    let path = document_path(base, collection, name);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read document {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to decode document {}", path.display()))
}

/// Read a document, or produce a default when the file does not exist yet.
pub fn open_document_or<T: DeserializeOwned + Default>(
    base: &Path,
    collection: &str,
    name: &str,
) -> Result<T> {
    let path = document_path(base, collection, name);
    if !path.exists() {
        return Ok(T::default());
    }
    open_document(base, collection, name)
}

/// Encode and rewrite one document in full, creating the collection
/// directory on first save.
pub fn save_document<T: Serialize>(
    base: &Path,
    collection: &str,
    name: &str,
    value: &T,
) -> Result<()> {
    let path = document_path(base, collection, name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(value).context("failed to encode document")?;
    fs::write(&path, content)
        .with_context(|| format!("failed to write document {}", path.display()))
}
