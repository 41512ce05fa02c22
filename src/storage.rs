//! Uploaded media on the local filesystem.
//!
//! Post images land under `<uploads_dir>/posts/` with a generated name;
//! only the relative path is stored in the database. Nothing from the
//! client-supplied filename survives except a short alphanumeric extension.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;

use crate::error::AppResult;

const MAX_EXTENSION_LEN: usize = 5;

/// Persist an upload under `uploads_dir` and return the relative path to
/// store in the database, e.g. `posts/0192d3a8-....png`.
pub fn save_upload(uploads_dir: &Path, original_name: &str, data: &Bytes) -> AppResult<String> {
    let id = uuid::Uuid::now_v7().to_string();
    let file_name = match sanitized_extension(original_name) {
        Some(ext) => format!("{}.{}", id, ext),
        None => id,
    };

    let dir = uploads_dir.join("posts");
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join(&file_name), data)?;

    Ok(format!("posts/{}", file_name))
}

/// Extension of the uploaded name, kept only when short and purely
/// alphanumeric, lowercased.
fn sanitized_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Resolve a requested media path against the uploads directory, refusing
/// anything that is not a plain relative path (no `..`, no leading `/`).
pub fn resolve_media_path(uploads_dir: &Path, requested: &str) -> Option<PathBuf> {
    if requested.is_empty() {
        return None;
    }
    let relative = Path::new(requested);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(uploads_dir.join(relative))
}
