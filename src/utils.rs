//! Utility functions for file operations

use std::path::Path;

/// Size of `path` if it is a regular file with at least one byte.
///
/// A missing, empty or unreadable file yields `None`; callers treat all three as
/// "not downloaded".
pub async fn nonempty_file_len(path: &Path) -> Option<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Some(meta.len()),
        _ => None,
    }
}

/// Remove a file, logging anything other than "already gone".
pub async fn remove_file_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed file");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove file");
        }
    }
}

/// Quote a path for an ffmpeg concat manifest line: `file '<path>'`.
///
/// Single quotes inside the path are closed, escaped and reopened (`'\''`).
pub fn concat_manifest_line(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', r"'\''");
    format!("file '{}'\n", escaped)
}
