//! Raw ordered byte concatenation

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::AssemblyError;
use crate::utils::remove_file_if_exists;

/// Append `segments`, in the given order, into a fresh `output` file.
///
/// On any failure the output file is removed. Returns the number of bytes written.
pub(crate) async fn concatenate(segments: &[PathBuf], output: &Path) -> Result<u64, AssemblyError> {
    let result = write_segments(segments, output).await;
    if result.is_err() {
        remove_file_if_exists(output).await;
    }
    result
}

async fn write_segments(segments: &[PathBuf], output: &Path) -> Result<u64, AssemblyError> {
    let out_err = |source| AssemblyError::Io {
        path: output.to_path_buf(),
        source,
    };

    let mut out = tokio::fs::File::create(output).await.map_err(out_err)?;
    let mut total = 0u64;

    for segment in segments {
        let mut input = tokio::fs::File::open(segment)
            .await
            .map_err(|source| AssemblyError::Io {
                path: segment.clone(),
                source,
            })?;
        total += tokio::io::copy(&mut input, &mut out)
            .await
            .map_err(|source| AssemblyError::Io {
                path: segment.clone(),
                source,
            })?;
    }

    out.flush().await.map_err(out_err)?;
    out.sync_all().await.map_err(out_err)?;
    Ok(total)
}
