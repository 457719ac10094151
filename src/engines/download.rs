//! Model and training-data cache shared by the engines

use crate::error::OcrError;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Cache directory for downloaded models, created on demand
pub fn cache_dir(subdir: Option<&str>) -> Result<PathBuf, OcrError> {
    let mut dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("docscan-ocr");
    if let Some(subdir) = subdir {
        dir = dir.join(subdir);
    }

    std::fs::create_dir_all(&dir).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create cache directory: {}", e))
    })?;
    Ok(dir)
}

/// Return `dir/filename`, downloading it from `url` first if missing
pub fn ensure_downloaded(url: &str, dir: &Path, filename: &str) -> Result<PathBuf, OcrError> {
    let path = dir.join(filename);

    if !path.exists() {
        tracing::info!("Downloading {} (this may take a moment)...", filename);
        download_file(url, &path)?;
        tracing::info!("Downloaded {} to {:?}", filename, path);
    } else {
        tracing::info!("Using cached {} from {:?}", filename, dir);
    }

    Ok(path)
}

/// Download a file from URL to path using ureq
fn download_file(url: &str, path: &Path) -> Result<(), OcrError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| OcrError::InitializationError(format!("Failed to download {}: {}", url, e)))?;

    let buffer = response.into_body().read_to_vec().map_err(|e| {
        OcrError::InitializationError(format!("Failed to read response body: {}", e))
    })?;

    // Write next to the target and rename so an interrupted download never
    // leaves a truncated file behind
    let partial = path.with_extension("part");
    let mut file = File::create(&partial)
        .map_err(|e| OcrError::InitializationError(format!("Failed to create file: {}", e)))?;
    file.write_all(&buffer)
        .map_err(|e| OcrError::InitializationError(format!("Failed to write file: {}", e)))?;
    std::fs::rename(&partial, path)
        .map_err(|e| OcrError::InitializationError(format!("Failed to move file: {}", e)))?;

    Ok(())
}
