use std::fs;
use std::path::{Path, PathBuf};

use rust_embed::Embed;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    Missing(String),
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Materializes a named resource as a file on disk.
///
/// Repeated calls for an already present file return the same path without
/// copying again. Failures are logged and still yield the target path; the
/// caller finds out when it tries to open it.
pub trait AssetProvider: Send + Sync {
    fn materialize(&self, name: &str) -> PathBuf;
}

#[derive(Embed)]
#[folder = "assets/"]
struct Bundled;

/// Extracts resources compiled into the binary into `cache_dir`.
pub struct EmbeddedAssets {
    cache_dir: PathBuf,
}

impl EmbeddedAssets {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    fn extract(&self, name: &str, target: &Path) -> Result<(), AssetError> {
        let file = Bundled::get(name).ok_or_else(|| AssetError::Missing(name.to_string()))?;
        if is_current(target, file.data.len() as u64) {
            return Ok(());
        }
        write_atomic(target, &file.data)
    }
}

impl AssetProvider for EmbeddedAssets {
    fn materialize(&self, name: &str) -> PathBuf {
        let target = self.cache_dir.join(name);
        if let Err(e) = self.extract(name, &target) {
            tracing::warn!(asset = name, error = %e, "asset extraction failed");
        }
        target
    }
}

/// Copies resources from `source_dir` into `cache_dir`.
pub struct DirectoryAssets {
    source_dir: PathBuf,
    cache_dir: PathBuf,
}

impl DirectoryAssets {
    pub fn new(source_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    fn copy(&self, name: &str, target: &Path) -> Result<(), AssetError> {
        let source = self.source_dir.join(name);
        let len = match fs::metadata(&source) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => return Err(AssetError::Missing(source.display().to_string())),
        };
        if is_current(target, len) {
            return Ok(());
        }
        let data = fs::read(&source).map_err(|e| AssetError::Io {
            path: source.clone(),
            source: e,
        })?;
        write_atomic(target, &data)
    }
}

impl AssetProvider for DirectoryAssets {
    fn materialize(&self, name: &str) -> PathBuf {
        let target = self.cache_dir.join(name);
        if let Err(e) = self.copy(name, &target) {
            tracing::warn!(asset = name, error = %e, "asset copy failed");
        }
        target
    }
}

fn is_current(target: &Path, len: u64) -> bool {
    fs::metadata(target)
        .map(|m| m.is_file() && m.len() == len)
        .unwrap_or(false)
}

fn write_atomic(target: &Path, data: &[u8]) -> Result<(), AssetError> {
    let io_err = |e| AssetError::Io {
        path: target.to_path_buf(),
        source: e,
    };
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut temp_name = target.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".partial");
    let temp = target.with_file_name(temp_name);
    fs::write(&temp, data).map_err(io_err)?;
    fs::rename(&temp, target).map_err(io_err)?;
    tracing::debug!(path = %target.display(), bytes = data.len(), "asset materialized");
    Ok(())
}
