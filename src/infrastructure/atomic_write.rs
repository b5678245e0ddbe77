//! Crash-safe whole-file replacement.
//!
//! Content goes to a temp file in the target's directory, is synced, then
//! renamed over the target. Readers see either the old file or the new one,
//! never a prefix of the new one.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Mode for files that only the service account should read.
pub const MODE_PRIVATE: u32 = 0o600;
/// Mode for files the resolver (a different user) must read.
pub const MODE_SHARED: u32 = 0o644;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Invalid target path: {0}")]
    InvalidPath(PathBuf),

    #[error("Failed to prepare directory for {path}: {source}")]
    Prepare { path: PathBuf, source: io::Error },

    #[error("Failed to write temporary file for {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to replace {path}: {source}")]
    Replace { path: PathBuf, source: io::Error },

    #[error("Failed to remove {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicWriter;

impl AtomicWriter {
    pub fn new() -> Self {
        Self
    }

    /// Replace `path` with `content`, created with permission bits `mode`.
    ///
    /// On error `path` is untouched and no temp file is left behind.
    pub fn write(&self, path: &Path, content: &[u8], mode: u32) -> Result<(), WriteError> {
        write_with_hook(path, content, mode, |_| Ok(()))
    }

    /// Remove `path` if it exists.
    pub fn remove(&self, path: &Path) -> Result<(), WriteError> {
        match fs::remove_file(path) {
            Ok(()) => {
                if let Some(dir) = path.parent() {
                    sync_dir(dir);
                }
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(WriteError::Remove {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// `before_rename` runs after the temp file is synced and before it replaces
/// the target. Tests use it to inject failures at the worst moment.
fn write_with_hook<F>(path: &Path, content: &[u8], mode: u32, before_rename: F) -> Result<(), WriteError>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| WriteError::InvalidPath(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    fs::create_dir_all(dir).map_err(|source| WriteError::Prepare {
        path: path.to_path_buf(),
        source,
    })?;

    let write_err = |source| WriteError::Write {
        path: path.to_path_buf(),
        source,
    };

    // Dropping `tmp` on any early return deletes the temp file.
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;

    tmp.write_all(content).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    set_mode(tmp.as_file(), mode).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    before_rename(tmp.path()).map_err(write_err)?;

    tmp.persist(path).map_err(|e| WriteError::Replace {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    sync_dir(dir);
    tracing::debug!(path = %path.display(), bytes = content.len(), "Atomically replaced file");
    Ok(())
}

#[cfg(unix)]
fn set_mode(file: &File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &File, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Persist the rename itself. Failure only weakens durability, not atomicity.
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        tracing::warn!(dir = %dir.display(), error = %e, "Failed to sync directory");
    }
}
