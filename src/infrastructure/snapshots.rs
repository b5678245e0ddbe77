//! Snapshot storage: `<dir>/<id>/{resolver.conf, upstream.json, meta.json}`.
//!
//! `meta.json` is written last. A directory without it is an interrupted
//! capture and is never listed or restored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;

use super::atomic_write::{AtomicWriter, MODE_PRIVATE, MODE_SHARED, WriteError};
use super::gateway::{Command, Gateway, GatewayError};
use crate::domain::{Snapshot, SnapshotId, SnapshotMeta};

const RESOLVER_FILE: &str = "resolver.conf";
const UPSTREAM_FILE: &str = "upstream.json";
const META_FILE: &str = "meta.json";
const MAX_COLLISIONS: u8 = 99;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(SnapshotId),

    #[error("Snapshot I/O error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Corrupt snapshot metadata at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Too many snapshots created at {0}")]
    IdExhausted(SnapshotId),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("Reload after restore failed: {0}")]
    Reload(#[from] GatewayError),
}

/// Live files a snapshot captures.
#[derive(Debug, Clone)]
pub struct LiveFiles {
    pub resolver_config: PathBuf,
    pub upstream_config: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SnapshotManager {
    dir: PathBuf,
    live: LiveFiles,
    retention: usize,
    writer: AtomicWriter,
}

impl SnapshotManager {
    pub fn new(dir: PathBuf, live: LiveFiles, retention: usize) -> Self {
        Self {
            dir,
            live,
            retention: retention.max(1),
            writer: AtomicWriter::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Capture both live files, then prune beyond the retention count.
    pub fn create(&self) -> Result<Snapshot, SnapshotError> {
        let snapshot = Snapshot {
            rendered_config_text: read_optional(&self.live.resolver_config)?,
            upstream_config_text: read_optional(&self.live.upstream_config)?,
            ..self.allocate()?
        };
        let snapshot_dir = self.dir.join(snapshot.id.as_str());

        if let Some(text) = &snapshot.rendered_config_text {
            self.writer
                .write(&snapshot_dir.join(RESOLVER_FILE), text.as_bytes(), MODE_PRIVATE)?;
        }
        if let Some(text) = &snapshot.upstream_config_text {
            self.writer
                .write(&snapshot_dir.join(UPSTREAM_FILE), text.as_bytes(), MODE_PRIVATE)?;
        }

        let meta = serde_json::to_vec_pretty(&snapshot.meta()).map_err(|source| {
            SnapshotError::Corrupt {
                path: snapshot_dir.join(META_FILE),
                source,
            }
        })?;
        self.writer
            .write(&snapshot_dir.join(META_FILE), &meta, MODE_PRIVATE)?;

        tracing::info!(
            id = %snapshot.id,
            resolver_config = snapshot.rendered_config_text.is_some(),
            upstream_config = snapshot.upstream_config_text.is_some(),
            "Created snapshot"
        );

        Ok(settle_prune(snapshot, self.prune()))
    }

    /// Reserve a fresh id by creating its directory.
    fn allocate(&self) -> Result<Snapshot, SnapshotError> {
        fs::create_dir_all(&self.dir).map_err(|source| SnapshotError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let (base, timestamp_iso) = SnapshotId::from_time(SystemTime::now());
        let candidates =
            std::iter::once(base.clone()).chain((1..=MAX_COLLISIONS).map(|n| base.with_suffix(n)));

        for id in candidates {
            let path = self.dir.join(id.as_str());
            match fs::create_dir(&path) {
                Ok(()) => {
                    return Ok(Snapshot {
                        id,
                        timestamp_iso,
                        rendered_config_text: None,
                        upstream_config_text: None,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(SnapshotError::Io { path, source }),
            }
        }
        Err(SnapshotError::IdExhausted(base))
    }

    pub fn get(&self, id: &SnapshotId) -> Result<Snapshot, SnapshotError> {
        let snapshot_dir = self.dir.join(id.as_str());
        let meta = self
            .read_meta(&snapshot_dir)?
            .ok_or_else(|| SnapshotError::SnapshotNotFound(id.clone()))?;

        let payload = |present: bool, name: &str| -> Result<Option<String>, SnapshotError> {
            if !present {
                return Ok(None);
            }
            let path = snapshot_dir.join(name);
            fs::read_to_string(&path)
                .map(Some)
                .map_err(|source| SnapshotError::Io { path, source })
        };

        Ok(Snapshot {
            rendered_config_text: payload(meta.resolver_config_present, RESOLVER_FILE)?,
            upstream_config_text: payload(meta.upstream_config_present, UPSTREAM_FILE)?,
            id: meta.id,
            timestamp_iso: meta.timestamp_iso,
        })
    }

    /// Complete snapshots, newest first.
    pub fn list(&self) -> Result<Vec<SnapshotMeta>, SnapshotError> {
        let mut metas = Vec::new();
        for (_, path) in self.entries()? {
            if let Some(meta) = self.read_meta(&path)? {
                metas.push(meta);
            }
        }
        metas.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(metas)
    }

    /// Delete everything beyond the newest `retention` snapshots, plus any
    /// interrupted captures. Returns the removed ids.
    pub fn prune(&self) -> Result<Vec<SnapshotId>, SnapshotError> {
        let mut complete = Vec::new();
        let mut removed = Vec::new();

        for (id, path) in self.entries()? {
            if path.join(META_FILE).is_file() {
                complete.push((id, path));
            } else {
                remove_dir(&path)?;
                removed.push(id);
            }
        }

        complete.sort_by(|a, b| b.0.cmp(&a.0));
        for (id, path) in complete.into_iter().skip(self.retention) {
            remove_dir(&path)?;
            removed.push(id);
        }

        if !removed.is_empty() {
            tracing::debug!(count = removed.len(), retention = self.retention, "Pruned snapshots");
        }
        Ok(removed)
    }

    /// Write the snapshot's files back over the live ones. A file that did
    /// not exist at capture time is removed.
    pub fn restore_files(&self, id: &SnapshotId) -> Result<Snapshot, SnapshotError> {
        let snapshot = self.get(id)?;

        match &snapshot.rendered_config_text {
            Some(text) => self
                .writer
                .write(&self.live.resolver_config, text.as_bytes(), MODE_SHARED)?,
            None => self.writer.remove(&self.live.resolver_config)?,
        }
        match &snapshot.upstream_config_text {
            Some(text) => self
                .writer
                .write(&self.live.upstream_config, text.as_bytes(), MODE_PRIVATE)?,
            None => self.writer.remove(&self.live.upstream_config)?,
        }

        tracing::info!(id = %id, "Restored snapshot files");
        Ok(snapshot)
    }

    /// Restore files, then reload the resolver.
    pub async fn restore(
        &self,
        id: &SnapshotId,
        gateway: &dyn Gateway,
    ) -> Result<Snapshot, SnapshotError> {
        let snapshot = self.restore_files(id)?;
        gateway.execute(&Command::Reload).await?;
        Ok(snapshot)
    }

    fn entries(&self) -> Result<Vec<(SnapshotId, PathBuf)>, SnapshotError> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|source| SnapshotError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            // Foreign files in the directory are left alone.
            let Some(id) = name.to_str().and_then(|n| SnapshotId::parse(n).ok()) else {
                continue;
            };
            if entry.path().is_dir() {
                entries.push((id, entry.path()));
            }
        }
        Ok(entries)
    }

    fn read_meta(&self, snapshot_dir: &Path) -> Result<Option<SnapshotMeta>, SnapshotError> {
        let path = snapshot_dir.join(META_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SnapshotError::Io { path, source }),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| SnapshotError::Corrupt { path, source })
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, SnapshotError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// The new snapshot is complete before pruning starts, so a failed prune
/// only leaves extra snapshots behind.
fn settle_prune(
    snapshot: Snapshot,
    pruned: Result<Vec<SnapshotId>, SnapshotError>,
) -> Snapshot {
    if let Err(e) = pruned {
        tracing::warn!(id = %snapshot.id, error = %e, "Pruning old snapshots failed");
    }
    snapshot
}

fn remove_dir(path: &Path) -> Result<(), SnapshotError> {
    fs::remove_dir_all(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })
}
