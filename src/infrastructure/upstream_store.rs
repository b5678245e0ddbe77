use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::atomic_write::{AtomicWriter, MODE_PRIVATE, WriteError};
use crate::domain::{UpstreamConfig, UpstreamError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid upstream configuration: {0}")]
    Invalid(#[from] UpstreamError),

    #[error("Failed to serialize upstream configuration: {0}")]
    Serialize(serde_json::Error),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Persists the structured upstream configuration as pretty JSON.
#[derive(Debug, Clone)]
pub struct UpstreamStore {
    path: PathBuf,
    writer: AtomicWriter,
}

impl UpstreamStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            writer: AtomicWriter::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file means nothing was ever applied: recursive mode.
    pub fn load(&self) -> Result<UpstreamConfig, StoreError> {
        match self.load_text()? {
            Some(text) => parse(&text, &self.path),
            None => Ok(UpstreamConfig::default()),
        }
    }

    /// Exact file contents, `None` if absent.
    pub fn load_text(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn save(&self, config: &UpstreamConfig) -> Result<(), StoreError> {
        config.validate()?;
        let text = to_json(config)?;
        self.writer.write(&self.path, text.as_bytes(), MODE_PRIVATE)?;
        Ok(())
    }
}

/// Parse and validate a structured config from JSON text.
pub fn parse(text: &str, origin: &Path) -> Result<UpstreamConfig, StoreError> {
    let config: UpstreamConfig = serde_json::from_str(text).map_err(|source| StoreError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

pub fn to_json(config: &UpstreamConfig) -> Result<String, StoreError> {
    let mut text = serde_json::to_string_pretty(config).map_err(StoreError::Serialize)?;
    text.push('\n');
    Ok(text)
}
