use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A file path confined to the staging directory.
///
/// Only a single plain file name below the root is accepted: no parent
/// segments, no nested directories, no hidden files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPath(PathBuf);

#[derive(Debug, thiserror::Error)]
pub enum StagedPathError {
    #[error("Path must be absolute: {0}")]
    NotAbsolute(PathBuf),

    #[error("Path contains a parent-directory segment: {0}")]
    ParentSegment(PathBuf),

    #[error("Path is outside the staging directory {root}: {path}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Path has an invalid file name: {0}")]
    InvalidFileName(PathBuf),
}

impl StagedPath {
    pub fn new(path: impl Into<PathBuf>, root: &Path) -> Result<Self, StagedPathError> {
        let path = path.into();

        if !path.is_absolute() {
            return Err(StagedPathError::NotAbsolute(path));
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(StagedPathError::ParentSegment(path));
        }

        let relative = match path.strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => {
                return Err(StagedPathError::OutsideRoot {
                    path,
                    root: root.to_path_buf(),
                });
            }
        };

        let mut components = relative.components();
        let name = match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => name.to_str(),
            _ => None,
        };
        let valid = name.is_some_and(|n| {
            !n.starts_with('.')
                && !n.starts_with('-')
                && n.chars()
                    .all(|c| c.is_ascii_alphanumeric() || "._-".contains(c))
        });
        if !valid {
            return Err(StagedPathError::InvalidFileName(path));
        }

        Ok(Self(path))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for StagedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
