//! Apply lock: at most one mutation in flight, per process and per host.
//!
//! Inside the process a `tokio::sync::Mutex` is tried without waiting. Across
//! processes an exclusive `flock` on the lock file does the same; the file
//! also records the holder's PID for diagnostics.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Another apply is already in progress")]
    Busy { holder: Option<u32> },

    #[error("Failed to open lock file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

pub struct ApplyLock {
    path: PathBuf,
    inner: Mutex<()>,
}

/// Held for the duration of one apply. Dropping it releases both locks.
pub struct ApplyGuard<'a> {
    _local: MutexGuard<'a, ()>,
    _file: File,
}

impl ApplyLock {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            inner: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the lock or fail immediately. Never queues.
    pub fn try_acquire(&self) -> Result<ApplyGuard<'_>, LockError> {
        let local = self.inner.try_lock().map_err(|_| LockError::Busy {
            holder: Some(std::process::id()),
        })?;

        let io_err = |source| LockError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(io_err)?;

        if !try_flock(&file).map_err(io_err)? {
            return Err(LockError::Busy {
                holder: read_pid(&mut file),
            });
        }

        // The PID is informational; failing to record it does not matter.
        let _ = file
            .set_len(0)
            .and_then(|_| file.seek(SeekFrom::Start(0)))
            .and_then(|_| write!(file, "{}", std::process::id()));

        tracing::debug!(path = %self.path.display(), "Acquired apply lock");
        Ok(ApplyGuard {
            _local: local,
            _file: file,
        })
    }

    /// PID recorded by the current holder, if any process holds the lock.
    pub fn holder(&self) -> Option<u32> {
        let mut file = File::open(&self.path).ok()?;
        if try_flock(&file).ok()? {
            // Nobody held it. Our lock drops with `file`.
            return None;
        }
        read_pid(&mut file)
    }
}

fn read_pid(file: &mut File) -> Option<u32> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut content).ok()?;
    content.trim().parse().ok()
}

/// Returns `Ok(false)` when another open file description holds the lock.
#[cfg(unix)]
fn try_flock(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and stays open for the
    // duration of the call. `flock` does not touch memory we own.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
fn try_flock(_file: &File) -> io::Result<bool> {
    Ok(true)
}
