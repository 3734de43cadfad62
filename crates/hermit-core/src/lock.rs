//! Process-level lock around state-mutating commands.
//!
//! The lock is a PID file held with an advisory lock. Blocked acquisition
//! polls every 100 ms against an optional deadline. Re-acquiring a path
//! this process already holds is a no-op.

use crate::error::{Error, Result};
use fs2::FileExt;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lock paths currently held by this process.
static HELD: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Diagnostic payload stored in the lock file.
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    message: String,
}

/// A held lock; released on drop.
#[derive(Debug)]
pub struct LockGuard {
    /// `None` for a recursive (no-op) acquisition.
    inner: Option<(PathBuf, File)>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some((path, file)) = self.inner.take() {
            let _ = FileExt::unlock(&file);
            HELD.lock().remove(&path);
            debug!(path = %path.display(), "released lock");
        }
    }
}

/// Acquire the lock at `path`, polling until `timeout` expires
/// (`None` waits forever). `message` is stored in the lock file to aid
/// diagnostics for other processes.
pub fn acquire(path: &Path, message: &str, timeout: Option<Duration>) -> Result<LockGuard> {
    let key = path.to_path_buf();
    {
        let held = HELD.lock();
        if held.contains(&key) {
            debug!(path = %path.display(), "lock already held by this process");
            return Ok(LockGuard { inner: None });
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::LockUnavailable {
                path: key.clone(),
                message: e.to_string(),
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                let info = LockInfo {
                    pid: std::process::id(),
                    message: message.to_string(),
                };
                file.set_len(0).map_err(|e| Error::io(path, e))?;
                file.seek(SeekFrom::Start(0)).map_err(|e| Error::io(path, e))?;
                let payload = serde_json::to_vec(&info)
                    .map_err(|e| Error::other("lock", e.to_string()))?;
                file.write_all(&payload).map_err(|e| Error::io(path, e))?;
                file.flush().map_err(|e| Error::io(path, e))?;
                HELD.lock().insert(key.clone());
                debug!(path = %path.display(), "acquired lock");
                return Ok(LockGuard {
                    inner: Some((key, file)),
                });
            }
            Err(_) => {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        return Err(Error::LockTimeout {
                            path: key,
                            holder: read_holder(&mut file),
                        });
                    }
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

fn read_holder(file: &mut File) -> Option<String> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut content).ok()?;
    let info: LockInfo = serde_json::from_str(&content).ok()?;
    Some(format!("pid {} ({})", info.pid, info.message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hermit.lock");
        {
            let _guard = acquire(&path, "testing", None).unwrap();
            assert!(path.exists());
            let content = std::fs::read_to_string(&path).unwrap();
            assert!(content.contains("testing"));
        }
        // Released: a fresh acquisition succeeds immediately.
        let _guard = acquire(&path, "again", Some(Duration::from_millis(10))).unwrap();
    }

    #[test]
    fn reacquire_same_process_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hermit.lock");
        let _outer = acquire(&path, "outer", None).unwrap();
        // Same PID: returns instantly despite the zero-ish timeout.
        let inner = acquire(&path, "inner", Some(Duration::from_millis(1))).unwrap();
        drop(inner);
        // The outer guard still holds the path.
        assert!(HELD.lock().contains(&path.to_path_buf()));
    }
}
