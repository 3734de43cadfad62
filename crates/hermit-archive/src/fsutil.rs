//! Filesystem helpers shared by the per-format extractors.

use hermit_core::{Error, Result};
use std::path::Path;

/// Create `dir` and any missing parents, each restricted to the owner.
pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    if let Some(parent) = dir.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }
    match std::fs::create_dir(dir) {
        Ok(()) => set_mode(dir, 0o700),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(Error::io(dir, e)),
    }
}

/// Create the parent directory of a file about to be written.
pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// Archive modes are masked to drop group/other access.
pub(crate) fn mask_mode(mode: u32) -> u32 {
    mode & !0o077
}

#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Best-effort mtime restore.
pub(crate) fn set_mtime(path: &Path, unix_secs: i64) {
    let _ = filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(unix_secs, 0));
}

/// Create a symlink, replacing any previous entry at `location`.
#[cfg(unix)]
pub(crate) fn make_symlink(target: &Path, location: &Path) -> Result<()> {
    if std::fs::symlink_metadata(location).is_ok() {
        std::fs::remove_file(location).map_err(|e| Error::io(location, e))?;
    }
    std::os::unix::fs::symlink(target, location).map_err(|e| Error::io(location, e))
}

#[cfg(not(unix))]
pub(crate) fn make_symlink(_target: &Path, location: &Path) -> Result<()> {
    Err(Error::io(
        location,
        std::io::Error::new(std::io::ErrorKind::Unsupported, "symlinks unsupported"),
    ))
}
