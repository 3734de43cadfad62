//! 7-Zip extraction with per-entry path safety.

use crate::fsutil::ensure_parent;
use crate::paths::{safe_join, stripped};
use hermit_core::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Unpack a 7z archive into `dest`, stripping `strip` leading path
/// components from every entry.
///
/// Entries with no stream that are not explicitly empty files represent
/// directories; they are skipped and the enclosing directories are
/// created when files are written.
pub fn extract_7z(archive: &Path, dest: &Path, strip: usize) -> Result<()> {
    let mut reader = sevenz_rust::SevenZReader::open(archive, sevenz_rust::Password::empty())
        .map_err(|e| Error::Archive {
            message: e.to_string(),
            path: Some(archive.to_path_buf()),
        })?;

    let mut failure: Option<Error> = None;
    reader
        .for_each_entries(|entry, content| {
            if entry.is_directory() || !entry.has_stream() {
                return Ok(true);
            }
            match write_entry(entry.name(), content, dest, strip) {
                Ok(()) => Ok(true),
                Err(e) => {
                    failure = Some(e);
                    Ok(false)
                }
            }
        })
        .map_err(|e| Error::Archive {
            message: e.to_string(),
            path: Some(archive.to_path_buf()),
        })?;

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn write_entry(name: &str, content: &mut dyn Read, dest: &Path, strip: usize) -> Result<()> {
    let path = PathBuf::from(name);
    let Some(rel) = stripped(&path, strip) else {
        return Ok(());
    };
    let out = safe_join(dest, &rel)?;
    ensure_parent(&out)?;
    let mut file = File::create(&out).map_err(|e| Error::io(&out, e))?;
    std::io::copy(content, &mut file).map_err(|e| Error::io(&out, e))?;
    Ok(())
}
