//! Zip extraction with per-entry path safety.

use crate::fsutil::{ensure_dir, ensure_parent, make_symlink, mask_mode, set_mode};
use crate::paths::{check_link_target, safe_join, stripped};
use hermit_core::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

/// Unpack a zip archive into `dest`, stripping `strip` leading path
/// components from every entry.
pub fn extract_zip(file: File, dest: &Path, strip: usize) -> Result<()> {
    let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::Archive {
        message: e.to_string(),
        path: None,
    })?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| Error::Archive {
            message: e.to_string(),
            path: None,
        })?;
        let path = PathBuf::from(entry.name());
        let Some(rel) = stripped(&path, strip) else {
            continue;
        };
        let out = safe_join(dest, &rel)?;

        if entry.is_dir() {
            ensure_dir(&out)?;
            continue;
        }

        let mode = entry.unix_mode();
        if mode.map_or(false, |m| m & S_IFMT == S_IFLNK) {
            let mut target = String::new();
            entry
                .read_to_string(&mut target)
                .map_err(|e| Error::io(&out, e))?;
            check_link_target(dest, &rel, &target)?;
            ensure_parent(&out)?;
            make_symlink(Path::new(&target), &out)?;
            continue;
        }

        ensure_parent(&out)?;
        let mut file = File::create(&out).map_err(|e| Error::io(&out, e))?;
        std::io::copy(&mut entry, &mut file).map_err(|e| Error::io(&out, e))?;
        drop(file);
        if let Some(mode) = mode {
            set_mode(&out, mask_mode(mode & 0o7777))?;
        }
    }
    Ok(())
}
