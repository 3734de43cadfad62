//! Tar extraction with per-entry path safety.

use crate::fsutil::{ensure_dir, ensure_parent, make_symlink, mask_mode, set_mode, set_mtime};
use crate::paths::{check_link_target, relative_to, safe_join, stripped};
use hermit_core::{Error, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::EntryType;
use tracing::debug;

/// Unpack a tar stream into `dest`, stripping `strip` leading path
/// components from every entry.
///
/// Hardlinks are rewritten as relative symlinks to the previously written
/// file: the installed tree relocates without cross-inode bookkeeping.
pub fn extract_tar<R: Read>(reader: R, dest: &Path, strip: usize) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    let mut written: HashSet<PathBuf> = HashSet::new();

    let entries = archive
        .entries()
        .map_err(|e| Error::Archive {
            message: e.to_string(),
            path: None,
        })?;
    for entry in entries {
        let mut entry = entry.map_err(|e| Error::Archive {
            message: e.to_string(),
            path: None,
        })?;
        let path = entry
            .path()
            .map_err(|e| Error::Archive {
                message: e.to_string(),
                path: None,
            })?
            .into_owned();
        let Some(rel) = stripped(&path, strip) else {
            continue;
        };
        let out = safe_join(dest, &rel)?;

        match entry.header().entry_type() {
            EntryType::Directory => {
                ensure_dir(&out)?;
            }
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                ensure_parent(&out)?;
                let mut file = File::create(&out).map_err(|e| Error::io(&out, e))?;
                std::io::copy(&mut entry, &mut file).map_err(|e| Error::io(&out, e))?;
                drop(file);
                if let Ok(mode) = entry.header().mode() {
                    set_mode(&out, mask_mode(mode))?;
                }
                if let Ok(mtime) = entry.header().mtime() {
                    set_mtime(&out, i64::try_from(mtime).unwrap_or(0));
                }
                written.insert(rel);
            }
            EntryType::Symlink => {
                let target = link_name(&entry)?;
                check_link_target(dest, &rel, &target)?;
                ensure_parent(&out)?;
                make_symlink(Path::new(&target), &out)?;
                written.insert(rel);
            }
            EntryType::Link => {
                let target = link_name(&entry)?;
                let Some(target_rel) = stripped(Path::new(&target), strip) else {
                    continue;
                };
                let target_abs = safe_join(dest, &target_rel)?;
                if !written.contains(&target_rel) {
                    return Err(Error::Archive {
                        message: format!("hardlink {rel:?} references unwritten {target_rel:?}"),
                        path: None,
                    });
                }
                let link_dir = out.parent().unwrap_or(dest);
                let relative = relative_to(link_dir, &target_abs);
                ensure_parent(&out)?;
                make_symlink(&relative, &out)?;
                written.insert(rel);
            }
            other => {
                debug!(entry = ?path, kind = ?other, "skipping tar entry");
            }
        }
    }
    Ok(())
}

fn link_name<R: Read>(entry: &tar::Entry<'_, R>) -> Result<String> {
    let name = entry
        .link_name()
        .map_err(|e| Error::Archive {
            message: e.to_string(),
            path: None,
        })?
        .ok_or_else(|| Error::Archive {
            message: "link entry without target".to_string(),
            path: None,
        })?;
    Ok(name.to_string_lossy().into_owned())
}
