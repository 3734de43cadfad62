//! Archive extraction for Hermit.
//!
//! A downloaded source becomes a read-only, relocatable package tree:
//! - format detection by content sniffing, never file extension
//! - compression wrappers (gzip, bzip2, xz, zstd) peeled and re-sniffed
//! - zip, tar, 7z, deb, rpm, dmg, pkg, and bare executables
//! - `strip` applied before the path-safety check
//! - every entry name and link target confined to the destination
//! - staged into a sibling temp directory, renamed into place atomically
//! - finalized read-only unless the package is `mutable`

mod fsutil;
mod macos;
mod paths;
mod pkgfmt;
mod sevenz;
mod sniff;
mod tar;
mod zip;

pub use paths::{check_link_target, safe_join, stripped};
pub use sniff::{Compression, Format};

use fsutil::{ensure_dir, ensure_parent, set_mode};
use hermit_core::{Error, Result};
use hermit_manifest::Package;
use sniff::{decoder, sniff_compression, sniff_format, strip_compression_suffix};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Pending finalization of an extracted package. Dropping it without
/// calling [`Finalize::finalize`] leaves the tree writable (unpack
/// triggers run in between).
#[derive(Debug)]
#[must_use]
pub struct Finalize {
    dest: PathBuf,
    mutable: bool,
}

impl Finalize {
    /// Strip write bits from every file under the destination, unless the
    /// package is mutable. Best-effort: files deleted by unpack triggers
    /// are ignored.
    pub fn finalize(self) -> Result<()> {
        if self.mutable {
            return Ok(());
        }
        for entry in WalkDir::new(&self.dest).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            if entry.file_type().is_symlink() {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(_) => continue,
            };
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mode = metadata.permissions().mode() & !0o222;
                let _ = std::fs::set_permissions(
                    entry.path(),
                    std::fs::Permissions::from_mode(mode),
                );
            }
            #[cfg(not(unix))]
            {
                let mut permissions = metadata.permissions();
                permissions.set_readonly(true);
                let _ = std::fs::set_permissions(entry.path(), permissions);
            }
        }
        Ok(())
    }
}

/// Extract `archive` into the package's destination.
///
/// The archive is unpacked into a temporary sibling of `dest` and renamed
/// into place on success; a failed extraction leaves no trace. Returns
/// the finalizer that makes the tree read-only.
pub fn extract(archive: &Path, package: &Package) -> Result<Finalize> {
    let dest = &package.dest;
    let parent = dest
        .parent()
        .ok_or_else(|| Error::io(dest, std::io::Error::other("destination has no parent")))?;
    ensure_dir(parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".hermit-stage-")
        .tempdir_in(parent)
        .map_err(|e| Error::io(parent, e))?;
    debug!(archive = %archive.display(), staging = %staging.path().display(), "extracting");

    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if archive.is_dir() {
        copy_tree(archive, staging.path())?;
    } else {
        extract_into(archive, staging.path(), package.strip, &name)?;
    }

    // The rename is the atomic-install boundary.
    let staged = staging.into_path();
    if dest.exists() {
        std::fs::remove_dir_all(dest).map_err(|e| Error::io(dest, e))?;
    }
    if let Err(e) = std::fs::rename(&staged, dest) {
        let _ = std::fs::remove_dir_all(&staged);
        return Err(Error::io(dest, e));
    }
    info!(dest = %dest.display(), "extraction complete");
    Ok(Finalize {
        dest: dest.clone(),
        mutable: package.mutable,
    })
}

/// Unpack an archive file into an existing directory. Used both for the
/// top-level staging directory and for recursion into nested payloads
/// (deb data archives, compression wrappers), which keep driving the same
/// destination.
fn extract_into(archive: &Path, dest: &Path, strip: usize, name: &str) -> Result<()> {
    // Sniffing cannot cheaply see a dmg's trailer; dispatch Apple formats
    // by name.
    if name.ends_with(".dmg") {
        return macos::extract_dmg(archive, dest);
    }
    if name.ends_with(".pkg") {
        return macos::extract_pkg(archive, dest);
    }

    let header = read_header(archive)?;
    let compression = sniff_compression(&header);
    if compression != Compression::None {
        return extract_compressed(archive, dest, strip, name, compression);
    }

    match sniff_format(&header) {
        Format::Zip => {
            let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
            zip::extract_zip(file, dest, strip)
        }
        Format::Tar => {
            let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
            tar::extract_tar(file, dest, strip)
        }
        Format::SevenZip => sevenz::extract_7z(archive, dest, strip),
        Format::Ar => extract_deb(archive, dest, strip),
        Format::Rpm => pkgfmt::extract_rpm(archive, dest, strip),
        Format::Executable => copy_executable(archive, dest, name),
        Format::Unknown => Err(Error::Archive {
            message: "unsupported archive format".to_string(),
            path: Some(archive.to_path_buf()),
        }),
    }
}

/// Peel a compression wrapper. Tars stream straight through the decoder;
/// anything else decodes to a temp file and re-enters the dispatcher.
fn extract_compressed(
    archive: &Path,
    dest: &Path,
    strip: usize,
    name: &str,
    compression: Compression,
) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let mut decoded = decoder(compression, file).map_err(|e| Error::io(archive, e))?;

    // Re-sniff the first 4 KiB of decoded content.
    let mut head = vec![0u8; 4096];
    let n = read_some(&mut decoded, &mut head).map_err(|e| Error::io(archive, e))?;
    head.truncate(n);
    let inner = sniff_format(&head);
    debug!(?compression, ?inner, "peeled compression wrapper");

    let rest = std::io::Cursor::new(head).chain(decoded);
    if inner == Format::Tar {
        return tar::extract_tar(rest, dest, strip);
    }

    let mut temp = tempfile::NamedTempFile::new().map_err(|e| Error::io(archive, e))?;
    let mut rest = rest;
    std::io::copy(&mut rest, &mut temp).map_err(|e| Error::io(archive, e))?;
    extract_into(temp.path(), dest, strip, strip_compression_suffix(name))
}

/// A deb is an `ar` archive embedding `data.tar[.*]`; write that member
/// to a temp file and recurse, keeping the outer destination.
fn extract_deb(archive: &Path, dest: &Path, strip: usize) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let mut outer = ar::Archive::new(file);
    while let Some(entry) = outer.next_entry() {
        let mut entry = entry.map_err(|e| Error::Archive {
            message: e.to_string(),
            path: Some(archive.to_path_buf()),
        })?;
        let member = String::from_utf8_lossy(entry.header().identifier()).into_owned();
        if !member.starts_with("data.tar") {
            continue;
        }
        let mut temp = tempfile::NamedTempFile::new().map_err(|e| Error::io(archive, e))?;
        std::io::copy(&mut entry, &mut temp).map_err(|e| Error::io(archive, e))?;
        return extract_into(temp.path(), dest, strip, &member);
    }
    Err(Error::Archive {
        message: "deb contains no data.tar member".to_string(),
        path: Some(archive.to_path_buf()),
    })
}

/// A bare executable: copy into the destination under its own name and
/// mark it executable.
fn copy_executable(archive: &Path, dest: &Path, name: &str) -> Result<()> {
    let name = strip_compression_suffix(name);
    let out = dest.join(if name.is_empty() { "binary" } else { name });
    ensure_parent(&out)?;
    std::fs::copy(archive, &out).map_err(|e| Error::io(&out, e))?;
    set_mode(&out, 0o755)
}

/// Copy a directory source verbatim.
fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| Error::Archive {
            message: e.to_string(),
            path: Some(src.to_path_buf()),
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Archive {
                message: e.to_string(),
                path: Some(src.to_path_buf()),
            })?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let out = dest.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            ensure_dir(&out)?;
        } else if file_type.is_symlink() {
            let target = std::fs::read_link(entry.path()).map_err(|e| Error::io(entry.path(), e))?;
            fsutil::make_symlink(&target, &out)?;
        } else {
            ensure_parent(&out)?;
            std::fs::copy(entry.path(), &out).map_err(|e| Error::io(&out, e))?;
        }
    }
    Ok(())
}

fn read_header(archive: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let mut header = vec![0u8; 4096];
    let n = read_some(&mut file, &mut header).map_err(|e| Error::io(archive, e))?;
    header.truncate(n);
    Ok(header)
}

fn read_some<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}
