//! Path safety for archive entries.
//!
//! Every entry name and every link target must land inside the extraction
//! destination after lexical normalization, even after `strip` removes
//! leading components. Violations abort the whole extraction.

use hermit_core::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Drop the first `strip` components from an entry path. Returns `None`
/// for entries entirely consumed by the strip (they are skipped).
#[must_use]
pub fn stripped(path: &Path, strip: usize) -> Option<PathBuf> {
    let components: Vec<Component<'_>> = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if components.len() <= strip {
        return None;
    }
    Some(components[strip..].iter().collect())
}

/// Join an entry path onto `dest`, rejecting anything that would escape
/// after lexical normalization (absolute paths, `..` walking above the
/// destination).
pub fn safe_join(dest: &Path, rel: &Path) -> Result<PathBuf> {
    let mut stack: Vec<std::ffi::OsString> = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => stack.push(part.to_os_string()),
            Component::CurDir => {}
            Component::ParentDir => {
                if stack.pop().is_none() {
                    return Err(Error::IllegalPath {
                        path: rel.to_path_buf(),
                    });
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::IllegalPath {
                    path: rel.to_path_buf(),
                })
            }
        }
    }
    let mut out = dest.to_path_buf();
    for part in stack {
        out.push(part);
    }
    Ok(out)
}

/// Validate a link target: the joined absolute target (link parent +
/// value) must also resolve within `dest`. `entry` is the destination-
/// relative location of the link itself.
pub fn check_link_target(dest: &Path, entry: &Path, target: &str) -> Result<()> {
    let target_path = Path::new(target);
    if target_path.is_absolute() {
        let normalized = safe_join(Path::new("/"), target_path.strip_prefix("/").unwrap_or(target_path));
        match normalized {
            Ok(normalized) if normalized.starts_with(dest) => return Ok(()),
            _ => {
                return Err(Error::IllegalPath {
                    path: target_path.to_path_buf(),
                })
            }
        }
    }
    let base = entry.parent().unwrap_or_else(|| Path::new(""));
    let joined = base.join(target_path);
    safe_join(dest, &joined).map_err(|_| Error::IllegalPath {
        path: entry.join(target_path),
    })?;
    Ok(())
}

/// Relative path from `from_dir` to `to`, for rewriting hardlinks as
/// symlinks. Both paths must share `base` as a prefix.
#[must_use]
pub fn relative_to(from_dir: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let to: Vec<Component<'_>> = to.components().collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for component in &to[common..] {
        out.push(component);
    }
    out
}
