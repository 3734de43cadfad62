//! macOS disk images and installer packages.
//!
//! Both formats delegate to the platform tools: `hdiutil` to mount the
//! image, `rsync` to copy `.app` bundles faithfully, and `installer` for
//! `.pkg` payloads.

use hermit_core::{Error, Result};
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Mount a dmg, rsync every `.app` bundle into `dest`, and detach.
pub fn extract_dmg(archive: &Path, dest: &Path) -> Result<()> {
    let mount = tempfile::tempdir().map_err(|e| Error::io(dest, e))?;
    run(
        Command::new("hdiutil")
            .arg("attach")
            .arg("-nobrowse")
            .arg("-readonly")
            .arg("-mountpoint")
            .arg(mount.path())
            .arg(archive),
    )?;

    let result = copy_apps(mount.path(), dest);

    if let Err(e) = run(Command::new("hdiutil").arg("detach").arg(mount.path())) {
        warn!(error = %e, "hdiutil detach failed");
    }
    result
}

fn copy_apps(mount: &Path, dest: &Path) -> Result<()> {
    let entries = std::fs::read_dir(mount).map_err(|e| Error::io(mount, e))?;
    let mut found = false;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(mount, e))?;
        let path = entry.path();
        if path.extension().map_or(false, |e| e == "app") {
            debug!(app = %path.display(), "copying app bundle");
            run(Command::new("rsync").arg("-a").arg(&path).arg(dest))?;
            found = true;
        }
    }
    if found {
        Ok(())
    } else {
        Err(Error::Archive {
            message: "no .app bundles in disk image".to_string(),
            path: Some(mount.to_path_buf()),
        })
    }
}

/// Install a macOS pkg into `dest` via the system installer.
pub fn extract_pkg(archive: &Path, dest: &Path) -> Result<()> {
    run(Command::new("installer")
        .arg("-pkg")
        .arg(archive)
        .arg("-target")
        .arg(dest))
}

fn run(command: &mut Command) -> Result<()> {
    let describe = format!("{command:?}");
    let output = command.output().map_err(|e| Error::Command {
        command: describe.clone(),
        message: e.to_string(),
    })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(Error::Command {
            command: describe,
            message: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        })
    }
}
