//! End-to-end extraction scenarios: traversal safety, strip interaction,
//! atomicity, and read-only finalization.

use hermit_archive::extract;
use hermit_core::{Ops, Reference};
use hermit_manifest::Package;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

fn package(dest: PathBuf, strip: usize, mutable: bool) -> Package {
    Package {
        reference: Reference::parse("pkg-1.0.0"),
        description: "test package".to_string(),
        arch: None,
        binaries: vec!["*".to_string()],
        apps: vec![],
        requires: vec![],
        provides: vec![],
        runtime_deps: vec![],
        rename: BTreeMap::new(),
        env: Ops::default(),
        source: "https://example.com/pkg.tar.gz".to_string(),
        mirrors: vec![],
        root: dest.clone(),
        dest,
        sha256: None,
        sha256_source: None,
        test: None,
        strip,
        mutable,
        files: vec![],
        triggers: BTreeMap::new(),
        update_interval: None,
        warnings: vec![],
        unsupported_platforms: vec![],
    }
}

fn tar_with<F: FnOnce(&mut tar::Builder<Vec<u8>>)>(build: F) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    build(&mut builder);
    builder.into_inner().unwrap()
}

fn add_file(builder: &mut tar::Builder<Vec<u8>>, path: &str, content: &[u8], mode: u32) {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(mode);
    header.set_cksum();
    builder.append_data(&mut header, path, content).unwrap();
}

fn add_link(builder: &mut tar::Builder<Vec<u8>>, kind: tar::EntryType, path: &str, target: &str) {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(kind);
    header.set_size(0);
    header.set_mode(0o777);
    builder.append_link(&mut header, path, target).unwrap();
}

fn write_archive(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn tar_with_escaping_links_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let bytes = tar_with(|b| {
        add_file(b, "safe_file.txt", b"ok", 0o644);
        add_link(b, tar::EntryType::Symlink, "evil", "../escape");
        add_link(b, tar::EntryType::Link, "evil2", "../escape");
    });
    let archive = write_archive(tmp.path(), "evil.tar", &bytes);

    let dest = tmp.path().join("nested/extracted");
    let err = extract(&archive, &package(dest.clone(), 0, false)).unwrap_err();
    assert!(err.to_string().contains("illegal"), "{err}");
    assert!(!dest.exists());
    // Nothing named `escape` exists anywhere under the temp tree.
    let escaped = walkdir::WalkDir::new(tmp.path())
        .into_iter()
        .filter_map(Result::ok)
        .any(|e| e.file_name() == "escape");
    assert!(!escaped);
}

#[test]
fn strip_can_turn_an_internal_link_into_an_escape() {
    let tmp = tempfile::tempdir().unwrap();
    let bytes = tar_with(|b| {
        add_file(b, "foo/waz", b"content", 0o644);
        add_link(b, tar::EntryType::Symlink, "foo/bar", "../waz");
    });
    let archive = write_archive(tmp.path(), "stripped.tar", &bytes);

    // With strip=1 the symlink becomes `bar -> ../waz`, which escapes.
    let dest = tmp.path().join("out");
    let err = extract(&archive, &package(dest.clone(), 1, false)).unwrap_err();
    assert!(err.to_string().contains("illegal"), "{err}");
    assert!(!dest.exists());
}

#[test]
fn internal_symlinks_are_allowed() {
    let tmp = tempfile::tempdir().unwrap();
    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buffer);
        let dir_options = zip::write::SimpleFileOptions::default();
        zip.add_directory("suite/recursive/subsuite/", dir_options)
            .unwrap();
        let link_options =
            zip::write::SimpleFileOptions::default().unix_permissions(0o120_777);
        zip.start_file("suite/recursive_with_symlinks/subsuite", link_options)
            .unwrap();
        zip.write_all(b"../recursive/subsuite").unwrap();
        zip.finish().unwrap();
    }
    let archive = write_archive(tmp.path(), "links.zip", &buffer.into_inner());

    let dest = tmp.path().join("out");
    let finalize = extract(&archive, &package(dest.clone(), 0, false)).unwrap();
    finalize.finalize().unwrap();

    let link = dest.join("suite/recursive_with_symlinks/subsuite");
    let target = std::fs::read_link(&link).unwrap();
    assert_eq!(target, PathBuf::from("../recursive/subsuite"));
}

#[test]
fn hardlinks_become_relative_symlinks() {
    let tmp = tempfile::tempdir().unwrap();
    let bytes = tar_with(|b| {
        add_file(b, "pkg/bin/tool", b"#!/bin/sh\n", 0o755);
        add_link(b, tar::EntryType::Link, "pkg/bin/alias", "pkg/bin/tool");
    });
    let archive = write_archive(tmp.path(), "links.tar", &bytes);

    let dest = tmp.path().join("out");
    extract(&archive, &package(dest.clone(), 1, false))
        .unwrap()
        .finalize()
        .unwrap();
    let target = std::fs::read_link(dest.join("bin/alias")).unwrap();
    assert_eq!(target, PathBuf::from("tool"));
    assert_eq!(
        std::fs::read_to_string(dest.join("bin/alias")).unwrap(),
        "#!/bin/sh\n"
    );
}

#[cfg(unix)]
#[test]
fn finalize_strips_write_bits() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempfile::tempdir().unwrap();
    let bytes = tar_with(|b| {
        add_file(b, "bin/tool", b"x", 0o755);
        add_file(b, "share/doc", b"y", 0o644);
    });
    let archive = write_archive(tmp.path(), "pkg.tar", &bytes);

    let dest = tmp.path().join("out");
    extract(&archive, &package(dest.clone(), 0, false))
        .unwrap()
        .finalize()
        .unwrap();

    for entry in walkdir::WalkDir::new(&dest) {
        let entry = entry.unwrap();
        if entry.file_type().is_file() {
            let mode = entry.metadata().unwrap().permissions().mode();
            assert_eq!(mode & 0o222, 0, "{} is writable", entry.path().display());
        }
    }

    // Mutable packages stay writable.
    let dest = tmp.path().join("mutable");
    extract(&archive, &package(dest.clone(), 0, true))
        .unwrap()
        .finalize()
        .unwrap();
    let mode = std::fs::metadata(dest.join("bin/tool"))
        .unwrap()
        .permissions()
        .mode();
    assert_ne!(mode & 0o200, 0);
}

#[test]
fn gzip_wrapped_tar_streams() {
    let tmp = tempfile::tempdir().unwrap();
    let tar_bytes = tar_with(|b| add_file(b, "dir/file.txt", b"hello", 0o644));
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    // Deliberately misleading name: detection is by content.
    let archive = write_archive(tmp.path(), "download.bin", &encoder.finish().unwrap());

    let dest = tmp.path().join("out");
    extract(&archive, &package(dest.clone(), 0, false))
        .unwrap()
        .finalize()
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(dest.join("dir/file.txt")).unwrap(),
        "hello"
    );
}

#[cfg(unix)]
#[test]
fn bare_executable_is_copied_and_marked_executable() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempfile::tempdir().unwrap();
    let archive = write_archive(tmp.path(), "tool", b"#!/bin/sh\necho hi\n");

    let dest = tmp.path().join("out");
    extract(&archive, &package(dest.clone(), 0, true))
        .unwrap()
        .finalize()
        .unwrap();
    let mode = std::fs::metadata(dest.join("tool"))
        .unwrap()
        .permissions()
        .mode();
    assert_ne!(mode & 0o111, 0);
}

#[test]
fn deb_recurses_into_data_tar() {
    let tmp = tempfile::tempdir().unwrap();
    let inner = tar_with(|b| add_file(b, "usr/bin/tool", b"binary", 0o755));
    let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    gz.write_all(&inner).unwrap();
    let data_member = gz.finish().unwrap();

    let mut deb = Vec::new();
    {
        let mut builder = ar::Builder::new(&mut deb);
        let control = b"2.0\n";
        builder
            .append(
                &ar::Header::new(b"debian-binary".to_vec(), control.len() as u64),
                &control[..],
            )
            .unwrap();
        builder
            .append(
                &ar::Header::new(b"data.tar.gz".to_vec(), data_member.len() as u64),
                &data_member[..],
            )
            .unwrap();
    }
    let archive = write_archive(tmp.path(), "pkg.deb", &deb);

    let dest = tmp.path().join("out");
    extract(&archive, &package(dest.clone(), 0, false))
        .unwrap()
        .finalize()
        .unwrap();
    assert_eq!(
        std::fs::read(dest.join("usr/bin/tool")).unwrap(),
        b"binary"
    );
}

#[test]
fn directory_sources_are_copied() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    std::fs::create_dir_all(src.join("bin")).unwrap();
    std::fs::write(src.join("bin/tool"), "x").unwrap();

    let dest = tmp.path().join("out");
    extract(&src, &package(dest.clone(), 0, false))
        .unwrap()
        .finalize()
        .unwrap();
    assert!(dest.join("bin/tool").exists());
}
