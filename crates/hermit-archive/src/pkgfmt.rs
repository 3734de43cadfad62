//! Linux package formats: RPM framing and the newc cpio payload walker.
//!
//! RPM framing is parsed just far enough to locate the compressed payload
//! (lead, signature header, main header); the payload compression is then
//! re-sniffed and the cpio archive inside walked with the same path
//! safety rules as tar.

use crate::fsutil::{ensure_dir, ensure_parent, make_symlink, mask_mode, set_mode, set_mtime};
use crate::paths::{check_link_target, safe_join, stripped};
use crate::sniff::{decoder, sniff_compression};
use hermit_core::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const RPM_LEAD_LEN: u64 = 96;
const RPM_HEADER_MAGIC: [u8; 3] = [0x8e, 0xad, 0xe8];

const S_IFMT: u32 = 0o170_000;
const S_IFDIR: u32 = 0o040_000;
const S_IFREG: u32 = 0o100_000;
const S_IFLNK: u32 = 0o120_000;

/// Extract the cpio payload of an RPM package.
pub fn extract_rpm(archive: &Path, dest: &Path, strip: usize) -> Result<()> {
    let mut file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    skip_lead(&mut file, archive)?;
    skip_header(&mut file, archive, true)?;
    skip_header(&mut file, archive, false)?;

    let mut head = vec![0u8; 4096];
    let n = read_some(&mut file, &mut head).map_err(|e| Error::io(archive, e))?;
    head.truncate(n);
    let compression = sniff_compression(&head);
    let payload = std::io::Cursor::new(head).chain(file);
    let decoded = decoder(compression, payload).map_err(|e| Error::io(archive, e))?;
    extract_cpio(decoded, dest, strip)
}

fn skip_lead(reader: &mut File, archive: &Path) -> Result<()> {
    let mut lead = [0u8; RPM_LEAD_LEN as usize];
    reader
        .read_exact(&mut lead)
        .map_err(|e| Error::io(archive, e))?;
    if lead[..4] != [0xed, 0xab, 0xee, 0xdb] {
        return Err(Error::Archive {
            message: "not an RPM package".to_string(),
            path: Some(archive.to_path_buf()),
        });
    }
    Ok(())
}

fn skip_header(reader: &mut File, archive: &Path, pad8: bool) -> Result<()> {
    let mut intro = [0u8; 16];
    reader
        .read_exact(&mut intro)
        .map_err(|e| Error::io(archive, e))?;
    if intro[..3] != RPM_HEADER_MAGIC {
        return Err(Error::Archive {
            message: "corrupt RPM header".to_string(),
            path: Some(archive.to_path_buf()),
        });
    }
    let nindex = u64::from(u32::from_be_bytes([intro[8], intro[9], intro[10], intro[11]]));
    let hsize = u64::from(u32::from_be_bytes([intro[12], intro[13], intro[14], intro[15]]));
    let mut skip = nindex * 16 + hsize;
    if pad8 {
        skip = (skip + 7) & !7;
    }
    let copied = std::io::copy(&mut reader.take(skip), &mut std::io::sink())
        .map_err(|e| Error::io(archive, e))?;
    if copied != skip {
        return Err(Error::Archive {
            message: "truncated RPM header".to_string(),
            path: Some(archive.to_path_buf()),
        });
    }
    Ok(())
}

/// Walk a newc-format cpio archive, applying strip and path safety to
/// every entry.
pub fn extract_cpio<R: Read>(mut reader: R, dest: &Path, strip: usize) -> Result<()> {
    loop {
        let mut header = [0u8; 110];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(Error::io(dest, e)),
        }
        if header.iter().all(|&b| b == 0) {
            break;
        }
        if &header[..6] != b"070701" && &header[..6] != b"070702" {
            return Err(Error::Archive {
                message: "corrupt cpio header".to_string(),
                path: None,
            });
        }
        let mode = hex_field(&header, 14)?;
        let mtime = hex_field(&header, 46)?;
        let filesize = u64::from(hex_field(&header, 54)?);
        let namesize = hex_field(&header, 94)? as usize;

        let mut name_buf = vec![0u8; namesize];
        reader
            .read_exact(&mut name_buf)
            .map_err(|e| Error::io(dest, e))?;
        skip_padding(&mut reader, 110 + namesize as u64)?;
        let name = String::from_utf8_lossy(&name_buf)
            .trim_end_matches('\0')
            .to_string();
        if name == "TRAILER!!!" {
            break;
        }
        let name = name.strip_prefix("./").unwrap_or(&name).to_string();

        let mut content = reader.by_ref().take(filesize);
        let rel = stripped(&PathBuf::from(&name), strip);
        match rel {
            None => {
                // Consumed by strip; drain the content anyway.
                std::io::copy(&mut content, &mut std::io::sink())
                    .map_err(|e| Error::io(dest, e))?;
            }
            Some(rel) => {
                let out = safe_join(dest, &rel)?;
                match mode & S_IFMT {
                    S_IFDIR => {
                        ensure_dir(&out)?;
                    }
                    S_IFLNK => {
                        let mut target = String::new();
                        content
                            .read_to_string(&mut target)
                            .map_err(|e| Error::io(&out, e))?;
                        check_link_target(dest, &rel, &target)?;
                        ensure_parent(&out)?;
                        make_symlink(Path::new(&target), &out)?;
                    }
                    S_IFREG => {
                        ensure_parent(&out)?;
                        let mut file = File::create(&out).map_err(|e| Error::io(&out, e))?;
                        std::io::copy(&mut content, &mut file).map_err(|e| Error::io(&out, e))?;
                        drop(file);
                        set_mode(&out, mask_mode(mode & 0o7777))?;
                        set_mtime(&out, i64::from(mtime));
                    }
                    _ => {
                        std::io::copy(&mut content, &mut std::io::sink())
                            .map_err(|e| Error::io(dest, e))?;
                    }
                }
            }
        }
        // Content is padded to a 4-byte boundary.
        skip_padding(&mut reader, filesize)?;
    }
    Ok(())
}

fn hex_field(header: &[u8; 110], offset: usize) -> Result<u32> {
    let text = std::str::from_utf8(&header[offset..offset + 8]).map_err(|_| Error::Archive {
        message: "corrupt cpio header field".to_string(),
        path: None,
    })?;
    u32::from_str_radix(text, 16).map_err(|_| Error::Archive {
        message: format!("corrupt cpio header field {text:?}"),
        path: None,
    })
}

fn skip_padding<R: Read>(reader: &mut R, consumed: u64) -> Result<()> {
    let pad = (4 - (consumed % 4)) % 4;
    if pad > 0 {
        std::io::copy(&mut reader.take(pad), &mut std::io::sink())
            .map_err(|e| Error::io(PathBuf::new(), e))?;
    }
    Ok(())
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
