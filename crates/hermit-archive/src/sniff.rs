//! Content sniffing.
//!
//! Formats are detected from file content, never extensions: release
//! artifacts are routinely misnamed. Compression wrappers are peeled
//! first and the decoded stream re-sniffed.

use std::io::Read;

/// Outer compression wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No wrapper.
    None,
    /// gzip.
    Gzip,
    /// bzip2.
    Bzip2,
    /// xz.
    Xz,
    /// zstandard.
    Zstd,
}

/// Inner archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// ZIP archive.
    Zip,
    /// POSIX tar.
    Tar,
    /// 7-Zip archive.
    SevenZip,
    /// `ar` archive (Debian packages).
    Ar,
    /// RPM package.
    Rpm,
    /// A bare executable (ELF, Mach-O, script).
    Executable,
    /// Nothing recognizable.
    Unknown,
}

/// Detect a compression wrapper from the first bytes.
#[must_use]
pub fn sniff_compression(header: &[u8]) -> Compression {
    match infer::get(header).map(|t| t.mime_type()) {
        Some("application/gzip") => Compression::Gzip,
        Some("application/x-bzip2") => Compression::Bzip2,
        Some("application/x-xz") => Compression::Xz,
        Some("application/zstd") => Compression::Zstd,
        _ => Compression::None,
    }
}

/// Detect the archive format of (possibly decoded) content.
#[must_use]
pub fn sniff_format(header: &[u8]) -> Format {
    if let Some(found) = infer::get(header) {
        match found.mime_type() {
            "application/zip" => return Format::Zip,
            "application/x-tar" => return Format::Tar,
            "application/x-7z-compressed" => return Format::SevenZip,
            "application/vnd.debian.binary-package" | "application/x-unix-archive" => {
                return Format::Ar
            }
            "application/x-rpm" => return Format::Rpm,
            "application/x-executable" | "application/x-mach-binary" => {
                return Format::Executable
            }
            _ => {}
        }
    }
    // infer's tar matcher needs the checksum to validate; fall back to the
    // `ustar` magic at offset 257 for archives it rejects.
    if header.len() > 262 && &header[257..262] == b"ustar" {
        return Format::Tar;
    }
    if header.starts_with(b"#!") {
        return Format::Executable;
    }
    Format::Unknown
}

/// Wrap a reader in the matching decompressor.
pub fn decoder<'a, R: Read + 'a>(
    compression: Compression,
    reader: R,
) -> std::io::Result<Box<dyn Read + 'a>> {
    Ok(match compression {
        Compression::None => Box::new(reader),
        Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
        Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
        Compression::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
        Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
    })
}

/// Strip a compression suffix from a file name (`tool.gz` → `tool`).
#[must_use]
pub fn strip_compression_suffix(name: &str) -> &str {
    for suffix in [".gz", ".bz2", ".xz", ".zst"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            return stripped;
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn detects_compression_magics() {
        assert_eq!(
            sniff_compression(&[0x1f, 0x8b, 0x08, 0x00]),
            Compression::Gzip
        );
        assert_eq!(sniff_compression(b"BZh91AY"), Compression::Bzip2);
        assert_eq!(
            sniff_compression(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]),
            Compression::Xz
        );
        assert_eq!(
            sniff_compression(&[0x28, 0xb5, 0x2f, 0xfd, 0x00]),
            Compression::Zstd
        );
        assert_eq!(sniff_compression(b"PK\x03\x04"), Compression::None);
    }

    #[test]
    fn detects_archive_formats() {
        assert_eq!(sniff_format(b"PK\x03\x04rest"), Format::Zip);
        assert_eq!(
            sniff_format(&[0x37, 0x7a, 0xbc, 0xaf, 0x27, 0x1c, 0x00]),
            Format::SevenZip
        );
        assert_eq!(sniff_format(b"!<arch>\x0adebian-binary"), Format::Ar);
        assert_eq!(sniff_format(b"\x7fELF\x02\x01\x01"), Format::Executable);
        assert_eq!(sniff_format(b"#!/bin/sh\necho"), Format::Executable);
        assert_eq!(sniff_format(b"plain text"), Format::Unknown);
    }

    #[test]
    fn detects_real_tar() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(2);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "a.txt", &b"hi"[..]).unwrap();
        let bytes = builder.into_inner().unwrap();
        assert_eq!(sniff_format(&bytes), Format::Tar);
    }

    #[test]
    fn gzip_round_trip_through_decoder() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"payload").unwrap();
        let bytes = encoder.finish().unwrap();
        let compression = sniff_compression(&bytes);
        let mut decoded = String::new();
        decoder(compression, &bytes[..])
            .unwrap()
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "payload");
    }

    #[test]
    fn compression_suffixes() {
        assert_eq!(strip_compression_suffix("tool.gz"), "tool");
        assert_eq!(strip_compression_suffix("tool"), "tool");
    }
}
